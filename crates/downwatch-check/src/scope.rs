//! Which endpoints a run covers, and their grouping by owner.

use std::fmt;

use serde::Serialize;

use downwatch_state::{Endpoint, EndpointId, Owner, OwnerId, Repository};

use crate::error::{CheckError, CheckResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Scope {
    /// One endpoint, reported to its owner.
    SingleEndpoint(EndpointId),
    /// Every endpoint of one owner.
    OwnerEndpoints(OwnerId),
    /// Every endpoint of every owner.
    AllEndpoints,
}

impl Scope {
    /// Build a scope from the optional owner/endpoint selectors of a check
    /// invocation. Supplying both is rejected.
    pub fn from_selectors(owner: Option<OwnerId>, endpoint: Option<EndpointId>) -> CheckResult<Self> {
        match (owner, endpoint) {
            (Some(_), Some(_)) => Err(CheckError::ConflictingScope),
            (Some(owner), None) => Ok(Scope::OwnerEndpoints(owner)),
            (None, Some(endpoint)) => Ok(Scope::SingleEndpoint(endpoint)),
            (None, None) => Ok(Scope::AllEndpoints),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::SingleEndpoint(id) => write!(f, "endpoint {id}"),
            Scope::OwnerEndpoints(id) => write!(f, "owner {id}"),
            Scope::AllEndpoints => f.write_str("all endpoints"),
        }
    }
}

/// An owner together with the endpoints to check for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerBatch {
    pub owner: Owner,
    pub endpoints: Vec<Endpoint>,
}

/// Result of resolving a scope.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub batches: Vec<OwnerBatch>,
    /// Targets that could not be found, e.g. `"endpoint 7"`.
    pub not_found: Vec<String>,
}

/// Group the endpoints covered by `scope` by owner, in store order.
///
/// Missing targets are recorded rather than failing the resolution. An
/// endpoint whose owner record is gone is reported as not found too.
pub(crate) fn resolve(repo: &dyn Repository, scope: Scope) -> CheckResult<Resolution> {
    let mut resolution = Resolution::default();

    match scope {
        Scope::SingleEndpoint(id) => match repo.find_endpoint(id)? {
            None => resolution.not_found.push(format!("endpoint {id}")),
            Some(endpoint) => match repo.find_owner(endpoint.owner_id)? {
                None => resolution
                    .not_found
                    .push(format!("owner {} of endpoint {id}", endpoint.owner_id)),
                Some(owner) => resolution.batches.push(OwnerBatch {
                    owner,
                    endpoints: vec![endpoint],
                }),
            },
        },
        Scope::OwnerEndpoints(id) => match repo.find_owner(id)? {
            None => resolution.not_found.push(format!("owner {id}")),
            Some(owner) => {
                let endpoints = repo.endpoints_of(owner.id)?;
                resolution.batches.push(OwnerBatch { owner, endpoints });
            }
        },
        Scope::AllEndpoints => {
            for owner in repo.list_all_owners()? {
                let endpoints = repo.endpoints_of(owner.id)?;
                if endpoints.is_empty() {
                    continue;
                }
                resolution.batches.push(OwnerBatch { owner, endpoints });
            }
        }
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use downwatch_state::StateStore;

    fn store() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        let alice = store.create_owner("alice", "alice@example.com", 0).unwrap();
        let bob = store.create_owner("bob", "bob@example.com", 0).unwrap();
        store.create_owner("carol", "carol@example.com", 0).unwrap();
        store.create_endpoint(alice.id, "https://a1.example", true, 0).unwrap();
        store.create_endpoint(alice.id, "https://a2.example", true, 0).unwrap();
        store.create_endpoint(bob.id, "https://b1.example", true, 0).unwrap();
        store
    }

    #[test]
    fn selectors_map_to_scopes() {
        assert_eq!(Scope::from_selectors(None, None).unwrap(), Scope::AllEndpoints);
        assert_eq!(Scope::from_selectors(Some(3), None).unwrap(), Scope::OwnerEndpoints(3));
        assert_eq!(Scope::from_selectors(None, Some(9)).unwrap(), Scope::SingleEndpoint(9));
        assert!(matches!(
            Scope::from_selectors(Some(3), Some(9)),
            Err(CheckError::ConflictingScope)
        ));
    }

    #[test]
    fn all_endpoints_groups_by_owner_and_skips_empty_owners() {
        let store = store();
        let resolution = resolve(&store, Scope::AllEndpoints).unwrap();

        let shape: Vec<(&str, usize)> = resolution
            .batches
            .iter()
            .map(|b| (b.owner.username.as_str(), b.endpoints.len()))
            .collect();
        assert_eq!(shape, vec![("alice", 2), ("bob", 1)]);
        assert!(resolution.not_found.is_empty());
    }

    #[test]
    fn owner_scope_keeps_endpoint_order() {
        let store = store();
        let resolution = resolve(&store, Scope::OwnerEndpoints(1)).unwrap();
        let addresses: Vec<&str> = resolution.batches[0]
            .endpoints
            .iter()
            .map(|e| e.address.as_str())
            .collect();
        assert_eq!(addresses, vec!["https://a1.example", "https://a2.example"]);
    }

    #[test]
    fn single_endpoint_resolves_its_owner() {
        let store = store();
        let resolution = resolve(&store, Scope::SingleEndpoint(3)).unwrap();
        assert_eq!(resolution.batches.len(), 1);
        assert_eq!(resolution.batches[0].owner.username, "bob");
        assert_eq!(resolution.batches[0].endpoints[0].address, "https://b1.example");
    }

    #[test]
    fn missing_targets_are_reported_not_fatal() {
        let store = store();

        let r = resolve(&store, Scope::SingleEndpoint(99)).unwrap();
        assert!(r.batches.is_empty());
        assert_eq!(r.not_found, vec!["endpoint 99".to_string()]);

        let r = resolve(&store, Scope::OwnerEndpoints(42)).unwrap();
        assert_eq!(r.not_found, vec!["owner 42".to_string()]);
    }

    #[test]
    fn empty_store_resolves_to_nothing() {
        let store = StateStore::open_in_memory().unwrap();
        let r = resolve(&store, Scope::AllEndpoints).unwrap();
        assert!(r.batches.is_empty());
        assert!(r.not_found.is_empty());
    }

    #[test]
    fn display_names_the_target() {
        assert_eq!(Scope::SingleEndpoint(4).to_string(), "endpoint 4");
        assert_eq!(Scope::OwnerEndpoints(2).to_string(), "owner 2");
        assert_eq!(Scope::AllEndpoints.to_string(), "all endpoints");
    }
}
