use downwatch_state::{Owner, Repository, StateStore};

const MAX_FIELD_LEN: usize = 255;

pub fn add(store: &StateStore, username: &str, email: &str) -> anyhow::Result<()> {
    let owner = create(store, username, email)?;
    println!("✓ Added owner {} ({} <{}>)", owner.id, owner.username, owner.email);
    Ok(())
}

pub fn list(store: &StateStore) -> anyhow::Result<()> {
    let owners = store.list_all_owners()?;
    if owners.is_empty() {
        println!("No owners registered");
        return Ok(());
    }
    print!("{}", format_owners(&owners));
    Ok(())
}

fn create(store: &StateStore, username: &str, email: &str) -> anyhow::Result<Owner> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || username.len() > MAX_FIELD_LEN {
        anyhow::bail!("username must be 1-{MAX_FIELD_LEN} characters");
    }
    if !looks_like_email(email) || email.len() > MAX_FIELD_LEN {
        anyhow::bail!("invalid email address: {email}");
    }
    Ok(store.create_owner(username, email, super::now())?)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn format_owners(owners: &[Owner]) -> String {
    let name_width = owners
        .iter()
        .map(|o| o.username.chars().count())
        .max()
        .unwrap_or(0)
        .max("USERNAME".len());

    let mut out = format!("{:<6} {:<name_width$} EMAIL\n", "ID", "USERNAME");
    for owner in owners {
        out.push_str(&format!(
            "{:<6} {:<name_width$} {}\n",
            owner.id, owner.username, owner.email
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_and_validates() {
        let store = StateStore::open_in_memory().unwrap();
        let owner = create(&store, "  alice ", " alice@example.com ").unwrap();
        assert_eq!(owner.username, "alice");
        assert_eq!(owner.email, "alice@example.com");

        assert!(create(&store, "", "x@example.com").is_err());
        assert!(create(&store, "bob", "not-an-email").is_err());
        assert!(create(&store, "bob", "bob@localhost").is_err());
        assert!(create(&store, &"b".repeat(256), "bob@example.com").is_err());
    }

    #[test]
    fn duplicate_owner_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        create(&store, "alice", "alice@example.com").unwrap();
        let err = create(&store, "alice", "a2@example.com").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn owners_table_aligns_columns() {
        let owners = vec![
            Owner {
                id: 1,
                username: "al".to_string(),
                email: "al@example.com".to_string(),
                created_at: 0,
            },
            Owner {
                id: 12,
                username: "bartholomew".to_string(),
                email: "bart@example.com".to_string(),
                created_at: 0,
            },
        ];
        let table = format_owners(&owners);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "ID     USERNAME    EMAIL");
        assert_eq!(lines[1], "1      al          al@example.com");
        assert_eq!(lines[2], "12     bartholomew bart@example.com");
    }
}
