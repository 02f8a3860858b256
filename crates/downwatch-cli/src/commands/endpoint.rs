use reqwest::Url;
use tracing::info;

use downwatch_check::{HttpProber, Prober, normalize};
use downwatch_core::DownwatchConfig;
use downwatch_state::{DownLogEntry, Endpoint, EndpointId, OwnerId, Repository, StateStore};

const MAX_URL_LEN: usize = 255;

pub async fn add(config: &DownwatchConfig, store: &StateStore, owner: OwnerId, url: &str) -> anyhow::Result<()> {
    let prober = HttpProber::new(&config.probe)?;
    let endpoint = register(store, &prober, owner, url).await?;
    println!(
        "✓ Added endpoint {} {} ({})",
        endpoint.id,
        endpoint.address,
        status_label(&endpoint)
    );
    Ok(())
}

pub async fn update(config: &DownwatchConfig, store: &StateStore, id: EndpointId, url: &str) -> anyhow::Result<()> {
    let prober = HttpProber::new(&config.probe)?;
    let endpoint = repoint(store, &prober, id, url).await?;
    println!(
        "✓ Updated endpoint {} {} ({})",
        endpoint.id,
        endpoint.address,
        status_label(&endpoint)
    );
    Ok(())
}

pub fn show(store: &StateStore, id: EndpointId) -> anyhow::Result<()> {
    let Some(endpoint) = store.find_endpoint(id)? else {
        anyhow::bail!("endpoint {id} not found");
    };
    let down_log = store.find_down_log(id)?;
    print!("{}", format_endpoint(&endpoint, down_log.as_ref(), super::now()));
    Ok(())
}

pub fn remove(store: &StateStore, id: u64) -> anyhow::Result<()> {
    if !store.delete_endpoint(id)? {
        anyhow::bail!("endpoint {id} not found");
    }
    println!("✓ Removed endpoint {id}");
    Ok(())
}

pub fn list(store: &StateStore, owner: Option<OwnerId>) -> anyhow::Result<()> {
    let endpoints = match owner {
        Some(id) => {
            if store.find_owner(id)?.is_none() {
                anyhow::bail!("owner {id} not found");
            }
            store.endpoints_of(id)?
        }
        None => store.list_endpoints()?,
    };
    if endpoints.is_empty() {
        println!("No endpoints registered");
        return Ok(());
    }
    print!("{}", format_endpoints(&endpoints));
    Ok(())
}

/// Validate `url`, probe it once, and store it with the observed status.
/// An endpoint that is down at registration gets its down log opened now.
async fn register(
    store: &StateStore,
    prober: &dyn Prober,
    owner: OwnerId,
    url: &str,
) -> anyhow::Result<Endpoint> {
    let address = validate_url(url)?;
    if store.find_owner(owner)?.is_none() {
        anyhow::bail!("owner {owner} not found");
    }

    let verdict = prober.probe(&address).await;
    let endpoint = store.create_endpoint(owner, &address, verdict.is_reachable(), super::now())?;
    info!(endpoint_id = endpoint.id, owner_id = owner, ?verdict, "endpoint registered");
    Ok(endpoint)
}

/// Validate `url`, probe it, and point endpoint `id` at it. The old down
/// log is dropped either way; a new one is opened if the new address is down.
async fn repoint(
    store: &StateStore,
    prober: &dyn Prober,
    id: EndpointId,
    url: &str,
) -> anyhow::Result<Endpoint> {
    let address = validate_url(url)?;
    if store.find_endpoint(id)?.is_none() {
        anyhow::bail!("endpoint {id} not found");
    }

    let verdict = prober.probe(&address).await;
    let endpoint = store.update_endpoint_address(id, &address, verdict.is_reachable(), super::now())?;
    info!(endpoint_id = id, ?verdict, "endpoint address updated");
    Ok(endpoint)
}

fn validate_url(url: &str) -> anyhow::Result<String> {
    let url = url.trim();
    if url.len() > MAX_URL_LEN {
        anyhow::bail!("url must be at most {MAX_URL_LEN} characters");
    }
    let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("invalid url {url}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported url scheme {}: only http and https are checked", parsed.scheme());
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("url {url} has no host");
    }
    Ok(url.to_string())
}

fn status_label(endpoint: &Endpoint) -> &'static str {
    if endpoint.is_active { "up" } else { "down" }
}

fn format_endpoint(endpoint: &Endpoint, down_log: Option<&DownLogEntry>, now: u64) -> String {
    let mut out = format!(
        "ID:      {}\nOWNER:   {}\nURL:     {}\nSTATUS:  {}\nUPDATED: {}\n",
        endpoint.id,
        endpoint.owner_id,
        endpoint.address,
        status_label(endpoint),
        endpoint.updated_at
    );
    if let Some(entry) = down_log {
        let downtime = normalize(now.saturating_sub(entry.opened_at));
        out.push_str(&format!("DOWN:    since {} ({downtime})\n", entry.opened_at));
    }
    out
}

fn format_endpoints(endpoints: &[Endpoint]) -> String {
    let mut out = format!("{:<6} {:<6} {:<6} URL\n", "ID", "OWNER", "STATUS");
    for endpoint in endpoints {
        out.push_str(&format!(
            "{:<6} {:<6} {:<6} {}\n",
            endpoint.id,
            endpoint.owner_id,
            status_label(endpoint),
            endpoint.address
        ));
    }
    out
}
