pub mod check;
pub mod endpoint;
pub mod owner;

use anyhow::Context;
use tracing::debug;

use downwatch_core::DownwatchConfig;
use downwatch_state::StateStore;

/// Open the configured store, creating its parent directory if needed.
pub fn open_store(config: &DownwatchConfig) -> anyhow::Result<StateStore> {
    let path = &config.store.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = StateStore::open(path)
        .with_context(|| format!("failed to open store {}", path.display()))?;
    debug!(path = %path.display(), "store ready");
    Ok(store)
}

/// Current Unix time in seconds.
pub fn now() -> u64 {
    use downwatch_check::Clock;
    downwatch_check::SystemClock.now()
}
