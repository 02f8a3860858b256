use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use downwatch_check::{BatchRunner, HttpProber, RunSummary, Scope};
use downwatch_core::DownwatchConfig;
use downwatch_notify::Notifier;

use crate::OutputFormat;

pub async fn run(
    config: &DownwatchConfig,
    user_id: Option<u64>,
    url_id: Option<u64>,
    format: OutputFormat,
    every: Option<u64>,
) -> anyhow::Result<()> {
    let scope = Scope::from_selectors(user_id, url_id)?;

    let store = super::open_store(config)?;
    let prober = HttpProber::new(&config.probe)?;
    let notifier = Notifier::from_config(&config.notify)?;
    let runner = BatchRunner::new(Arc::new(store), Arc::new(prober), notifier, &config.runner);

    let Some(every) = every else {
        let summary = runner.run(scope).await?;
        print_summary(&summary, format)?;
        if summary.has_failures() {
            anyhow::bail!(
                "check finished with {} undelivered report(s), {} endpoint fault(s) and {} missing target(s)",
                summary.failed.len(),
                summary.faults.len(),
                summary.not_found.len()
            );
        }
        return Ok(());
    };

    // A run in progress always completes; Ctrl-C only cuts the wait.
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    });

    let interval = Duration::from_secs(every);
    info!(%scope, every, "repeating checks until Ctrl-C");
    loop {
        match runner.run(scope).await {
            Ok(summary) => print_summary(&summary, format)?,
            Err(e) => error!(%scope, error = %e, "check run failed"),
        }

        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    info!("checks stopped");
    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", summary.render_json()?),
        OutputFormat::Text => print!("{}", summary.render_text()),
    }
    Ok(())
}
