use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "downwatch",
    about = "downwatch — URL uptime checks with per-owner status reports",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Config file (default: ./downwatch.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe endpoints, update their status and send reports.
    ///
    /// With no selector every endpoint in the system is checked.
    Check {
        /// Only check the endpoints of this owner
        #[arg(long, conflicts_with = "url_id")]
        user_id: Option<u64>,
        /// Only check this endpoint
        #[arg(long)]
        url_id: Option<u64>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Repeat the check every SECS seconds until Ctrl-C
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        every: Option<u64>,
    },
    /// Manage owners
    Owner {
        #[command(subcommand)]
        action: OwnerAction,
    },
    /// Manage monitored endpoints
    Endpoint {
        #[command(subcommand)]
        action: EndpointAction,
    },
}

#[derive(Subcommand)]
enum OwnerAction {
    /// Register an owner
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// List owners
    List,
}

#[derive(Subcommand)]
enum EndpointAction {
    /// Register an endpoint; it is probed once to record its initial status
    Add {
        /// Owner id
        #[arg(long)]
        owner: u64,
        #[arg(long)]
        url: String,
    },
    /// Point an endpoint at a new URL; it is probed again and its down log restarts
    Update {
        id: u64,
        #[arg(long)]
        url: String,
    },
    /// Show one endpoint and its open downtime, if any
    Show { id: u64 },
    /// Remove an endpoint and its down log
    Remove { id: u64 },
    /// List endpoints
    List {
        /// Only list this owner's endpoints
        #[arg(long)]
        owner: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

const DEFAULT_LOG_FILTER: &str = "info,downwatch=info";

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let config = downwatch_core::DownwatchConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            user_id,
            url_id,
            format,
            every,
        } => commands::check::run(&config, user_id, url_id, format, every).await,
        Commands::Owner { action } => {
            let store = commands::open_store(&config)?;
            match action {
                OwnerAction::Add { username, email } => {
                    commands::owner::add(&store, &username, &email)
                }
                OwnerAction::List => commands::owner::list(&store),
            }
        }
        Commands::Endpoint { action } => {
            let store = commands::open_store(&config)?;
            match action {
                EndpointAction::Add { owner, url } => {
                    commands::endpoint::add(&config, &store, owner, &url).await
                }
                EndpointAction::Update { id, url } => {
                    commands::endpoint::update(&config, &store, id, &url).await
                }
                EndpointAction::Show { id } => commands::endpoint::show(&store, id),
                EndpointAction::Remove { id } => commands::endpoint::remove(&store, id),
                EndpointAction::List { owner } => commands::endpoint::list(&store, owner),
            }
        }
    }
}
