use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lifestream_core::storage::STORE_FILE_NAME;
use lifestream_core::{
    run_fetch, AdapterRegistry, AppConfig, FetchConfig, Render, TimelineQuery, TimelineStore,
};
use reqwest::{redirect, Client, ClientBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Fetch new activity from every configured account and batch it into the timeline.
#[derive(Parser)]
#[command(name = "lifestream-fetch", version, about)]
struct Cli {
    /// Logging verbosity: trace, debug, info, warn or error.
    #[arg(short, long, default_value = "info")]
    loglevel: String,

    /// Configuration root holding config.json and the timeline store.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all active accounts once (default).
    Fetch,

    /// Print the stored timeline, newest entries first.
    Timeline {
        /// Maximum number of entries to print.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Only show entries of this account id.
        #[arg(short, long)]
        account: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.loglevel);

    // Failures are reported through the log; the process always exits zero.
    if let Err(err) = run(cli).await {
        error!(error = %err, "lifestream run aborted");
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.config {
        Some(path) => path,
        None => AppConfig::default_root()?,
    };
    if !root.exists() {
        warn!(path = %root.display(), "configuration directory does not exist");
    }
    info!(path = %root.display(), "configuration root");

    let store = TimelineStore::load_from(root.join(STORE_FILE_NAME)).await;

    match cli.command.unwrap_or(Command::Fetch) {
        Command::Fetch => {
            let config = AppConfig::load_from_dir(&root)?;
            let accounts = config.accounts()?;
            let registry = AdapterRegistry::new(&config.endpoints);
            let fetch_config = FetchConfig::from(&config.fetch);
            let client = build_client(&fetch_config)?;

            let summary = run_fetch(&accounts, &registry, &client, &fetch_config, &store).await;
            for account in &summary.accounts {
                info!(
                    account = %account.account,
                    status = ?account.status,
                    created = account.created,
                    existing = account.existing,
                    failed = account.failed,
                    "account summary"
                );
            }
            info!(%summary, "run summary");
        }
        Command::Timeline { limit, account } => {
            let query = TimelineQuery {
                account: account.map(lifestream_core::AccountId::new),
                limit: Some(limit),
            };
            for entry in store.timeline(&query).await {
                println!(
                    "{} .. {}  [{}] {:?}",
                    entry.span_start.format("%Y-%m-%d %H:%M"),
                    entry.span_end.format("%H:%M"),
                    entry.account_id,
                    entry.content_kind
                );
                for activity in &entry.members {
                    let rendered = activity.render();
                    println!(
                        "    {}  {}",
                        rendered.headline,
                        rendered.link.as_deref().unwrap_or_default()
                    );
                }
            }
        }
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_ascii_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_client(config: &FetchConfig) -> anyhow::Result<Client> {
    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .timeout(config.request_timeout)
        .user_agent(concat!("lifestream/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
