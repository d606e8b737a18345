use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use stock_alerts::api::{ApiClient, ApiError};
use stock_alerts::config::{Config, ConfigError, Mode};
use stock_alerts::feed::{Feed, InventoryLink};
use stock_alerts::ledger::{Ledger, SystemClock};
use stock_alerts::poller::{self, Source};
use stock_alerts::report::{cached_stock_report, refresh_stock_report};
use stock_alerts::routes::{self, InventoryState};
use stock_alerts::store::{FileBackend, Notice, Store, StoreError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid JSON value: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("not an inventory link or part id: {0}")]
    InvalidLink(String),
    #[error("server failed: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "stock-alerts", about = "Low-stock notifications for the maintenance dashboard")]
struct Cli {
    /// Inventory API base URL (overrides STOCK_ALERTS_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// Notification source: remote or local (overrides STOCK_ALERTS_MODE).
    #[arg(long, value_parser = Mode::parse)]
    mode: Option<Mode>,

    /// Store file (overrides STOCK_ALERTS_STORE_PATH).
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Raw key-value store access.
    Kv(KvCommand),
    /// Local notification ledger.
    Notify(NotifyCommand),
    /// Poll notifications and print the feed until Ctrl-C.
    Watch,
    /// Cached stock report.
    Report(ReportCommand),
    /// Resolve an inventory deep link (or bare part id) against the cached report.
    Open { target: String },
    /// Serve the alert endpoints from an inventory file.
    Serve {
        #[arg(long)]
        inventory: PathBuf,
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
}

#[derive(Args, Debug)]
struct KvCommand {
    #[command(subcommand)]
    command: KvSubcommand,
}

#[derive(Subcommand, Debug)]
enum KvSubcommand {
    Get { key: String },
    Set { key: String, value: String },
    Rm { key: String },
}

#[derive(Args, Debug)]
struct NotifyCommand {
    #[command(subcommand)]
    command: NotifySubcommand,
}

#[derive(Subcommand, Debug)]
enum NotifySubcommand {
    Add { message: String },
    List,
    Clear,
}

#[derive(Args, Debug)]
struct ReportCommand {
    #[command(subcommand)]
    command: ReportSubcommand,
}

#[derive(Subcommand, Debug)]
enum ReportSubcommand {
    Refresh,
    Show,
}

/// Blocking notices go straight to the terminal.
struct StderrNotice;

impl Notice for StderrNotice {
    fn alert(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = stock_alerts::config::normalize_base_url(&url);
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(path) = cli.store {
        config.store_path = path;
    }

    let store = Store::new(
        Arc::new(FileBackend::new(&config.store_path, Some(config.store_quota_bytes))),
        Arc::new(StderrNotice),
    );

    match cli.command {
        Command::Kv(kv) => run_kv(&store, kv.command),
        Command::Notify(notify) => {
            run_notify(&ledger(&config, &store), notify.command);
            Ok(())
        }
        Command::Watch => run_watch(&config, &store).await,
        Command::Report(report) => run_report(&config, &store, report.command).await,
        Command::Open { target } => run_open(&store, &target),
        Command::Serve { inventory, bind } => run_serve(inventory, bind).await,
    }
}

fn ledger(config: &Config, store: &Store) -> Ledger {
    Ledger::new(store.clone(), config.notifications_key.clone(), Arc::new(SystemClock))
}

fn run_kv(store: &Store, command: KvSubcommand) -> Result<(), CliError> {
    match command {
        KvSubcommand::Get { key } => match store.try_load::<Value>(&key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(none)"),
        },
        KvSubcommand::Set { key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            store.try_save(&key, &value)?;
        }
        KvSubcommand::Rm { key } => store.remove(&key)?,
    }
    Ok(())
}

fn run_notify(ledger: &Ledger, command: NotifySubcommand) {
    match command {
        NotifySubcommand::Add { message } => match ledger.add(&message) {
            Some(entry) => println!("{} {}", entry.id, entry.message),
            None => println!("not added"),
        },
        NotifySubcommand::List => {
            for entry in ledger.list() {
                println!("{} {}", entry.id, entry.message);
            }
        }
        NotifySubcommand::Clear => {
            if ledger.clear() {
                println!("cleared");
            }
        }
    }
}

async fn run_watch(config: &Config, store: &Store) -> Result<(), CliError> {
    let source = match config.mode {
        Mode::Remote => Source::Remote(ApiClient::new(&config.api_url, config.timeouts)?),
        Mode::Local => Source::Local(ledger(config, store)),
    };

    let handle = poller::spawn(source, config.poll_interval);
    let mut feed = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                print_feed(&snapshot);
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_feed(feed: &Feed) {
    println!("[{}] notifications", feed.badge_count());
    for item in feed.sorted() {
        println!("  {} {}  -> {}", item.id, item.message, InventoryLink::for_item(item));
    }
}

async fn run_report(config: &Config, store: &Store, command: ReportSubcommand) -> Result<(), CliError> {
    let rows = match command {
        ReportSubcommand::Refresh => {
            let api = ApiClient::new(&config.api_url, config.timeouts)?;
            refresh_stock_report(&api, store).await?
        }
        ReportSubcommand::Show => cached_stock_report(store),
    };
    for row in rows {
        let flag = if row.is_low() { "LOW" } else { "ok" };
        println!("{:>5} {:<30} {:>6} / {:<6} {flag}", row.id, row.name, row.quantity, row.min_quantity);
    }
    Ok(())
}

fn run_open(store: &Store, target: &str) -> Result<(), CliError> {
    let link = InventoryLink::parse(target)
        .or_else(|| target.parse::<i64>().ok().map(|part_id| InventoryLink { part_id }))
        .ok_or_else(|| CliError::InvalidLink(target.to_owned()))?;

    println!("{link}");
    let rows = cached_stock_report(store);
    if let Some(row) = link.resolve(&rows) {
        println!("editing {} ({}): qtd {} / min {}", row.name, row.id, row.quantity, row.min_quantity);
    }
    Ok(())
}

async fn run_serve(inventory: PathBuf, bind: SocketAddr) -> Result<(), CliError> {
    let app = routes::app(InventoryState::new(&inventory));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, inventory = %inventory.display(), "alert endpoints listening");
    axum::serve(listener, app).await?;
    Ok(())
}
