use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use hosts_blocker::driver::{delete_site, update_site};
use hosts_blocker::schedule::parse_time;
use hosts_blocker::{
    BlockWindow, Driver, InstanceLock, Settings, SiteRegistry, SqliteRegistry, StateFile,
    block_page, decide,
};

#[derive(Parser)]
#[command(name = "hosts-blocker", version, about = "Block websites through the hosts file")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, short, default_value = "hosts-blocker.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered sites
    List,
    /// Register a site
    Add { url: String },
    /// Change the URL of a registered site
    Update { id: i64, url: String },
    /// Remove a registered site
    Delete { id: i64 },
    /// Turn blocking on
    Enable,
    /// Turn blocking off
    Disable,
    /// Only block between START and END (HH:MM, may wrap past midnight)
    Schedule { start: String, end: String },
    /// Block at any time of day while enabled
    Unschedule,
    /// Show toggles, window, and what the hosts file currently holds
    Status,
    /// Keep the hosts file reconciled until interrupted
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let state_file = StateFile::new(&settings.state_file);

    match cli.command {
        Commands::List => {
            let registry = open_registry(&settings)?;
            for site in registry.list()? {
                println!("{}\t{}", site.id, site.url);
            }
            registry.close()?;
        }
        Commands::Add { url } => {
            let mut registry = open_registry(&settings)?;
            let id = registry.add(&url)?;
            registry.close()?;
            println!("{id}");
        }
        Commands::Update { id, url } => {
            let mut registry = open_registry(&settings)?;
            let result = update_site(&settings.hosts_file(), &mut registry, id, &url);
            registry.close()?;
            result?;
        }
        Commands::Delete { id } => {
            let mut registry = open_registry(&settings)?;
            let result = delete_site(&settings.hosts_file(), &mut registry, id);
            registry.close()?;
            result?;
        }
        Commands::Enable => {
            state_file.modify(|s| s.enabled = true)?;
        }
        Commands::Disable => {
            state_file.modify(|s| s.enabled = false)?;
        }
        Commands::Schedule { start, end } => {
            let window = BlockWindow::new(parse_time(&start)?, parse_time(&end)?);
            state_file.modify(|s| {
                s.window = window;
                s.time_restricted = true;
            })?;
            println!("blocking between {window}");
        }
        Commands::Unschedule => {
            state_file.modify(|s| s.time_restricted = false)?;
        }
        Commands::Status => status(&settings, &state_file)?,
        Commands::Run => run(&settings, state_file).await?,
    }
    Ok(())
}

fn open_registry(settings: &Settings) -> Result<SqliteRegistry> {
    SqliteRegistry::open(&settings.database)
        .with_context(|| format!("opening site registry {}", settings.database.display()))
}

fn status(settings: &Settings, state_file: &StateFile) -> Result<()> {
    let state = state_file.load()?;
    let registry = open_registry(settings)?;
    let sites = registry.list()?;
    registry.close()?;

    let hosts = settings.hosts_file();
    let present = hosts.blocked_urls(&sites)?;

    println!("enabled:         {}", state.enabled);
    println!("time restricted: {}", state.time_restricted);
    println!("window:          {}", state.window);
    println!("target now:      {}", decide(&state, Local::now().time()));
    println!("hosts file:      {}", hosts.path().display());
    println!("sites in file:   {}/{}", present.len(), sites.len());
    Ok(())
}

async fn run(settings: &Settings, state_file: StateFile) -> Result<()> {
    let lock = InstanceLock::acquire(&settings.lock_file)?;

    let hosts = settings.hosts_file();
    let backup = settings.backup_path();
    hosts
        .backup(&backup)
        .with_context(|| format!("backing up {}", hosts.path().display()))?;

    let registry = open_registry(settings)?;
    let driver = Driver::new(hosts, registry, state_file)
        .with_interval(settings.interval())
        .with_tick_timeout(settings.tick_timeout());

    let cancel = CancellationToken::new();
    let page = settings.block_page.map(|addr| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = block_page::serve(addr, cancel).await {
                error!(error = %e, "Block page failed");
            }
        })
    });

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    driver.run(cancel).await;

    if let Some(page) = page {
        if let Err(e) = page.await {
            error!(error = %e, "Block page task panicked");
        }
    }
    lock.release()?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}
