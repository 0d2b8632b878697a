//! `BotZapper` - feed filter host
//!
//! Stands in for the extension's settings page and popup, and runs content
//! surfaces over saved feed snapshots.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod snapshot;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use botzapper_core::reconciler::HIDDEN_POST_CLASS;
use botzapper_core::{
    ContentSurface, DenylistClient, DenylistStore, Policy, PolicyProvider, PopupView,
    SqliteStore, SurfaceHandle, SyncedArea, Tier, ZapperConfig,
};
use botzapper_feed::{FeedTree, MemoryTree};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapshot::FeedSnapshot;

/// Database file under the data directory.
const DATABASE_FILE: &str = "storage.db";
/// Area holding the denylist snapshot and counters.
const LOCAL_AREA: &str = "local";
/// Area holding the blocking level.
const SYNC_AREA: &str = "sync";
/// How long the popup waits for a content surface.
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (default: <config dir>/botzapper/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the storage database (default: <data dir>/botzapper)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or set the blocking level.
    Level {
        /// New level; omit to print the current one.
        level: Option<LevelArg>,
    },
    /// Refresh the denylist and print the tier sizes.
    Refresh,
    /// Print hidden post counters and denylist statistics.
    Stats,
    /// Filter a saved feed snapshot and report what was hidden.
    Scan {
        /// JSON file with `sections[].posts[]`.
        feed: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LevelArg {
    Low,
    Medium,
    High,
}

impl From<LevelArg> for Policy {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Low => Self::Low,
            LevelArg::Medium => Self::Medium,
            LevelArg::High => Self::High,
        }
    }
}

/// Local and synced storage areas sharing one database.
struct Areas {
    local: SqliteStore,
    synced: SyncedArea<SqliteStore>,
}

impl Areas {
    async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;
        let path = data_dir.join(DATABASE_FILE);
        debug!(path = %path.display(), "Opening storage");
        let local = SqliteStore::new(&path.to_string_lossy(), LOCAL_AREA).await?;
        let synced = SyncedArea::new(local.area(SYNC_AREA));
        Ok(Self { local, synced })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botzapper=info,botzapper_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(ZapperConfig::default_path);
    let config = ZapperConfig::load(&config_path).await?;
    let data_dir = args.data_dir.unwrap_or_else(ZapperConfig::data_dir);
    let areas = Areas::open(&data_dir).await?;

    match args.command {
        Command::Level { level } => level_command(areas, level).await,
        Command::Refresh => refresh_command(&config, areas).await,
        Command::Stats => stats_command(&areas).await,
        Command::Scan { feed } => scan_command(&config, areas, &feed).await,
    }
}

async fn level_command(areas: Areas, level: Option<LevelArg>) -> anyhow::Result<()> {
    let mut policy = PolicyProvider::new(areas.synced);
    match level {
        Some(level) => {
            policy.set(level.into()).await?;
            println!("Settings saved! Blocking level: {}", policy.get());
        }
        None => println!("{}", policy.refresh().await),
    }
    Ok(())
}

async fn refresh_command(config: &ZapperConfig, areas: Areas) -> anyhow::Result<()> {
    let client = DenylistClient::new(&config.denylist_url)?;
    let mut store = DenylistStore::new(client, areas.local, config.freshness_window());
    let denylist = store.refresh().await?;

    if let Some(source) = store.last_source() {
        println!("Source: {source:?}");
    }
    for tier in Tier::ALL {
        println!("{tier}: {}", denylist.tier(tier).len());
    }
    Ok(())
}

async fn stats_command(areas: &Areas) -> anyhow::Result<()> {
    // No content surface is reachable from here, so the session count is N/A.
    let view = PopupView::load::<_, MemoryTree>(&areas.local, None, MESSAGE_TIMEOUT).await;
    print!("{view}");
    Ok(())
}

async fn scan_command(config: &ZapperConfig, areas: Areas, path: &Path) -> anyhow::Result<()> {
    let snapshot = FeedSnapshot::load(path).await?;
    let feed = snapshot.render(&config.markers);
    info!(
        sections = feed.sections.len(),
        posts = feed.posts.len(),
        "Scanning feed snapshot"
    );

    let mut surface = ContentSurface::new(feed.tree, config, areas.local, areas.synced)?;
    let report = surface.activate().await;

    // Stop right away; shutting down saves the counters.
    let (handle, events) = SurfaceHandle::channel();
    handle.shutdown().await;
    surface.run(events).await?;

    let tree = surface.tree();
    for (post, label) in &feed.posts {
        if tree.has_class(*post, HIDDEN_POST_CLASS) {
            println!("hidden  {label}");
        }
    }
    println!(
        "{} posts in {} sections: {} hidden, {} sections collapsed, {} unidentified",
        report.posts, report.sections, report.hidden, report.collapsed, report.unidentified
    );
    println!(
        "Hidden all time: {}",
        surface.ledger().all_time_count()
    );
    Ok(())
}
