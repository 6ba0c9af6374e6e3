mod browser;
mod config;
mod dates;
mod db;
mod scraper;

use std::path::PathBuf;

use clap::Parser;

use crate::browser::webdriver::ChromeSession;
use crate::config::Config;
use crate::db::JobStore;
use crate::scraper::Scraper;

#[derive(Parser)]
#[command(
    name = "seek_scraper",
    about = "Scrape applied jobs from Seek into a local SQLite store"
)]
struct Cli {
    /// SQLite file (overrides DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Stop after N list pages
    #[arg(long)]
    max_pages: Option<u32>,
    /// Print the stored row count and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.stats {
        let path = cli.db.unwrap_or_else(Config::db_path_from_env);
        let store = JobStore::open(&path)?;
        println!("Stored jobs: {}", store.count()?);
        return store.close();
    }

    let mut cfg = Config::from_env()?;
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }

    let store = JobStore::open(&cfg.db_path)?;
    let session = ChromeSession::launch(&cfg).await?;

    let result = Scraper::new(&session).run(&store, cli.max_pages).await;

    session.quit().await.ok();
    store.close()?;

    let stats = result?;
    println!(
        "All done. {} pages, {} saved, {} skipped, {} failed.",
        stats.pages, stats.saved, stats.skipped, stats.failed
    );
    Ok(())
}
