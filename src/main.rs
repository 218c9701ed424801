use clap::Parser;
use recipe_crawler::{
    config::{filter_sites, load_sites},
    http::ReqwestClient,
    Crawl, CrawlerError,
};
use std::{error::Error as _, time::Instant};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

mod cli;

async fn run(cli: cli::Cli) -> Result<(), CrawlerError> {
    let started = Instant::now();

    let sites = filter_sites(load_sites(&cli.config)?, cli.filter.as_deref())?;
    let settings = cli.settings();
    let client = ReqwestClient::new(&settings)?;

    let mut crawl = Crawl::new(client, settings, sites)?;
    let cookbook = crawl.run().await;

    let path = cookbook.write(&cli.output)?;
    cookbook.write_license_summary(&path)?;

    let stats = cookbook.stats;
    info!(
        "{} recipe(s) from {} page(s): {} GET request(s), {:.2} MiB downloaded, {} robots skip(s), {} failure(s)",
        cookbook.len(),
        stats.pages_visited,
        stats.fetch.get_calls,
        stats.fetch.bytes_downloaded as f64 / (1024.0 * 1024.0),
        stats.fetch.robots_skipped,
        stats.fetch.failures
    );
    info!("Finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = cli::Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
