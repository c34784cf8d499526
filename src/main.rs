use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

mod config;
mod db;
mod detect;
mod error;
mod feed;
mod models;
mod notify;
mod pipeline;
mod render;
mod services;

use config::Config;
use db::{ArticleStore, Repository};
use error::Result;
use feed::FeedFetcher;
use notify::{DryRunNotifier, Notifier};
use pipeline::Pipeline;
use render::HtmlDiffRenderer;
use services::StatusClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    init_logging(&config)?;
    tracing::info!("Starting rss-diff");

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --history <article_id>: print stored versions and exit
    if args.len() >= 3 && args[1] == "--history" {
        return print_history(&config, &args[2]).await;
    }

    // --check: verify notifier credentials and exit
    if args.len() >= 2 && args[1] == "--check" {
        let (api_base, token) = config.notifier_credentials()?;
        let client = StatusClient::new(api_base, token.to_string())?;
        let account = client.verify_credentials().await?;
        println!("Notifier authenticated as {}", account);
        return Ok(());
    }

    let result = run_once(&config).await;
    if let Err(e) = &result {
        tracing::error!("Cycle aborted: {}", e);
    }
    tracing::info!("Finished rss-diff");
    result
}

async fn run_once(config: &Config) -> Result<()> {
    let feed_url = config.feed_url()?;
    let retry = config.retry.policy();

    let repository = Repository::new(&config.db_path).await?;
    let renderer = HtmlDiffRenderer::new(&config.output_dir)
        .with_image_command(config.image_command()?)
        .with_stylesheet(config.stylesheet()?);

    let notifier: Box<dyn Notifier> = if config.dry_run {
        tracing::info!("Dry-run mode: notifications are logged, not posted");
        Box::new(DryRunNotifier::new())
    } else {
        let (api_base, token) = config.notifier_credentials()?;
        Box::new(StatusClient::new(api_base, token.to_string())?)
    };

    let fetcher = FeedFetcher::new(retry.clone())?;
    let snapshot = fetcher.fetch(feed_url).await?;
    tracing::info!(
        "Parsing {} ({} entries)",
        snapshot.title.as_deref().unwrap_or(feed_url),
        snapshot.items.len()
    );

    let pipeline = Pipeline::new(&repository, notifier.as_ref(), &renderer, retry);
    let report = pipeline.run_cycle(snapshot.items).await;
    println!("{}", report);

    Ok(())
}

async fn print_history(config: &Config, article_id: &str) -> Result<()> {
    let repository = Repository::new(&config.db_path).await?;

    let Some(article) = repository.get_by_id(article_id).await? else {
        println!("Article {} is not tracked", article_id);
        return Ok(());
    };
    println!(
        "{} (status {}, first seen {}, thread {})",
        article.article_id,
        article.status.as_str(),
        article.first_seen_at.to_rfc3339(),
        article
            .thread_anchor_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    for version in repository.history(article_id).await? {
        println!(
            "v{} {} {}",
            version.version,
            version.recorded_at.to_rfc3339(),
            version.content_hash
        );
        println!("  url:      {}", version.fields.url);
        println!("  title:    {}", version.fields.title);
        println!("  author:   {}", version.fields.author);
        println!("  abstract: {}", version.fields.abstract_text);
    }
    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    // Keep HTTP internals quiet
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(PathBuf::from(dir).join("rss-diff.log"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
