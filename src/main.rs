mod affiliate;
mod compose;
mod config;
mod deal;
mod email;
mod extract;
mod history;
mod pipeline;
mod publish;
mod sources;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "dealcaster", about = "Fetches deals and posts them to Threads")]
enum Cli {
    /// Fetch, convert, and publish today's deals (default when no
    /// subcommand is given)
    #[command(alias = "run")]
    Post,
    /// Fetch and print deals without converting or publishing
    Scrape,
    /// Send the rendered digest by email instead of posting
    Email,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Default to Post when no subcommand is given, but still allow
    // --help and --version to work.
    let args: Vec<String> = std::env::args().collect();
    let cli = if args.len() <= 1 { Cli::Post } else { Cli::parse() };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dealcaster=info,reqwest=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;

    match cli {
        Cli::Post => pipeline::run(&config).await,
        Cli::Scrape => scrape(&config).await,
        Cli::Email => email_digest(&config).await,
    }
}

/// Scraper-only mode: fetch and rank, then print what a run would see.
async fn scrape(config: &config::Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build HTTP client")?;

    let deals = deal::dedup_and_rank(sources::fetch_all(config, &client).await);
    tracing::info!(count = deals.len(), "Fetched deals");
    println!(
        "{}",
        serde_json::to_string_pretty(&deals).context("failed to serialize deals")?
    );
    Ok(())
}

/// Notification variant: same fetch/convert path, digest goes out by SMTP.
async fn email_digest(config: &config::Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build HTTP client")?;

    let deals = deal::dedup_and_rank(sources::fetch_all(config, &client).await);
    if deals.is_empty() {
        tracing::warn!("No deals fetched, no digest sent");
        return Ok(());
    }

    let converted = affiliate::convert_batch(&client, deals, &config.affiliate_tag).await;
    if converted.is_empty() {
        tracing::warn!("No convertible deals, no digest sent");
        return Ok(());
    }

    let sender = email::EmailSender::from_env()?;
    sender.send_deals(&converted).await
}
