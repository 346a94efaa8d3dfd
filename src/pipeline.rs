use anyhow::{Context, Result};

use crate::affiliate;
use crate::compose;
use crate::config::Config;
use crate::deal::{Deal, dedup_and_rank};
use crate::history::{self, PostedHistory};
use crate::publish::threads::ThreadsPublisher;
use crate::publish::{DryRunPublisher, Publisher};
use crate::sources;

/// One full run: fetch, rank, convert, filter against history, render,
/// publish, record. Fetch and conversion failures degrade; a publish
/// failure is the only fatal outcome.
pub async fn run(config: &Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build HTTP client")?;

    let publisher: Box<dyn Publisher> = if config.test_mode {
        Box::new(DryRunPublisher)
    } else {
        let threads = ThreadsPublisher::new(client.clone(), config)?;
        if let Err(e) = threads.check_quota().await {
            tracing::warn!(error = %e, "Could not check publishing quota");
        }
        Box::new(threads)
    };

    let deals = fetch_candidates(config, &client).await;
    if deals.is_empty() {
        tracing::warn!("No deals fetched, nothing to post");
        return Ok(());
    }

    let converted = affiliate::convert_batch(&client, deals, &config.affiliate_tag).await;
    tracing::info!(count = converted.len(), "Deals converted to affiliate links");

    publish_batch(config, publisher.as_ref(), converted).await
}

/// Fetch, dedup, rank, and cap the candidate list for conversion.
async fn fetch_candidates(config: &Config, client: &reqwest::Client) -> Vec<Deal> {
    let deals = sources::fetch_all(config, client).await;
    tracing::info!(count = deals.len(), "Fetched deals");

    let mut ranked = dedup_and_rank(deals);
    ranked.truncate(config.candidate_limit);
    ranked
}

/// History-filter, render, publish, and record one converted batch.
/// Identifiers reach history only after the publisher reports success.
async fn publish_batch(
    config: &Config,
    publisher: &dyn Publisher,
    converted: Vec<Deal>,
) -> Result<()> {
    let mut posted = PostedHistory::load(&config.history_file);
    let fresh = posted.filter_new(converted);
    if fresh.is_empty() {
        tracing::info!("All candidate deals were already posted");
        return Ok(());
    }

    let post = compose::compose(&fresh, config.target_deals, config.max_post_len);
    let included = &fresh[..post.deal_count];
    tracing::info!(
        deals = post.deal_count,
        chars = post.content.chars().count(),
        "Composed post"
    );

    let images: Vec<String> = if config.attach_images {
        included
            .iter()
            .filter_map(|deal| deal.image_url.clone())
            .collect()
    } else {
        Vec::new()
    };

    publisher
        .publish(&post.content, &images)
        .await
        .context("publish failed")?;

    let ids: Vec<String> = included.iter().filter_map(history::posted_id).collect();
    posted.append_and_save(&ids, &config.history_file);
    Ok(())
}
