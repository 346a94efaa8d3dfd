pub mod amazon;
pub mod reddit;
pub mod sample;
pub mod slickdeals;

use scraper::{ElementRef, Html, Selector};

use crate::config::Config;
use crate::deal::{self, Deal};

/// Fetch one batch of deals using the configured source-selection strategy:
/// sample data when the flag is set, otherwise the curated links file when it
/// has entries, otherwise the aggregator site, otherwise the social feed.
/// Each step degrades to the next on failure; the run never aborts here.
pub async fn fetch_all(config: &Config, client: &reqwest::Client) -> Vec<Deal> {
    if config.use_sample_data {
        match sample::fetch(client).await {
            Ok(deals) => {
                tracing::info!(count = deals.len(), "Fetched sample deals");
                return deals;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch sample deals");
                return Vec::new();
            }
        }
    }

    let links = amazon::read_links_file(&config.links_file);
    if !links.is_empty() {
        tracing::info!(file = %config.links_file, count = links.len(), "Using curated deal links");
        return amazon::fetch_from_links(client, &links).await;
    }

    match slickdeals::fetch(client, config.min_votes, 20).await {
        Ok(deals) if !deals.is_empty() => {
            tracing::info!(count = deals.len(), "Fetched deals from Slickdeals");
            return deals;
        }
        Ok(_) => tracing::info!("No Slickdeals results, falling back to Reddit"),
        Err(e) => tracing::error!(error = %e, "Failed to fetch from Slickdeals"),
    }

    match reddit::fetch(client).await {
        Ok(deals) => {
            let unique = deal::dedup_and_rank(deals);
            tracing::info!(count = unique.len(), "Fetched deals from Reddit");
            unique
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch from Reddit");
            Vec::new()
        }
    }
}

/// Evaluate an ordered fallback list of selectors, returning the first
/// non-empty text match. The site markup changes over time; adding a new
/// variant is a data change, not a code change.
pub(crate) fn select_first_text(root: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            root.select(&sel)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .find(|t| !t.is_empty())
        })
}

/// Same, but pulls an attribute; for each selector the attributes are tried
/// in priority order (e.g. a high-resolution image attr before `src`).
pub(crate) fn select_first_attr(
    root: ElementRef<'_>,
    selectors: &[&str],
    attrs: &[&str],
) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            root.select(&sel).find_map(|el| {
                attrs
                    .iter()
                    .find_map(|a| el.value().attr(a))
                    .map(str::to_string)
                    .filter(|v| !v.is_empty())
            })
        })
}

pub(crate) fn document_root(document: &Html) -> ElementRef<'_> {
    document.root_element()
}

/// Make a site-relative URL absolute against a base origin.
pub(crate) fn resolve_url(raw: &str, base: &str) -> String {
    if raw.is_empty() || raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    if raw.starts_with("//") {
        return format!("https:{raw}");
    }
    let base = base.trim_end_matches('/');
    if raw.starts_with('/') {
        format!("{base}{raw}")
    } else {
        format!("{base}/{raw}")
    }
}
