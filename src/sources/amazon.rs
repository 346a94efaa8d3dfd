use anyhow::{Context, Result};
use futures::future::join_all;
use scraper::{ElementRef, Html, Selector};

use crate::deal::{Deal, cap_title};
use crate::extract;
use crate::sources::{document_root, select_first_attr, select_first_text};

// Known markup variants, tried in order; adding a variant is a data change.
const TITLE_SELECTORS: &[&str] = &[
    "span#productTitle",
    "h1#title",
    "span.product-title-word-break",
];
const PRICE_SELECTORS: &[&str] = &[
    "span.a-offscreen",
    "span.a-price-whole",
    "span.priceToPay",
    "span#priceblock_ourprice",
    "span#priceblock_dealprice",
];
const DISCOUNT_SELECTORS: &[&str] = &[
    "span.savingsPercentage",
    "span.a-size-large.a-color-price.savingPriceOverride",
];
const IMAGE_SELECTORS: &[&str] = &["img#landingImage", "img#imgBlkFront", "img.a-dynamic-image"];
const FEATURE_SELECTOR: &str = "div#feature-bullets span.a-list-item";

const MIN_FEATURE_LENGTH: usize = 10;

/// Newline-delimited shortened links; blank lines and `#` comments ignored.
/// Missing or unreadable file degrades to no links.
pub fn read_links_file(path: &str) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Resolve each shortened link to its product page and scrape it. Links are
/// fetched concurrently; a failed link is logged and skipped, and file order
/// acts as explicit priority ranking via a descending synthetic score.
pub async fn fetch_from_links(client: &reqwest::Client, links: &[String]) -> Vec<Deal> {
    let fetches = links
        .iter()
        .enumerate()
        .map(|(i, link)| fetch_one(client, link, i + 1));

    join_all(fetches)
        .await
        .into_iter()
        .filter_map(|outcome| match outcome {
            Ok(deal) => Some(deal),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping deal link");
                None
            }
        })
        .collect()
}

async fn fetch_one(client: &reqwest::Client, short_link: &str, position: usize) -> Result<Deal> {
    let response = client
        .get(short_link)
        .headers(browser_headers())
        .timeout(std::time::Duration::from_secs(20))
        .send()
        .await
        .with_context(|| format!("failed to fetch {short_link}"))?
        .error_for_status()
        .with_context(|| format!("product page returned error status for {short_link}"))?;

    // Final URL after redirects is the canonical product link.
    let final_url = response.url().to_string();
    let html = response
        .text()
        .await
        .with_context(|| format!("failed to read product page body for {short_link}"))?;

    let mut deal = parse_product_page(&html, position);
    deal.link = final_url;
    deal.short_link = Some(short_link.to_string());

    tracing::info!(title = %deal.title, price = %deal.price, "Fetched product page");
    Ok(deal)
}

fn parse_product_page(html: &str, position: usize) -> Deal {
    let document = Html::parse_document(html);
    let root = document_root(&document);

    let title = select_first_text(root, TITLE_SELECTORS)
        .map(|t| cap_title(&t))
        .unwrap_or_else(|| {
            tracing::warn!(position, "No product title found, using synthetic title");
            format!("Deal {position}")
        });

    let price = select_first_text(root, PRICE_SELECTORS)
        .map(|p| p.replace(['$', ','], "").trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| extract::DEFAULT_PRICE.to_string());

    let discount_percentage = select_first_text(root, DISCOUNT_SELECTORS);

    let image_url = select_first_attr(root, IMAGE_SELECTORS, &["data-old-hires", "src"]);

    let description = first_feature(root);

    Deal {
        title,
        price,
        original_price: None,
        discount_percentage,
        store: "Amazon".to_string(),
        link: String::new(),
        short_link: None,
        image_url,
        description,
        score: 100 - position as i64,
        promo_code: None,
    }
}

/// First bullet point long enough to be a real feature, skipping the short
/// boilerplate entries that lead the list.
fn first_feature(root: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse(FEATURE_SELECTOR).ok()?;
    root.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| text.chars().count() > MIN_FEATURE_LENGTH)
}

/// Browser-like header set; product pages block obvious bot agents.
fn browser_headers() -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut headers = HeaderMap::new();
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}
