use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};

use crate::deal::{Deal, cap_title};
use crate::extract;
use crate::sources::{resolve_url, select_first_attr, select_first_text};

const BASE_URL: &str = "https://slickdeals.net";
// Frontpage plus the next two pages covers the well-voted window.
const PAGE_PATHS: &[&str] = &["/", "/?page=2", "/?page=3"];
// Only this merchant's listings are convertible downstream.
const TARGET_MERCHANT: &str = "amazon";

const CARD_SELECTORS: &[&str] = &["div.dealCard", "li.fpGridBox", r#"div[data-role="dealCard"]"#];
const VOTE_SELECTORS: &[&str] = &["span.dealCardSocialControls__voteCount", "span.voteCount"];
const PRICE_SELECTORS: &[&str] = &["span.dealCard__price", "span.dealPrice", "span.itemPrice"];
const ORIGINAL_PRICE_SELECTORS: &[&str] = &[
    "span.dealCard__originalPrice",
    "span.originalPrice",
    "span.oldListPrice",
];
const IMAGE_SELECTORS: &[&str] = &["img.dealCard__image", "img.lazyimg", "img"];

/// Scrape frontpage deal cards, keeping only those at or above the vote
/// threshold. Pages are fetched sequentially; a failing page is logged and
/// skipped so a partial scrape still yields a batch.
pub async fn fetch(client: &reqwest::Client, min_votes: i64, max_deals: usize) -> Result<Vec<Deal>> {
    let mut deals = Vec::new();

    for path in PAGE_PATHS {
        if deals.len() >= max_deals {
            break;
        }
        let url = format!("{BASE_URL}{path}");
        match fetch_page(client, &url).await {
            Ok(html) => deals.extend(parse_page(&html, min_votes)),
            Err(e) => tracing::warn!(url = %url, error = %e, "Failed to fetch deals page"),
        }
    }

    deals.sort_by(|a, b| b.score.cmp(&a.score));
    deals.truncate(max_deals);
    Ok(deals)
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    client
        .get(url)
        .header(
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        )
        .timeout(std::time::Duration::from_secs(15))
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("deals page returned error status for {url}"))?
        .text()
        .await
        .with_context(|| format!("failed to read deals page body for {url}"))
}

fn parse_page(html: &str, min_votes: i64) -> Vec<Deal> {
    let document = Html::parse_document(html);

    for card_selector in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(card_selector) else {
            continue;
        };
        let cards: Vec<_> = document.select(&selector).collect();
        if cards.is_empty() {
            continue;
        }
        return cards
            .into_iter()
            .filter_map(|card| parse_card(card, min_votes))
            .collect();
    }

    tracing::warn!("No recognized deal cards in page markup");
    Vec::new()
}

/// One deal card. Returns None when the card has no usable title link,
/// names another merchant, or falls below the vote threshold.
fn parse_card(card: ElementRef<'_>, min_votes: i64) -> Option<Deal> {
    let anchor_selector = Selector::parse("a").ok()?;
    let anchors: Vec<_> = card.select(&anchor_selector).collect();
    // First anchor is the image wrapper; the second carries the title text.
    if anchors.len() < 2 {
        return None;
    }
    let title_anchor = anchors[1];

    let title = title_anchor.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        return None;
    }

    let votes = select_first_text(card, VOTE_SELECTORS)
        .map(|t| extract::numeric(&t))
        .unwrap_or(0);
    if votes < min_votes {
        return None;
    }

    let link = title_anchor
        .value()
        .attr("href")
        .map(|href| resolve_url(href, BASE_URL))
        .unwrap_or_default();
    if link.is_empty() {
        return None;
    }

    let store = store_for_card(card, &title)?;

    let price = select_first_text(card, PRICE_SELECTORS)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| extract::DEFAULT_PRICE.to_string());
    let original_price = select_first_text(card, ORIGINAL_PRICE_SELECTORS);
    let discount_percentage = discount_from_prices(&price, original_price.as_deref());

    let image_url = select_first_attr(card, IMAGE_SELECTORS, &["data-lazy-src", "src"])
        .filter(|src| !src.contains("avatar"))
        .map(|src| resolve_url(&src, BASE_URL));

    let promo_code = extract::promo_code(&title);

    Some(Deal {
        title: cap_title(&title),
        price,
        original_price,
        discount_percentage,
        store,
        link,
        short_link: None,
        image_url,
        description: None,
        score: votes,
        promo_code,
    })
}

/// Relevance gate and store label in one: a card counts only when its
/// merchant field or title mentions the target merchant.
fn store_for_card(card: ElementRef<'_>, title: &str) -> Option<String> {
    let merchant = select_first_text(
        card,
        &[
            "span.dealCard__storeName",
            "span.itemStore",
            r#"[class*="merchant"]"#,
        ],
    )
    .filter(|n| !n.is_empty());

    if let Some(name) = merchant {
        return name
            .to_lowercase()
            .contains(TARGET_MERCHANT)
            .then_some(name);
    }
    title
        .to_lowercase()
        .contains(TARGET_MERCHANT)
        .then(|| "Amazon".to_string())
}

/// Derive a "-NN%" label when both prices parse and the sale price is lower.
fn discount_from_prices(price: &str, original: Option<&str>) -> Option<String> {
    let current = parse_money(price)?;
    let original = parse_money(original?)?;
    if original <= 0.0 || current >= original {
        return None;
    }
    let pct = ((1.0 - current / original) * 100.0).round() as i64;
    Some(format!("-{pct}%"))
}

fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok().filter(|v: &f64| *v > 0.0)
}
