use anyhow::{Context, Result};
use serde::Deserialize;

use crate::deal::{Deal, cap_title};
use crate::extract;

const FEED_URL: &str = "https://www.reddit.com/r/deals/hot.json";
// Reddit blocks default HTTP client agents.
const FEED_USER_AGENT: &str = "DealsBot/1.0";
const MAX_POSTS: usize = 10;

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Post>,
}

#[derive(Deserialize)]
struct Post {
    data: PostData,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PostData {
    title: String,
    url: String,
    score: i64,
    promoted: Option<bool>,
    is_sponsored: Option<bool>,
    preview: Option<Preview>,
    thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Deserialize)]
struct PreviewImage {
    source: Option<ImageSource>,
}

#[derive(Deserialize)]
struct ImageSource {
    url: String,
}

/// Fetch the hot-posts feed and map posts to deals. Promoted/sponsored
/// posts are skipped; price and store are derived from the post text.
pub async fn fetch(client: &reqwest::Client) -> Result<Vec<Deal>> {
    let listing: Listing = client
        .get(FEED_URL)
        .header("User-Agent", FEED_USER_AGENT)
        .timeout(std::time::Duration::from_secs(15))
        .send()
        .await
        .context("failed to fetch deals feed")?
        .error_for_status()
        .context("deals feed returned error status")?
        .json()
        .await
        .context("failed to parse deals feed")?;

    let deals = listing
        .data
        .children
        .into_iter()
        .map(|post| post.data)
        .filter(|post| {
            let promoted =
                post.promoted.unwrap_or(false) || post.is_sponsored.unwrap_or(false);
            if promoted {
                tracing::debug!(title = %post.title, "Skipping promoted post");
            }
            !promoted
        })
        .take(MAX_POSTS)
        .map(|post| Deal {
            title: cap_title(&post.title),
            price: extract::price(&post.title),
            original_price: None,
            discount_percentage: None,
            store: extract::store_from_url(&post.url),
            link: post.url.clone(),
            short_link: None,
            image_url: post_image(&post),
            description: None,
            score: post.score,
            promo_code: None,
        })
        .collect();

    Ok(deals)
}

/// Prefer the high-resolution preview image over the thumbnail. The feed
/// HTML-escapes ampersands inside preview URLs.
fn post_image(post: &PostData) -> Option<String> {
    if let Some(preview) = &post.preview {
        if let Some(url) = preview
            .images
            .first()
            .and_then(|img| img.source.as_ref())
            .map(|s| s.url.as_str())
            .filter(|u| !u.is_empty())
        {
            return Some(html_escape::decode_html_entities(url).into_owned());
        }
    }
    post.thumbnail
        .as_deref()
        .filter(|t| t.starts_with("http"))
        .map(str::to_string)
}
