use anyhow::{Context, Result};
use serde::Deserialize;

use crate::deal::{Deal, cap_title};

// Public demo catalog; keeps the pipeline testable without scraping.
const SAMPLE_URL: &str = "https://dummyjson.com/products?limit=10";

#[derive(Deserialize)]
struct Catalog {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Product {
    id: u64,
    title: String,
    description: String,
    price: f64,
    #[serde(rename = "discountPercentage")]
    discount_percentage: f64,
    rating: f64,
    brand: String,
    thumbnail: String,
}

/// Fetch a fixed sample batch from the demo catalog. Ratings (0-5) are
/// scaled into the same score range the real sources produce.
pub async fn fetch(client: &reqwest::Client) -> Result<Vec<Deal>> {
    let catalog: Catalog = client
        .get(SAMPLE_URL)
        .timeout(std::time::Duration::from_secs(15))
        .send()
        .await
        .context("failed to fetch sample catalog")?
        .error_for_status()
        .context("sample catalog returned error status")?
        .json()
        .await
        .context("failed to parse sample catalog")?;

    Ok(catalog.products.into_iter().map(to_deal).collect())
}

fn to_deal(product: Product) -> Deal {
    let discount = (product.discount_percentage > 0.0)
        .then(|| format!("-{:.0}%", product.discount_percentage));
    let store = if product.brand.is_empty() {
        "Sample Store".to_string()
    } else {
        product.brand
    };

    Deal {
        title: cap_title(&product.title),
        price: format!("{:.2}", product.price),
        original_price: None,
        discount_percentage: discount,
        store,
        link: format!("https://dummyjson.com/products/{}", product.id),
        short_link: None,
        image_url: (!product.thumbnail.is_empty()).then_some(product.thumbnail),
        description: (!product.description.is_empty()).then_some(product.description),
        score: (product.rating * 20.0) as i64,
        promo_code: None,
    }
}
