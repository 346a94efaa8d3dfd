use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_PRICE: &str = "See Deal";
pub const DEFAULT_STORE: &str = "Various";

static RE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[\d,]+\.?\d*").unwrap());
static RE_DOMAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://(?:www\.)?([^/]+)").unwrap());
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// Amazon product ids appear in three known path shapes.
static RE_ASIN: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/dp/([A-Z0-9]{10})(?:[/?]|$)",
        r"/gp/product/([A-Z0-9]{10})(?:[/?]|$)",
        r"/product/([A-Z0-9]{10})(?:[/?]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_PROMO: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)apply promo code\s+([A-Z0-9]+)",
        r"(?i)promo code[:\s]+([A-Z0-9]+)",
        r"(?i)coupon code[:\s]+([A-Z0-9]+)",
        r"(?i)code[:\s]+([A-Z0-9]{6,10})",
        r"(?i)use code[:\s]+([A-Z0-9]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// First currency-formatted substring, or the "See Deal" sentinel.
pub fn price(text: &str) -> String {
    RE_PRICE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_PRICE.to_string())
}

/// Capitalized first label of the URL host, or "Various".
pub fn store_from_url(url: &str) -> String {
    if url.is_empty() {
        return DEFAULT_STORE.to_string();
    }
    let Some(caps) = RE_DOMAIN.captures(url) else {
        return DEFAULT_STORE.to_string();
    };
    let label = caps[1].split('.').next().unwrap_or_default();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_STORE.to_string(),
    }
}

/// First run of digits as an integer, 0 on no match or overflow.
pub fn numeric(text: &str) -> i64 {
    RE_DIGITS
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Amazon product id (ASIN) from any of the three recognized path shapes.
pub fn product_id(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    RE_ASIN
        .iter()
        .find_map(|re| re.captures(url).map(|c| c[1].to_string()))
}

/// Canonical affiliate product URL for an ASIN.
pub fn affiliate_link(asin: &str, tag: &str) -> String {
    format!("https://www.amazon.com/dp/{asin}?tag={tag}")
}

/// Coupon code from free text, trying the known phrasings in order.
pub fn promo_code(text: &str) -> Option<String> {
    RE_PROMO
        .iter()
        .find_map(|re| re.captures(text).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_basic() {
        assert_eq!(price("Anker charger for $29.99 today"), "$29.99");
        assert_eq!(price("TV $1,299 shipped"), "$1,299");
    }

    #[test]
    fn test_price_is_total() {
        assert_eq!(price(""), DEFAULT_PRICE);
        assert_eq!(price("no price here"), DEFAULT_PRICE);
        assert_eq!(price("$"), DEFAULT_PRICE);
    }

    #[test]
    fn test_store_from_url() {
        assert_eq!(store_from_url("https://www.bestbuy.com/site/x"), "Bestbuy");
        assert_eq!(store_from_url("http://target.com/deal"), "Target");
        assert_eq!(store_from_url(""), DEFAULT_STORE);
        assert_eq!(store_from_url("not a url"), DEFAULT_STORE);
    }

    #[test]
    fn test_numeric() {
        assert_eq!(numeric("+123 votes"), 123);
        assert_eq!(numeric("no digits"), 0);
        assert_eq!(numeric(""), 0);
    }

    #[test]
    fn test_product_id_three_shapes() {
        assert_eq!(
            product_id("https://www.amazon.com/Some-Title/dp/B0ABCDEFG1/ref=xyz"),
            Some("B0ABCDEFG1".to_string())
        );
        assert_eq!(
            product_id("https://www.amazon.com/gp/product/B0ABCDEFG1?th=1"),
            Some("B0ABCDEFG1".to_string())
        );
        assert_eq!(
            product_id("https://www.amazon.com/product/B0ABCDEFG1"),
            Some("B0ABCDEFG1".to_string())
        );
    }

    #[test]
    fn test_product_id_rejects_bad_ids() {
        // lowercase, wrong length, missing segment
        assert_eq!(product_id("https://www.amazon.com/dp/b0abcdefg1"), None);
        assert_eq!(product_id("https://www.amazon.com/dp/B0SHORT"), None);
        assert_eq!(product_id("https://www.amazon.com/s?k=echo+dot"), None);
        assert_eq!(product_id(""), None);
    }

    #[test]
    fn test_affiliate_link_round_trip() {
        let link = affiliate_link("B0ABCDEFG1", "mytag-20");
        assert_eq!(link, "https://www.amazon.com/dp/B0ABCDEFG1?tag=mytag-20");
        assert_eq!(product_id(&link), Some("B0ABCDEFG1".to_string()));
    }

    #[test]
    fn test_promo_code_patterns() {
        assert_eq!(
            promo_code("50% off when you apply promo code SAVE50 at checkout"),
            Some("SAVE50".to_string())
        );
        assert_eq!(
            promo_code("Use coupon code: DEAL2024"),
            Some("DEAL2024".to_string())
        );
        assert_eq!(promo_code("no code in sight"), None);
    }

    #[test]
    fn test_promo_code_prefers_earlier_pattern() {
        let text = "apply promo code FIRSTONE or use code SECONDTW";
        assert_eq!(promo_code(text), Some("FIRSTONE".to_string()));
    }
}
