use serde::Serialize;

pub const MAX_TITLE_LENGTH: usize = 100;
pub const TITLE_KEY_LENGTH: usize = 50;

/// One discounted product observed from a source. Built once by an adapter
/// and never mutated afterwards; affiliate conversion produces a fresh copy.
#[derive(Debug, Clone, Serialize)]
pub struct Deal {
    pub title: String,
    /// Display string, not a parsed number. Sources report prices in
    /// inconsistent formats, sometimes textual ("See Deal").
    pub price: String,
    pub original_price: Option<String>,
    /// Pre-formatted, e.g. "-40%".
    pub discount_percentage: Option<String>,
    pub store: String,
    pub link: String,
    /// Shortened/tracking URL kept for display, distinct from `link`.
    pub short_link: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    /// Source-local popularity metric. Only comparable within one fetch
    /// batch from one adapter; never normalized across sources.
    pub score: i64,
    pub promo_code: Option<String>,
}

impl Deal {
    /// Dedup identity: lowercase, non-alphanumerics stripped, first 50 chars.
    pub fn title_key(&self) -> String {
        self.title
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .take(TITLE_KEY_LENGTH)
            .collect()
    }
}

/// Truncate a source title to the ingestion cap, respecting char boundaries.
pub fn cap_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_LENGTH).collect()
}

/// Sort descending by score (stable, so earlier input wins ties), then keep
/// the first occurrence of each normalized-title key. Greedy first-wins:
/// information from discarded duplicates is lost. Deals with empty titles
/// all collapse to the empty key; that is accepted.
pub fn dedup_and_rank(mut deals: Vec<Deal>) -> Vec<Deal> {
    deals.sort_by(|a, b| b.score.cmp(&a.score));

    let mut seen = std::collections::HashSet::new();
    deals
        .into_iter()
        .filter(|deal| seen.insert(deal.title_key()))
        .collect()
}

#[cfg(test)]
pub(crate) fn test_deal(title: &str, score: i64) -> Deal {
    Deal {
        title: title.to_string(),
        price: "19.99".to_string(),
        original_price: None,
        discount_percentage: None,
        store: "Amazon".to_string(),
        link: format!("https://www.amazon.com/dp/B0TEST{:04}", score),
        short_link: None,
        image_url: None,
        description: None,
        score,
        promo_code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_key_strips_symbols_and_case() {
        let deal = test_deal("Echo Dot (5th Gen)", 90);
        assert_eq!(deal.title_key(), "echodot5thgen");
    }

    #[test]
    fn test_title_key_truncates_to_50() {
        let deal = test_deal(&"a".repeat(120), 1);
        assert_eq!(deal.title_key().len(), 50);
    }

    #[test]
    fn test_dedup_keeps_highest_score_for_colliding_titles() {
        let deals = vec![
            test_deal("Echo Dot 5th Gen!!", 70),
            test_deal("Echo Dot (5th Gen)", 90),
        ];
        let result = dedup_and_rank(deals);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 90);
        assert_eq!(result[0].title, "Echo Dot (5th Gen)");
    }

    #[test]
    fn test_dedup_never_emits_duplicate_keys() {
        let deals = vec![
            test_deal("USB-C Cable 6ft", 10),
            test_deal("Monitor 27in", 50),
            test_deal("usb c cable 6FT", 40),
            test_deal("Monitor 27in", 50),
        ];
        let result = dedup_and_rank(deals);
        let mut keys: Vec<String> = result.iter().map(|d| d.title_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), result.len());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_dedup_sorts_descending() {
        let deals = vec![
            test_deal("Alpha", 5),
            test_deal("Beta", 99),
            test_deal("Gamma", 42),
        ];
        let result = dedup_and_rank(deals);
        let scores: Vec<i64> = result.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![99, 42, 5]);
    }

    #[test]
    fn test_dedup_empty_titles_collapse() {
        let deals = vec![test_deal("", 3), test_deal("   !!!", 2)];
        let result = dedup_and_rank(deals);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 3);
    }

    #[test]
    fn test_deal_serializes_for_json_output() {
        let json = serde_json::to_string_pretty(&vec![test_deal("Echo Dot", 90)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["title"], "Echo Dot");
        assert_eq!(value[0]["score"], 90);
        assert_eq!(value[0]["store"], "Amazon");
    }

    #[test]
    fn test_cap_title() {
        assert_eq!(cap_title("short"), "short");
        assert_eq!(cap_title(&"x".repeat(150)).chars().count(), 100);
    }
}
