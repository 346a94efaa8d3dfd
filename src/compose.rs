use chrono::Local;

use crate::deal::Deal;

const RANK_MARKERS: &[&str] = &["🥇", "🥈", "🥉"];
// Approximate per-deal chars consumed by price and link lines.
const PRICE_LINK_OVERHEAD: usize = 80;
const MIN_TITLE_CHARS: usize = 30;
const MAX_EXPAND: usize = 20;

pub struct ComposedPost {
    pub content: String,
    pub deal_count: usize,
}

/// Render the ranked deals into one post. Starts at `target_deals` and
/// greedily adds deals while the rendered text stays within the budget;
/// if even the target count overflows, falls back to truncating titles at
/// word boundaries and accepts a marginally over-budget result.
pub fn compose(deals: &[Deal], target_deals: usize, max_len: usize) -> ComposedPost {
    let date = Local::now().format("%B %d, %Y").to_string();
    compose_with_date(deals, target_deals, max_len, &date)
}

fn compose_with_date(
    deals: &[Deal],
    target_deals: usize,
    max_len: usize,
    date: &str,
) -> ComposedPost {
    let header = format!("🔥 Today's Hottest Deals 🔥\n📅 {date}\n\n");
    let footer = "\n\n💡 Follow for daily deals!\n#deals #savings";

    let target = target_deals.min(deals.len());
    if target == 0 {
        return ComposedPost {
            content: format!("{header}{footer}"),
            deal_count: 0,
        };
    }

    // Expand: keep adding deals while the full render still fits.
    let mut best: Option<(String, usize)> = None;
    for count in target..=deals.len().min(MAX_EXPAND) {
        let body = deals[..count]
            .iter()
            .enumerate()
            .map(|(i, deal)| render_deal(deal, i + 1, None))
            .collect::<Vec<_>>()
            .join("\n");
        let content = format!("{header}{body}{footer}");

        if content.chars().count() <= max_len {
            tracing::debug!(count, chars = content.chars().count(), "Deals fit");
            best = Some((content, count));
        } else {
            tracing::debug!(count, chars = content.chars().count(), "Too long, stopping");
            break;
        }
    }
    if let Some((content, deal_count)) = best {
        return ComposedPost {
            content,
            deal_count,
        };
    }

    // Contract: even the target count overflows, so split the remaining
    // budget evenly and truncate each title to its share.
    tracing::warn!(target, "Post over budget at target count, truncating titles");
    let overhead = header.chars().count() + footer.chars().count() + target * 2;
    let available = max_len.saturating_sub(overhead);
    let title_budget = (available / target)
        .saturating_sub(PRICE_LINK_OVERHEAD)
        .max(MIN_TITLE_CHARS);

    let body = deals[..target]
        .iter()
        .enumerate()
        .map(|(i, deal)| render_deal(deal, i + 1, Some(title_budget)))
        .collect::<Vec<_>>()
        .join("\n");

    ComposedPost {
        content: format!("{header}{body}{footer}"),
        deal_count: target,
    }
}

fn render_deal(deal: &Deal, rank: usize, title_budget: Option<usize>) -> String {
    let marker = RANK_MARKERS
        .get(rank - 1)
        .map(|m| (*m).to_string())
        .unwrap_or_else(|| format!("{rank}."));

    let title = match title_budget {
        Some(budget) => truncate_at_word(&deal.title, budget),
        None => deal.title.clone(),
    };

    let discount = deal
        .discount_percentage
        .as_deref()
        .map(|d| d.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|digits| !digits.is_empty())
        .map(|digits| format!("{digits}% OFF "))
        .unwrap_or_default();

    let price = match (&deal.original_price, deal.price.as_str()) {
        (Some(original), price) => format!("\n{}👉{}", display_price(original), display_price(price)),
        (None, crate::extract::DEFAULT_PRICE) => String::new(),
        (None, price) => format!("\n{}", display_price(price)),
    };

    let promo = deal
        .promo_code
        .as_deref()
        .map(|code| format!("\n✅Code: {code}"))
        .unwrap_or_default();

    let link = deal.short_link.as_deref().unwrap_or(&deal.link);

    format!("{marker}{discount}{title}{price}{promo}\n{link}")
}

/// Sources disagree on whether a price string carries the currency symbol.
fn display_price(price: &str) -> String {
    if price.starts_with('$') || !price.starts_with(|c: char| c.is_ascii_digit()) {
        price.to_string()
    } else {
        format!("${price}")
    }
}

/// Cut at the last space within the budget when that space is reasonably
/// close to the limit (past 70% of it), otherwise cut mid-budget. Never
/// leaves a trailing comma.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().take(max_chars).collect();
    let cut = match chars.iter().rposition(|c| *c == ' ') {
        Some(pos) if pos * 10 > max_chars * 7 => pos,
        _ => chars.len(),
    };
    chars[..cut]
        .iter()
        .collect::<String>()
        .trim_end()
        .trim_end_matches(',')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::test_deal;

    fn deal(title: &str, price: &str, link: &str) -> Deal {
        let mut deal = test_deal(title, 100);
        deal.price = price.to_string();
        deal.link = link.to_string();
        deal
    }

    #[test]
    fn test_empty_batch_renders_header_and_footer_only() {
        let post = compose_with_date(&[], 3, 500, "January 01, 2026");
        assert_eq!(post.deal_count, 0);
        assert!(post.content.contains("Today's Hottest Deals"));
        assert!(post.content.contains("January 01, 2026"));
    }

    #[test]
    fn test_expand_includes_more_deals_when_room() {
        let deals: Vec<Deal> = (1..=5)
            .map(|i| deal(&format!("Deal {i}"), "9.99", "https://amzn.to/x"))
            .collect();
        let post = compose_with_date(&deals, 3, 500, "January 01, 2026");
        assert_eq!(post.deal_count, 5);
        assert!(post.content.chars().count() <= 500);
    }

    #[test]
    fn test_expand_stops_at_budget() {
        let deals: Vec<Deal> = (1..=10)
            .map(|i| {
                deal(
                    &format!("A fairly long product title number {i} with details"),
                    "19.99",
                    "https://www.amazon.com/dp/B0ABCDEFG1?tag=t-20",
                )
            })
            .collect();
        let post = compose_with_date(&deals, 3, 500, "January 01, 2026");
        assert!(post.deal_count >= 3);
        assert!(post.deal_count < 10);
        assert!(post.content.chars().count() <= 500);
    }

    #[test]
    fn test_contract_truncates_titles_when_target_overflows() {
        let long_title = "word ".repeat(40);
        let deals: Vec<Deal> = (0..3)
            .map(|_| {
                deal(
                    long_title.trim(),
                    "19.99",
                    "https://www.amazon.com/dp/B0ABCDEFG1?tag=t-20",
                )
            })
            .collect();
        let post = compose_with_date(&deals, 3, 500, "January 01, 2026");
        assert_eq!(post.deal_count, 3);
        // titles were cut, so no deal line still carries the full title
        assert!(!post.content.contains(long_title.trim()));
    }

    #[test]
    fn test_render_deal_full_fields() {
        let mut d = deal(
            "Echo Dot",
            "22.99",
            "https://www.amazon.com/dp/B0ABCDEFG1?tag=t-20",
        );
        d.original_price = Some("$49.99".to_string());
        d.discount_percentage = Some("-54%".to_string());
        d.promo_code = Some("SAVE10".to_string());

        let text = render_deal(&d, 1, None);
        assert!(text.starts_with("🥇54% OFF Echo Dot"));
        assert!(text.contains("$49.99👉$22.99"));
        assert!(text.contains("✅Code: SAVE10"));
        assert!(text.ends_with("https://www.amazon.com/dp/B0ABCDEFG1?tag=t-20"));
    }

    #[test]
    fn test_render_deal_prefers_short_link_and_skips_sentinel_price() {
        let mut d = deal("Mystery deal", crate::extract::DEFAULT_PRICE, "https://long.example/x");
        d.short_link = Some("https://amzn.to/abc".to_string());

        let text = render_deal(&d, 4, None);
        assert!(text.starts_with("4.Mystery deal"));
        assert!(!text.contains(crate::extract::DEFAULT_PRICE));
        assert!(text.ends_with("https://amzn.to/abc"));
    }

    #[test]
    fn test_display_price_never_doubles_symbol() {
        assert_eq!(display_price("$22.99"), "$22.99");
        assert_eq!(display_price("22.99"), "$22.99");
        assert_eq!(display_price("See Deal"), "See Deal");
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short title", 30), "short title");
        assert_eq!(
            truncate_at_word("wireless noise cancelling headphones premium", 30),
            "wireless noise cancelling"
        );
        // no usable space near the limit, hard cut, trailing comma stripped
        assert_eq!(truncate_at_word("abcdefghij,klmnopqrst", 11), "abcdefghij");
    }
}
