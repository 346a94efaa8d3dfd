use anyhow::{Context, Result};

/// Runtime configuration loaded from environment variables.
///
/// Constructed once at startup and passed by reference to every component
/// that needs it; no ambient mutable state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Threads credentials. Only the publishing path needs them; the
    /// scrape and email variants run without.
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub affiliate_tag: String,
    pub use_sample_data: bool,
    pub test_mode: bool,
    pub attach_images: bool,
    pub links_file: String,
    pub history_file: String,
    pub min_votes: i64,
    /// Deals the formatter starts from before growing the post.
    pub target_deals: usize,
    /// Ranked deals fed into affiliate conversion per run.
    pub candidate_limit: usize,
    /// Platform character budget for one post.
    pub max_post_len: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_raw_values(
            std::env::var("THREADS_ACCESS_TOKEN").ok().as_deref(),
            std::env::var("THREADS_USER_ID").ok().as_deref(),
            std::env::var("AMAZON_AFFILIATE_TAG").ok().as_deref(),
            std::env::var("USE_SAMPLE_DATA").ok().as_deref(),
            std::env::var("TEST_MODE").ok().as_deref(),
            std::env::var("ATTACH_IMAGES").ok().as_deref(),
            std::env::var("DEALS_LINKS_FILE").ok().as_deref(),
            std::env::var("POSTED_HISTORY_FILE").ok().as_deref(),
            std::env::var("MIN_VOTES").ok().as_deref(),
        )
    }

    /// Build a Config from raw string values (as they would come from env
    /// vars). Used directly in tests to avoid mutating process-global
    /// environment.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw_values(
        access_token: Option<&str>,
        user_id: Option<&str>,
        affiliate_tag: Option<&str>,
        use_sample_data: Option<&str>,
        test_mode: Option<&str>,
        attach_images: Option<&str>,
        links_file: Option<&str>,
        history_file: Option<&str>,
        min_votes: Option<&str>,
    ) -> Result<Self> {
        Ok(Config {
            access_token: access_token.filter(|s| !s.is_empty()).map(String::from),
            user_id: user_id.filter(|s| !s.is_empty()).map(String::from),
            affiliate_tag: affiliate_tag
                .filter(|s| !s.is_empty())
                .unwrap_or("boostdeals20-20")
                .to_string(),
            use_sample_data: flag(use_sample_data),
            test_mode: flag(test_mode),
            attach_images: flag(attach_images),
            links_file: links_file
                .filter(|s| !s.is_empty())
                .unwrap_or("deals_links.txt")
                .to_string(),
            history_file: history_file
                .filter(|s| !s.is_empty())
                .unwrap_or("posted_deals.json")
                .to_string(),
            min_votes: min_votes.and_then(|v| v.parse().ok()).unwrap_or(100),
            target_deals: 3,
            candidate_limit: 10,
            max_post_len: 500,
        })
    }

    /// Resolve the Threads credentials, failing only when the publishing
    /// path actually needs them.
    pub fn threads_credentials(&self) -> Result<(String, String)> {
        let access_token = self
            .access_token
            .clone()
            .context("THREADS_ACCESS_TOKEN must be set")?;
        let user_id = self.user_id.clone().context("THREADS_USER_ID must be set")?;
        Ok((access_token, user_id))
    }
}

fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_raw_values(
        Some("token"),
        Some("12345"),
        None,
        None,
        Some("true"),
        None,
        None,
        None,
        None,
    )
    .expect("test config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loads_without_credentials() {
        let config =
            Config::from_raw_values(None, None, None, None, None, None, None, None, None).unwrap();
        assert!(config.access_token.is_none());
        assert!(config.threads_credentials().is_err());
    }

    #[test]
    fn test_empty_credentials_count_as_missing() {
        let config =
            Config::from_raw_values(Some("t"), Some(""), None, None, None, None, None, None, None)
                .unwrap();
        assert!(config.threads_credentials().is_err());
    }

    #[test]
    fn test_credentials_resolve_when_both_set() {
        let config = test_config();
        let (token, user) = config.threads_credentials().unwrap();
        assert_eq!(token, "token");
        assert_eq!(user, "12345");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_raw_values(
            Some("t"),
            Some("1"),
            None,
            None,
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(config.affiliate_tag, "boostdeals20-20");
        assert_eq!(config.links_file, "deals_links.txt");
        assert_eq!(config.history_file, "posted_deals.json");
        assert_eq!(config.min_votes, 100);
        assert_eq!(config.max_post_len, 500);
        assert!(!config.use_sample_data);
        assert!(!config.test_mode);
    }

    #[test]
    fn test_flags_and_overrides() {
        let config = Config::from_raw_values(
            Some("t"),
            Some("1"),
            Some("mytag-20"),
            Some("TRUE"),
            Some("1"),
            Some("false"),
            Some("links.txt"),
            Some("hist.json"),
            Some("50"),
        )
        .unwrap();
        assert_eq!(config.affiliate_tag, "mytag-20");
        assert!(config.use_sample_data);
        assert!(config.test_mode);
        assert!(!config.attach_images);
        assert_eq!(config.links_file, "links.txt");
        assert_eq!(config.history_file, "hist.json");
        assert_eq!(config.min_votes, 50);
    }

    #[test]
    fn test_invalid_min_votes_uses_default() {
        let config = Config::from_raw_values(
            Some("t"),
            Some("1"),
            None,
            None,
            None,
            None,
            None,
            None,
            Some("lots"),
        )
        .unwrap();
        assert_eq!(config.min_votes, 100);
    }
}
