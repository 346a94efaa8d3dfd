use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use super::Publisher;
use crate::config::Config;

const API_BASE: &str = "https://graph.threads.net/v1.0";
// Server-side eventual consistency between container creation and publish.
const PUBLISH_DELAY: Duration = Duration::from_secs(1);
const MAX_CAROUSEL_IMAGES: usize = 20;

/// Client for the Threads Graph API: creates media containers and publishes
/// them, as a single post or a multi-image carousel.
pub struct ThreadsPublisher {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct QuotaResponse {
    #[serde(default)]
    data: Vec<QuotaEntry>,
}

#[derive(Deserialize)]
struct QuotaEntry {
    quota_usage: Option<i64>,
    config: Option<QuotaConfig>,
}

#[derive(Deserialize)]
struct QuotaConfig {
    quota_total: Option<i64>,
}

impl ThreadsPublisher {
    /// Fails when the Threads credentials are missing from config; this is
    /// the only place that requires them.
    pub fn new(client: reqwest::Client, config: &Config) -> Result<Self> {
        let (access_token, user_id) = config.threads_credentials()?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            access_token,
            user_id,
        })
    }

    #[cfg(test)]
    fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            access_token: "test-token".to_string(),
            user_id: "12345".to_string(),
        }
    }

    /// Report the account's publishing quota. Failure here is informational
    /// only; callers log and continue.
    pub async fn check_quota(&self) -> Result<()> {
        let url = format!("{}/{}/threads_publishing_limit", self.base_url, self.user_id);
        let response: QuotaResponse = self
            .client
            .get(&url)
            .query(&[
                ("fields", "quota_usage,config"),
                ("access_token", self.access_token.as_str()),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("failed to query publishing limit")?
            .error_for_status()
            .context("publishing limit query rejected")?
            .json()
            .await
            .context("failed to parse publishing limit response")?;

        if let Some(entry) = response.data.first() {
            let total = entry.config.as_ref().and_then(|c| c.quota_total);
            tracing::info!(used = ?entry.quota_usage, total = ?total, "Publishing quota");
        }
        Ok(())
    }

    async fn create_media_container(
        &self,
        text: Option<&str>,
        image_url: Option<&str>,
        is_carousel_item: bool,
    ) -> Result<String> {
        let media_type = if image_url.is_some() { "IMAGE" } else { "TEXT" };
        let mut params = vec![
            ("media_type", media_type.to_string()),
            ("access_token", self.access_token.clone()),
        ];
        // Carousel items carry no text of their own; the caption lives on
        // the carousel container.
        if let Some(text) = text.filter(|_| !is_carousel_item) {
            params.push(("text", text.to_string()));
        }
        if let Some(url) = image_url {
            params.push(("image_url", url.to_string()));
        }
        if is_carousel_item {
            params.push(("is_carousel_item", "true".to_string()));
        }

        let id = self.post_for_id("threads", &params).await?;
        tracing::info!(container = %id, media_type, "Created media container");
        Ok(id)
    }

    /// Item containers expire within seconds, so all of them are created in
    /// parallel and the carousel container follows with no added delay.
    async fn create_carousel_container(&self, text: &str, image_urls: &[String]) -> Result<String> {
        let creations = image_urls
            .iter()
            .map(|url| self.create_media_container(None, Some(url), true));

        let children: Vec<String> = join_all(creations)
            .await
            .into_iter()
            .zip(image_urls)
            .filter_map(|(outcome, url)| match outcome {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to create carousel item");
                    None
                }
            })
            .collect();

        if children.is_empty() {
            bail!("no carousel item containers created");
        }

        let params = vec![
            ("media_type", "CAROUSEL".to_string()),
            ("children", children.join(",")),
            ("text", text.to_string()),
            ("access_token", self.access_token.clone()),
        ];
        let id = self.post_for_id("threads", &params).await?;
        tracing::info!(container = %id, items = children.len(), "Created carousel container");
        Ok(id)
    }

    async fn publish_container(&self, container_id: &str) -> Result<String> {
        let params = vec![
            ("creation_id", container_id.to_string()),
            ("access_token", self.access_token.clone()),
        ];
        let post_id = self.post_for_id("threads_publish", &params).await?;
        tracing::info!(post = %post_id, "Published post");
        Ok(post_id)
    }

    async fn post_for_id(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{}/{}", self.base_url, self.user_id, endpoint);
        let response: IdResponse = self
            .client
            .post(&url)
            .query(params)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .with_context(|| format!("request to {endpoint} failed"))?
            .json()
            .await
            .with_context(|| format!("unparseable response from {endpoint}"))?;

        match response.id {
            Some(id) => Ok(id),
            None => bail!(
                "no id in {endpoint} response: {}",
                response
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }
}

#[async_trait]
impl Publisher for ThreadsPublisher {
    async fn publish(&self, text: &str, image_urls: &[String]) -> Result<()> {
        let mut images: Vec<&String> = image_urls.iter().filter(|u| !u.is_empty()).collect();
        if images.len() > MAX_CAROUSEL_IMAGES {
            tracing::warn!(count = images.len(), "Truncating carousel to limit");
            images.truncate(MAX_CAROUSEL_IMAGES);
        }

        let container_id = if images.len() > 1 {
            let urls: Vec<String> = images.into_iter().cloned().collect();
            self.create_carousel_container(text, &urls).await?
        } else {
            self.create_media_container(Some(text), images.first().map(|u| u.as_str()), false)
                .await?
        };

        tokio::time::sleep(PUBLISH_DELAY).await;
        self.publish_container(&container_id).await?;
        Ok(())
    }
}
