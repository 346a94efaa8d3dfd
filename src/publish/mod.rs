pub mod threads;

use anyhow::Result;
use async_trait::async_trait;

/// One publish attempt: text plus zero or more image URLs. An error means
/// the post did not go out and history must not be updated.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, image_urls: &[String]) -> Result<()>;
}

/// Logs the rendered post instead of sending it. Used in test mode.
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, text: &str, image_urls: &[String]) -> Result<()> {
        tracing::info!(
            images = image_urls.len(),
            chars = text.chars().count(),
            "Test mode, skipping publish"
        );
        tracing::info!("Post content:\n{text}");
        Ok(())
    }
}
