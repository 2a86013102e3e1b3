//! Poster downloads
//!
//! Shares the rate limiter contract with the API transports but never bans:
//! the image CDN does not issue ban notices.

use log::{debug, warn};
use std::path::Path;
use std::time::Duration;

use crate::Result;
use crate::error::{IoError, ProtocolError};
use crate::protocol::Outcome;
use crate::ratelimit::RateLimiter;

/// Default base URL for poster files
pub const DEFAULT_IMAGE_SERVER: &str = "https://cdn.anidb.net/images/main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IMAGE_SERVER.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ImageConfig {
    /// URL of a picture file name on the image server
    pub fn picture_url(&self, picture: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            picture.trim_start_matches('/')
        )
    }
}

/// Rate-limited image downloader
pub struct ImageClient {
    config: ImageConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl ImageClient {
    pub fn new(config: ImageConfig, limiter: RateLimiter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProtocolError::from)?;
        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Download `url` into `target`, creating parent directories
    ///
    /// Succeeds with the number of bytes written.
    pub async fn fetch(&self, url: &str, target: &Path) -> Result<Outcome<u64>> {
        let guard = self.limiter.acquire().await;
        debug!("Fetching image {url}");
        let response = self.client.get(url).send().await;
        let body = match response {
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                guard.release();
                return Ok(Outcome::Negative(format!("Image not found: {url}")));
            }
            Ok(response) if !response.status().is_success() => {
                guard.release();
                let status = response.status();
                warn!("Image request {url} answered {status}");
                return Ok(Outcome::TransientError(format!("HTTP status {status}")));
            }
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };
        guard.release();

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                warn!("Image request {url} failed: {e}");
                return Ok(Outcome::TransientError(e.to_string()));
            }
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::from_std(e).with_path(parent))?;
        }
        tokio::fs::write(target, &body)
            .await
            .map_err(|e| IoError::from_std(e).with_path(target))?;
        debug!("Saved {} bytes to {}", body.len(), target.display());
        Ok(Outcome::Success(body.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_url() {
        let config = ImageConfig::default();
        assert_eq!(
            config.picture_url("22.jpg"),
            "https://cdn.anidb.net/images/main/22.jpg"
        );

        let config = ImageConfig {
            base_url: "http://img7.anidb.net/pics/anime/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.picture_url("/1.jpg"), "http://img7.anidb.net/pics/anime/1.jpg");
    }
}
