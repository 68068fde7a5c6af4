use async_trait::async_trait;
use std::time::Duration;

use crate::error::{CoreError, Result};

pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Fetches raw image bytes for a media id from the external media store.
/// Never caches across calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media_id: &str, deadline: Duration) -> Result<FetchedMedia>;
}

/// `reqwest`-backed implementation against the media-store HTTP API.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpMediaFetcher {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, media_id: &str, deadline: Duration) -> Result<FetchedMedia> {
        let url = format!("{}/media/{}/raw", self.base_url, media_id);
        let response = self
            .client
            .get(&url)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| CoreError::MediaUnavailable(format!("fetch {media_id}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::MediaMissing(media_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(CoreError::MediaUnavailable(format!(
                "media store returned {} for {media_id}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::MediaUnavailable(format!("read body for {media_id}: {e}")))?;

        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
