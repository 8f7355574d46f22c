//! Image references: local paths or http(s) URLs, fetched and decoded
//! into RGB before they reach the engine.

use std::path::Path;
use std::time::Duration;

use image::RgbImage;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Resolves image references for the D-Bus surface.
pub struct ImageSource {
    client: reqwest::Client,
}

impl ImageSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the reference and decode it to RGB. URLs go over HTTP with a
    /// bounded timeout; anything else is treated as a filesystem path.
    pub async fn fetch_and_decode(&self, reference: &str) -> Result<RgbImage, SourceError> {
        let bytes = if is_url(reference) {
            self.client
                .get(reference)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        } else {
            tokio::fs::read(Path::new(reference))
                .await
                .map_err(|source| SourceError::Unreadable {
                    path: reference.to_string(),
                    source,
                })?
        };

        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }
}

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}
