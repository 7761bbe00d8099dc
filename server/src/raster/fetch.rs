//! Raster fetching over HTTP

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use metrics::histogram;
use reqwest::{Client, header};
use tracing::debug;

use crate::config::RasterConfig;

use super::types::RasterError;

/// Trait for anything that can retrieve raster bytes for a URL
///
/// One attempt per call; retrying is left to whoever issues the next cycle.
#[async_trait]
pub trait RasterFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, RasterError>;
}

/// Fetcher issuing a plain HTTP GET with reqwest
pub struct HttpRasterFetcher {
    client: Client,
    max_size: usize,
}

impl HttpRasterFetcher {
    pub fn new(config: &RasterConfig) -> Result<Self, RasterError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RasterError::Fetch {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self::with_client(client, config.max_fetch_size))
    }

    pub fn with_client(client: Client, max_size: usize) -> Self {
        Self { client, max_size }
    }

    fn too_large(&self, url: &str, size: u64) -> RasterError {
        RasterError::Fetch {
            url: url.to_string(),
            reason: format!(
                "response of {} bytes exceeds limit of {} bytes",
                size, self.max_size
            ),
        }
    }
}

#[async_trait]
impl RasterFetcher for HttpRasterFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, RasterError> {
        let start = Instant::now();
        let transport = |e: reqwest::Error| RasterError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RasterError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP status {}", status),
            });
        }

        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(len) = declared
            && len > self.max_size as u64
        {
            return Err(self.too_large(url, len));
        }

        let mut body = BytesMut::with_capacity(declared.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > self.max_size {
                return Err(self.too_large(url, (body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {} in {:?}", body.len(), url, start.elapsed());
        histogram!("moonbase_raster_fetch_bytes").record(body.len() as f64);

        Ok(body.freeze())
    }
}
