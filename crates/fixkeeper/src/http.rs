//! HTTP utilities
//!
//! Shared reqwest client plus streaming download with retry and
//! exponential backoff. The catalog uses the client for JSON requests, the
//! installer uses [`HttpClient::download_to`] for archive assets.

use futures::StreamExt;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Instant;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::FixKeeperConfig;
use crate::error::{FixError, Result};
use crate::progress::{ProgressCallback, ProgressEvent};

/// Failure while transferring a file
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("HTTP request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Writing download to '{path}' failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Giving up on '{url}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: usize,
        last_error: String,
    },
}

impl TransferError {
    /// Check if error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransferError::Http { source, .. } => {
                // Only retry on network-related HTTP errors, not client errors (4xx)
                source
                    .status()
                    .map_or(true, |status| status.is_server_error() || status.as_u16() == 429)
            }
            TransferError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            TransferError::RetriesExhausted { .. } => false,
        }
    }
}

/// HTTP client with integrated download functionality
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: FixKeeperConfig,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn from_config(config: &FixKeeperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FixError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: None,
            })?;

        Ok(Self { client, config: config.clone() })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download `url` into `file`, retrying recoverable failures with backoff
    ///
    /// Each attempt truncates the file first, so a failed attempt never leaves
    /// a mix of old and new bytes behind.
    pub async fn download_to(
        &self,
        url: &str,
        file: &NamedTempFile,
        progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, TransferError> {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                if let Some(ref callback) = progress_callback {
                    callback(ProgressEvent::RetryAttempt {
                        url: url.to_string(),
                        attempt,
                        max_attempts: max_retries,
                    });
                }

                let delay = self.config.get_retry_delay(attempt - 1);
                debug!("Retrying {} in {:?}", url, delay);
                tokio::time::sleep(delay).await;
            }

            match self
                .stream_once(url, file, progress_callback.clone())
                .instrument(info_span!("download", url = %url, attempt))
                .await
            {
                Ok(size) => return Ok(size),
                Err(e) if e.is_recoverable() && attempt < max_retries => {
                    warn!("Download attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    if let Some(ref callback) = progress_callback {
                        callback(ProgressEvent::Error {
                            url: url.to_string(),
                            error: e.to_string(),
                        });
                    }
                    if attempt == 0 || !e.is_recoverable() {
                        return Err(e);
                    }
                    last_error = Some(e);
                    break;
                }
            }
        }

        Err(TransferError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_retries + 1,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn stream_once(
        &self,
        url: &str,
        file: &NamedTempFile,
        progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, TransferError> {
        let io_error = |source| TransferError::Io {
            path: file.path().to_path_buf(),
            source,
        };
        let http_error = |source| TransferError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?;

        let total_size = response.content_length();
        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_size,
            });
        }

        let std_file = file.reopen().map_err(io_error)?;
        std_file.set_len(0).map_err(io_error)?;
        let mut out = tokio::fs::File::from_std(std_file);

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let start_time = Instant::now();
        let mut last_progress_time = start_time;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(http_error)?;
            out.write_all(&chunk).await.map_err(io_error)?;
            downloaded += chunk.len() as u64;

            // Report progress at most every 100ms to avoid spam
            let now = Instant::now();
            if now.duration_since(last_progress_time).as_millis() >= 100 {
                if let Some(ref callback) = progress_callback {
                    let elapsed = start_time.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };

                    callback(ProgressEvent::DownloadProgress {
                        url: url.to_string(),
                        downloaded,
                        total: total_size,
                        speed_bps: speed,
                    });
                }
                last_progress_time = now;
            }
        }

        out.flush().await.map_err(io_error)?;
        out.sync_all().await.map_err(io_error)?;

        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
            });
        }

        debug!("Download completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}
