//! Fetching the PBF extract over HTTP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use crate::config::DownloadConfig;
use crate::{Cancellation, Error, Result};

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`,
/// capped at `max`.
pub fn backoff_delay(retry: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}

/// Statuses worth another attempt.
pub fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Outcome of a single attempt.
enum Attempt {
    Done(u64),
    Retry(String),
    Fatal(String),
}

/// HTTP client for the extract download, configured from [`DownloadConfig`].
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self { client, config })
    }

    /// Download `url` to `dest`. The body is streamed into a `.part` file
    /// next to `dest` and renamed once complete.
    pub async fn download(&self, url: &Url, dest: &Path, cancel: &Cancellation) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        let partial = partial_path(dest);
        let max_attempts = self.config.max_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            cancel.check()?;
            info!("Downloading {} (attempt {}/{})", url, attempt, max_attempts);

            let reason = match self.attempt(url, &partial, cancel).await? {
                Attempt::Done(bytes) => {
                    tokio::fs::rename(&partial, dest)
                        .await
                        .map_err(|e| Error::io(dest, e))?;
                    info!("Downloaded {} bytes to {}", bytes, dest.display());
                    return Ok(bytes);
                }
                Attempt::Fatal(reason) => {
                    return Err(Error::Download {
                        url: url.to_string(),
                        attempts: attempt,
                        reason,
                    })
                }
                Attempt::Retry(reason) => reason,
            };

            if attempt == max_attempts {
                return Err(Error::Download {
                    url: url.to_string(),
                    attempts: attempt,
                    reason,
                });
            }

            let delay = backoff_delay(attempt, self.config.base_delay(), self.config.max_delay());
            warn!(
                "Download attempt {}/{} failed: {}. Retrying in {:?}",
                attempt, max_attempts, reason, delay
            );
            tokio::time::sleep(delay).await;
        }

        Err(Error::Download {
            url: url.to_string(),
            attempts: 0,
            reason: "no attempts configured".to_string(),
        })
    }

    async fn attempt(&self, url: &Url, partial: &Path, cancel: &Cancellation) -> Result<Attempt> {
        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Retry(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return Ok(if is_transient(status) {
                Attempt::Retry(reason)
            } else {
                Attempt::Fatal(reason)
            });
        }

        let bar = match response.content_length() {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| Error::io(partial, e))?;
        let mut written = 0u64;

        loop {
            cancel.check()?;
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    bar.abandon();
                    return Ok(Attempt::Retry(e.to_string()));
                }
            };
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(partial, e))?;
            written += chunk.len() as u64;
            bar.set_position(written);
        }

        file.flush().await.map_err(|e| Error::io(partial, e))?;
        bar.finish_and_clear();
        Ok(Attempt::Done(written))
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
