//! Bounded streaming downloader.
//!
//! Streams a remote resource into a uniquely named temporary file while
//! enforcing a byte ceiling, detecting stalled streams and reporting throttled
//! progress. The temporary file is removed on every failure path; on success
//! it is handed to the caller inside a [`DownloadedFile`] guard.

use super::filename::resolve_filename;
use super::progress::{ProgressSink, TransferProgress};
use crate::config::{RelaySettings, BROWSER_USER_AGENT, DOWNLOAD_CHUNK_SIZE};
use crate::error::TransferError;
use crate::utils::human_size;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Some hosts answer 451 when `Origin`/`Referer` are present but serve the
/// same URL to a bare request. One retry without those headers, nothing more.
const LEGAL_BLOCK_RETRY: StatusCode = StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS;

const MAX_REDIRECTS: usize = 10;
const TEMP_PREFIX: &str = "relay-";
const TEMP_SUFFIX: &str = ".part";

/// Tunables for [`BoundedDownloader`].
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// TCP connect timeout, independent of stall detection
    pub connect_timeout: Duration,
    /// Maximum silence (no new bytes) before failing
    pub stall_timeout: Duration,
    /// Minimum interval between two progress emissions
    pub progress_interval: Duration,
    /// Directory for temporary files
    pub temp_dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

impl From<&RelaySettings> for DownloadSettings {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            stall_timeout: settings.stall_timeout(),
            progress_interval: settings.progress_interval(),
            temp_dir: settings.temp_dir(),
        }
    }
}

/// A completed download.
///
/// The file lives as long as this value; dropping it deletes the file.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    filename: String,
    size: u64,
}

impl DownloadedFile {
    /// Location of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved display name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size measured on disk after the stream finished.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file now, reporting any filesystem error.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file could not be removed.
    pub fn remove(self) -> std::io::Result<()> {
        self.path.close()
    }

    /// Detach the file from the guard; the caller becomes responsible for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path could not be persisted.
    pub fn keep(self) -> std::io::Result<PathBuf> {
        self.path.keep().map_err(|e| e.error)
    }
}

/// Streams URLs to disk under a byte ceiling.
#[derive(Debug, Clone)]
pub struct BoundedDownloader {
    client: HttpClient,
    settings: DownloadSettings,
}

impl BoundedDownloader {
    /// Create a downloader with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Network` if the HTTP client cannot be built.
    pub fn new(settings: DownloadSettings) -> Result<Self, TransferError> {
        let client = HttpClient::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransferError::Network(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// HTTP client shared with metadata lookups.
    #[must_use]
    pub const fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    /// Download `url` into a temporary file no larger than `byte_ceiling`.
    ///
    /// # Errors
    ///
    /// - `HttpError` for a non-success status (after the 451 retry)
    /// - `TooLarge` when the declared, streamed or on-disk size exceeds the ceiling
    /// - `StallTimeout` when no data arrives within the stall timeout
    /// - `InvalidUrl`, `Network`, `Io` for the ambient failures
    pub async fn download(
        &self,
        url: &str,
        byte_ceiling: u64,
        filename_hint: &str,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadedFile, TransferError> {
        let parsed = parse_http_url(url)?;
        info!(url = %parsed, limit = %human_size(byte_ceiling), "Starting download");

        let response = self.open(&parsed).await?;

        let declared = response.content_length().unwrap_or(0);
        if declared > byte_ceiling {
            warn!(url = %parsed, declared, "Declared size exceeds limit, body not read");
            return Err(TransferError::TooLarge {
                observed: declared,
                limit: byte_ceiling,
            });
        }

        let filename = resolve_filename(response.headers(), url, filename_hint);

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.settings.temp_dir)?;
        let (file, temp_path) = temp.into_parts();
        debug!(path = %temp_path.display(), "Created temporary file");

        match self
            .stream_to_file(response, file, &temp_path, declared, byte_ceiling, sink)
            .await
        {
            Ok(size) => {
                info!(url = %parsed, filename = %filename, size, "Download finished");
                emit(sink, &format!("Download complete: {}", human_size(size))).await;
                Ok(DownloadedFile {
                    path: temp_path,
                    filename,
                    size,
                })
            }
            Err(e) => {
                warn!(url = %parsed, error = %e, "Download failed, removing temporary file");
                let path_display = temp_path.display().to_string();
                if let Err(rm) = temp_path.close() {
                    warn!(path = %path_display, error = %rm, "Failed to remove temporary file");
                }
                Err(e)
            }
        }
    }

    /// Send the GET, applying the 451 retry; returns a success response.
    async fn open(&self, url: &Url) -> Result<Response, TransferError> {
        let headers = request_headers(url);
        let response = self.send(url, headers.clone()).await?;

        let response = if response.status() == LEGAL_BLOCK_RETRY {
            debug!(url = %url, "Got 451, retrying without Origin/Referer");
            drop(response);
            let mut bare = headers;
            bare.remove(ORIGIN);
            bare.remove(REFERER);
            self.send(url, bare).await?
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::HttpError {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn send(&self, url: &Url, headers: HeaderMap) -> Result<Response, TransferError> {
        let request = self.client.get(url.clone()).headers(headers).send();
        match timeout(self.settings.stall_timeout, request).await {
            Ok(result) => result.map_err(|e| TransferError::from_reqwest(&e)),
            Err(_) => Err(self.stall_error()),
        }
    }

    async fn stream_to_file(
        &self,
        response: Response,
        file: std::fs::File,
        path: &Path,
        declared: u64,
        byte_ceiling: u64,
        sink: &dyn ProgressSink,
    ) -> Result<u64, TransferError> {
        let mut writer =
            BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, tokio::fs::File::from_std(file));
        let mut progress = TransferProgress::new(declared, Instant::now());
        let mut stream = response.bytes_stream();

        loop {
            let budget = progress.stall_budget(Instant::now(), self.settings.stall_timeout);
            let Ok(next) = timeout(budget, stream.next()).await else {
                return Err(self.stall_error());
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| TransferError::from_reqwest(&e))?;
            if chunk.is_empty() {
                continue;
            }

            writer.write_all(&chunk).await?;
            progress.record_chunk(chunk.len(), Instant::now());

            if progress.downloaded() > byte_ceiling {
                return Err(TransferError::TooLarge {
                    observed: progress.downloaded(),
                    limit: byte_ceiling,
                });
            }

            if let Some(text) = progress.next_emission(Instant::now(), self.settings.progress_interval) {
                emit(sink, &text).await;
            }
        }

        drop(stream);
        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        // The on-disk size is authoritative, not the counted bytes
        let size = tokio::fs::metadata(path).await?.len();
        if size > byte_ceiling {
            return Err(TransferError::TooLarge {
                observed: size,
                limit: byte_ceiling,
            });
        }
        Ok(size)
    }

    const fn stall_error(&self) -> TransferError {
        TransferError::StallTimeout {
            secs: self.settings.stall_timeout.as_secs(),
        }
    }
}

fn parse_http_url(url: &str) -> Result<Url, TransferError> {
    let parsed = Url::parse(url.trim()).map_err(|e| TransferError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(TransferError::InvalidUrl(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

/// Browser-like header set with `Origin`/`Referer` derived from the target.
#[must_use]
pub fn request_headers(url: &Url) -> HeaderMap {
    let origin = url.origin().ascii_serialization();
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,id;q=0.8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
        headers.insert(REFERER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert(ORIGIN, value);
    }
    headers
}

/// Best-effort progress delivery.
async fn emit(sink: &dyn ProgressSink, text: &str) {
    if let Err(e) = sink.update(text).await {
        warn!(error = %e, "Progress update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_origin_and_referer() -> Result<(), Box<dyn std::error::Error>> {
        let url = Url::parse("https://files.example.com:8443/a/b.zip?x=1")?;
        let headers = request_headers(&url);
        assert_eq!(headers[ORIGIN], "https://files.example.com:8443");
        assert_eq!(headers[REFERER], "https://files.example.com:8443/");
        assert!(headers[USER_AGENT].to_str()?.starts_with("Mozilla/5.0"));
        Ok(())
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            parse_http_url("ftp://example.com/file"),
            Err(TransferError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(TransferError::InvalidUrl(_))
        ));
        assert!(parse_http_url(" https://example.com/x ").is_ok());
    }

    #[test]
    fn settings_follow_relay_settings() {
        let relay = RelaySettings {
            stall_timeout_secs: 7,
            progress_interval_secs: 2,
            ..RelaySettings::default()
        };
        let settings = DownloadSettings::from(&relay);
        assert_eq!(settings.stall_timeout, Duration::from_secs(7));
        assert_eq!(settings.progress_interval, Duration::from_secs(2));
    }
}
