//! Source URL rewriting before the generic downloader runs.
//!
//! Pixeldrain share links (`/u/<id>`) serve an HTML page; they are rewritten
//! to the direct-download API and the real file name is looked up through the
//! metadata endpoint.

use crate::config::METADATA_TIMEOUT_SECS;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Public Pixeldrain origin.
pub const PIXELDRAIN_BASE_URL: &str = "https://pixeldrain.com";
/// Hint used when no better name is known.
pub const DEFAULT_FILENAME_HINT: &str = "file";

const PIXELDRAIN_SHARE_MARKER: &str = "pixeldrain.com/u/";
const PIXELDRAIN_API_MARKER: &str = "pixeldrain.com/api/file/";
const NAME_KEYS: &[&str] = &["name", "filename", "file_name"];

/// What the downloader should fetch, and the name to fall back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    /// URL handed to the downloader
    pub download_url: String,
    /// Fallback file name when headers and URL give nothing usable
    pub filename_hint: String,
}

/// Extracts the Pixeldrain file id from a share or API link.
///
/// # Examples
///
/// ```
/// use mirror_relay_core::transfer::source::pixeldrain_id;
/// assert_eq!(pixeldrain_id("https://pixeldrain.com/u/abc123?embed").as_deref(), Some("abc123"));
/// assert_eq!(pixeldrain_id("https://example.com/u/abc123"), None);
/// ```
#[must_use]
pub fn pixeldrain_id(url: &str) -> Option<String> {
    let marker = [PIXELDRAIN_SHARE_MARKER, PIXELDRAIN_API_MARKER]
        .into_iter()
        .find(|marker| url.contains(marker))?;
    let (_, tail) = url.split_once(marker)?;
    let id = tail
        .split(['?', '#', '/'])
        .next()
        .unwrap_or_default()
        .trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Rewrites known file-host links into direct downloads.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    client: HttpClient,
    pixeldrain_base: String,
}

impl SourceResolver {
    /// Create a resolver that talks to the public Pixeldrain API.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_pixeldrain_base(client, PIXELDRAIN_BASE_URL)
    }

    /// Create a resolver against a custom Pixeldrain origin.
    #[must_use]
    pub fn with_pixeldrain_base(client: HttpClient, base: impl Into<String>) -> Self {
        Self {
            client,
            pixeldrain_base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Direct-download URL for a Pixeldrain file id.
    #[must_use]
    pub fn pixeldrain_download_url(&self, id: &str) -> String {
        format!("{}/api/file/{id}", self.pixeldrain_base)
    }

    /// Metadata URL for a Pixeldrain file id.
    #[must_use]
    pub fn pixeldrain_info_url(&self, id: &str) -> String {
        format!("{}/api/file/{id}/info", self.pixeldrain_base)
    }

    /// Resolve a user-supplied URL into a download target.
    pub async fn resolve(&self, raw_url: &str) -> SourceTarget {
        let raw_url = raw_url.trim();
        let Some(id) = pixeldrain_id(raw_url) else {
            return SourceTarget {
                download_url: raw_url.to_string(),
                filename_hint: DEFAULT_FILENAME_HINT.to_string(),
            };
        };

        debug!(id = %id, "Rewriting Pixeldrain link to API download");
        let filename_hint = self
            .lookup_pixeldrain_name(&id)
            .await
            .unwrap_or_else(|| DEFAULT_FILENAME_HINT.to_string());

        SourceTarget {
            download_url: self.pixeldrain_download_url(&id),
            filename_hint,
        }
    }

    /// Fetch the real file name from the Pixeldrain metadata endpoint.
    ///
    /// Any failure yields `None`; the lookup only improves the fallback name.
    pub async fn lookup_pixeldrain_name(&self, id: &str) -> Option<String> {
        let response = match self
            .client
            .get(self.pixeldrain_info_url(id))
            .timeout(Duration::from_secs(METADATA_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(id = %id, error = %e, "Pixeldrain info lookup failed");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            debug!(id = %id, status = %response.status(), "Pixeldrain info unavailable");
            return None;
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(id = %id, error = %e, "Pixeldrain info is not JSON");
                return None;
            }
        };

        NAME_KEYS.iter().find_map(|key| {
            body.get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
        })
    }
}
