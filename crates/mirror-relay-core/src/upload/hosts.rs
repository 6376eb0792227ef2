use super::{Host, UploadDispatcher};
use crate::config::RelaySettings;
use crate::error::TransferError;
use crate::utils::truncate_str;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Base URLs of the upload APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEndpoints {
    /// Gofile upload origin
    pub gofile: String,
    /// Pixeldrain API origin (also used for share links)
    pub pixeldrain: String,
    /// Uguu origin
    pub uguu: String,
}

impl Default for HostEndpoints {
    fn default() -> Self {
        Self {
            gofile: "https://upload.gofile.io".to_string(),
            pixeldrain: "https://pixeldrain.com".to_string(),
            uguu: "https://uguu.se".to_string(),
        }
    }
}

impl HostEndpoints {
    /// Point every host at the same origin (handy for a single mock server).
    #[must_use]
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            gofile: base.clone(),
            pixeldrain: base.clone(),
            uguu: base,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GofileResponse {
    status: String,
    data: Option<GofileData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GofileData {
    download_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PixeldrainResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UguuResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    files: Vec<UguuFile>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UguuFile {
    url: String,
}

/// Uploads over multipart HTTP to Gofile, Pixeldrain and Uguu.
#[derive(Debug, Clone)]
pub struct HttpUploadDispatcher {
    client: HttpClient,
    endpoints: HostEndpoints,
    pixeldrain_api_key: Option<String>,
}

impl HttpUploadDispatcher {
    /// Create a dispatcher against the public host APIs.
    #[must_use]
    pub fn new(client: HttpClient, settings: &RelaySettings) -> Self {
        Self::with_endpoints(client, HostEndpoints::default(), settings.pixeldrain_api_key.clone())
    }

    /// Create a dispatcher with its own HTTP client against the public host APIs.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Network` if the HTTP client cannot be built.
    pub fn from_settings(settings: &RelaySettings) -> Result<Self, TransferError> {
        Ok(Self::new(upload_client(settings)?, settings))
    }

    /// Create a dispatcher against custom endpoints.
    #[must_use]
    pub const fn with_endpoints(
        client: HttpClient,
        endpoints: HostEndpoints,
        pixeldrain_api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoints,
            pixeldrain_api_key,
        }
    }

    async fn upload_gofile(&self, part: Part) -> Result<String, TransferError> {
        let url = format!("{}/uploadfile", self.endpoints.gofile);
        let response = self
            .client
            .post(url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| dispatch_error(Host::Gofile, e.to_string()))?;

        let body: GofileResponse = parse_json(Host::Gofile, response).await?;
        if body.status != "ok" {
            return Err(dispatch_error(
                Host::Gofile,
                format!("status '{}'", body.status),
            ));
        }
        body.data
            .and_then(|d| d.download_page)
            .ok_or_else(|| dispatch_error(Host::Gofile, "response has no download page"))
    }

    async fn upload_pixeldrain(&self, part: Part) -> Result<String, TransferError> {
        let url = format!("{}/api/file", self.endpoints.pixeldrain);
        let mut request = self
            .client
            .post(url)
            .multipart(Form::new().part("file", part));
        if let Some(key) = &self.pixeldrain_api_key {
            request = request.basic_auth("", Some(key));
        }
        let response = request
            .send()
            .await
            .map_err(|e| dispatch_error(Host::Pixeldrain, e.to_string()))?;

        let body: PixeldrainResponse = parse_json(Host::Pixeldrain, response).await?;
        match body.id {
            Some(id) if body.success => Ok(format!("{}/u/{id}", self.endpoints.pixeldrain)),
            _ => Err(dispatch_error(
                Host::Pixeldrain,
                body.message
                    .unwrap_or_else(|| "upload rejected".to_string()),
            )),
        }
    }

    async fn upload_uguu(&self, part: Part) -> Result<String, TransferError> {
        let url = format!("{}/upload", self.endpoints.uguu);
        let response = self
            .client
            .post(url)
            .multipart(Form::new().part("files[]", part))
            .send()
            .await
            .map_err(|e| dispatch_error(Host::Uguu, e.to_string()))?;

        let body: UguuResponse = parse_json(Host::Uguu, response).await?;
        if !body.success {
            return Err(dispatch_error(
                Host::Uguu,
                body.description
                    .unwrap_or_else(|| "upload rejected".to_string()),
            ));
        }
        body.files
            .into_iter()
            .next()
            .map(|f| f.url)
            .ok_or_else(|| dispatch_error(Host::Uguu, "response has no file url"))
    }
}

#[async_trait]
impl UploadDispatcher for HttpUploadDispatcher {
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
        host: Host,
    ) -> Result<String, TransferError> {
        let part = file_part(local_path, display_name).await?;
        info!(host = %host, file = %display_name, "Uploading file");

        let result = match host {
            Host::Gofile => self.upload_gofile(part).await,
            Host::Pixeldrain => self.upload_pixeldrain(part).await,
            Host::Uguu => self.upload_uguu(part).await,
        };

        match &result {
            Ok(link) => info!(host = %host, link = %link, "Upload finished"),
            Err(e) => warn!(host = %host, error = %e, "Upload failed"),
        }
        result
    }
}

/// HTTP client for uploads; a host that stops answering fails the request
/// after `upload_timeout` instead of hanging the interaction.
///
/// # Errors
///
/// Returns `TransferError::Network` if the HTTP client cannot be built.
pub fn upload_client(settings: &RelaySettings) -> Result<HttpClient, TransferError> {
    HttpClient::builder()
        .connect_timeout(settings.connect_timeout())
        .timeout(settings.upload_timeout())
        .build()
        .map_err(|e| TransferError::Network(e.to_string()))
}

/// Multipart part that streams the file instead of buffering it.
async fn file_part(path: &Path, display_name: &str) -> Result<Part, TransferError> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    debug!(path = %path.display(), len, "Streaming file into multipart body");

    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    Part::stream_with_length(body, len)
        .file_name(display_name.to_string())
        .mime_str("application/octet-stream")
        .map_err(|e| TransferError::Network(e.to_string()))
}

async fn parse_json<T: DeserializeOwned>(host: Host, response: Response) -> Result<T, TransferError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| dispatch_error(host, e.to_string()))?;

    if !status.is_success() {
        return Err(dispatch_error(host, describe_failure(status, &text)));
    }

    serde_json::from_str(&text).map_err(|e| {
        dispatch_error(
            host,
            format!("unexpected response ({e}): {}", truncate_str(&text, 200)),
        )
    })
}

/// One-line failure description; HTML error pages are not echoed back.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html || trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), truncate_str(trimmed, 200))
    }
}

fn dispatch_error(host: Host, detail: impl Into<String>) -> TransferError {
    TransferError::DispatcherError {
        host: host.display_name().to_string(),
        detail: detail.into(),
    }
}
