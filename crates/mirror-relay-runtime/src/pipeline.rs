//! Relay flows.
//!
//! Every flow funnels its bytes through a local temporary file: URLs go
//! through the [`BoundedDownloader`], chat attachments through an
//! [`AttachmentFetcher`]. The file is deleted when the flow returns, whatever
//! the outcome, unless it is handed to the caller in [`LeechOutcome::Ready`].

use crate::pending::Attachment;
use anyhow::Result;
use async_trait::async_trait;
use mirror_relay_core::config::RelaySettings;
use mirror_relay_core::transfer::{
    BoundedDownloader, DownloadSettings, DownloadedFile, ProgressSink, SourceResolver,
};
use mirror_relay_core::upload::{Host, UploadDispatcher};
use mirror_relay_core::utils::human_size;
use mirror_relay_core::TransferError;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Pulls a chat attachment onto local disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Write the attachment identified by `file_id` to `dest`.
    async fn fetch(&self, file_id: &str, dest: &Path) -> Result<()>;
}

/// Result of a completed mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Resolved file name
    pub filename: String,
    /// Bytes transferred
    pub size: u64,
    /// Public link returned by the host
    pub link: String,
}

/// Result of a leech download.
#[derive(Debug)]
pub enum LeechOutcome {
    /// File is small enough to be sent into the chat.
    Ready(DownloadedFile),
    /// File was downloaded but exceeds what the bot may send; it is already deleted.
    TooLargeForChat {
        /// Resolved file name
        filename: String,
        /// Size on disk
        size: u64,
        /// Relay ceiling that was exceeded
        limit: u64,
    },
}

/// Upload, mirror and leech flows shared by every transport.
#[derive(Clone)]
pub struct RelayPipeline {
    downloader: BoundedDownloader,
    resolver: SourceResolver,
    dispatcher: Arc<dyn UploadDispatcher>,
    task_limit: u64,
    relay_limit: u64,
}

impl RelayPipeline {
    /// Build the pipeline from settings.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Network` if the HTTP client cannot be built.
    pub fn new(
        settings: &RelaySettings,
        dispatcher: Arc<dyn UploadDispatcher>,
    ) -> Result<Self, TransferError> {
        let downloader = BoundedDownloader::new(DownloadSettings::from(settings))?;
        let resolver = SourceResolver::new(downloader.client().clone());
        Ok(Self::with_parts(
            downloader,
            resolver,
            dispatcher,
            settings.task_limit_bytes,
            settings.relay_limit_bytes,
        ))
    }

    /// Assemble the pipeline from prepared parts.
    #[must_use]
    pub fn with_parts(
        downloader: BoundedDownloader,
        resolver: SourceResolver,
        dispatcher: Arc<dyn UploadDispatcher>,
        task_limit: u64,
        relay_limit: u64,
    ) -> Self {
        Self {
            downloader,
            resolver,
            dispatcher,
            task_limit,
            relay_limit,
        }
    }

    /// Byte ceiling for a single download.
    #[must_use]
    pub const fn task_limit(&self) -> u64 {
        self.task_limit
    }

    /// Byte ceiling for sending a file into the chat.
    #[must_use]
    pub const fn relay_limit(&self) -> u64 {
        self.relay_limit
    }

    /// Resolve host-specific links and download under the task ceiling.
    ///
    /// # Errors
    ///
    /// Any downloader failure, unchanged.
    pub async fn fetch_url(
        &self,
        raw_url: &str,
        status: &dyn ProgressSink,
    ) -> Result<DownloadedFile, TransferError> {
        let target = self.resolver.resolve(raw_url).await;
        self.downloader
            .download(
                &target.download_url,
                self.task_limit,
                &target.filename_hint,
                status,
            )
            .await
    }

    /// Download `raw_url` and re-host it on `host`.
    ///
    /// # Errors
    ///
    /// Downloader failures, or `DispatcherError` from the host.
    pub async fn mirror(
        &self,
        raw_url: &str,
        host: Host,
        status: &dyn ProgressSink,
    ) -> Result<MirrorReport, TransferError> {
        notify(status, &format!("Starting download...\nTarget: {host}")).await;
        let file = self.fetch_url(raw_url, status).await?;

        notify(
            status,
            &format!("Uploading to {host}... ({})", human_size(file.size())),
        )
        .await;
        let link = self
            .dispatcher
            .upload(file.path(), file.filename(), host)
            .await?;

        info!(url = %raw_url, host = %host, size = file.size(), "Mirror finished");
        Ok(MirrorReport {
            filename: file.filename().to_string(),
            size: file.size(),
            link,
        })
    }

    /// Download `raw_url` for delivery into the chat.
    ///
    /// A file over the relay ceiling is deleted and reported as
    /// [`LeechOutcome::TooLargeForChat`] instead of an error.
    ///
    /// # Errors
    ///
    /// Any downloader failure, unchanged.
    pub async fn leech(
        &self,
        raw_url: &str,
        status: &dyn ProgressSink,
    ) -> Result<LeechOutcome, TransferError> {
        let file = self.fetch_url(raw_url, status).await?;
        if file.size() <= self.relay_limit {
            return Ok(LeechOutcome::Ready(file));
        }

        let filename = file.filename().to_string();
        let size = file.size();
        warn!(url = %raw_url, size, limit = self.relay_limit, "Leech exceeds relay limit");
        if let Err(e) = file.remove() {
            warn!(error = %e, "Failed to remove oversized download");
        }
        Ok(LeechOutcome::TooLargeForChat {
            filename,
            size,
            limit: self.relay_limit,
        })
    }

    /// Fetch a chat attachment to disk and upload it to `host`.
    ///
    /// # Errors
    ///
    /// - `TooLarge` if the platform-reported size exceeds the task ceiling
    /// - `Network` if the attachment cannot be fetched
    /// - `DispatcherError` from the host
    pub async fn upload_attachment(
        &self,
        fetcher: &dyn AttachmentFetcher,
        attachment: &Attachment,
        host: Host,
        status: &dyn ProgressSink,
    ) -> Result<String, TransferError> {
        if let Some(size) = attachment.size.filter(|size| *size > self.task_limit) {
            return Err(TransferError::TooLarge {
                observed: size,
                limit: self.task_limit,
            });
        }

        let temp_path = tempfile::Builder::new()
            .prefix("relay-")
            .suffix(".part")
            .tempfile_in(&self.downloader.settings().temp_dir)?
            .into_temp_path();

        notify(status, "Download: 0%").await;
        fetcher
            .fetch(&attachment.file_id, &temp_path)
            .await
            .map_err(|e| TransferError::Network(format!("{e:#}")))?;
        notify(status, "Download: 100%").await;

        let link = self
            .dispatcher
            .upload(&temp_path, &attachment.filename, host)
            .await?;
        info!(file = %attachment.filename, host = %host, "Attachment upload finished");

        if let Err(e) = temp_path.close() {
            warn!(error = %e, "Failed to remove attachment copy");
        }
        Ok(link)
    }
}

async fn notify(status: &dyn ProgressSink, text: &str) {
    if let Err(e) = status.update(text).await {
        warn!(error = %e, "Status update failed");
    }
}
