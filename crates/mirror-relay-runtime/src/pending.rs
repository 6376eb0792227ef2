//! Pending destination choices.
//!
//! A selection lives between the "choose a destination" prompt and the button
//! click. Entries expire after a TTL, and issuing the same command again
//! replaces the previous entry for that user.

use mirror_relay_core::config::PENDING_SELECTION_MAX_SIZE;
use mirror_relay_core::TransferError;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Which command created a selection; each kind has its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    /// `/u` on a chat attachment
    Upload,
    /// `/mirror <url>`
    Mirror,
}

impl SelectionKind {
    /// Callback-data prefix of the kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Upload => "up",
            Self::Mirror => "mi",
        }
    }

    /// Parse a callback-data prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "up" => Some(Self::Upload),
            "mi" => Some(Self::Mirror),
            _ => None,
        }
    }
}

/// Reference to a file already stored by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Platform file id
    pub file_id: String,
    /// Display name to upload under
    pub filename: String,
    /// Size reported by the platform, if any
    pub size: Option<u64>,
}

#[derive(Debug, Clone)]
enum PendingSource {
    Attachment(Attachment),
    Url(String),
}

/// Process-wide store of pending selections, keyed by user id.
#[derive(Clone)]
pub struct PendingSelections {
    cache: Cache<(SelectionKind, u64), PendingSource>,
}

impl PendingSelections {
    /// Create a store whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(PENDING_SELECTION_MAX_SIZE)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Remember the attachment a user wants to upload.
    pub async fn put_upload(&self, user_id: u64, attachment: Attachment) {
        self.insert(SelectionKind::Upload, user_id, PendingSource::Attachment(attachment))
            .await;
    }

    /// Remember the URL a user wants to mirror.
    pub async fn put_mirror(&self, user_id: u64, url: impl Into<String>) {
        self.insert(SelectionKind::Mirror, user_id, PendingSource::Url(url.into()))
            .await;
    }

    /// Put a consumed upload back after a failed attempt so another click can
    /// retry it. A selection made in the meantime wins.
    pub async fn restore_upload(&self, user_id: u64, attachment: Attachment) {
        self.cache
            .entry((SelectionKind::Upload, user_id))
            .or_insert(PendingSource::Attachment(attachment))
            .await;
    }

    /// Consume the pending upload of a user.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::UnknownSelection` if nothing is pending.
    pub async fn take_upload(&self, user_id: u64) -> Result<Attachment, TransferError> {
        match self.take(SelectionKind::Upload, user_id).await {
            Some(PendingSource::Attachment(attachment)) => Ok(attachment),
            _ => Err(TransferError::UnknownSelection),
        }
    }

    /// Consume the pending mirror URL of a user.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::UnknownSelection` if nothing is pending.
    pub async fn take_mirror(&self, user_id: u64) -> Result<String, TransferError> {
        match self.take(SelectionKind::Mirror, user_id).await {
            Some(PendingSource::Url(url)) => Ok(url),
            _ => Err(TransferError::UnknownSelection),
        }
    }

    // `get` honours the TTL; `remove` makes sure only one click consumes the entry
    async fn take(&self, kind: SelectionKind, user_id: u64) -> Option<PendingSource> {
        let key = (kind, user_id);
        self.cache.get(&key).await?;
        self.cache.remove(&key).await
    }

    async fn insert(&self, kind: SelectionKind, user_id: u64, source: PendingSource) {
        if self.cache.contains_key(&(kind, user_id)) {
            debug!(user_id, kind = ?kind, "Replacing pending selection");
        }
        self.cache.insert((kind, user_id), source).await;
    }
}
