//! Uploads of local files to third-party file hosts.
//!
//! The dispatcher only ever receives a local path: whatever size and stall
//! guarantees the downloader enforced stay independent of host limits.

mod hosts;

pub use hosts::{upload_client, HostEndpoints, HttpUploadDispatcher};

use crate::error::TransferError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Supported destination hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Host {
    /// gofile.io
    Gofile,
    /// pixeldrain.com
    Pixeldrain,
    /// uguu.se
    Uguu,
}

impl Host {
    /// Every host, in menu order.
    pub const ALL: [Self; 3] = [Self::Gofile, Self::Pixeldrain, Self::Uguu];

    /// Stable key used in callback data.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Gofile => "gofile",
            Self::Pixeldrain => "pixeldrain",
            Self::Uguu => "uguu",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Gofile => "Gofile",
            Self::Pixeldrain => "Pixeldrain",
            Self::Uguu => "Uguu",
        }
    }

    /// Parse a callback key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|host| host.key() == key)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Interface for file-host uploaders
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadDispatcher: Send + Sync {
    /// Upload `local_path` as `display_name` to `host`, returning the public link.
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
        host: Host,
    ) -> Result<String, TransferError>;
}
