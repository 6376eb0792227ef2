use crate::utils::human_size;
use thiserror::Error;

/// Errors that can occur while relaying a file
#[derive(Debug, Error)]
pub enum TransferError {
    /// The server answered with a non-success status
    #[error("HTTP {status}")]
    HttpError {
        /// HTTP status code
        status: u16,
    },
    /// The resource exceeds the byte ceiling
    #[error("File too large: {}", size_over_limit(.observed, .limit))]
    TooLarge {
        /// Observed size (declared, streamed or measured on disk)
        observed: u64,
        /// Configured ceiling
        limit: u64,
    },
    /// No data arrived for longer than the stall timeout
    #[error("Timeout: no data received for {secs} seconds")]
    StallTimeout {
        /// Stall timeout that was exceeded
        secs: u64,
    },
    /// Upload to a file host failed
    #[error("Upload to {host} failed: {detail}")]
    DispatcherError {
        /// Host display name
        host: String,
        /// Host-specific failure detail
        detail: String,
    },
    /// The pending destination choice is missing or expired
    #[error("Selection not found, please start over")]
    UnknownSelection,
    /// The source URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Connectivity failure while talking to a remote host
    #[error("Network error: {0}")]
    Network(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn size_over_limit(observed: &u64, limit: &u64) -> String {
    format!("{} > limit {}", human_size(*observed), human_size(*limit))
}

impl TransferError {
    /// Map a reqwest failure onto the taxonomy.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::HttpError {
                status: status.as_u16(),
            };
        }
        Self::Network(err.to_string())
    }

    /// Whether the user can fix the problem by repeating the command.
    #[must_use]
    pub const fn is_user_correctable(&self) -> bool {
        matches!(self, Self::UnknownSelection | Self::InvalidUrl(_))
    }
}
