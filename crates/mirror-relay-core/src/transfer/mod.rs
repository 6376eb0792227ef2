//! Fetching remote resources into temporary storage.

/// Bounded streaming downloader
pub mod download;
/// Filename resolution and sanitization
pub mod filename;
/// Progress tracking and sinks
pub mod progress;
/// Host-specific source rewrites
pub mod source;

pub use download::{BoundedDownloader, DownloadSettings, DownloadedFile};
pub use progress::{NoopProgress, ProgressSink, TransferProgress};
pub use source::{SourceResolver, SourceTarget};
