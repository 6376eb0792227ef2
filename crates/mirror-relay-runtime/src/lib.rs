#![deny(missing_docs)]
//! Mirror Relay runtime helpers.
//!
//! Transport-agnostic orchestration of the upload, mirror and leech flows.

/// Pending destination choices.
pub mod pending;
/// Relay flows on top of the downloader and dispatcher.
pub mod pipeline;

pub use pending::{Attachment, PendingSelections, SelectionKind};
pub use pipeline::{AttachmentFetcher, LeechOutcome, MirrorReport, RelayPipeline};
