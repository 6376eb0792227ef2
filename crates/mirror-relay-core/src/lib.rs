#![deny(missing_docs)]
//! Mirror Relay core library.
//!
//! Bounded streaming downloads, filename resolution, host rewrites and the
//! upload dispatcher shared by every transport.

/// Configuration management.
pub mod config;
/// Error taxonomy for transfers.
pub mod error;
/// Remote fetching into temporary storage.
pub mod transfer;
/// Uploads to third-party file hosts.
pub mod upload;
/// Utility functions.
pub mod utils;

pub use error::TransferError;
