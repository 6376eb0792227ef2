/// Destination-button callbacks
pub mod callbacks;
/// Command handlers
pub mod handlers;
/// Chat attachments: detection and download
pub mod media;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Status message acting as a progress sink
pub mod status;
/// View layer for UI components (keyboards, messages)
pub mod views;
