use crate::utils::human_size;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Receiver of human-readable progress text.
///
/// Implementations are expected to have "replace the previous status"
/// semantics. Failures are logged by the caller and never abort a transfer.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Replace the displayed status with `text`.
    async fn update(&self, text: &str) -> Result<()>;
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn update(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Mutable state of one running download.
///
/// Owned by the download loop; never shared between transfers.
#[derive(Debug)]
pub struct TransferProgress {
    downloaded: u64,
    total: u64,
    last_text: String,
    last_emit: Option<Instant>,
    last_data: Instant,
}

impl TransferProgress {
    /// Start tracking a transfer whose declared size is `total` (0 if unknown).
    #[must_use]
    pub fn new(total: u64, now: Instant) -> Self {
        Self {
            downloaded: 0,
            total,
            last_text: String::new(),
            last_emit: None,
            last_data: now,
        }
    }

    /// Account for a received chunk; empty chunks leave the stall clock running.
    pub fn record_chunk(&mut self, len: usize, now: Instant) {
        if len == 0 {
            return;
        }
        self.downloaded = self.downloaded.saturating_add(len as u64);
        self.last_data = now;
    }

    /// Bytes received so far.
    #[must_use]
    pub const fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Time left before the stall timeout fires, zero if already exceeded.
    #[must_use]
    pub fn stall_budget(&self, now: Instant, stall_timeout: Duration) -> Duration {
        stall_timeout.saturating_sub(now.saturating_duration_since(self.last_data))
    }

    /// Current progress text.
    #[must_use]
    pub fn render(&self) -> String {
        if self.total > 0 {
            let percent = u128::from(self.downloaded) * 100 / u128::from(self.total);
            format!(
                "Download: {percent}% ({}/{})",
                human_size(self.downloaded),
                human_size(self.total)
            )
        } else {
            format!("Download: {}", human_size(self.downloaded))
        }
    }

    /// Returns the text to emit now, if any.
    ///
    /// The time gate opens at most once per `interval`; when it opens the
    /// text is only returned if it differs from the last emitted one.
    pub fn next_emission(&mut self, now: Instant, interval: Duration) -> Option<String> {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_emit = Some(now);

        let text = self.render();
        if text == self.last_text {
            return None;
        }
        self.last_text.clone_from(&text);
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(5);

    #[test]
    fn first_chunk_emits_immediately() {
        let start = Instant::now();
        let mut progress = TransferProgress::new(0, start);
        progress.record_chunk(2048, start);
        assert_eq!(
            progress.next_emission(start, INTERVAL).as_deref(),
            Some("Download: 2KB")
        );
    }

    #[test]
    fn emissions_are_throttled() {
        let start = Instant::now();
        let mut progress = TransferProgress::new(0, start);
        progress.record_chunk(1024, start);
        assert!(progress.next_emission(start, INTERVAL).is_some());

        progress.record_chunk(1024, start + Duration::from_secs(1));
        assert!(progress
            .next_emission(start + Duration::from_secs(1), INTERVAL)
            .is_none());

        assert_eq!(
            progress
                .next_emission(start + Duration::from_secs(5), INTERVAL)
                .as_deref(),
            Some("Download: 2KB")
        );
    }

    #[test]
    fn identical_text_is_emitted_once() {
        let start = Instant::now();
        let mut progress = TransferProgress::new(0, start);
        progress.record_chunk(10, start);
        assert!(progress.next_emission(start, Duration::ZERO).is_some());

        // 1500B and 1530B both render as 1KB
        progress.record_chunk(1490, start);
        assert_eq!(
            progress.next_emission(start, Duration::ZERO).as_deref(),
            Some("Download: 1KB")
        );
        progress.record_chunk(30, start);
        assert!(progress.next_emission(start, Duration::ZERO).is_none());
    }

    #[test]
    fn known_total_renders_percentage() {
        let start = Instant::now();
        let mut progress = TransferProgress::new(4 * 1024 * 1024, start);
        progress.record_chunk(1024 * 1024, start);
        assert_eq!(progress.render(), "Download: 25% (1MB/4MB)");
    }

    #[test]
    fn empty_chunks_do_not_reset_stall_clock() {
        let start = Instant::now();
        let mut progress = TransferProgress::new(0, start);
        let later = start + Duration::from_secs(50);
        progress.record_chunk(0, later);
        assert_eq!(
            progress.stall_budget(later, Duration::from_secs(60)),
            Duration::from_secs(10)
        );

        progress.record_chunk(1, later);
        assert_eq!(
            progress.stall_budget(later, Duration::from_secs(60)),
            Duration::from_secs(60)
        );
        assert_eq!(
            progress.stall_budget(later + Duration::from_secs(61), Duration::from_secs(60)),
            Duration::ZERO
        );
    }
}
