#![allow(dead_code)]

use async_trait::async_trait;
use mirror_relay_core::transfer::{DownloadSettings, ProgressSink};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Sink that records every emitted text.
#[derive(Clone, Default)]
pub struct CollectingSink {
    texts: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub async fn texts(&self) -> Vec<String> {
        self.texts.lock().await.clone()
    }
}

#[async_trait]
impl ProgressSink for CollectingSink {
    async fn update(&self, text: &str) -> anyhow::Result<()> {
        self.texts.lock().await.push(text.to_string());
        Ok(())
    }
}

/// Sink whose every update fails; counts the attempts.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSink for FailingSink {
    async fn update(&self, _text: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("chat unavailable"))
    }
}

/// Settings with a private temp dir, no progress throttle and a short stall timeout.
pub fn test_settings(dir: &TempDir) -> DownloadSettings {
    DownloadSettings {
        connect_timeout: Duration::from_secs(5),
        stall_timeout: Duration::from_secs(2),
        progress_interval: Duration::ZERO,
        temp_dir: dir.path().to_path_buf(),
    }
}

pub fn entries(dir: &Path) -> std::io::Result<usize> {
    Ok(std::fs::read_dir(dir)?.count())
}

/// Serves one raw HTTP response, then keeps the socket open for `hold`.
///
/// Without a `Content-Length` header the body is delimited by connection close.
pub async fn raw_server(head: &'static str, body: Vec<u8>, hold: Duration) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = vec![0_u8; 8192];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.flush().await;
            tokio::time::sleep(hold).await;
        }
    });

    Ok(format!("http://{addr}/stream/data.bin"))
}

pub const CLOSE_DELIMITED_HEAD: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n";
