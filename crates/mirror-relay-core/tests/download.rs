mod common;

use common::{entries, raw_server, test_settings, CollectingSink, FailingSink, CLOSE_DELIMITED_HEAD};
use mirror_relay_core::transfer::{BoundedDownloader, DownloadSettings};
use mirror_relay_core::TransferError;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn downloads_file_and_reports_progress() -> TestResult {
    let server = MockServer::start().await;
    let payload = vec![7_u8; 3000];
    Mock::given(method("GET"))
        .and(path("/files/archive"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=\"backup.zip\"")
                .set_body_bytes(payload.clone()),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/files/archive", server.uri());

    let file = downloader.download(&url, 1024 * 1024, "file", &sink).await?;
    assert_eq!(file.filename(), "backup.zip");
    assert_eq!(file.size(), 3000);
    assert_eq!(std::fs::read(file.path())?, payload);

    let texts = sink.texts().await;
    assert!(texts.iter().any(|t| t == "Download: 100% (3KB/3KB)"), "{texts:?}");
    assert_eq!(texts.last().map(String::as_str), Some("Download complete: 3KB"));

    let path = file.path().to_path_buf();
    drop(file);
    assert!(!path.exists(), "dropping the result must delete the file");
    Ok(())
}

#[tokio::test]
async fn failing_progress_sink_does_not_abort_download() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'n'; 2048]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = FailingSink::default();
    let url = format!("{}/files/notes.txt", server.uri());

    let file = downloader.download(&url, 1024 * 1024, "file", &sink).await?;
    assert_eq!(file.filename(), "notes.txt");
    assert_eq!(file.size(), 2048);
    assert!(sink.attempts() > 0, "progress should still be attempted");
    Ok(())
}

#[tokio::test]
async fn cookies_do_not_leak_between_downloads() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=alice; Path=/")
                .set_body_bytes(vec![1_u8; 16]),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2_u8; 16]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    downloader
        .download(&format!("{}/first.bin", server.uri()), 1024, "file", &sink)
        .await?;
    downloader
        .download(&format!("{}/second.bin", server.uri()), 1024, "file", &sink)
        .await?;

    let requests = server.received_requests().await.unwrap_or_default();
    let second = requests
        .iter()
        .find(|r| r.url.path() == "/second.bin")
        .ok_or("second request missing")?;
    assert!(second.headers.get("cookie").is_none());
    Ok(())
}

#[tokio::test]
async fn declared_length_over_ceiling_fails_before_writing() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_string("01234567890"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/large", server.uri());

    let err = downloader.download(&url, 10, "file", &sink).await.err();
    assert!(
        matches!(err, Some(TransferError::TooLarge { observed: 11, limit: 10 })),
        "unexpected result: {err:?}"
    );
    assert_eq!(entries(dir.path())?, 0);
    assert!(sink.texts().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn streamed_bytes_over_ceiling_fail_and_clean_up() -> TestResult {
    let url = raw_server(CLOSE_DELIMITED_HEAD, vec![1_u8; 4096], Duration::ZERO).await?;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();

    let err = downloader.download(&url, 1000, "file", &sink).await.err();
    match err {
        Some(TransferError::TooLarge { observed, limit }) => {
            assert!(observed > 1000);
            assert_eq!(limit, 1000);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
    assert_eq!(entries(dir.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn stalled_stream_times_out_and_cleans_up() -> TestResult {
    let url = raw_server(CLOSE_DELIMITED_HEAD, vec![2_u8; 10], Duration::from_secs(10)).await?;

    let dir = tempfile::tempdir()?;
    let settings = DownloadSettings {
        stall_timeout: Duration::from_millis(300),
        ..test_settings(&dir)
    };
    let downloader = BoundedDownloader::new(settings)?;
    let sink = CollectingSink::default();

    let started = std::time::Instant::now();
    let err = downloader.download(&url, 1024, "file", &sink).await.err();
    assert!(
        matches!(err, Some(TransferError::StallTimeout { .. })),
        "unexpected result: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(entries(dir.path())?, 0);

    // The 10 bytes that did arrive were reported before the stall
    assert_eq!(sink.texts().await, vec!["Download: 10B".to_string()]);
    Ok(())
}

#[tokio::test]
async fn missing_content_length_reports_downloaded_only() -> TestResult {
    let url = raw_server(CLOSE_DELIMITED_HEAD, vec![3_u8; 5000], Duration::ZERO).await?;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();

    let file = downloader.download(&url, 1024 * 1024, "hint.bin", &sink).await?;
    assert_eq!(file.size(), 5000);
    assert_eq!(file.filename(), "data.bin");

    let texts = sink.texts().await;
    assert!(!texts.is_empty());
    assert!(texts.iter().all(|t| !t.contains('%')), "{texts:?}");
    assert_eq!(texts.last().map(String::as_str), Some("Download complete: 5KB"));
    Ok(())
}

#[tokio::test]
async fn legal_block_is_retried_without_origin_and_referer() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked.bin"))
        .and(header_exists("origin"))
        .respond_with(ResponseTemplate::new(451))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/blocked.bin", server.uri());

    let file = downloader.download(&url, 1024, "file", &sink).await?;
    assert_eq!(std::fs::read(file.path())?, b"payload");
    assert_eq!(file.filename(), "blocked.bin");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get("origin").is_some());
    assert!(requests[0].headers.get("referer").is_some());
    assert!(requests[1].headers.get("origin").is_none());
    assert!(requests[1].headers.get("referer").is_none());
    Ok(())
}

#[tokio::test]
async fn legal_block_is_retried_only_once() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/always-blocked"))
        .respond_with(ResponseTemplate::new(451))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/always-blocked", server.uri());

    let err = downloader.download(&url, 1024, "file", &sink).await.err();
    assert!(
        matches!(err, Some(TransferError::HttpError { status: 451 })),
        "unexpected result: {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn http_errors_are_terminal() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/missing", server.uri());

    let err = downloader.download(&url, 1024, "file", &sink).await.err();
    assert!(
        matches!(err, Some(TransferError::HttpError { status: 404 })),
        "unexpected result: {err:?}"
    );
    assert_eq!(entries(dir.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn kept_file_survives_the_guard() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("keep me"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let downloader = BoundedDownloader::new(test_settings(&dir))?;
    let sink = CollectingSink::default();
    let url = format!("{}/keep.txt", server.uri());

    let file = downloader.download(&url, 1024, "file", &sink).await?;
    let kept = file.keep()?;
    assert_eq!(std::fs::read_to_string(&kept)?, "keep me");
    std::fs::remove_file(kept)?;
    Ok(())
}
