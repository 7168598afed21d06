//! End-to-end album runs against a wiremock catalog
//!
//! The HTTP catalog client is real; the external tools are recording doubles.
//!
//! ```bash
//! cargo test --test album_run
//! ```

mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog_dl::tools::StreamKind;
use catalog_dl::{Error, Issues, NeverRetry, Orchestrator, RetryPrompt, RunOptions, RunSummary};
use common::{
    ALBUM_ID, RecordingDecryptor, RecordingTagger, album_url, config_for, mount_album,
    recording_tools, services_for,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct AlwaysRetry {
    asked: AtomicUsize,
}

#[async_trait]
impl RetryPrompt for AlwaysRetry {
    async fn confirm_retry(&self, _summary: &RunSummary, _issues: &Issues) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        true
    }
}

struct Run {
    orchestrator: Orchestrator,
    decryptor: Arc<RecordingDecryptor>,
    tagger: Arc<RecordingTagger>,
    root: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn run_for(server: &MockServer, decryptor: RecordingDecryptor) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(server, dir.path());
    let decryptor = Arc::new(decryptor);
    let tagger = Arc::new(RecordingTagger::default());
    let services = services_for(&config, recording_tools(&decryptor, &tagger));
    Run {
        orchestrator: Orchestrator::new(config, services, RunOptions::default()),
        decryptor,
        tagger,
        root: dir.path().to_path_buf(),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_album_is_downloaded_tagged_and_counted() {
    let server = MockServer::start().await;
    mount_album(&server).await;
    let run = run_for(&server, RecordingDecryptor::default());

    let summary = run
        .orchestrator
        .run_urls(&[album_url()], &NeverRetry)
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "Completed: 3/3 | Warnings: 0 | Errors: 0");
    let album_dir = run.root.join("Joni Mitchell").join("Blue");
    assert!(album_dir.join("cover.jpg").exists());
    for name in ["01. All I Want.m4a", "02. My Old Man.m4a", "03. Little Green.m4a"] {
        assert!(album_dir.join(name).exists(), "{name} missing");
    }

    let requests = run.decryptor.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.kind == StreamKind::Enhanced));
    assert!(
        requests
            .iter()
            .all(|r| r.stream_url.ends_with("/alac/prog_index.m3u8")),
        "ALAC is preferred under the default codec priority"
    );

    let tag_calls = run.tagger.tags_for("02. My Old Man.m4a");
    assert_eq!(tag_calls.len(), 2, "cover step, then metadata step");
    assert!(tag_calls[0].get("cover").unwrap().ends_with("cover.jpg"));
    let full = &tag_calls[1];
    assert_eq!(full.get("album"), Some("Blue"));
    assert_eq!(full.get("tracknum"), Some("2/3"));
    assert_eq!(full.get("genre"), Some("Folk"));
    assert_eq!(full.get("UPC"), Some("075992716626"));
}

#[tokio::test]
async fn test_failed_track_is_retried_until_it_succeeds() {
    let server = MockServer::start().await;
    mount_album(&server).await;
    let decryptor = RecordingDecryptor::default();
    decryptor.fail("2", 1);
    let run = run_for(&server, decryptor);
    let prompt = AlwaysRetry {
        asked: AtomicUsize::new(0),
    };

    let summary = run
        .orchestrator
        .run_urls(&[album_url()], &prompt)
        .await
        .unwrap();

    assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    assert_eq!(summary.counters.error, 1);
    assert_eq!(summary.counters.total, 6, "the retry pass counts done tracks again");
    assert_eq!(summary.counters.success, 5);
    let fetched_two = run
        .decryptor
        .requests()
        .iter()
        .filter(|r| r.track_id == "2")
        .count();
    assert_eq!(fetched_two, 2);
    assert_eq!(run.decryptor.requests().len(), 4, "tracks 1 and 3 are not fetched again");
    let album_dir = run.root.join("Joni Mitchell").join("Blue");
    assert!(
        album_dir.join("01. My Old Man.m4a").exists(),
        "the retry batch holds only track 2, numbered 1"
    );
    assert!(!album_dir.join("02. My Old Man.m4a").exists());
}

#[tokio::test]
async fn test_rejected_token_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/catalog/us/albums/{ALBUM_ID}")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let run = run_for(&server, RecordingDecryptor::default());

    let err = run
        .orchestrator
        .run_urls(
            &[album_url(), "https://music.apple.com/us/album/court-and-spark/1".into()],
            &NeverRetry,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(_)), "got {err:?}");
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1, "the second album is never requested");
    assert!(run.decryptor.requests().is_empty());
}

#[tokio::test]
async fn test_missing_manifest_marks_track_unavailable() {
    let server = MockServer::start().await;
    mount_album(&server).await;
    Mock::given(method("GET"))
        .and(path("/hls/3/master.m3u8"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    let run = run_for(&server, RecordingDecryptor::default());

    let summary = run
        .orchestrator
        .run_urls(&[album_url()], &NeverRetry)
        .await
        .unwrap();

    assert_eq!(summary.counters.success, 2);
    assert_eq!(summary.counters.unavailable, 1);
    let issues = run.orchestrator.stats().issues();
    assert!(
        issues
            .warnings
            .iter()
            .any(|w| w.starts_with("[Joni Mitchell - Little Green]")),
        "{issues:?}"
    );
}
