//! Resumable upload protocol tests against a mock platform.

use std::time::Duration;

use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vodpipe_publish::{PlatformConfig, PublishError, ResumableUploadClient, VideoTarget};
use vodpipe_storage::{LocalUrlConfig, RetryConfig, StorageGateway};

fn fast_config(base_url: &str) -> PlatformConfig {
    let mut config = PlatformConfig::new(base_url, "test-token");
    config.backoff = RetryConfig::new("upload_chunk")
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5));
    config.request_retry = RetryConfig::new("platform_request")
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(1));
    config
}

fn target() -> VideoTarget {
    VideoTarget {
        title: "Episode 12".into(),
        description: "Weekly show".into(),
        tags: vec!["podcast".into()],
        category_id: 22,
        privacy: "private".into(),
        made_for_kids: false,
    }
}

async fn write_video(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("video.mp4");
    tokio::fs::write(&path, b"hello world").await.unwrap();
    path
}

async fn mount_initiate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/session/1", server.uri()).as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn transient_failures_then_final_confirmation() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    mount_initiate(&server).await;

    // Status queries after each transient failure: nothing stored yet.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes */11"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;

    // First two chunk transfers fail transiently.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes 0-10/11"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    // Third transfer succeeds with the assigned id.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let id = client.upload_video(&video, &target()).await.unwrap();
    assert_eq!(id, "abc");
}

#[tokio::test]
async fn fully_confirmed_session_is_finalized_by_status_query() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    mount_initiate(&server).await;

    // The platform stores the whole chunk but answers 308 instead of the
    // final confirmation.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes 0-10/11"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-10"))
        .expect(1)
        .mount(&server)
        .await;

    // The id arrives only on the follow-up status query. Any further
    // chunk PUT would miss both mocks and fail the upload.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes */11"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "late"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let id = client.upload_video(&video, &target()).await.unwrap();
    assert_eq!(id, "late");
}

#[tokio::test]
async fn resume_continues_from_confirmed_offset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    mount_initiate(&server).await;

    // The status query reports the first 6 bytes as stored.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes */11"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-5"))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes 0-10/11"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // The client must resume with only the remaining bytes.
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .and(header("Content-Range", "bytes 6-10/11"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "xyz"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let id = client.upload_video(&video, &target()).await.unwrap();
    assert_eq!(id, "xyz");
}

#[tokio::test]
async fn session_404_is_session_lost_not_generic_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    mount_initiate(&server).await;
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let err = client.upload_video(&video, &target()).await.unwrap_err();
    assert!(err.is_session_lost());
    assert!(matches!(err, PublishError::SessionLost { status: 404 }));
}

#[tokio::test]
async fn non_retryable_http_error_fails_without_retry() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    mount_initiate(&server).await;
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let err = client.upload_video(&video, &target()).await.unwrap_err();
    assert!(matches!(err, PublishError::Upload { status: 403, .. }));
    assert!(!err.is_session_lost());
}

#[tokio::test]
async fn existing_marker_skips_upload_entirely() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;

    // Any HTTP call would fail the expectation.
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let storage_dir = tempfile::tempdir().unwrap();
    let gateway = StorageGateway::local(
        storage_dir.path(),
        LocalUrlConfig::default(),
        RetryConfig::new("test").with_base_delay(Duration::from_millis(1)),
    );
    gateway
        .upload_bytes(
            br#"{"video_id": "prior-id", "published_at": "2024-01-01T00:00:00Z"}"#,
            "uploads/ep12/.published.json",
            "application/json",
        )
        .await
        .unwrap();

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let outcome = client
        .publish(&gateway, "uploads/ep12", &video, &target(), &[])
        .await
        .unwrap();

    assert!(outcome.already_published);
    assert_eq!(outcome.video_id, "prior-id");
    assert!(outcome.captions_skipped.is_none());
}

#[tokio::test]
async fn caption_failure_degrades_instead_of_failing_publish() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(&dir).await;
    let caption_path = dir.path().join("subtitles.vtt");
    tokio::fs::write(&caption_path, b"WEBVTT\n\n").await.unwrap();

    mount_initiate(&server).await;
    Mock::given(method("PUT"))
        .and(path("/session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "vid-9"})))
        .mount(&server)
        .await;
    // Captions fail on every attempt of the small retry budget.
    Mock::given(method("POST"))
        .and(path("/upload/captions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let storage_dir = tempfile::tempdir().unwrap();
    let gateway = StorageGateway::local(
        storage_dir.path(),
        LocalUrlConfig::default(),
        RetryConfig::new("test").with_base_delay(Duration::from_millis(1)),
    );

    let client = ResumableUploadClient::new(fast_config(&server.uri())).unwrap();
    let outcome = client
        .publish(
            &gateway,
            "uploads/ep12",
            &video,
            &target(),
            &[vodpipe_publish::CaptionFile {
                language: "en".into(),
                name: "English".into(),
                path: caption_path,
            }],
        )
        .await
        .unwrap();

    assert_eq!(outcome.video_id, "vid-9");
    assert!(!outcome.already_published);
    assert!(outcome.captions_skipped.is_some());

    // The marker is written even when captions were skipped.
    assert!(gateway
        .exists("uploads/ep12/.published.json")
        .await
        .unwrap());
}
