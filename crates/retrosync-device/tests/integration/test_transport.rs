//! Integration tests for the HTTP transport against a mocked WebUI

use retrosync_core::domain::{DevicePath, RemoteEntry, RemoteError};
use retrosync_core::ports::{IDeviceTransport, RawEntry, UploadBody};
use retrosync_device::HttpDeviceTransport;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn dev(p: &str) -> DevicePath {
    DevicePath::new(p).unwrap()
}

// ============================================================================
// list
// ============================================================================

#[tokio::test]
async fn test_list_sends_leading_and_trailing_slash() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("path", "/saves/snes9x/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "mario.srm", "path": "/saves/snes9x/mario.srm", "size": 8192},
            {"name": "backup/", "path": "/saves/snes9x/backup/"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let entries = transport.list(&dev("saves/snes9x")).await.unwrap();
    let classified: Vec<RemoteEntry> = entries.iter().map(RawEntry::classify).collect();

    assert_eq!(classified[0], RemoteEntry::file("mario.srm"));
    assert_eq!(classified[1], RemoteEntry::directory("backup"));
}

#[tokio::test]
async fn test_list_empty_body_is_empty_listing() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(transport.list(&dev("downloads")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_garbage_is_invalid_response() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = transport.list(&dev("downloads")).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn test_404_maps_to_not_found() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = transport.list(&dev("states/mgba")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_5xx_maps_to_unavailable() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("POST"))
        .and(path("/create"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = transport.create(&dev("downloads")).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_4xx_maps_to_rejected_with_body() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("POST"))
        .and(path("/delete"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = transport.delete(&dev("downloads/mario.sfc")).await.unwrap_err();
    match err {
        RemoteError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let transport =
        HttpDeviceTransport::with_base_url("http://127.0.0.1:1", common::test_timeouts());
    let err = transport.list(&dev("downloads")).await.unwrap_err();
    assert!(err.is_retryable(), "got {err:?}");
    assert!(transport.probe().await.is_err());
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_create_and_delete_send_form_path() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("POST"))
        .and(path("/create"))
        .and(body_string_contains("path=%2Fsaves%2Fsnes9x%2F"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/delete"))
        .and(body_string_contains("path=%2Fdownloads%2Fmario.sfc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport.create(&dev("/saves/snes9x")).await.unwrap();
    transport.delete(&dev("downloads/mario.sfc")).await.unwrap();
}

#[tokio::test]
async fn test_upload_uses_files_field_and_relative_path() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"files[]\""))
        .and(body_string_contains("filename=\"mario.sfc\""))
        .and(body_string_contains("ROMDATA"))
        .and(body_string_contains("downloads/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport
        .upload(&dev("/downloads/"), "mario.sfc", UploadBody::Bytes(b"ROMDATA".to_vec()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_streams_local_file() {
    let (server, transport) = common::setup_device_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("zelda.srm");
    std::fs::write(&local, b"SAVEBYTES").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("SAVEBYTES"))
        .and(body_string_contains("saves/snes9x/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport
        .upload(&dev("saves/snes9x"), "zelda.srm", UploadBody::File(local))
        .await
        .unwrap();
}

// ============================================================================
// download / probe
// ============================================================================

#[tokio::test]
async fn test_download_writes_destination_atomically() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .and(query_param("path", "/saves/snes9x/mario.srm"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("aaa").join("saves").join("mario.srm");
    let written = transport
        .download(&dev("saves/snes9x/mario.srm"), &dest)
        .await
        .unwrap();

    assert_eq!(written, 2048);
    assert_eq!(std::fs::read(&dest).unwrap().len(), 2048);
    assert!(!dest.with_file_name("mario.srm.part").exists());
}

#[tokio::test]
async fn test_download_missing_file_leaves_nothing() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("mario.srm");
    let err = transport
        .download(&dev("saves/snes9x/mario.srm"), &dest)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_probe_hits_root() {
    let (server, transport) = common::setup_device_mock().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("RetroArch"))
        .expect(1)
        .mount(&server)
        .await;

    transport.probe().await.unwrap();
}
