//! RemoteStorageClient behaviour against the simulated device

use std::sync::Arc;
use std::time::Duration;

use retrosync_core::domain::{DevicePath, RemoteError};
use retrosync_core::ports::UploadBody;
use retrosync_device::testing::{CancelOnDelete, SimulatedDevice};
use retrosync_device::{CreateOutcome, MutationGate, RemoteStorageClient, PROTECTED_PATHS};
use tokio_util::sync::CancellationToken;

use crate::common;

fn dev(p: &str) -> DevicePath {
    DevicePath::new(p).unwrap()
}

// ============================================================================
// Idempotent create
// ============================================================================

#[tokio::test]
async fn test_create_twice_never_duplicates() {
    let (device, client) = common::simulated_client_for(SimulatedDevice::new());

    let first = client.create_directory(&dev("downloads")).await.unwrap();
    let second = client.create_directory(&dev("/downloads/")).await.unwrap();

    assert_eq!(first, CreateOutcome::Created);
    assert_eq!(second, CreateOutcome::AlreadyExists);
    assert_eq!(device.dirs_in("/"), vec!["downloads"]);
    assert_eq!(device.calls().create, 1);
}

#[tokio::test]
async fn test_create_existing_makes_no_create_call() {
    let (device, client) = common::simulated_client();

    let outcome = client.create_directory(&dev("saves")).await.unwrap();

    assert_eq!(outcome, CreateOutcome::AlreadyExists);
    assert_eq!(device.calls().create, 0);
}

#[tokio::test]
async fn test_create_after_unavailable_listing_is_refused() {
    let (device, client) = common::simulated_client();
    device.make_unavailable("downloads");

    let err = client.create_directory(&dev("downloads")).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(device.calls().create, 0);
    assert!(!device.has_dir("downloads (1)"));
}

// ============================================================================
// Protected paths
// ============================================================================

#[tokio::test]
async fn test_delete_protected_path_makes_no_network_call() {
    let (device, client) = common::simulated_client();

    for raw in PROTECTED_PATHS {
        for variant in [raw.to_string(), format!("/{raw}"), format!("/{raw}/")] {
            let err = client.delete_file(&dev(&variant)).await.unwrap_err();
            assert!(matches!(err, RemoteError::ProtectedPath(_)), "{variant}: {err:?}");
        }
    }

    assert_eq!(device.calls().total(), 0);
    assert_eq!(client.gate().acquired_count(), 0);
}

#[tokio::test]
async fn test_delete_regular_file() {
    let (device, client) = common::simulated_client();
    device.add_file("/downloads/mario.sfc", b"rom".to_vec());
    device.add_file("/downloads/zelda.sfc", b"rom".to_vec());

    client.delete_file(&dev("downloads/mario.sfc")).await.unwrap();

    assert_eq!(device.files_in("downloads"), vec!["zelda.sfc"]);
}

// ============================================================================
// Clear and repair
// ============================================================================

#[tokio::test]
async fn test_clear_recreates_directory_removed_by_device() {
    let (device, client) = common::simulated_client();
    device.add_file("/downloads/mario.sfc", b"rom".to_vec());
    device.add_file("/downloads/zelda.sfc", b"rom".to_vec());

    let outcome = client
        .clear_directory(&DevicePath::downloads(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["mario.sfc", "zelda.sfc"]);
    assert!(outcome.recreated);
    assert!(outcome.is_clean());
    assert!(device.has_dir("downloads"));
    assert!(client.list_directory(&DevicePath::downloads()).await.is_ok());
    assert!(!device.has_dir("downloads (1)"));
}

#[tokio::test]
async fn test_clear_skips_hidden_files_and_directories() {
    let (device, client) = common::simulated_client();
    device.add_file("/playlists/.keep", b"".to_vec());
    device.add_file("/playlists/SNES.lpl", b"{}".to_vec());
    device.add_dir("/playlists/builtin");

    let outcome = client
        .clear_directory(&DevicePath::playlists(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["SNES.lpl"]);
    assert_eq!(outcome.skipped.len(), 2);
    assert!(!outcome.recreated);
    assert!(device.has_file("/playlists/.keep"));
    assert!(device.has_dir("/playlists/builtin"));
}

#[tokio::test]
async fn test_clear_missing_directory_creates_it() {
    let (device, client) = common::simulated_client_for(SimulatedDevice::new());

    let outcome = client
        .clear_directory(&DevicePath::playlists(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.deleted.is_empty());
    assert!(outcome.recreated);
    assert!(device.has_dir("playlists"));
}

#[tokio::test]
async fn test_clear_records_failed_deletes_and_continues() {
    let (device, client) = common::simulated_client();
    device.add_file("/downloads/bad.sfc", b"rom".to_vec());
    device.add_file("/downloads/good.sfc", b"rom".to_vec());
    device.make_unavailable("downloads/bad.sfc");

    let outcome = client
        .clear_directory(&DevicePath::downloads(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["good.sfc"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "bad.sfc");
    assert!(!outcome.is_clean());
    assert!(device.has_dir("downloads"));
}

#[tokio::test]
async fn test_cancelled_clear_still_repairs() {
    let (device, client) = common::simulated_client();
    device.add_file("/downloads/mario.sfc", b"rom".to_vec());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = client
        .clear_directory(&DevicePath::downloads(), &cancel)
        .await
        .unwrap();

    assert!(outcome.interrupted);
    assert!(outcome.deleted.is_empty());
    assert!(device.has_file("/downloads/mario.sfc"));
    assert!(device.has_dir("downloads"));
}

#[tokio::test]
async fn test_cancel_after_delete_still_recreates_directory() {
    let device = Arc::new(SimulatedDevice::with_standard_layout());
    device.add_file("/downloads/a.sfc", b"rom".to_vec());
    device.add_file("/downloads/b.sfc", b"rom".to_vec());
    let cancel = CancellationToken::new();
    let transport = CancelOnDelete::new(device.clone(), cancel.clone());
    let client = RemoteStorageClient::with_gate(
        Arc::new(transport),
        MutationGate::unthrottled(),
        common::options(0),
    );

    let outcome = client
        .clear_directory(&DevicePath::downloads(), &cancel)
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert!(outcome.interrupted);
    assert_eq!(outcome.deleted, vec!["a.sfc"]);
    assert!(device.has_file("/downloads/b.sfc"));
    assert!(device.has_dir("downloads"));
}

#[tokio::test]
async fn test_cancel_on_last_delete_recreates_pruned_directory() {
    let device = Arc::new(SimulatedDevice::with_standard_layout());
    device.add_file("/downloads/a.sfc", b"rom".to_vec());
    let cancel = CancellationToken::new();
    let transport = CancelOnDelete::new(device.clone(), cancel.clone());
    let client = RemoteStorageClient::with_gate(
        Arc::new(transport),
        MutationGate::unthrottled(),
        common::options(0),
    );

    let outcome = client
        .clear_directory(&DevicePath::downloads(), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["a.sfc"]);
    assert!(outcome.recreated);
    assert!(outcome.repair_error.is_none());
    assert!(device.has_dir("downloads"));
    assert_eq!(device.dirs_in("/").iter().filter(|d| d.starts_with("downloads")).count(), 1);
}

#[tokio::test]
async fn test_clear_on_unreachable_device_is_error() {
    let (device, client) = common::simulated_client();
    device.set_reachable(false);

    let err = client
        .clear_directory(&DevicePath::downloads(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(device.calls().create, 0);
}

#[tokio::test]
async fn test_ensure_critical_directories_idempotent() {
    let (device, client) = common::simulated_client_for(SimulatedDevice::new());

    let first = client.ensure_critical_directories().await;
    assert!(first
        .iter()
        .all(|(_, r)| matches!(r, Ok(CreateOutcome::Created))));

    let second = client.ensure_critical_directories().await;
    assert!(second
        .iter()
        .all(|(_, r)| matches!(r, Ok(CreateOutcome::AlreadyExists))));

    assert_eq!(
        device.dirs_in("/"),
        vec!["downloads", "playlists", "saves", "states"]
    );
}

// ============================================================================
// Retries, pacing, transfers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_list_retries_unavailable_then_gives_up() {
    let device = Arc::new(SimulatedDevice::with_standard_layout());
    device.make_unavailable("saves");
    let mut options = common::options(2);
    options.retry_backoff = Duration::from_millis(500);
    let client =
        RemoteStorageClient::with_gate(device.clone(), MutationGate::unthrottled(), options);

    let start = tokio::time::Instant::now();
    let err = client.list_directory(&DevicePath::saves()).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(device.calls().list, 3);
    // 500ms + 1000ms of linear backoff
    assert!(start.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test]
async fn test_list_not_found_is_not_retried() {
    let (device, client) = common::simulated_client_for(SimulatedDevice::new());

    let err = client.list_directory(&dev("saves/snes9x")).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(device.calls().list, 1);
}

#[tokio::test(start_paused = true)]
async fn test_mutations_are_paced() {
    let device = Arc::new(SimulatedDevice::with_standard_layout());
    device.set_prune_empty_dirs(false);
    device.add_file("/downloads/a.sfc", b"a".to_vec());
    device.add_file("/downloads/b.sfc", b"b".to_vec());
    device.add_file("/downloads/c.sfc", b"c".to_vec());
    let client = RemoteStorageClient::with_gate(
        device.clone(),
        MutationGate::new(Duration::from_secs(1)),
        common::options(0),
    );

    let start = tokio::time::Instant::now();
    let outcome = client
        .clear_directory(&DevicePath::downloads(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.deleted.len(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn test_upload_rejects_invalid_file_name_without_request() {
    let (device, client) = common::simulated_client();

    let err = client
        .upload_file(&DevicePath::downloads(), "../evil.sfc", UploadBody::Bytes(vec![1]))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Io(_)));
    assert_eq!(device.calls().upload, 0);
}

#[tokio::test]
async fn test_upload_and_download_round_trip() {
    let (device, client) = common::simulated_client();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("mario.sfc");
    std::fs::write(&local, b"ROM").unwrap();

    client
        .upload_file(&DevicePath::downloads(), "mario.sfc", UploadBody::File(local))
        .await
        .unwrap();
    assert_eq!(device.file_content("/downloads/mario.sfc"), Some(b"ROM".to_vec()));

    let dest = dir.path().join("copy.sfc");
    let written = client
        .download_file(&dev("downloads/mario.sfc"), &dest)
        .await
        .unwrap();
    assert_eq!(written, 3);
    // upload + throttled download
    assert_eq!(client.gate().acquired_count(), 2);
}

#[tokio::test]
async fn test_check_connection_reports_state() {
    let (device, client) = common::simulated_client();

    let status = client.check_connection().await;
    assert!(status.online);
    assert_eq!(status.url, "sim://device");
    assert!(status.error.is_none());

    device.set_reachable(false);
    let status = client.check_connection().await;
    assert!(!status.online);
    assert!(status.error.is_some());
}
