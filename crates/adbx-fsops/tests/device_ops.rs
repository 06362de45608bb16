use std::sync::Arc;

use adbx_core::{
    FsPath, ProgressSink, RecycleIndexEntry, TransferDirection, TransferEngine, TransferRequest,
};
use adbx_fsops::{AdbTransferEngine, CommandExecutor, FsOpsError, RemoteFileOps};
use adbx_test_support::FakeDevice;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const DEVICE: &str = "R58M12345";

fn setup() -> (Arc<FakeDevice>, RemoteFileOps) {
    let device = Arc::new(FakeDevice::new(DEVICE));
    device.add_dir("/sd");
    let executor = Arc::new(CommandExecutor::new("adb", device.clone()));
    (device, RemoteFileOps::new(executor).with_recycle_root("/sd/.trash"))
}

fn remote(path: &str, is_directory: bool) -> TestResult<FsPath> {
    Ok(FsPath::remote(DEVICE, path, is_directory)?)
}

#[tokio::test]
async fn file_lifecycle_on_the_device() -> TestResult {
    let (device, ops) = setup();
    let cancel = CancellationToken::new();
    let folder = remote("/sd/it's here", true)?;
    let file = folder.join("list of things.txt", false)?;

    ops.make_dir(ops.reserve(DEVICE), &folder, &cancel).await?;
    ops.make_file(ops.reserve(DEVICE), &file, &cancel).await?;
    ops.append_line(ops.reserve(DEVICE), &file, "first $HOME `x`", &cancel)
        .await?;
    ops.append_line(ops.reserve(DEVICE), &file, "second", &cancel)
        .await?;
    assert_eq!(
        ops.read_all_text(ops.reserve(DEVICE), &file, &cancel).await?,
        "first $HOME `x`\nsecond\n"
    );

    let entries = ops.list_dir(ops.reserve(DEVICE), &folder, &cancel).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path(), &file);
    assert_eq!(entries[0].size(), Some(23));

    let renamed = file.with_name("done.txt")?;
    ops.move_path(ops.reserve(DEVICE), &file, &renamed, &cancel)
        .await?;
    assert!(device.exists("/sd/it's here/done.txt"));

    ops.delete(ops.reserve(DEVICE), &[folder], true, &cancel)
        .await?;
    assert!(!device.exists("/sd/it's here"));
    Ok(())
}

#[tokio::test]
async fn device_errors_surface_verbatim() -> TestResult {
    let (_device, ops) = setup();
    let err = ops
        .move_path(
            ops.reserve(DEVICE),
            &remote("/sd/ghost.txt", false)?,
            &remote("/sd/real.txt", false)?,
            &CancellationToken::new(),
        )
        .await
        .expect_err("missing source");
    assert!(matches!(err, FsOpsError::RemoteOperationFailed { .. }));
    assert_eq!(
        err.user_message(),
        "mv: bad '/sd/ghost.txt': No such file or directory"
    );
    Ok(())
}

#[tokio::test]
async fn listing_the_recycle_root_decodes_metadata() -> TestResult {
    let (device, ops) = setup();
    let entry = RecycleIndexEntry::new(
        remote("/sd/docs", true)?,
        "report.txt",
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).single().ok_or("time")?,
    )?;
    device.add_file(&format!("/sd/.trash/{}", entry.encode()), "data");
    device.add_file("/sd/.trash/stray.txt", "x");

    let mut entries = ops
        .list_dir(ops.reserve(DEVICE), &remote("/sd/.trash", true)?, &CancellationToken::new())
        .await?;
    entries.sort_by(|a, b| a.path().full_name().cmp(b.path().full_name()));
    let decoded: Vec<Option<&RecycleIndexEntry>> =
        entries.iter().map(|entry| entry.trash_origin()).collect();
    assert!(decoded.contains(&Some(&entry)));
    assert!(decoded.contains(&None));
    Ok(())
}

#[tokio::test]
async fn transfers_move_bytes_both_ways() -> TestResult {
    let (device, ops) = setup();
    device.add_file("/sd/photo.jpg", "jpeg bytes");
    let scratch = tempfile::tempdir()?;
    let engine = AdbTransferEngine::new(Arc::clone(ops.executor()), scratch.path().join("helper"));

    let pulled = scratch.path().join("photo.jpg");
    let outcome = engine
        .transfer(
            TransferRequest {
                operation_id: Uuid::new_v4(),
                direction: TransferDirection::Pull,
                device_id: DEVICE.into(),
                source: remote("/sd/photo.jpg", false)?,
                destination: FsPath::host(&pulled.to_string_lossy(), false)?,
                progress_file: None,
            },
            ProgressSink::noop(),
            CancellationToken::new(),
        )
        .await?;
    assert!(outcome.succeeded());
    assert_eq!(std::fs::read_to_string(&pulled)?, "jpeg bytes");

    let outcome = engine
        .transfer(
            TransferRequest {
                operation_id: Uuid::new_v4(),
                direction: TransferDirection::Push,
                device_id: DEVICE.into(),
                source: FsPath::host(&pulled.to_string_lossy(), false)?,
                destination: remote("/sd/copy.jpg", false)?,
                progress_file: None,
            },
            ProgressSink::noop(),
            CancellationToken::new(),
        )
        .await?;
    assert!(outcome.succeeded());
    assert_eq!(device.read("/sd/copy.jpg").as_deref(), Some("jpeg bytes"));

    let missing = engine
        .transfer(
            TransferRequest {
                operation_id: Uuid::new_v4(),
                direction: TransferDirection::Pull,
                device_id: DEVICE.into(),
                source: remote("/sd/gone.jpg", false)?,
                destination: FsPath::host(&pulled.to_string_lossy(), false)?,
                progress_file: None,
            },
            ProgressSink::noop(),
            CancellationToken::new(),
        )
        .await?;
    assert!(!missing.succeeded());
    assert_eq!(
        missing.stderr,
        "adb: error: failed to stat remote object '/sd/gone.jpg': No such file or directory"
    );
    Ok(())
}

#[tokio::test]
async fn lists_connected_devices() -> TestResult {
    let (_, ops) = setup();
    let devices = ops.executor().list_devices().await?;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, DEVICE);
    assert_eq!(devices[0].model.as_deref(), Some("Fake_Device"));
    Ok(())
}
