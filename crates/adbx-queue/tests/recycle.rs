mod common;

use std::time::Duration;

use adbx_core::{EntryType, FileEntry, OperationRequest, OperationStatus};
use adbx_queue::{OperationHandle, RecycleError};
use adbx_test_support::FakeTransferEngine;
use common::{Harness, RECYCLE_ROOT, TestResult, harness, remote};

async fn setup() -> TestResult<Harness> {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    h.device.add_file("/sd/docs/report.txt", "quarterly numbers");
    h.device.add_file("/sd/docs/notes.txt", "remember");
    Ok(h)
}

async fn completed(handles: &[OperationHandle]) -> bool {
    for handle in handles {
        if handle.wait().await.state.status != OperationStatus::Completed {
            return false;
        }
    }
    true
}

#[tokio::test]
async fn trash_then_restore_round_trips_a_file() -> TestResult {
    let h = setup().await?;
    let docs = remote("/sd/docs", true)?;
    let report = remote("/sd/docs/report.txt", false)?;

    let handles = h.engine.recycle().trash(&[report], &docs).await?;
    assert!(completed(&handles).await);
    assert!(!h.device.exists("/sd/docs/report.txt"));
    assert_eq!(h.device.children(RECYCLE_ROOT).len(), 1);

    let trashed = h.engine.recycle().trashed_entries().await?;
    assert_eq!(trashed.len(), 1);
    let origin = trashed[0].trash_origin().ok_or("trash metadata missing")?;
    assert_eq!(origin.original_name(), "report.txt");
    assert_eq!(origin.original_parent().full_path(), "/sd/docs");

    let handles = h.engine.recycle().restore(&trashed).await?;
    assert!(completed(&handles).await);
    assert_eq!(
        h.device.read("/sd/docs/report.txt").as_deref(),
        Some("quarterly numbers")
    );
    assert!(h.device.children(RECYCLE_ROOT).is_empty());
    Ok(())
}

#[tokio::test]
async fn restore_recreates_a_missing_parent() -> TestResult {
    let h = setup().await?;
    let report = remote("/sd/docs/report.txt", false)?;
    let handles = h
        .engine
        .recycle()
        .trash(&[report], &remote("/sd/docs", true)?)
        .await?;
    assert!(completed(&handles).await);
    let cleanup = h
        .engine
        .queue()
        .submit(OperationRequest::delete(remote("/sd/docs", true)?))?;
    cleanup.wait().await;
    assert!(!h.device.exists("/sd/docs"));

    let trashed = h.engine.recycle().trashed_entries().await?;
    let handles = h.engine.recycle().restore(&trashed).await?;
    assert!(completed(&handles).await);
    assert!(h.device.exists("/sd/docs/report.txt"));
    Ok(())
}

#[tokio::test]
async fn restore_refuses_to_overwrite() -> TestResult {
    let h = setup().await?;
    let report = remote("/sd/docs/report.txt", false)?;
    let handles = h
        .engine
        .recycle()
        .trash(&[report.clone()], &remote("/sd/docs", true)?)
        .await?;
    assert!(completed(&handles).await);

    // Something new took the old name.
    h.device.add_file("/sd/docs/report.txt", "draft");
    h.listing.insert(FileEntry::new(report, EntryType::File, Some(5)));

    let trashed = h.engine.recycle().trashed_entries().await?;
    let err = h
        .engine
        .recycle()
        .restore(&trashed)
        .await
        .expect_err("conflict");
    assert!(matches!(
        &err,
        RecycleError::RestoreConflict { path } if path == "/sd/docs/report.txt"
    ));
    assert_eq!(h.device.read("/sd/docs/report.txt").as_deref(), Some("draft"));
    assert_eq!(h.device.children(RECYCLE_ROOT).len(), 1);
    Ok(())
}

#[tokio::test]
async fn restore_rejects_names_without_metadata() -> TestResult {
    let h = setup().await?;
    let stray = FileEntry::new(
        remote(&format!("{RECYCLE_ROOT}/stray.txt"), false)?,
        EntryType::File,
        Some(3),
    );
    let err = h
        .engine
        .recycle()
        .restore(&[stray])
        .await
        .expect_err("corrupt entry");
    assert!(matches!(err, RecycleError::CorruptTrashEntry { ref name, .. } if name == "stray.txt"));
    assert!(h.engine.queue().all().is_empty());
    Ok(())
}

#[tokio::test]
async fn trash_rejects_items_already_in_the_bin() -> TestResult {
    let h = setup().await?;
    let root = remote(RECYCLE_ROOT, true)?;
    let inside = root.join("old.txt", false)?;

    let err = h
        .engine
        .recycle()
        .trash(&[inside], &root)
        .await
        .expect_err("already trashed");
    assert!(matches!(err, RecycleError::InvalidPath { .. }));

    let err = h
        .engine
        .recycle()
        .trash(&[remote("/sd", true)?], &remote("/", true)?)
        .await
        .expect_err("contains the bin");
    assert!(matches!(err, RecycleError::InvalidPath { .. }));
    assert!(h.engine.queue().all().is_empty());
    Ok(())
}

#[tokio::test]
async fn index_files_are_never_trashed_or_listed() -> TestResult {
    let h = setup().await?;
    h.device.add_file(&format!("{RECYCLE_ROOT}/.RecycleIndex"), "");
    let root = remote(RECYCLE_ROOT, true)?;

    let handles = h
        .engine
        .recycle()
        .trash(&[root.join(".RecycleIndex", false)?], &root)
        .await?;
    assert!(handles.is_empty());
    assert!(h.engine.recycle().trashed_entries().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_removes_every_trashed_item() -> TestResult {
    let h = setup().await?;
    h.device.add_file(&format!("{RECYCLE_ROOT}/.RecycleIndex"), "");
    let docs = remote("/sd/docs", true)?;
    let items = [
        remote("/sd/docs/report.txt", false)?,
        remote("/sd/docs/notes.txt", false)?,
    ];
    let handles = h.engine.recycle().trash(&items, &docs).await?;
    assert!(completed(&handles).await);

    assert_eq!(h.engine.recycle().empty().await?, 2);
    assert_eq!(h.device.children(RECYCLE_ROOT), vec![".RecycleIndex"]);
    assert_eq!(h.engine.recycle().empty().await?, 0);
    Ok(())
}

#[tokio::test]
async fn restoring_two_items_with_one_origin_conflicts() -> TestResult {
    let h = setup().await?;
    let docs = remote("/sd/docs", true)?;
    let report = remote("/sd/docs/report.txt", false)?;

    let handles = h.engine.recycle().trash(&[report.clone()], &docs).await?;
    assert!(completed(&handles).await);
    // Keep the two deletion stamps apart.
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.device.add_file("/sd/docs/report.txt", "second draft");
    let handles = h.engine.recycle().trash(&[report], &docs).await?;
    assert!(completed(&handles).await);

    let trashed = h.engine.recycle().trashed_entries().await?;
    assert_eq!(trashed.len(), 2);
    let submitted = h.engine.queue().all().len();

    let err = h
        .engine
        .recycle()
        .restore(&trashed)
        .await
        .expect_err("both items claim the same path");
    assert!(matches!(
        &err,
        RecycleError::RestoreConflict { path } if path == "/sd/docs/report.txt"
    ));
    assert_eq!(h.engine.queue().all().len(), submitted);
    assert!(!h.device.exists("/sd/docs/report.txt"));
    assert_eq!(h.device.children(RECYCLE_ROOT).len(), 2);
    Ok(())
}

#[tokio::test]
async fn trash_rejects_items_outside_the_current_directory() -> TestResult {
    let h = setup().await?;
    let err = h
        .engine
        .recycle()
        .trash(
            &[remote("/sd/docs/report.txt", false)?],
            &remote("/sd", true)?,
        )
        .await
        .expect_err("not listed in /sd");
    assert!(matches!(err, RecycleError::InvalidPath { .. }));
    assert!(h.device.exists("/sd/docs/report.txt"));
    assert!(h.engine.queue().all().is_empty());
    Ok(())
}

#[tokio::test]
async fn trash_refuses_names_too_long_for_the_device() -> TestResult {
    let h = setup().await?;
    let deep = format!("/sd{}", "/nested".repeat(30));
    let file = format!("{deep}/old.log");
    h.device.add_file(&file, "log");

    let err = h
        .engine
        .recycle()
        .trash(&[remote(&file, false)?], &remote(&deep, true)?)
        .await
        .expect_err("recycle name too long");
    assert!(matches!(err, RecycleError::InvalidPath { .. }));
    assert!(h.device.exists(&file));
    assert!(h.engine.queue().all().is_empty());
    Ok(())
}
