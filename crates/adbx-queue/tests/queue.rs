mod common;

use std::time::Duration;

use adbx_core::{
    BatchRequest, OperationKind, OperationRequest, OperationStatus, Relation, WritePayload,
};
use adbx_events::Event;
use adbx_queue::QueueError;
use adbx_test_support::{FakeTransferEngine, wait_until};
use common::{DEVICE, TestResult, adb_harness, harness, remote};

const PATIENCE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn single_slot_runs_transfers_one_at_a_time_in_order() -> TestResult {
    let h = harness(FakeTransferEngine::new(3, Duration::from_millis(10)), 1).await?;
    let queue = h.engine.queue();

    let mut handles = Vec::new();
    for name in ["a", "b", "c"] {
        let request = OperationRequest::pull(remote(&format!("/{name}"), false)?, h.host(name)?);
        handles.push(queue.submit(request)?);
    }
    for handle in &handles {
        assert_eq!(handle.wait().await.state.status, OperationStatus::Completed);
    }

    assert_eq!(h.transfers().max_running(), 1);
    assert_eq!(h.transfers().started(), vec!["/a", "/b", "/c"]);
    assert_eq!(queue.completed_operations().len(), 3);
    assert_eq!(queue.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn transfer_slots_cap_concurrency() -> TestResult {
    let h = harness(FakeTransferEngine::new(4, Duration::from_millis(15)), 2).await?;
    let queue = h.engine.queue();

    let mut handles = Vec::new();
    for index in 0..5 {
        let request =
            OperationRequest::pull(remote(&format!("/sd/file-{index}"), false)?, h.host(&format!("out-{index}"))?);
        handles.push(queue.submit(request)?);
    }
    for handle in &handles {
        assert_eq!(handle.wait().await.state.status, OperationStatus::Completed);
    }
    assert_eq!(h.transfers().max_running(), 2);
    Ok(())
}

#[tokio::test]
async fn admin_work_skips_the_transfer_wait_list() -> TestResult {
    let h = harness(FakeTransferEngine::new(50, Duration::from_millis(20)), 1).await?;
    let queue = h.engine.queue();

    let running = queue.submit(OperationRequest::pull(remote("/sd/big.bin", false)?, h.host("big.bin")?))?;
    let waiting = queue.submit(OperationRequest::pull(remote("/sd/next.bin", false)?, h.host("next.bin")?))?;
    let mkdir = queue.submit(OperationRequest::make_dir(remote("/sd/fresh", true)?))?;
    assert_eq!(mkdir.wait().await.state.status, OperationStatus::Completed);
    assert_eq!(waiting.snapshot().state.status, OperationStatus::Waiting);
    assert_eq!(queue.pending_count(), 1);

    assert!(waiting.cancel());
    assert!(running.cancel());
    assert_eq!(running.wait().await.state.status, OperationStatus::Canceled);
    Ok(())
}

#[tokio::test]
async fn delete_during_pull_of_a_child_finishes_both() -> TestResult {
    let h = harness(FakeTransferEngine::new(5, Duration::from_millis(10)), 1).await?;
    h.device.add_file("/sd/a/b.txt", "payload");
    let queue = h.engine.queue();

    let pull = queue.submit(OperationRequest::pull(remote("/sd/a/b.txt", false)?, h.host("b.txt")?))?;
    let delete = queue.submit(OperationRequest::delete(remote("/sd/a", true)?))?;

    assert!(pull.wait().await.state.status.is_terminal());
    assert_eq!(delete.wait().await.state.status, OperationStatus::Completed);
    assert!(!h.device.exists("/sd/a"));
    Ok(())
}

#[tokio::test]
async fn delete_waits_for_a_running_pull_on_the_device_gate() -> TestResult {
    let h = adb_harness(Duration::from_millis(100), 1).await?;
    h.device.add_file("/sd/a/b.txt", "payload");
    let queue = h.engine.queue();

    let pull = queue.submit(OperationRequest::pull(remote("/sd/a/b.txt", false)?, h.host("b.txt")?))?;
    assert!(
        wait_until(PATIENCE, || h
            .device
            .commands()
            .iter()
            .any(|command| command.contains(" pull /sd/a/b.txt ")))
        .await
    );
    let delete = queue.submit(OperationRequest::delete(remote("/sd/a", true)?))?;
    assert_eq!(delete.snapshot().state.status, OperationStatus::Waiting);

    assert_eq!(pull.wait().await.state.status, OperationStatus::Completed);
    assert_eq!(delete.wait().await.state.status, OperationStatus::Completed);
    assert_eq!(std::fs::read_to_string(h.scratch.path().join("b.txt"))?, "payload");
    assert!(!h.device.exists("/sd/a"));

    let commands = h.device.commands();
    let pulled = commands.iter().position(|command| command.contains(" pull "));
    let removed = commands.iter().position(|command| command.contains("shell rm "));
    assert!(pulled.is_some() && removed.is_some() && pulled < removed, "{commands:?}");
    Ok(())
}

#[tokio::test]
async fn admin_work_stays_waiting_until_the_device_is_free() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    let queue = h.engine.queue();
    let held = h.engine.fsops().reserve(DEVICE).acquire().await;

    let mkdir = queue.submit(OperationRequest::make_dir(remote("/sd/photos", true)?))?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mkdir.snapshot().state.status, OperationStatus::Waiting);
    assert_eq!(queue.pending_count(), 1);
    assert!(queue.active_operations().is_empty());
    assert!(!h.device.exists("/sd/photos"));

    drop(held);
    assert_eq!(mkdir.wait().await.state.status, OperationStatus::Completed);
    assert!(h.device.is_dir("/sd/photos"));
    Ok(())
}

#[tokio::test]
async fn bulk_cancel_leaves_the_queue_open() -> TestResult {
    let h = harness(FakeTransferEngine::new(200, Duration::from_millis(20)), 1).await?;
    let queue = h.engine.queue();

    let running = queue.submit(OperationRequest::pull(remote("/sd/one", false)?, h.host("one")?))?;
    let waiting = queue.submit(OperationRequest::pull(remote("/sd/two", false)?, h.host("two")?))?;
    assert!(wait_until(PATIENCE, || h.transfers().running() == 1).await);
    let held = h.engine.fsops().reserve(DEVICE).acquire().await;
    let gated = queue.submit(OperationRequest::make_dir(remote("/sd/later", true)?))?;

    assert_eq!(queue.cancel_pending(), 2);
    assert_eq!(waiting.wait().await.state.status, OperationStatus::Canceled);
    assert_eq!(gated.wait().await.state.status, OperationStatus::Canceled);
    assert_eq!(running.snapshot().state.status, OperationStatus::Running);
    drop(held);
    assert!(!h.device.exists("/sd/later"));

    assert_eq!(queue.cancel_all(), 1);
    assert_eq!(running.wait().await.state.status, OperationStatus::Canceled);
    assert_eq!(queue.cancel_all(), 0);

    let after = queue.submit(OperationRequest::make_dir(remote("/sd/after", true)?))?;
    assert_eq!(after.wait().await.state.status, OperationStatus::Completed);
    assert_eq!(h.transfers().started(), vec!["/sd/one"]);
    Ok(())
}

#[tokio::test]
async fn moving_a_folder_into_itself_never_reaches_the_device() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    h.device.add_dir("/sd/folder/sub");

    let request = OperationRequest::move_to(
        remote("/sd/folder", true)?,
        remote("/sd/folder/sub/folder", true)?,
    );
    let err = h.engine.queue().submit(request).expect_err("move into itself");
    assert!(matches!(err, QueueError::InvalidPath { .. }));
    assert!(h.device.commands().iter().all(|command| !command.contains(" mv ")));
    assert!(h.engine.queue().all().is_empty());
    Ok(())
}

#[tokio::test]
async fn make_dir_twice_succeeds() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    let queue = h.engine.queue();
    for _ in 0..2 {
        let handle = queue.submit(OperationRequest::make_dir(remote("/sd/photos/2026", true)?))?;
        assert_eq!(handle.wait().await.state.status, OperationStatus::Completed);
    }
    assert!(h.device.is_dir("/sd/photos/2026"));
    Ok(())
}

#[tokio::test]
async fn writes_touch_and_append() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    let queue = h.engine.queue();
    let notes = remote("/sd/notes.txt", false)?;

    let touch = queue.submit(OperationRequest::write(notes.clone(), WritePayload::Touch))?;
    assert_eq!(touch.wait().await.state.status, OperationStatus::Completed);
    let append = queue.submit(OperationRequest::write(
        notes,
        WritePayload::AppendLine {
            text: "it's done".into(),
        },
    ))?;
    assert_eq!(append.wait().await.state.status, OperationStatus::Completed);
    assert_eq!(h.device.read("/sd/notes.txt").as_deref(), Some("it's done\n"));
    Ok(())
}

#[tokio::test]
async fn canceling_waiting_and_running_transfers() -> TestResult {
    let h = harness(FakeTransferEngine::new(200, Duration::from_millis(20)), 1).await?;
    let queue = h.engine.queue();

    let running = queue.submit(OperationRequest::pull(remote("/sd/one", false)?, h.host("one")?))?;
    let waiting = queue.submit(OperationRequest::pull(remote("/sd/two", false)?, h.host("two")?))?;
    assert!(wait_until(PATIENCE, || h.transfers().running() == 1).await);

    assert!(waiting.cancel());
    assert_eq!(waiting.snapshot().state.status, OperationStatus::Canceled);
    assert!(!waiting.cancel());

    assert!(queue.cancel(running.id()));
    let snapshot = running.wait().await;
    assert_eq!(snapshot.state.status, OperationStatus::Canceled);
    assert!(snapshot.state.error.is_none());

    assert_eq!(h.transfers().started(), vec!["/sd/one"]);
    assert!(wait_until(PATIENCE, || h.transfers().running() == 0).await);
    Ok(())
}

#[tokio::test]
async fn failures_carry_the_tool_output() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    let stderr = "adb: error: failed to stat remote object '/sd/bad': No such file or directory";
    h.transfers().fail_source("/sd/bad", 1, stderr);
    h.device.fail_when("mkdir -p '/sd/ro'", "mkdir: '/sd/ro': Read-only file system");
    let queue = h.engine.queue();

    let pull = queue.submit(OperationRequest::pull(remote("/sd/bad", false)?, h.host("bad")?))?;
    let snapshot = pull.wait().await;
    assert_eq!(snapshot.state.status, OperationStatus::Failed);
    assert_eq!(snapshot.state.error.as_deref(), Some(stderr));

    let mkdir = queue.submit(OperationRequest::make_dir(remote("/sd/ro", true)?))?;
    let snapshot = mkdir.wait().await;
    assert_eq!(snapshot.state.status, OperationStatus::Failed);
    assert_eq!(
        snapshot.state.error.as_deref(),
        Some("mkdir: '/sd/ro': Read-only file system")
    );

    let events = h.events().await;
    assert!(events.iter().any(|event| matches!(
        event,
        Event::OperationFailed { message, .. } if message == stderr
    )));
    Ok(())
}

#[tokio::test]
async fn finished_operations_notify_the_listing() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    let docs = remote("/sd/docs", true)?;
    h.device.add_dir("/sd/docs");
    h.listing.show(docs.clone());
    let queue = h.engine.queue();

    let created = remote("/sd/docs/new", true)?;
    let mkdir = queue.submit(OperationRequest::make_dir(created.clone()))?;
    mkdir.wait().await;
    let elsewhere = queue.submit(OperationRequest::make_dir(remote("/sd/music", true)?))?;
    elsewhere.wait().await;

    let notifications = h.listing.notifications();
    assert_eq!(notifications[0], (created, Relation::Descendant));
    assert_eq!(notifications[1].1, Relation::Unrelated);

    let events = h.events().await;
    assert!(events.iter().any(|event| matches!(
        event,
        Event::PathAffected { path, relation: Relation::Descendant, .. } if path == "/sd/docs/new"
    )));
    Ok(())
}

#[tokio::test]
async fn batch_items_fail_independently() -> TestResult {
    let h = harness(FakeTransferEngine::new(1, Duration::ZERO), 1).await?;
    h.device.add_file("/sd/x.txt", "x");
    h.device.add_dir("/sd/dest");

    let handles = h.engine.queue().submit_batch(BatchRequest {
        kind: OperationKind::Move,
        sources: vec![
            remote("/sd/x.txt", false)?.into(),
            remote("/sd/missing.txt", false)?.into(),
        ],
        destination_dir: Some(remote("/sd/dest", true)?),
        device_id: None,
    })?;
    assert_eq!(handles.len(), 2);

    let moved = handles[0].wait().await;
    let missing = handles[1].wait().await;
    assert_eq!(moved.state.status, OperationStatus::Completed);
    assert_eq!(missing.state.status, OperationStatus::Failed);
    assert_eq!(
        missing.state.error.as_deref(),
        Some("mv: bad '/sd/missing.txt': No such file or directory")
    );
    assert!(h.device.exists("/sd/dest/x.txt"));
    Ok(())
}

#[tokio::test]
async fn side_channel_progress_reaches_observers() -> TestResult {
    let h = harness(FakeTransferEngine::new(4, Duration::from_millis(40)), 1).await?;
    let pull = h
        .engine
        .queue()
        .submit(OperationRequest::pull(remote("/sd/video.mp4", false)?, h.host("video.mp4")?))?;
    let snapshot = pull.wait().await;
    assert_eq!(snapshot.state.status, OperationStatus::Completed);
    assert!((snapshot.state.progress - 1.0).abs() < f64::EPSILON);

    let events = h.events().await;
    let progress: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            Event::OperationProgress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(matches!(events.first(), Some(Event::OperationQueued { .. })));
    assert!(matches!(events.last(), Some(Event::OperationCompleted { .. } | Event::PathAffected { .. })));

    let leftovers = std::fs::read_dir(h.scratch.path().join("helper"))?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("progress-"))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_outstanding_work_and_rejects_new_work() -> TestResult {
    let h = harness(FakeTransferEngine::new(200, Duration::from_millis(20)), 1).await?;
    let queue = h.engine.queue();
    let first = queue.submit(OperationRequest::pull(remote("/sd/one", false)?, h.host("one")?))?;
    let second = queue.submit(OperationRequest::pull(remote("/sd/two", false)?, h.host("two")?))?;

    h.engine.shutdown().await;
    assert_eq!(first.snapshot().state.status, OperationStatus::Canceled);
    assert_eq!(second.snapshot().state.status, OperationStatus::Canceled);

    let late = queue.submit(OperationRequest::make_dir(remote("/sd/late", true)?));
    assert!(matches!(late, Err(QueueError::Closed)));
    assert_eq!(queue.clear_completed(), 2);
    assert!(queue.all().is_empty());
    Ok(())
}
