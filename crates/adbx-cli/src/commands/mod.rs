//! Command handlers grouped by concern.

pub(crate) mod devices;
pub(crate) mod files;
pub(crate) mod transfer;
pub(crate) mod trash;

use std::collections::HashMap;

use adbx_core::{CoreError, OperationId, OperationSnapshot, OperationStatus};
use adbx_events::{Event, EventId};
use adbx_fsops::FsOpsError;
use adbx_queue::{OperationHandle, QueueError};
use anyhow::anyhow;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::context::{AppContext, CliError, CliResult};
use crate::output::render_operations;

/// Event id to replay from when watching operations submitted after this call.
pub(crate) fn watch_point(ctx: &AppContext) -> EventId {
    ctx.engine.events().last_event_id().unwrap_or(0)
}

/// Wait for `handles`, showing transfer progress, then render the outcome.
///
/// Ctrl-C cancels everything still outstanding. Fails when any operation did
/// not complete.
pub(crate) async fn finish(
    ctx: &AppContext,
    handles: Vec<OperationHandle>,
    since: EventId,
) -> CliResult<()> {
    if handles.is_empty() {
        return Ok(());
    }
    let progress = (ctx.output == OutputFormat::Table).then(|| {
        let labels: HashMap<OperationId, String> = handles
            .iter()
            .map(|handle| {
                let snapshot = handle.snapshot();
                (snapshot.id, snapshot.source.full_name().to_string())
            })
            .collect();
        tokio::spawn(show_progress(ctx.engine.events().subscribe(Some(since)), labels))
    });

    let snapshots = tokio::select! {
        snapshots = wait_all(&handles) => snapshots,
        interrupt = tokio::signal::ctrl_c() => {
            match interrupt {
                Ok(()) => {
                    for handle in &handles {
                        handle.cancel();
                    }
                }
                Err(err) => warn!(error = %err, "interrupt handler unavailable"),
            }
            wait_all(&handles).await
        }
    };
    if let Some(progress) = progress {
        progress.abort();
    }

    render_operations(&snapshots, ctx.output)?;
    let unfinished = snapshots
        .iter()
        .filter(|snapshot| snapshot.state.status != OperationStatus::Completed)
        .count();
    if unfinished == 0 {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "{unfinished} of {} operations did not complete",
            snapshots.len()
        )))
    }
}

async fn wait_all(handles: &[OperationHandle]) -> Vec<OperationSnapshot> {
    let mut snapshots = Vec::with_capacity(handles.len());
    for handle in handles {
        snapshots.push(handle.wait().await);
    }
    snapshots
}

async fn show_progress(
    mut events: adbx_events::EventStream,
    labels: HashMap<OperationId, String>,
) {
    while let Some(envelope) = events.next().await {
        if let Event::OperationProgress {
            operation_id,
            progress,
        } = envelope.event
            && let Some(label) = labels.get(&operation_id)
        {
            eprintln!("{label}: {:>3.0}%", progress * 100.0);
        }
    }
}

/// Map a rejected submission onto the CLI's error split.
pub(crate) fn rejected(err: QueueError) -> CliError {
    match err {
        QueueError::InvalidPath {
            source: CoreError::InvalidPath { path, reason, .. },
        } => CliError::validation(format!("{path}: {reason}")),
        QueueError::InvalidPath { source } => CliError::validation(source.label()),
        other => CliError::failure(other),
    }
}

/// Remote failures carry the tool's own output.
pub(crate) fn remote_failure(err: &FsOpsError) -> CliError {
    CliError::failure(anyhow!(err.user_message()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use adbx_config::{EngineConfig, ProgressMethod};
    use adbx_test_support::FakeDevice;
    use tempfile::TempDir;

    use crate::cli::{
        Command, LsArgs, MoveArgs, OutputFormat, PathArgs, PathsArgs, RestoreArgs, TransferArgs,
        execute,
    };
    use crate::context::AppContext;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    struct Fixture {
        device: Arc<FakeDevice>,
        ctx: AppContext,
        scratch: TempDir,
    }

    async fn fixture() -> Result<Fixture, Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let device = Arc::new(FakeDevice::new("emulator-5554"));
        device.add_dir("/sd");
        let config = EngineConfig {
            progress_method: ProgressMethod::Estimate,
            progress_poll_ms: 5,
            recycle_root: "/sd/.trash".into(),
            helper_dir: scratch.path().join("helper"),
            ..EngineConfig::default()
        };
        let ctx = AppContext::with_runner(config, Arc::clone(&device) as _, None, OutputFormat::Json).await;
        Ok(Fixture {
            device,
            ctx,
            scratch,
        })
    }

    fn paths(paths: &[&str]) -> PathsArgs {
        PathsArgs {
            paths: paths.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn outdated_tool_is_refused() -> TestResult {
        let scratch = tempfile::tempdir()?;
        let device = Arc::new(FakeDevice::new("emulator-5554").with_tool_version(Some("1.0.39")));
        device.add_dir("/sd");
        let config = EngineConfig {
            progress_method: ProgressMethod::Estimate,
            helper_dir: scratch.path().join("helper"),
            ..EngineConfig::default()
        };
        let ctx = AppContext::with_runner(config, Arc::clone(&device) as _, None, OutputFormat::Json).await;

        let err = execute(&ctx, Command::Mkdir(paths(&["/sd/music"])))
            .await
            .expect_err("tool too old");
        assert!(
            err.display_message()
                .contains("version 1.0.39 is older than the required 1.0.41")
        );
        assert!(!device.exists("/sd/music"));
        Ok(())
    }

    #[tokio::test]
    async fn the_only_attached_device_is_selected() -> TestResult {
        let fixture = fixture().await?;
        let selected = fixture
            .ctx
            .device()
            .await
            .map_err(|err| err.display_message())?;
        assert_eq!(selected, "emulator-5554");
        execute(
            &fixture.ctx,
            Command::Ls(LsArgs {
                path: "/sd".into(),
                all: true,
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        Ok(())
    }

    #[tokio::test]
    async fn edits_reach_the_device() -> TestResult {
        let fixture = fixture().await?;
        let ctx = &fixture.ctx;
        execute(ctx, Command::Mkdir(paths(&["/sd/music/albums"])))
            .await
            .map_err(|err| err.display_message())?;
        execute(
            ctx,
            Command::Touch(PathArgs {
                path: "/sd/music/notes.txt".into(),
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert!(fixture.device.is_dir("/sd/music/albums"));
        assert!(fixture.device.exists("/sd/music/notes.txt"));

        execute(ctx, Command::Rm(paths(&["/sd/music/albums"])))
            .await
            .map_err(|err| err.display_message())?;
        assert!(!fixture.device.exists("/sd/music/albums"));
        Ok(())
    }

    #[tokio::test]
    async fn mv_targets_existing_folders_or_new_paths() -> TestResult {
        let fixture = fixture().await?;
        fixture.device.add_dir("/sd/dest");
        fixture.device.add_file("/sd/a.txt", "a");
        fixture.device.add_file("/sd/b.txt", "b");

        execute(
            &fixture.ctx,
            Command::Mv(MoveArgs {
                sources: vec!["/sd/a.txt".into()],
                destination: "/sd/dest".into(),
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert!(fixture.device.exists("/sd/dest/a.txt"));

        execute(
            &fixture.ctx,
            Command::Mv(MoveArgs {
                sources: vec!["/sd/b.txt".into()],
                destination: "/sd/c.txt".into(),
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(fixture.device.read("/sd/c.txt").as_deref(), Some("b"));
        Ok(())
    }

    #[tokio::test]
    async fn trashed_items_restore_by_original_path() -> TestResult {
        let fixture = fixture().await?;
        fixture.device.add_file("/sd/report.pdf", "pdf");

        execute(&fixture.ctx, Command::Trash(paths(&["/sd/report.pdf"])))
            .await
            .map_err(|err| err.display_message())?;
        assert!(!fixture.device.exists("/sd/report.pdf"));
        assert_eq!(fixture.device.children("/sd/.trash").len(), 1);

        execute(
            &fixture.ctx,
            Command::Restore(RestoreArgs {
                items: vec!["/sd/report.pdf".into()],
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(fixture.device.read("/sd/report.pdf").as_deref(), Some("pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn trash_from_two_folders_remembers_each_origin() -> TestResult {
        let fixture = fixture().await?;
        fixture.device.add_file("/sd/docs/a.txt", "a");
        fixture.device.add_file("/sd/music/b.mp3", "b");

        execute(
            &fixture.ctx,
            Command::Trash(paths(&["/sd/docs/a.txt", "/sd/music/b.mp3"])),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(fixture.device.children("/sd/.trash").len(), 2);

        execute(
            &fixture.ctx,
            Command::Restore(RestoreArgs {
                items: vec!["/sd/docs/a.txt".into(), "/sd/music/b.mp3".into()],
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(fixture.device.read("/sd/docs/a.txt").as_deref(), Some("a"));
        assert_eq!(fixture.device.read("/sd/music/b.mp3").as_deref(), Some("b"));
        Ok(())
    }

    #[tokio::test]
    async fn push_then_pull_round_trips_through_the_device() -> TestResult {
        let fixture = fixture().await?;
        let host_file = fixture.scratch.path().join("song.mp3");
        std::fs::write(&host_file, b"la la la")?;
        let pulled = fixture.scratch.path().join("pulled");

        execute(
            &fixture.ctx,
            Command::Push(TransferArgs {
                sources: vec![host_file.to_string_lossy().into_owned()],
                destination: "/sd".into(),
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(fixture.device.read("/sd/song.mp3").as_deref(), Some("la la la"));

        execute(
            &fixture.ctx,
            Command::Pull(TransferArgs {
                sources: vec!["/sd/song.mp3".into()],
                destination: pulled.to_string_lossy().into_owned(),
            }),
        )
        .await
        .map_err(|err| err.display_message())?;
        assert_eq!(std::fs::read(pulled.join("song.mp3"))?, b"la la la");
        Ok(())
    }

    #[tokio::test]
    async fn missing_paths_are_usage_errors_and_device_failures_are_not() -> TestResult {
        let fixture = fixture().await?;
        let Err(missing) = execute(&fixture.ctx, Command::Rm(paths(&["/sd/nope"]))).await else {
            return Err("removing a missing path succeeded".into());
        };
        assert_eq!(missing.exit_code(), 2);
        assert_eq!(missing.display_message(), "/sd/nope: no such file or directory");

        fixture
            .device
            .fail_when("mkdir", "mkdir: '/sd': Read-only file system");
        let Err(failed) = execute(&fixture.ctx, Command::Mkdir(paths(&["/sd/x"]))).await else {
            return Err("mkdir on a read-only device succeeded".into());
        };
        assert_eq!(failed.exit_code(), 3);
        Ok(())
    }
}
