//! Recycle bin commands.

use adbx_core::{CoreError, FileEntry, FsPath};
use adbx_queue::RecycleError;
use anyhow::anyhow;

use crate::cli::{PathsArgs, RestoreArgs};
use crate::commands::{finish, rejected, watch_point};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{render_removed, render_trash};

/// Items are trashed per parent folder, which is recorded as their origin.
pub(crate) async fn handle_trash(ctx: &AppContext, args: PathsArgs) -> CliResult<()> {
    let mut groups: Vec<(FsPath, Vec<FsPath>)> = Vec::new();
    for raw in &args.paths {
        let item = ctx.stat(raw).await?.path().clone();
        let parent = item
            .parent()
            .map_err(|err| CliError::validation(format!("{}: {}", item.full_path(), err.label())))?;
        match groups.iter_mut().find(|(folder, _)| *folder == parent) {
            Some((_, items)) => items.push(item),
            None => groups.push((parent, vec![item])),
        }
    }

    let since = watch_point(ctx);
    let mut handles = Vec::new();
    for (folder, items) in &groups {
        match ctx.engine.recycle().trash(items, folder).await {
            Ok(submitted) => handles.extend(submitted),
            Err(err) => {
                finish(ctx, handles, since).await?;
                return Err(recycle_failure(err));
            }
        }
    }
    finish(ctx, handles, since).await
}

pub(crate) async fn handle_restore(ctx: &AppContext, args: RestoreArgs) -> CliResult<()> {
    ctx.device().await?;
    let trashed = ctx
        .engine
        .recycle()
        .trashed_entries()
        .await
        .map_err(recycle_failure)?;
    let selected = select_trashed(trashed, &args.items)?;
    if selected.is_empty() {
        return Ok(());
    }

    let since = watch_point(ctx);
    let handles = ctx
        .engine
        .recycle()
        .restore(&selected)
        .await
        .map_err(recycle_failure)?;
    finish(ctx, handles, since).await
}

pub(crate) async fn handle_trash_list(ctx: &AppContext) -> CliResult<()> {
    ctx.device().await?;
    let trashed = ctx
        .engine
        .recycle()
        .trashed_entries()
        .await
        .map_err(recycle_failure)?;
    render_trash(&trashed, ctx.output)
}

pub(crate) async fn handle_empty_trash(ctx: &AppContext) -> CliResult<()> {
    ctx.device().await?;
    let removed = ctx
        .engine
        .recycle()
        .empty()
        .await
        .map_err(recycle_failure)?;
    render_removed(removed, ctx.output)
}

/// Trashed entries matching `wanted` by trashed name or original path; all
/// of them when nothing is named.
fn select_trashed(trashed: Vec<FileEntry>, wanted: &[String]) -> CliResult<Vec<FileEntry>> {
    if wanted.is_empty() {
        return Ok(trashed);
    }
    let mut selected = Vec::with_capacity(wanted.len());
    for item in wanted {
        let found = trashed
            .iter()
            .find(|entry| {
                entry.path().full_name() == item
                    || original_path(entry).as_deref() == Some(item.as_str())
            })
            .ok_or_else(|| CliError::validation(format!("{item}: not in the recycle bin")))?;
        selected.push(found.clone());
    }
    Ok(selected)
}

fn original_path(entry: &FileEntry) -> Option<String> {
    entry
        .trash_origin()?
        .original_path(entry.path().is_directory())
        .ok()
        .map(|path| path.full_path().to_string())
}

fn recycle_failure(err: RecycleError) -> CliError {
    match err {
        RecycleError::RestoreConflict { path } => {
            CliError::validation(format!("{path}: already exists; not restored"))
        }
        RecycleError::InvalidPath {
            source: CoreError::InvalidPath { path, reason, .. },
        } => CliError::validation(format!("{path}: {reason}")),
        RecycleError::Queue { source } => rejected(source),
        other => CliError::failure(anyhow!(other.user_message())),
    }
}
