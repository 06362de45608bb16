//! Listing, reading, and administrative edits on the device.

use adbx_core::{
    BatchRequest, EntryType, OperationKind, OperationRequest, OperationSource, WritePayload,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{AppendArgs, LsArgs, MoveArgs, PathArgs, PathsArgs, RenameArgs};
use crate::commands::{finish, rejected, remote_failure, watch_point};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::render_entries;

pub(crate) async fn handle_ls(ctx: &AppContext, args: LsArgs) -> CliResult<()> {
    let directory = ctx.remote(&args.path, true).await?;
    let device = ctx.device().await?;
    let fsops = ctx.engine.fsops();
    let entries = fsops
        .list_dir(fsops.reserve(&device), &directory, &CancellationToken::new())
        .await
        .map_err(|err| remote_failure(&err))?;
    let shown: Vec<_> = entries
        .into_iter()
        .filter(|entry| args.all || !entry.is_hidden())
        .collect();
    render_entries(&shown, ctx.output)
}

pub(crate) async fn handle_cat(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let path = ctx.remote(&args.path, false).await?;
    let device = ctx.device().await?;
    let fsops = ctx.engine.fsops();
    let text = fsops
        .read_all_text(fsops.reserve(&device), &path, &CancellationToken::new())
        .await
        .map_err(|err| remote_failure(&err))?;
    print!("{text}");
    Ok(())
}

pub(crate) async fn handle_mkdir(ctx: &AppContext, args: PathsArgs) -> CliResult<()> {
    let mut requests = Vec::with_capacity(args.paths.len());
    for raw in &args.paths {
        requests.push(OperationRequest::make_dir(ctx.remote(raw, true).await?));
    }
    submit_all(ctx, requests).await
}

pub(crate) async fn handle_touch(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let path = ctx.remote(&args.path, false).await?;
    submit_all(ctx, vec![OperationRequest::write(path, WritePayload::Touch)]).await
}

pub(crate) async fn handle_append(ctx: &AppContext, args: AppendArgs) -> CliResult<()> {
    let path = ctx.remote(&args.path, false).await?;
    let payload = WritePayload::AppendLine { text: args.text };
    submit_all(ctx, vec![OperationRequest::write(path, payload)]).await
}

pub(crate) async fn handle_rm(ctx: &AppContext, args: PathsArgs) -> CliResult<()> {
    let mut requests = Vec::with_capacity(args.paths.len());
    for raw in &args.paths {
        let entry = ctx.stat(raw).await?;
        requests.push(OperationRequest::delete(&entry));
    }
    submit_all(ctx, requests).await
}

pub(crate) async fn handle_rename(ctx: &AppContext, args: RenameArgs) -> CliResult<()> {
    let entry = ctx.stat(&args.path).await?;
    let request = OperationRequest::rename(&entry, &args.new_name)
        .map_err(|err| CliError::validation(format!("{}: {}", args.new_name, err.label())))?;
    submit_all(ctx, vec![request]).await
}

/// `mv a b dir` moves into `dir`; `mv a b` moves into `b` when it is an
/// existing folder and to the path `b` otherwise.
pub(crate) async fn handle_mv(ctx: &AppContext, args: MoveArgs) -> CliResult<()> {
    let mut sources = Vec::with_capacity(args.sources.len());
    for raw in &args.sources {
        sources.push(OperationSource::from(&ctx.stat(raw).await?));
    }

    let into_directory = sources.len() > 1
        || ctx
            .stat(&args.destination)
            .await
            .is_ok_and(|entry| entry.entry_type() == EntryType::Folder);

    let since = watch_point(ctx);
    let handles = if into_directory {
        let directory = ctx.remote(&args.destination, true).await?;
        ctx.engine
            .queue()
            .submit_batch(BatchRequest {
                kind: OperationKind::Move,
                sources,
                destination_dir: Some(directory),
                device_id: None,
            })
            .map_err(rejected)?
    } else {
        let mut sources = sources;
        let Some(source) = sources.pop() else {
            return Ok(());
        };
        let destination = ctx
            .remote(&args.destination, source.path.is_directory())
            .await?;
        vec![
            ctx.engine
                .queue()
                .submit(OperationRequest::move_to(source, destination))
                .map_err(rejected)?,
        ]
    };
    finish(ctx, handles, since).await
}

async fn submit_all(ctx: &AppContext, requests: Vec<OperationRequest>) -> CliResult<()> {
    let since = watch_point(ctx);
    let handles = requests
        .into_iter()
        .map(|request| ctx.engine.queue().submit(request))
        .collect::<Result<Vec<_>, _>>()
        .map_err(rejected)?;
    finish(ctx, handles, since).await
}
