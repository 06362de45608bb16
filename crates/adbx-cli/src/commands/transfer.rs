//! `adbx push` and `adbx pull`.

use adbx_core::{BatchRequest, FsPath, OperationKind, OperationSource};

use crate::cli::TransferArgs;
use crate::commands::{finish, rejected, watch_point};
use crate::context::{AppContext, CliResult, host_directory, host_source};

pub(crate) async fn handle_push(ctx: &AppContext, args: TransferArgs) -> CliResult<()> {
    let sources = args
        .sources
        .iter()
        .map(|raw| host_source(raw).map(|(path, size)| OperationSource { path, size }))
        .collect::<CliResult<Vec<_>>>()?;
    let directory = ctx.remote(&args.destination, true).await?;
    transfer(ctx, OperationKind::Push, sources, directory).await
}

pub(crate) async fn handle_pull(ctx: &AppContext, args: TransferArgs) -> CliResult<()> {
    let mut sources = Vec::with_capacity(args.sources.len());
    for raw in &args.sources {
        sources.push(OperationSource::from(&ctx.stat(raw).await?));
    }
    let directory = host_directory(&args.destination)?;
    transfer(ctx, OperationKind::Pull, sources, directory).await
}

async fn transfer(
    ctx: &AppContext,
    kind: OperationKind,
    sources: Vec<OperationSource>,
    directory: FsPath,
) -> CliResult<()> {
    let since = watch_point(ctx);
    let handles = ctx
        .engine
        .queue()
        .submit_batch(BatchRequest {
            kind,
            sources,
            destination_dir: Some(directory),
            device_id: None,
        })
        .map_err(rejected)?;
    finish(ctx, handles, since).await
}
