//! `adbx devices`.

use crate::context::{AppContext, CliError, CliResult};
use crate::output::render_devices;

pub(crate) async fn handle_devices(ctx: &AppContext) -> CliResult<()> {
    let devices = ctx
        .engine
        .executor()
        .list_devices()
        .await
        .map_err(CliError::failure)?;
    render_devices(&devices, ctx.output)
}
