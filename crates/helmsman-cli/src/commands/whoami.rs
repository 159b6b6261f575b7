use helmsman_console::session::Session;

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliResult};
use crate::output::render_session;

pub(crate) async fn handle_whoami(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let info = Session::load(&ctx.console).await?;
    render_session(&info, format)
}
