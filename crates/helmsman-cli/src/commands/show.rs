use helmsman_console::ConsoleError;

use crate::cli::{OutputFormat, ShowArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_item;

pub(crate) async fn handle_show(
    ctx: &AppContext,
    args: ShowArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let item = ctx
        .console
        .api()
        .read(args.resource, args.id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                CliError::validation(format!("{} {} not found", args.resource, args.id))
            } else {
                CliError::from(ConsoleError::from(err))
            }
        })?;
    render_item(&item, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_context;
    use helmsman_api_models::ResourceKind;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn show_reads_detail_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v2/projects/8/");
            then.status(200).json_body(json!({
                "id": 8,
                "name": "playbooks",
                "scm_type": "git",
                "summary_fields": {"user_capabilities": {"delete": false}}
            }));
        });

        let ctx = test_context(&server.base_url());
        handle_show(
            &ctx,
            ShowArgs {
                resource: ResourceKind::Projects,
                id: 8,
            },
            OutputFormat::Table,
        )
        .await
        .expect("show succeeds");

        mock.assert();
    }

    #[tokio::test]
    async fn missing_resource_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/projects/9/");
            then.status(404).json_body(json!({"detail": "Not found."}));
        });

        let ctx = test_context(&server.base_url());
        let err = handle_show(
            &ctx,
            ShowArgs {
                resource: ResourceKind::Projects,
                id: 9,
            },
            OutputFormat::Json,
        )
        .await
        .expect_err("missing");

        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "projects 9 not found");
    }
}
