use helmsman_console::ConsoleError;
use helmsman_console::search::{can_add, related_searchable_keys, searchable_keys};

use crate::cli::{OptionsArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::{OptionsReport, render_options};

pub(crate) async fn handle_options(
    ctx: &AppContext,
    args: OptionsArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let options = ctx
        .console
        .api()
        .read_options(args.resource)
        .await
        .map_err(ConsoleError::from)?;

    let report = OptionsReport {
        resource: args.resource.to_string(),
        can_add: can_add(&options),
        searchable_keys: searchable_keys(options.actions.get.as_ref())
            .into_iter()
            .map(Into::into)
            .collect(),
        related_search_keys: related_searchable_keys(&options.related_search_fields),
    };
    render_options(&report, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_context;
    use helmsman_api_models::ResourceKind;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn options_reads_collection_schema() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(OPTIONS).path("/api/v2/inventories/");
            then.status(200).json_body(json!({
                "actions": {
                    "GET": {
                        "name": {"type": "string", "filterable": true},
                        "variables": {"type": "json", "filterable": false}
                    },
                    "POST": {}
                },
                "related_search_fields": ["hosts__search", "organization__search"]
            }));
        });

        let ctx = test_context(&server.base_url());
        handle_options(
            &ctx,
            OptionsArgs {
                resource: ResourceKind::Inventories,
            },
            OutputFormat::Table,
        )
        .await
        .expect("options succeeds");

        mock.assert();
    }

    #[tokio::test]
    async fn forbidden_options_is_a_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(OPTIONS).path("/api/v2/teams/");
            then.status(403)
                .json_body(json!({"detail": "You do not have permission."}));
        });

        let ctx = test_context(&server.base_url());
        let err = handle_options(
            &ctx,
            OptionsArgs {
                resource: ResourceKind::Teams,
            },
            OutputFormat::Json,
        )
        .await
        .expect_err("forbidden");

        assert_eq!(err.exit_code(), 3);
    }
}
