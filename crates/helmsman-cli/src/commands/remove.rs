use helmsman_api_models::{Endpoint, ResourceId};
use helmsman_console::qs::{parse_query_string, update_query_string};
use helmsman_console::search::{SearchTerm, with_page_size, with_search};
use helmsman_console::{ConsoleError, ListScreen};
use tracing::{info, warn};

use crate::cli::{OutputFormat, RemoveArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{FailureView, RemovalReport, render_removal};

pub(crate) async fn handle_remove(
    ctx: &AppContext,
    args: RemoveArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut ids = args.ids.clone();
    ids.sort_unstable();
    ids.dedup();

    let mut screen = match args.from {
        Some(parent) => ListScreen::for_endpoint(
            ctx.console.clone(),
            args.resource,
            Endpoint::related(parent.kind, parent.id, args.resource.as_str()),
        )?,
        None => ListScreen::new(ctx.console.clone(), args.resource)?,
    };
    let search = selection_location(&screen, &ids)?;
    screen.navigate(search).await;
    if let Some(error) = screen.error() {
        return Err(ConsoleError::from(error).into());
    }

    let missing: Vec<ResourceId> = ids
        .iter()
        .copied()
        .filter(|id| !screen.selection().items().iter().any(|item| item.id == *id))
        .collect();
    if !missing.is_empty() {
        return Err(CliError::validation(format!(
            "{} not found: {}",
            args.resource,
            join_ids(&missing)
        )));
    }
    screen.selection_mut().select_all(true);

    let mut report = RemovalReport {
        resource: args.resource.to_string(),
        action: if args.from.is_some() {
            "disassociate"
        } else {
            "delete"
        },
        dry_run: !args.yes,
        requested: ids.clone(),
        ..RemovalReport::default()
    };

    if args.from.is_none() {
        let undeletable: Vec<ResourceId> = screen
            .undeletable_selected()
            .iter()
            .map(|item| item.id)
            .collect();
        if !undeletable.is_empty() {
            return Err(CliError::validation(format!(
                "not permitted to delete {}: {}",
                args.resource,
                join_ids(&undeletable)
            )));
        }
        match screen.delete_details().await {
            Ok(details) => {
                report.related = details
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect();
            }
            Err(error) => {
                warn!(kind = %args.resource, error = %error, "related resource lookup failed");
                report.related_error = Some(error.message);
            }
        }
    }

    if !args.yes {
        render_removal(&report, format)?;
        return Err(CliError::validation("refusing to proceed without --yes"));
    }

    let outcome = if args.from.is_some() {
        screen.disassociate_selected().await
    } else {
        screen.delete_selected().await
    };
    match outcome.result {
        Ok(succeeded) => {
            info!(kind = %args.resource, count = succeeded.len(), "removal complete");
            report.succeeded = succeeded;
            render_removal(&report, format)
        }
        Err(error) => {
            report.succeeded.clone_from(&error.succeeded);
            report.failed = error
                .failures
                .iter()
                .map(|failure| FailureView {
                    id: failure.id,
                    messages: failure.error.messages(),
                })
                .collect();
            render_removal(&report, format)?;
            Err(CliError::failure(error))
        }
    }
}

/// Location selecting exactly `ids` on one page.
fn selection_location(screen: &ListScreen, ids: &[ResourceId]) -> CliResult<String> {
    let config = screen.qs_config();
    let page_size = u32::try_from(ids.len())
        .map_err(|_| CliError::validation("too many identifiers in one removal"))?;
    let params = with_search(
        config,
        &parse_query_string(config, ""),
        &SearchTerm::new("id__in", join_values(ids)),
    );
    let params = with_page_size(config, &params, page_size);
    Ok(update_query_string(config, "", &params))
}

fn join_values(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn join_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
