use helmsman_console::qs::{current_page, parse_query_string, update_query_string};
use helmsman_console::search::{
    SearchTerm, SortOrder, sorted_by, with_page, with_page_size, with_search,
};
use helmsman_console::{ConsoleError, ListScreen};
use tracing::warn;

use crate::cli::{ListArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::render_list;

pub(crate) async fn handle_list(
    ctx: &AppContext,
    args: ListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut screen = ListScreen::new(ctx.console.clone(), args.resource)?;
    let search = list_location(&screen, &args);
    screen.navigate(search).await;

    let data = screen.data();
    let page = current_page(&screen.params());
    match screen.error() {
        None => render_list(args.resource, &data, page, format),
        Some(error) => {
            if !data.items.is_empty() {
                warn!(kind = %args.resource, "showing stale rows after a failed fetch");
                render_list(args.resource, &data, page, format)?;
            }
            Err(ConsoleError::from(error).into())
        }
    }
}

/// Location string for the screen after applying the command-line edits in
/// toolbar order: filters, sort, page size, then page.
pub(crate) fn list_location(screen: &ListScreen, args: &ListArgs) -> String {
    let config = screen.qs_config();
    let base = args.query.clone().unwrap_or_default();
    let mut params = parse_query_string(config, &base);

    for filter in &args.filters {
        params = with_search(config, &params, &SearchTerm::new(&filter.key, &filter.value));
    }
    for filter in &args.excludes {
        params = with_search(
            config,
            &params,
            &SearchTerm::new(&filter.key, &filter.value).not(),
        );
    }
    if let Some(key) = &args.order_by {
        let order = if args.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        params = sorted_by(config, &params, key, order);
    }
    if let Some(page_size) = args.page_size {
        params = with_page_size(config, &params, page_size);
    }
    if let Some(page) = args.page {
        params = with_page(&params, page);
    }
    update_query_string(config, &base, &params)
}
