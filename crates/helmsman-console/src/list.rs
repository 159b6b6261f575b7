//! List screen controller: location, fetch, selection and batch mutation.
//!
//! ```text
//! Idle -> (navigate) -> Loading -> Ready
//!                               -> ErrorWithStaleData
//! Ready | ErrorWithStaleData -> (delete) -> Deleting -> Loading
//! ```

use std::sync::Arc;

use futures_util::future::BoxFuture;
use helmsman_api_models::{
    Endpoint, Item, ListResponse, OptionsResponse, ResourceId, ResourceKind,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::ResourceApi;
use crate::batch::{
    DeleteItems, DeleteOutcome, DeletionError, FetchItems, FollowUp, ItemOutcome, delete_each,
    disassociate_each, undeletable,
};
use crate::context::ConsoleContext;
use crate::delete_details::{RelatedResourceCount, delete_details_for};
use crate::error::{ApiError, ApiResult, ConsoleResult};
use crate::qs::{
    ORDER_BY, PAGE, PAGE_SIZE, ParamValue, Params, QsConfig, params, parse_query_string,
    update_query_string,
};
use crate::request::{RequestCoordinator, RequestState, Settlement};
use crate::search::{
    SearchTerm, SearchableKey, SortOrder, cleared, related_searchable_keys, searchable_keys,
    sorted_by, with_page, with_page_size, with_search, without_filter,
};
use crate::selection::Selection;

/// One fetched page together with the collection's OPTIONS schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListData {
    /// Rows of the current page.
    pub items: Vec<Item>,
    /// Total rows matching the query.
    pub count: u64,
    /// Schema and permissions of the collection.
    pub options: OptionsResponse,
}

/// Observable phase of a list screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    /// Nothing requested yet.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed; the previous page is still shown.
    ErrorWithStaleData,
    /// A batch mutation is in flight.
    Deleting,
}

impl ListPhase {
    /// Phase derived from the fetch state and whether a batch is running.
    ///
    /// Lets observers holding [`ListScreen::subscribe`] and
    /// [`ListScreen::subscribe_deletion`] follow the screen while a batch
    /// borrows it.
    #[must_use]
    pub const fn from_states(fetch: &RequestState<ListData, ApiError>, deleting: bool) -> Self {
        if deleting {
            Self::Deleting
        } else if fetch.is_loading {
            Self::Loading
        } else if fetch.error.is_some() {
            Self::ErrorWithStaleData
        } else if fetch.generation == 0 {
            Self::Idle
        } else {
            Self::Ready
        }
    }
}

/// Controller behind one paginated list.
pub struct ListScreen {
    ctx: ConsoleContext,
    kind: ResourceKind,
    endpoint: Endpoint,
    qs_config: QsConfig,
    location: Arc<watch::Sender<String>>,
    fetch: RequestCoordinator<ListData, ApiError>,
    deletion: DeleteItems<ResourceId>,
    selection: Selection<Item>,
}

impl ListScreen {
    /// Screen over the top-level collection of `kind`.
    ///
    /// # Errors
    ///
    /// Fails when the kind's namespace cannot build a query-string config.
    pub fn new(ctx: ConsoleContext, kind: ResourceKind) -> ConsoleResult<Self> {
        Self::for_endpoint(ctx, kind, Endpoint::collection(kind))
    }

    /// Screen over an arbitrary endpoint listing `kind` rows (e.g. a related
    /// sub-collection).
    ///
    /// # Errors
    ///
    /// Fails when the kind's namespace cannot build a query-string config.
    pub fn for_endpoint(
        ctx: ConsoleContext,
        kind: ResourceKind,
        endpoint: Endpoint,
    ) -> ConsoleResult<Self> {
        let qs_config = QsConfig::new(
            kind.qs_namespace(),
            params([
                (PAGE, ParamValue::from(1)),
                (
                    PAGE_SIZE,
                    ParamValue::from(i64::from(ctx.config().default_page_size)),
                ),
                (ORDER_BY, ParamValue::from(kind.default_order_by())),
            ]),
        )?;
        let (location, _) = watch::channel(String::new());
        let location = Arc::new(location);
        let fetch = RequestCoordinator::new(
            list_fetcher(ctx.api(), kind, endpoint.clone(), qs_config.clone(), Arc::clone(&location)),
            ListData::default(),
        );
        let refetch = fetch.clone();
        let fetch_items: FetchItems = Arc::new(move || {
            let refetch = refetch.clone();
            Box::pin(async move {
                refetch.request().await;
            })
        });
        let deletion = DeleteItems::new(qs_config.clone(), fetch_items);

        Ok(Self {
            ctx,
            kind,
            endpoint,
            qs_config,
            location,
            fetch,
            deletion,
            selection: Selection::default(),
        })
    }

    /// Resource kind listed.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Query-string config of this screen.
    #[must_use]
    pub const fn qs_config(&self) -> &QsConfig {
        &self.qs_config
    }

    /// Current location search string.
    #[must_use]
    pub fn location(&self) -> String {
        self.location.borrow().clone()
    }

    /// Watch location changes.
    #[must_use]
    pub fn subscribe_location(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }

    /// Params parsed from the current location.
    #[must_use]
    pub fn params(&self) -> Params {
        parse_query_string(&self.qs_config, &self.location())
    }

    /// Move to `search` and fetch.
    pub async fn navigate(&mut self, search: impl Into<String>) -> Settlement {
        let search = search.into();
        debug!(kind = %self.kind, %search, "list navigation");
        self.location.send_replace(search);
        self.fetch().await
    }

    /// Fetch the page the location points at.
    pub async fn fetch(&mut self) -> Settlement {
        let settlement = self.fetch.request().await;
        self.sync_items();
        settlement
    }

    /// Add a search term.
    pub async fn search(&mut self, term: &SearchTerm) -> Settlement {
        let next = with_search(&self.qs_config, &self.params(), term);
        self.push(&next).await
    }

    /// Remove one filter chip value.
    pub async fn remove_filter(&mut self, key: &str, value: &str) -> Settlement {
        let next = without_filter(&self.qs_config, &self.params(), key, value);
        self.push(&next).await
    }

    /// Return to the default filters.
    pub async fn clear_filters(&mut self) -> Settlement {
        let next = cleared(&self.qs_config);
        self.push(&next).await
    }

    /// Sort by `key`.
    pub async fn sort_by(&mut self, key: &str, order: SortOrder) -> Settlement {
        let next = sorted_by(&self.qs_config, &self.params(), key, order);
        self.push(&next).await
    }

    /// Jump to `page`.
    pub async fn set_page(&mut self, page: i64) -> Settlement {
        let next = with_page(&self.params(), page);
        self.push(&next).await
    }

    /// Change rows per page (back to page 1).
    pub async fn set_page_size(&mut self, page_size: u32) -> Settlement {
        let next = with_page_size(&self.qs_config, &self.params(), page_size);
        self.push(&next).await
    }

    async fn push(&mut self, next: &Params) -> Settlement {
        let search = update_query_string(&self.qs_config, &self.location(), next);
        self.navigate(search).await
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ListPhase {
        ListPhase::from_states(&self.fetch.snapshot(), self.deletion.is_loading())
    }

    /// Last fetched page (stale when the latest fetch failed).
    #[must_use]
    pub fn data(&self) -> ListData {
        self.fetch.result()
    }

    /// Error of the latest fetch.
    #[must_use]
    pub fn error(&self) -> Option<ApiError> {
        self.fetch.error()
    }

    /// Dismiss the fetch error.
    pub fn dismiss_error(&self) {
        self.fetch.dismiss_error();
    }

    /// Fetch state stream for renderers.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<ListData, ApiError>> {
        self.fetch.subscribe()
    }

    /// Batch state stream; `is_loading` is true while rows are being removed.
    #[must_use]
    pub fn subscribe_deletion(
        &self,
    ) -> watch::Receiver<RequestState<Vec<ResourceId>, DeletionError<ResourceId>>> {
        self.deletion.subscribe()
    }

    /// Shared handle to the fetch coordinator.
    #[must_use]
    pub fn requests(&self) -> RequestCoordinator<ListData, ApiError> {
        self.fetch.clone()
    }

    /// Whether the user may create rows here.
    #[must_use]
    pub fn can_add(&self) -> bool {
        self.fetch.snapshot().result.options.can_add()
    }

    /// Filterable fields advertised by the last OPTIONS response.
    #[must_use]
    pub fn searchable_keys(&self) -> Vec<SearchableKey> {
        searchable_keys(self.fetch.snapshot().result.options.actions.get.as_ref())
    }

    /// Related filter keys advertised by the last OPTIONS response.
    #[must_use]
    pub fn related_searchable_keys(&self) -> Vec<String> {
        related_searchable_keys(&self.fetch.snapshot().result.options.related_search_fields)
    }

    /// Row selection.
    #[must_use]
    pub const fn selection(&self) -> &Selection<Item> {
        &self.selection
    }

    /// Mutable row selection.
    pub const fn selection_mut(&mut self) -> &mut Selection<Item> {
        &mut self.selection
    }

    /// Selected rows the user may not delete.
    #[must_use]
    pub fn undeletable_selected(&self) -> Vec<&Item> {
        undeletable(self.selection.selected())
    }

    /// Related-resource counts for the pending delete.
    ///
    /// # Errors
    ///
    /// Propagates the first failing count request.
    pub async fn delete_details(&self) -> ApiResult<Option<Vec<RelatedResourceCount>>> {
        let api = self.ctx.api();
        delete_details_for(api.as_ref(), self.kind, &self.selection.selected_keys()).await
    }

    /// Delete every selected row and resynchronise.
    pub async fn delete_selected(&mut self) -> DeleteOutcome<ResourceId> {
        let api = self.ctx.api();
        let ids = self.selection.selected_keys();
        let kind = self.kind;
        self.run_batch(delete_each(api.as_ref(), kind, &ids)).await
    }

    /// Detach every selected row from this screen's endpoint and resynchronise.
    pub async fn disassociate_selected(&mut self) -> DeleteOutcome<ResourceId> {
        let api = self.ctx.api();
        let ids = self.selection.selected_keys();
        let endpoint = self.endpoint.clone();
        self.run_batch(disassociate_each(api.as_ref(), &endpoint, &ids))
            .await
    }

    async fn run_batch(
        &mut self,
        batch: impl Future<Output = Vec<ItemOutcome<ResourceId>>>,
    ) -> DeleteOutcome<ResourceId> {
        let all_items_selected = self.selection.is_all_selected();
        let search = self.location();
        let outcome = self
            .deletion
            .delete_items(batch, all_items_selected, &search)
            .await;
        match &outcome.follow_up {
            FollowUp::Navigate(previous) => {
                info!(kind = %self.kind, "page emptied, moving back");
                self.navigate(previous.clone()).await;
            }
            FollowUp::Refetched => self.sync_items(),
            FollowUp::Abandoned => {}
        }
        self.selection.clear_selected();
        outcome
    }

    /// Failure of the last batch.
    #[must_use]
    pub fn deletion_error(&self) -> Option<DeletionError<ResourceId>> {
        self.deletion.deletion_error()
    }

    /// Dismiss the batch failure.
    pub fn clear_deletion_error(&self) {
        self.deletion.clear_deletion_error();
    }

    fn sync_items(&mut self) {
        self.selection.set_items(self.fetch.result().items);
    }
}

impl Drop for ListScreen {
    fn drop(&mut self) {
        self.fetch.cancel();
        self.deletion.cancel();
    }
}

fn list_fetcher(
    api: Arc<dyn ResourceApi>,
    kind: ResourceKind,
    endpoint: Endpoint,
    qs_config: QsConfig,
    location: Arc<watch::Sender<String>>,
) -> impl Fn() -> BoxFuture<'static, ApiResult<ListData>> + Send + Sync + 'static {
    move || {
        let api = Arc::clone(&api);
        let endpoint = endpoint.clone();
        let query = parse_query_string(&qs_config, &location.borrow());
        Box::pin(async move {
            let (page, options): (ListResponse<Item>, OptionsResponse) = tokio::try_join!(
                api.list_at(&endpoint, &query),
                api.read_options(kind)
            )?;
            Ok(ListData {
                items: page.results,
                count: page.count,
                options,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConsoleConfig;
    use crate::search::LookupType;
    use crate::testing::FakeApi;
    use serde_json::json;

    fn screen(api: &Arc<FakeApi>, kind: ResourceKind) -> ListScreen {
        let ctx = ConsoleContext::new(
            Arc::clone(api) as Arc<dyn ResourceApi>,
            ConsoleConfig::new("http://controller.local".parse().unwrap()),
        );
        ListScreen::new(ctx, kind).unwrap()
    }

    #[tokio::test]
    async fn navigation_strips_namespace_before_transmission() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Credentials, 1..=3));
        let mut list = screen(&api, ResourceKind::Credentials);
        assert_eq!(list.phase(), ListPhase::Idle);

        let settlement = list.navigate("?credential.name__icontains=prod").await;

        assert_eq!(settlement, Settlement::Succeeded);
        assert_eq!(list.phase(), ListPhase::Ready);
        let (path, sent) = api.list_calls().pop().unwrap();
        assert_eq!(path, "credentials/");
        assert_eq!(
            sent,
            params([
                ("page", ParamValue::from(1)),
                ("page_size", ParamValue::from(20)),
                ("order_by", ParamValue::from("name")),
                ("name__icontains", ParamValue::from("prod")),
            ])
        );
    }

    #[tokio::test]
    async fn partial_delete_failure_still_refetches() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Credentials, 1..=5));
        api.fail_on(2);
        let mut list = screen(&api, ResourceKind::Credentials);
        list.fetch().await;
        assert_eq!(list.data().count, 5);

        let rows = list.data().items;
        list.selection_mut().handle_select(&rows[0]);
        list.selection_mut().handle_select(&rows[1]);
        let calls_before = api.list_calls().len();

        let outcome = list.delete_selected().await;

        let error = outcome.result.unwrap_err();
        assert_eq!(error.failed_ids().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(list.deletion_error(), Some(error));
        assert_eq!(api.destroyed(), vec![(ResourceKind::Credentials, 1)]);
        assert_eq!(api.list_calls().len(), calls_before + 1);
        assert_eq!(list.data().count, 4);
        assert!(list.selection().selected().is_empty());
        assert_eq!(list.phase(), ListPhase::Ready);
    }

    #[tokio::test]
    async fn batch_delete_moves_through_deleting_then_loading() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Credentials, 1..=3));
        let mut list = screen(&api, ResourceKind::Credentials);
        list.fetch().await;
        let rows = list.data().items;
        list.selection_mut().handle_select(&rows[0]);
        assert_eq!(list.phase(), ListPhase::Ready);

        let destroy_gate = api.gate_next_destroy();
        let list_gate = api.gate_next_list();
        let mut deletion = list.subscribe_deletion();
        let mut fetches = list.subscribe();
        let observer = async move {
            let deleting = deletion
                .wait_for(|state| state.is_loading)
                .await
                .map(|state| state.is_loading)
                .unwrap();
            let mut phases = vec![ListPhase::from_states(&fetches.borrow(), deleting)];
            destroy_gate.send(()).unwrap();

            let refetch = fetches
                .wait_for(|state| state.is_loading && state.generation == 2)
                .await
                .map(|state| (*state).clone())
                .unwrap();
            let deleting = deletion.borrow().is_loading;
            phases.push(ListPhase::from_states(&refetch, deleting));
            list_gate.send(()).unwrap();
            phases
        };

        let (outcome, phases) = tokio::join!(list.delete_selected(), observer);

        assert_eq!(outcome.result, Ok(vec![1]));
        assert_eq!(phases, vec![ListPhase::Deleting, ListPhase::Loading]);
        assert_eq!(list.phase(), ListPhase::Ready);
        assert_eq!(list.data().count, 2);
        assert_eq!(api.destroyed(), vec![(ResourceKind::Credentials, 1)]);
    }

    #[tokio::test]
    async fn deleting_whole_last_page_moves_back() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Hosts, 1..=3));
        let mut list = screen(&api, ResourceKind::Hosts);
        list.navigate("host.page=2&host.page_size=2").await;
        assert_eq!(list.data().items.len(), 1);

        list.selection_mut().select_all(true);
        let outcome = list.delete_selected().await;

        assert_eq!(outcome.result, Ok(vec![3]));
        assert_eq!(outcome.follow_up, FollowUp::Navigate("host.page_size=2".to_string()));
        assert_eq!(list.location(), "host.page_size=2");
        assert_eq!(list.data().items.len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_stale_rows() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Projects, 1..=2));
        let mut list = screen(&api, ResourceKind::Projects);
        list.fetch().await;
        let before = list.data();

        api.fail_next_list(ApiError::status("GET", "projects/", 500, None));
        let settlement = list.set_page(2).await;

        assert_eq!(settlement, Settlement::Failed);
        assert_eq!(list.phase(), ListPhase::ErrorWithStaleData);
        assert_eq!(list.data(), before);
        assert_eq!(list.error().and_then(|error| error.status), Some(500));

        list.dismiss_error();
        assert_eq!(list.phase(), ListPhase::Ready);
    }

    #[tokio::test]
    async fn toolbar_operations_rewrite_location() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Inventories, 1..=2));
        let mut list = screen(&api, ResourceKind::Inventories);
        list.navigate("?job.page=3&inventory.page=2").await;

        list.search(&SearchTerm::new("name", "web").lookup(LookupType::Icontains))
            .await;
        assert_eq!(list.location(), "job.page=3&inventory.name__icontains=web");

        list.sort_by("created", SortOrder::Descending).await;
        assert_eq!(
            list.location(),
            "job.page=3&inventory.name__icontains=web&inventory.order_by=-created"
        );

        list.set_page_size(50).await;
        list.remove_filter("name__icontains", "web").await;
        assert_eq!(
            list.location(),
            "job.page=3&inventory.order_by=-created&inventory.page_size=50"
        );

        list.clear_filters().await;
        assert_eq!(list.location(), "job.page=3");
    }

    #[tokio::test]
    async fn options_drive_add_and_search_keys() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Teams, [1]));
        api.set_options(
            ResourceKind::Teams,
            serde_json::from_value(json!({
                "actions": {"GET": {"name": {"type": "string", "filterable": true}}, "POST": {}},
                "related_search_fields": ["organization__search"]
            }))
            .unwrap(),
        );
        let mut list = screen(&api, ResourceKind::Teams);
        list.fetch().await;

        assert!(list.can_add());
        assert_eq!(list.searchable_keys()[0].key, "name");
        assert_eq!(list.related_searchable_keys(), vec!["organization".to_string()]);
    }

    #[tokio::test]
    async fn superseded_fetch_never_lands() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Users, 1..=4));
        let mut list = screen(&api, ResourceKind::Users);
        let gate = api.gate_next_list();

        let stale = list.requests();
        let slow = tokio::spawn(async move { stale.request().await });
        let mut watcher = list.subscribe();
        watcher.wait_for(|state| state.is_loading).await.unwrap();

        let settlement = list.navigate("user.page_size=1").await;
        let _ = gate.send(());

        assert_eq!(settlement, Settlement::Succeeded);
        assert_eq!(slow.await.unwrap(), Settlement::Superseded);
        assert_eq!(list.data().items.len(), 1);
    }

    #[tokio::test]
    async fn dropping_screen_cancels_in_flight_fetch() {
        let api = Arc::new(FakeApi::with_items(ResourceKind::Labels, 1..=2));
        let list = screen(&api, ResourceKind::Labels);
        let gate = api.gate_next_list();

        let requests = list.requests();
        let pending = requests.clone();
        let task = tokio::spawn(async move { pending.request().await });
        let mut watcher = requests.subscribe();
        watcher.wait_for(|state| state.is_loading).await.unwrap();

        drop(list);
        let _ = gate.send(());

        assert_eq!(task.await.unwrap(), Settlement::Superseded);
        assert!(!requests.is_loading());
        assert!(requests.result().items.is_empty());
    }

    #[tokio::test]
    async fn related_list_disassociates_selected_rows() {
        let api = Arc::new(FakeApi::default());
        let endpoint = Endpoint::related(ResourceKind::InventorySources, 9, "hosts");
        let ctx = ConsoleContext::new(
            Arc::clone(&api) as Arc<dyn ResourceApi>,
            ConsoleConfig::new("http://controller.local".parse().unwrap()),
        );
        let mut list = ListScreen::for_endpoint(ctx, ResourceKind::Hosts, endpoint.clone()).unwrap();
        list.selection_mut().set_selected(vec![Item::with_id(4)]);

        let outcome = list.disassociate_selected().await;

        assert_eq!(outcome.result, Ok(vec![4]));
        assert_eq!(api.disassociated(), vec![(endpoint, 4)]);
    }

    #[tokio::test]
    async fn undeletable_rows_are_reported() {
        let api = Arc::new(FakeApi::default());
        let mut list = screen(&api, ResourceKind::Credentials);
        let locked: Item = serde_json::from_value(json!({
            "id": 3,
            "summary_fields": {"user_capabilities": {"delete": false}}
        }))
        .unwrap();
        list.selection_mut().set_selected(vec![Item::with_id(1), locked]);

        let flagged: Vec<ResourceId> = list.undeletable_selected().iter().map(|item| item.id).collect();

        assert_eq!(flagged, vec![3]);
    }
}
