//! Multi-item delete and disassociate with per-item failure reporting.

use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, join_all};
use helmsman_api_models::{Endpoint, Item, ResourceId, ResourceKind};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::ResourceApi;
use crate::error::ApiError;
use crate::qs::{PAGE, ParamValue, QsConfig, current_page, parse_query_string, update_query_string};
use crate::request::{RequestCoordinator, RequestState, Settlement};

/// Result of one item of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome<K> {
    /// Item the operation targeted.
    pub id: K,
    /// Failure, if the operation did not succeed.
    pub error: Option<ApiError>,
}

impl<K> ItemOutcome<K> {
    /// Whether the operation succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A failed item of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure<K> {
    /// Item the operation targeted.
    pub id: K,
    /// Why it failed.
    pub error: ApiError,
}

/// Aggregated batch failure naming every item that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionError<K> {
    /// Items that failed, in request order.
    pub failures: Vec<ItemFailure<K>>,
    /// Items that succeeded and were not rolled back.
    pub succeeded: Vec<K>,
}

impl<K> DeletionError<K> {
    /// Split outcomes into the succeeded keys or an aggregated error.
    ///
    /// # Errors
    ///
    /// Returns a [`DeletionError`] when at least one item failed.
    pub fn check(outcomes: Vec<ItemOutcome<K>>) -> Result<Vec<K>, Self> {
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.error {
                None => succeeded.push(outcome.id),
                Some(error) => failures.push(ItemFailure {
                    id: outcome.id,
                    error,
                }),
            }
        }
        if failures.is_empty() {
            Ok(succeeded)
        } else {
            Err(Self {
                failures,
                succeeded,
            })
        }
    }

    /// Keys of the failed items.
    pub fn failed_ids(&self) -> impl Iterator<Item = &K> {
        self.failures.iter().map(|failure| &failure.id)
    }
}

impl<K: Display> Display for DeletionError<K> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let total = self.failures.len() + self.succeeded.len();
        write!(
            formatter,
            "{} of {total} item(s) could not be processed:",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(formatter, " [{}] {};", failure.id, failure.error.message)?;
        }
        Ok(())
    }
}

impl<K: Debug + Display> std::error::Error for DeletionError<K> {}

/// Run `op` once per key concurrently; outcomes keep input order.
pub async fn fan_out<K, F, Fut>(keys: impl IntoIterator<Item = K>, op: F) -> Vec<ItemOutcome<K>>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<(), ApiError>>,
{
    join_all(keys.into_iter().map(|id| {
        let pending = op(id.clone());
        async move {
            ItemOutcome {
                id,
                error: pending.await.err(),
            }
        }
    }))
    .await
}

/// Delete every id of `kind`.
pub async fn delete_each(
    api: &dyn ResourceApi,
    kind: ResourceKind,
    ids: &[ResourceId],
) -> Vec<ItemOutcome<ResourceId>> {
    fan_out(ids.iter().copied(), |id| api.destroy(kind, id)).await
}

/// Detach every id from the related collection at `endpoint`.
pub async fn disassociate_each(
    api: &dyn ResourceApi,
    endpoint: &Endpoint,
    ids: &[ResourceId],
) -> Vec<ItemOutcome<ResourceId>> {
    fan_out(ids.iter().copied(), |id| api.disassociate(endpoint, id)).await
}

/// Selected rows the caller is not allowed to delete.
#[must_use]
pub fn undeletable(selected: &[Item]) -> Vec<&Item> {
    selected.iter().filter(|item| !item.can_delete()).collect()
}

/// List refetch callback run after a batch settles.
pub type FetchItems = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// What the list screen should do once a batch has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// The page was emptied; move to this search string (previous page).
    Navigate(String),
    /// `fetch_items` already ran.
    Refetched,
    /// A newer batch or a cancellation took over; nothing was done.
    Abandoned,
}

/// Outcome of [`DeleteItems::delete_items`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome<K> {
    /// Deleted keys, or the aggregated failure.
    pub result: Result<Vec<K>, DeletionError<K>>,
    /// Next step for the list screen.
    pub follow_up: FollowUp,
}

/// Drives a batch mutation and resynchronises the list afterwards.
///
/// Failures are recorded as the deletion error rather than returned up the
/// stack, and the list is refetched whether or not every item succeeded.
pub struct DeleteItems<K> {
    qs_config: QsConfig,
    fetch_items: FetchItems,
    coordinator: RequestCoordinator<Vec<K>, DeletionError<K>>,
}

impl<K> Clone for DeleteItems<K> {
    fn clone(&self) -> Self {
        Self {
            qs_config: self.qs_config.clone(),
            fetch_items: Arc::clone(&self.fetch_items),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<K> DeleteItems<K>
where
    K: Clone + Display + Send + Sync + 'static,
{
    /// Helper bound to a screen's query-string config and refetch callback.
    #[must_use]
    pub fn new(qs_config: QsConfig, fetch_items: FetchItems) -> Self {
        Self {
            qs_config,
            fetch_items,
            coordinator: RequestCoordinator::new(|| async { Ok(Vec::new()) }, Vec::new()),
        }
    }

    /// Run `delete` and decide how the list resynchronises.
    ///
    /// When every visible row was selected and the screen is past page 1, the
    /// follow-up points at the previous page; otherwise `fetch_items` runs.
    pub async fn delete_items<F>(
        &self,
        delete: F,
        all_items_selected: bool,
        search: &str,
    ) -> DeleteOutcome<K>
    where
        F: Future<Output = Vec<ItemOutcome<K>>>,
    {
        let settlement = self
            .coordinator
            .run(async move { DeletionError::check(delete.await) })
            .await;
        let state = self.coordinator.snapshot();
        let result = match (settlement, state.error) {
            (Settlement::Superseded, _) => {
                return DeleteOutcome {
                    result: Ok(Vec::new()),
                    follow_up: FollowUp::Abandoned,
                };
            }
            (Settlement::Failed, Some(error)) => {
                warn!(
                    failed = error.failures.len(),
                    succeeded = error.succeeded.len(),
                    "batch partially failed"
                );
                Err(error)
            }
            _ => {
                info!(deleted = state.result.len(), "batch completed");
                Ok(state.result)
            }
        };

        let params = parse_query_string(&self.qs_config, search);
        let page = current_page(&params);
        let follow_up = if all_items_selected && page > 1 {
            let mut previous = params;
            previous.insert(PAGE.to_string(), ParamValue::from(page - 1));
            FollowUp::Navigate(update_query_string(&self.qs_config, search, &previous))
        } else {
            (self.fetch_items)().await;
            FollowUp::Refetched
        };

        DeleteOutcome { result, follow_up }
    }

    /// Whether a batch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.coordinator.is_loading()
    }

    /// Failure of the last batch, if any.
    #[must_use]
    pub fn deletion_error(&self) -> Option<DeletionError<K>> {
        self.coordinator.error()
    }

    /// Dismiss the recorded failure.
    pub fn clear_deletion_error(&self) {
        self.coordinator.dismiss_error();
    }

    /// Abandon an in-flight batch.
    pub fn cancel(&self) {
        self.coordinator.cancel();
    }

    /// Watch batch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<Vec<K>, DeletionError<K>>> {
        self.coordinator.subscribe()
    }
}
