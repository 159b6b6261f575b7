//! In-memory [`ResourceApi`] used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use helmsman_api_models::{
    AssociationRequest, Endpoint, Item, ListResponse, OptionsResponse, ResourceId, ResourceKind,
};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::api::ResourceApi;
use crate::error::{ApiError, ApiResult};
use crate::qs::{ParamValue, Params};

#[derive(Default)]
struct State {
    items: BTreeMap<String, Vec<Item>>,
    counts: HashMap<String, u64>,
    options: HashMap<ResourceKind, OptionsResponse>,
    json: HashMap<String, Value>,
    failing_ids: BTreeSet<ResourceId>,
    failing_endpoints: HashMap<String, u16>,
    list_failures: VecDeque<ApiError>,
    list_gates: VecDeque<oneshot::Receiver<()>>,
    destroy_gates: VecDeque<oneshot::Receiver<()>>,
    list_calls: Vec<(String, Params)>,
    destroyed: Vec<(ResourceKind, ResourceId)>,
    disassociated: Vec<(Endpoint, ResourceId)>,
}

/// Records calls and serves canned responses.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub(crate) fn with_items(kind: ResourceKind, ids: impl IntoIterator<Item = ResourceId>) -> Self {
        let api = Self::default();
        api.set_items(kind, ids.into_iter().map(named_item).collect());
        api
    }

    pub(crate) fn set_items(&self, kind: ResourceKind, items: Vec<Item>) {
        self.lock()
            .items
            .insert(Endpoint::collection(kind).path().to_string(), items);
    }

    pub(crate) fn set_count(&self, endpoint: &Endpoint, count: u64) {
        self.lock().counts.insert(endpoint.path().to_string(), count);
    }

    pub(crate) fn set_options(&self, kind: ResourceKind, options: OptionsResponse) {
        self.lock().options.insert(kind, options);
    }

    pub(crate) fn set_json(&self, endpoint: &Endpoint, value: Value) {
        self.lock().json.insert(endpoint.path().to_string(), value);
    }

    pub(crate) fn fail_on(&self, id: ResourceId) {
        self.lock().failing_ids.insert(id);
    }

    pub(crate) fn fail_endpoint(&self, endpoint: &Endpoint, status: u16) {
        self.lock()
            .failing_endpoints
            .insert(endpoint.path().to_string(), status);
    }

    pub(crate) fn fail_next_list(&self, error: ApiError) {
        self.lock().list_failures.push_back(error);
    }

    /// Hold the next list call until the returned sender fires or drops.
    pub(crate) fn gate_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().list_gates.push_back(rx);
        tx
    }

    /// Hold the next destroy call until the returned sender fires or drops.
    pub(crate) fn gate_next_destroy(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().destroy_gates.push_back(rx);
        tx
    }

    pub(crate) fn ids(&self, kind: ResourceKind) -> Vec<ResourceId> {
        self.lock()
            .items
            .get(Endpoint::collection(kind).path())
            .map(|items| items.iter().map(|item| item.id).collect())
            .unwrap_or_default()
    }

    pub(crate) fn list_calls(&self) -> Vec<(String, Params)> {
        self.lock().list_calls.clone()
    }

    pub(crate) fn destroyed(&self) -> Vec<(ResourceKind, ResourceId)> {
        self.lock().destroyed.clone()
    }

    pub(crate) fn disassociated(&self) -> Vec<(Endpoint, ResourceId)> {
        self.lock().disassociated.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn check_id(&self, method: &str, path: &str, id: ResourceId) -> ApiResult<()> {
        if self.lock().failing_ids.contains(&id) {
            return Err(ApiError::status(
                method,
                path,
                400,
                Some(serde_json::json!({"detail": format!("cannot process {id}")})),
            ));
        }
        Ok(())
    }

    fn check_endpoint(&self, method: &str, path: &str) -> ApiResult<()> {
        match self.lock().failing_endpoints.get(path) {
            Some(status) => Err(ApiError::status(method, path, *status, None)),
            None => Ok(()),
        }
    }
}

fn named_item(id: ResourceId) -> Item {
    let mut item = Item::with_id(id);
    item.name = Some(format!("item-{id}"));
    item
}

fn page_window(params: &Params, total: usize) -> (usize, usize) {
    let as_usize = |key: &str, fallback: usize| {
        params
            .get(key)
            .and_then(ParamValue::as_int)
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(fallback)
    };
    let size = as_usize("page_size", total.max(1));
    let page = as_usize("page", 1);
    let start = (page - 1).saturating_mul(size).min(total);
    (start, (start + size).min(total))
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn list_at(&self, endpoint: &Endpoint, params: &Params) -> ApiResult<ListResponse<Item>> {
        let gate = {
            let mut state = self.lock();
            state
                .list_calls
                .push((endpoint.path().to_string(), params.clone()));
            state.list_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check_endpoint("GET", endpoint.path())?;

        let mut state = self.lock();
        if let Some(error) = state.list_failures.pop_front() {
            return Err(error);
        }
        if let Some(count) = state.counts.get(endpoint.path()) {
            return Ok(ListResponse {
                count: *count,
                ..ListResponse::default()
            });
        }
        let items = state.items.entry(endpoint.path().to_string()).or_default();
        let filtered: Vec<Item> = match params.get("id__in") {
            Some(ids) => {
                let wanted: Vec<String> = ids
                    .scalars()
                    .flat_map(|scalar| {
                        scalar
                            .to_string()
                            .split(',')
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .collect();
                items
                    .iter()
                    .filter(|item| wanted.contains(&item.id.to_string()))
                    .cloned()
                    .collect()
            }
            None => items.clone(),
        };
        let (start, end) = page_window(params, filtered.len());
        Ok(ListResponse {
            count: filtered.len() as u64,
            next: None,
            previous: None,
            results: filtered[start..end].to_vec(),
        })
    }

    async fn read(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<Item> {
        let path = Endpoint::detail(kind, id);
        self.check_id("GET", path.path(), id)?;
        self.lock()
            .items
            .get(Endpoint::collection(kind).path())
            .and_then(|items| items.iter().find(|item| item.id == id).cloned())
            .ok_or_else(|| ApiError::status("GET", path.path(), 404, None))
    }

    async fn read_options(&self, kind: ResourceKind) -> ApiResult<OptionsResponse> {
        let endpoint = Endpoint::collection(kind);
        self.check_endpoint("OPTIONS", endpoint.path())?;
        Ok(self.lock().options.get(&kind).cloned().unwrap_or_default())
    }

    async fn create(&self, kind: ResourceKind, body: &Value) -> ApiResult<Item> {
        let mut state = self.lock();
        let items = state
            .items
            .entry(Endpoint::collection(kind).path().to_string())
            .or_default();
        let id = items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        let mut item = named_item(id);
        if let Some(name) = body.get("name").and_then(Value::as_str) {
            item.name = Some(name.to_string());
        }
        items.push(item.clone());
        Ok(item)
    }

    async fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> ApiResult<Item> {
        let path = Endpoint::detail(kind, id);
        self.check_id("PATCH", path.path(), id)?;
        let mut state = self.lock();
        let item = state
            .items
            .get_mut(Endpoint::collection(kind).path())
            .and_then(|items| items.iter_mut().find(|item| item.id == id))
            .ok_or_else(|| ApiError::status("PATCH", path.path(), 404, None))?;
        if let Some(name) = body.get("name").and_then(Value::as_str) {
            item.name = Some(name.to_string());
        }
        Ok(item.clone())
    }

    async fn destroy(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<()> {
        let gate = self.lock().destroy_gates.pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let path = Endpoint::detail(kind, id);
        self.check_id("DELETE", path.path(), id)?;
        let mut state = self.lock();
        if let Some(items) = state.items.get_mut(Endpoint::collection(kind).path()) {
            items.retain(|item| item.id != id);
        }
        state.destroyed.push((kind, id));
        Ok(())
    }

    async fn post_association(
        &self,
        endpoint: &Endpoint,
        request: &AssociationRequest,
    ) -> ApiResult<()> {
        self.check_id("POST", endpoint.path(), request.id)?;
        if request.disassociate {
            self.lock()
                .disassociated
                .push((endpoint.clone(), request.id));
        }
        Ok(())
    }

    async fn fetch(&self, endpoint: &Endpoint, _params: &Params) -> ApiResult<Value> {
        self.check_endpoint("GET", endpoint.path())?;
        self.lock()
            .json
            .get(endpoint.path())
            .cloned()
            .ok_or_else(|| ApiError::status("GET", endpoint.path(), 404, None))
    }
}
