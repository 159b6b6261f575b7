//! REST seam consumed by the list machinery.

use async_trait::async_trait;
use helmsman_api_models::{
    AssociationRequest, Endpoint, Item, ListResponse, Me, OptionsResponse, ResourceId,
    ResourceKind, ServerConfig,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::qs::{ParamValue, Params};

/// Per-resource client operations.
///
/// Implementations own transport, authentication and error decoding; callers
/// only see typed envelopes and [`ApiError`].
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// GET a paginated collection at `endpoint`.
    async fn list_at(&self, endpoint: &Endpoint, params: &Params) -> ApiResult<ListResponse<Item>>;

    /// GET a single resource.
    async fn read(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<Item>;

    /// OPTIONS on a collection.
    async fn read_options(&self, kind: ResourceKind) -> ApiResult<OptionsResponse>;

    /// POST a new resource.
    async fn create(&self, kind: ResourceKind, body: &Value) -> ApiResult<Item>;

    /// PATCH an existing resource.
    async fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> ApiResult<Item>;

    /// DELETE a resource.
    async fn destroy(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<()>;

    /// POST an association change to a related endpoint.
    async fn post_association(
        &self,
        endpoint: &Endpoint,
        request: &AssociationRequest,
    ) -> ApiResult<()>;

    /// GET arbitrary JSON.
    async fn fetch(&self, endpoint: &Endpoint, params: &Params) -> ApiResult<Value>;

    /// GET a resource collection.
    async fn list(&self, kind: ResourceKind, params: &Params) -> ApiResult<ListResponse<Item>> {
        self.list_at(&Endpoint::collection(kind), params).await
    }

    /// Attach `id` to the related collection at `endpoint`.
    async fn associate(&self, endpoint: &Endpoint, id: ResourceId) -> ApiResult<()> {
        self.post_association(
            endpoint,
            &AssociationRequest {
                id,
                disassociate: false,
            },
        )
        .await
    }

    /// Detach `id` from the related collection at `endpoint`.
    async fn disassociate(&self, endpoint: &Endpoint, id: ResourceId) -> ApiResult<()> {
        self.post_association(
            endpoint,
            &AssociationRequest {
                id,
                disassociate: true,
            },
        )
        .await
    }

    /// Server configuration (`config/`).
    async fn config(&self) -> ApiResult<ServerConfig> {
        let endpoint = Endpoint::named("config");
        let value = self.fetch(&endpoint, &Params::new()).await?;
        decode_value(&endpoint, value)
    }

    /// The authenticated user (`me/`).
    async fn me(&self) -> ApiResult<Me> {
        let endpoint = Endpoint::named("me");
        let value = self.fetch(&endpoint, &Params::new()).await?;
        let page: ListResponse<Me> = decode_value(&endpoint, value)?;
        page.results.into_iter().next().ok_or_else(|| {
            ApiError::transport("GET", endpoint.path(), "current user missing from response")
        })
    }
}

fn decode_value<T: DeserializeOwned>(endpoint: &Endpoint, value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|err| ApiError::decode("GET", endpoint.path(), &err))
}

/// Flatten params into wire query pairs.
///
/// Sequences repeat their key, which the server reads as OR-ed values; `__in`
/// lookups take a single comma-joined value instead.
#[must_use]
pub fn query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            ParamValue::One(scalar) => pairs.push((key.clone(), scalar.to_string())),
            ParamValue::Many(values) if values.is_empty() => {}
            ParamValue::Many(values) if key.ends_with("__in") => pairs.push((
                key.clone(),
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            )),
            ParamValue::Many(values) => {
                pairs.extend(
                    values
                        .iter()
                        .map(|scalar| (key.clone(), scalar.to_string())),
                );
            }
        }
    }
    pairs
}
