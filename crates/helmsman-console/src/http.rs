//! `reqwest` implementation of [`ResourceApi`].

use async_trait::async_trait;
use helmsman_api_models::{
    AssociationRequest, Endpoint, Item, ListResponse, OptionsResponse, ResourceId, ResourceKind,
};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::api::{ResourceApi, query_pairs};
use crate::context::ConsoleConfig;
use crate::error::{ApiError, ApiResult, ConsoleError};
use crate::qs::Params;

/// HTTP client for the controller REST API.
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpApiClient {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the TLS stack cannot start.
    pub fn new(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                ApiError::transport(
                    "INIT",
                    config.api_url.as_str(),
                    format!("failed to build HTTP client: {err}"),
                )
            })?;
        Self::with_client(client, config)
    }

    /// Wrap a pre-built client (custom headers, proxies).
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn with_client(client: Client, config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        config.validate()?;
        Ok(Self {
            client,
            base: config.api_base()?,
            token: config.token.clone(),
        })
    }

    /// Absolute URL of `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint path cannot be joined onto the base.
    pub fn url(&self, endpoint: &Endpoint) -> ApiResult<Url> {
        self.base.join(endpoint.path()).map_err(|err| {
            ApiError::transport("", endpoint.path(), format!("invalid endpoint: {err}"))
        })
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &Endpoint,
        params: Option<&Params>,
        body: Option<&Value>,
    ) -> ApiResult<(Url, Option<Value>)> {
        let url = self.url(endpoint)?;
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(params) = params {
            request = request.query(&query_pairs(params));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(%method, %url, "api request");
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::transport(method.as_str(), url.as_str(), err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::transport(method.as_str(), url.as_str(), err.to_string()))?;

        let decoded = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).trim().to_string())
            }))
        };

        if !status.is_success() {
            debug!(%method, %url, status = status.as_u16(), "api request failed");
            return Err(ApiError::status(
                method.as_str(),
                url.as_str(),
                status.as_u16(),
                decoded,
            ));
        }
        Ok((url, decoded))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        params: Option<&Params>,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let (url, decoded) = self
            .execute(method.clone(), endpoint, params, body)
            .await?;
        serde_json::from_value(decoded.unwrap_or(Value::Null))
            .map_err(|err| ApiError::decode(method.as_str(), url.as_str(), &err))
    }
}

#[async_trait]
impl ResourceApi for HttpApiClient {
    async fn list_at(&self, endpoint: &Endpoint, params: &Params) -> ApiResult<ListResponse<Item>> {
        self.json(Method::GET, endpoint, Some(params), None).await
    }

    async fn read(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<Item> {
        self.json(Method::GET, &Endpoint::detail(kind, id), None, None)
            .await
    }

    async fn read_options(&self, kind: ResourceKind) -> ApiResult<OptionsResponse> {
        self.json(Method::OPTIONS, &Endpoint::collection(kind), None, None)
            .await
    }

    async fn create(&self, kind: ResourceKind, body: &Value) -> ApiResult<Item> {
        self.json(Method::POST, &Endpoint::collection(kind), None, Some(body))
            .await
    }

    async fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> ApiResult<Item> {
        self.json(Method::PATCH, &Endpoint::detail(kind, id), None, Some(body))
            .await
    }

    async fn destroy(&self, kind: ResourceKind, id: ResourceId) -> ApiResult<()> {
        self.execute(Method::DELETE, &Endpoint::detail(kind, id), None, None)
            .await
            .map(|_| ())
    }

    async fn post_association(
        &self,
        endpoint: &Endpoint,
        request: &AssociationRequest,
    ) -> ApiResult<()> {
        let body = serde_json::to_value(request)
            .map_err(|err| ApiError::decode("POST", endpoint.path(), &err))?;
        self.execute(Method::POST, endpoint, None, Some(&body))
            .await
            .map(|_| ())
    }

    async fn fetch(&self, endpoint: &Endpoint, params: &Params) -> ApiResult<Value> {
        self.json(Method::GET, endpoint, Some(params), None).await
    }
}
