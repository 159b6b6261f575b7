//! Shared HTTP client, error types and console context wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use helmsman_api_models::{ResourceId, ResourceKind};
use helmsman_console::{ApiError, ConsoleConfig, ConsoleContext, ConsoleError, HttpApiClient};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConsoleError> for CliError {
    fn from(error: ConsoleError) -> Self {
        match error {
            ConsoleError::Unauthorized(source) => Self::failure(
                anyhow::Error::new(source)
                    .context("not authorized (pass --token or set HELMSMAN_TOKEN)"),
            ),
            ConsoleError::Api(source) => classify_api_error(&source),
            ConsoleError::Query(source) => Self::validation(source.to_string()),
            ConsoleError::Config(source) => Self::validation(source.to_string()),
        }
    }
}

/// Map an API failure onto the validation/failure split.
///
/// Rejected input (400, 409, 422) is the caller's to fix; everything else is
/// operational.
pub(crate) fn classify_api_error(error: &ApiError) -> CliError {
    let message = error.messages().join("; ");
    match error.status {
        Some(400 | 409 | 422) => CliError::validation(message),
        Some(status) => CliError::failure(anyhow!("{message} (status {status})")),
        None => CliError::failure(anyhow::Error::new(error.clone())),
    }
}

/// Dependencies constructed from environment flags and CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
}

impl CliDependencies {
    /// Construct an HTTP client that tags every request with `trace_id`.
    pub(crate) fn from_env(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) console: ConsoleContext,
}

impl AppContext {
    /// Bind the shared HTTP client to the controller described by `config`.
    pub(crate) fn new(deps: &CliDependencies, config: ConsoleConfig) -> CliResult<Self> {
        let api = HttpApiClient::with_client(deps.client.clone(), &config)?;
        Ok(Self {
            console: ConsoleContext::new(Arc::new(api), config),
        })
    }
}

/// Parse and validate a URL argument.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Parse a resource collection name such as `credentials` or `job-templates`.
pub(crate) fn parse_resource(input: &str) -> Result<ResourceKind, String> {
    input.parse::<ResourceKind>().map_err(|err| err.to_string())
}

/// `KEY=VALUE` filter argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterArg {
    pub(crate) key: String,
    pub(crate) value: String,
}

/// Parse a `KEY=VALUE` filter.
pub(crate) fn parse_filter(input: &str) -> Result<FilterArg, String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("filter '{input}' must be KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("filter '{input}' is missing a key"));
    }
    Ok(FilterArg {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parent of a related collection, written `<resource>/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentArg {
    pub(crate) kind: ResourceKind,
    pub(crate) id: ResourceId,
}

/// Parse a `<resource>/<id>` parent reference.
pub(crate) fn parse_parent(input: &str) -> Result<ParentArg, String> {
    let (kind, id) = input
        .trim_matches('/')
        .split_once('/')
        .ok_or_else(|| format!("parent '{input}' must be RESOURCE/ID"))?;
    let kind = parse_resource(kind)?;
    let id = id
        .parse::<ResourceId>()
        .map_err(|err| format!("invalid parent id '{id}': {err}"))?;
    Ok(ParentArg { kind, id })
}

#[cfg(test)]
pub(crate) fn test_context(base_url: &str) -> AppContext {
    let config = ConsoleConfig::new(base_url.parse().expect("valid URL"));
    AppContext::new(
        &CliDependencies {
            client: Client::new(),
        },
        config,
    )
    .expect("context")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use clap::Parser;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn cli_error_helpers_map_exit_codes() {
        let validation = CliError::validation("bad input");
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(validation.display_message(), "bad input");

        let failure = CliError::failure(anyhow!("boom"));
        assert_eq!(failure.exit_code(), 3);
        assert_eq!(failure.display_message(), "boom");
        assert_eq!(failure.to_string(), "cli error");
    }

    #[test]
    fn conflicts_are_validation_errors() {
        let error = ApiError::status(
            "DELETE",
            "http://controller/api/v2/credentials/4/",
            409,
            Some(json!({"error": "Resource is being used by running jobs."})),
        );
        let cli_error = classify_api_error(&error);
        assert!(matches!(cli_error, CliError::Validation(_)));
        assert_eq!(
            cli_error.display_message(),
            "error: Resource is being used by running jobs."
        );
    }

    #[test]
    fn server_errors_are_failures_with_status() {
        let error = ApiError::status(
            "GET",
            "http://controller/api/v2/hosts/",
            503,
            Some(json!({"detail": "Service unavailable"})),
        );
        let cli_error = classify_api_error(&error);
        assert_eq!(cli_error.exit_code(), 3);
        assert_eq!(
            cli_error.display_message(),
            "Service unavailable (status 503)"
        );
    }

    #[test]
    fn unauthorized_points_at_token() {
        let error = ApiError::status("GET", "http://controller/api/v2/me/", 401, None);
        let cli_error = CliError::from(ConsoleError::from(error));
        assert_eq!(cli_error.exit_code(), 3);
        assert!(cli_error.display_message().contains("--token"));
    }

    #[test]
    fn parse_filter_requires_separator() {
        assert_eq!(
            parse_filter("name__icontains=web"),
            Ok(FilterArg {
                key: "name__icontains".to_string(),
                value: "web".to_string(),
            })
        );
        assert_eq!(
            parse_filter("kind=").map(|filter| filter.value),
            Ok(String::new())
        );
        assert!(parse_filter("name").is_err());
        assert!(parse_filter("=web").is_err());
    }

    #[test]
    fn parse_parent_reads_kind_and_id() {
        assert_eq!(
            parse_parent("inventory-sources/3"),
            Ok(ParentArg {
                kind: ResourceKind::InventorySources,
                id: 3,
            })
        );
        assert!(parse_parent("inventories").is_err());
        assert!(parse_parent("widgets/3").is_err());
        assert!(parse_parent("inventories/x").is_err());
    }

    #[test]
    fn parse_url_rejects_invalid_input() {
        let err = parse_url("not-a-url").expect_err("invalid URL should fail");
        assert!(err.contains("invalid URL"));
    }

    #[tokio::test]
    async fn requests_carry_trace_identifier() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/ping")
                .header(HEADER_REQUEST_ID, "trace-123");
            then.status(204);
        });

        let cli = Cli::try_parse_from(["helmsman", "--timeout", "5", "whoami"])?;
        let deps = CliDependencies::from_env(&cli, "trace-123")
            .map_err(|err| anyhow!(err.display_message()))?;
        deps.client.get(server.url("/ping")).send().await?;

        mock.assert();
        Ok(())
    }

    #[test]
    fn invalid_trace_identifier_is_rejected() -> Result<()> {
        let cli = Cli::try_parse_from(["helmsman", "whoami"])?;
        let result = CliDependencies::from_env(&cli, "bad\nid");
        assert!(matches!(result, Err(CliError::Failure(_))));
        Ok(())
    }

    #[test]
    fn invalid_config_is_a_validation_error() {
        let mut config = ConsoleConfig::new("http://controller.local".parse().expect("url"));
        config.default_page_size = 0;
        let result = AppContext::new(
            &CliDependencies {
                client: Client::new(),
            },
            config,
        );
        assert!(matches!(result, Err(CliError::Validation(_))));
    }
}
