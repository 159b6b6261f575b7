//! Error types shared by the console layer.

use serde_json::Value;
use thiserror::Error;

use crate::context::ConfigError;
use crate::qs::QsError;

/// Result alias for calls made through the REST seam.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result alias for session and list-screen operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Failure of a single API call.
///
/// The body is kept verbatim so callers can render the server's own wording;
/// [`ApiError::messages`] flattens it into display lines.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{method} {url} failed: {message}")]
pub struct ApiError {
    /// HTTP method of the failed request.
    pub method: String,
    /// Absolute URL of the failed request.
    pub url: String,
    /// Response status, absent for transport failures.
    pub status: Option<u16>,
    /// Decoded JSON error body, when the server sent one.
    pub body: Option<Value>,
    /// One-line summary.
    pub message: String,
}

impl ApiError {
    /// Failure before any response arrived (connect, timeout, TLS).
    #[must_use]
    pub fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status: None,
            body: None,
            message: message.into(),
        }
    }

    /// Non-success status, summarised from the body when possible.
    #[must_use]
    pub fn status(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: Option<Value>,
    ) -> Self {
        let mut error = Self {
            method: method.into(),
            url: url.into(),
            status: Some(status),
            body,
            message: String::new(),
        };
        error.message = error
            .body_messages()
            .into_iter()
            .next()
            .unwrap_or_else(|| format!("request failed with status {status}"));
        error
    }

    /// Response arrived but did not decode into the expected shape.
    #[must_use]
    pub fn decode(
        method: impl Into<String>,
        url: impl Into<String>,
        source: &serde_json::Error,
    ) -> Self {
        Self::transport(method, url, format!("malformed response: {source}"))
    }

    /// Whether the server rejected the caller's credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status, Some(401))
    }

    /// Whether the target no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status, Some(404))
    }

    /// Human-readable lines for an error-detail panel.
    ///
    /// A `detail` string yields one line; field error maps yield `field: message`
    /// lines; plain string arrays yield one line per entry. Without a usable body
    /// the summary message is returned.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        let lines = self.body_messages();
        if lines.is_empty() {
            vec![self.message.clone()]
        } else {
            lines
        }
    }

    fn body_messages(&self) -> Vec<String> {
        match &self.body {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => {
                if let Some(Value::String(detail)) = map.get("detail") {
                    return vec![detail.clone()];
                }
                map.iter()
                    .flat_map(|(field, value)| {
                        flatten_strings(value)
                            .into_iter()
                            .map(move |message| format!("{field}: {message}"))
                    })
                    .collect()
            }
            Some(other) => flatten_strings(other),
        }
    }
}

fn flatten_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(values) => values.iter().flat_map(flatten_strings).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Errors surfaced by sessions and list screens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsoleError {
    /// The server answered 401; the session must be re-established.
    #[error("session is not authorized: {0}")]
    Unauthorized(#[source] ApiError),
    /// Any other API failure.
    #[error(transparent)]
    Api(ApiError),
    /// A list screen was configured with an unusable query-string namespace.
    #[error(transparent)]
    Query(#[from] QsError),
    /// Console configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ApiError> for ConsoleError {
    fn from(error: ApiError) -> Self {
        if error.is_unauthorized() {
            Self::Unauthorized(error)
        } else {
            Self::Api(error)
        }
    }
}

impl ConsoleError {
    /// Display lines for the error-detail panel.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Unauthorized(error) | Self::Api(error) => error.messages(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_body_becomes_single_message() {
        let error = ApiError::status(
            "GET",
            "http://controller/api/v2/credentials/",
            403,
            Some(json!({"detail": "You do not have permission."})),
        );
        assert_eq!(error.message, "You do not have permission.");
        assert_eq!(error.messages(), vec!["You do not have permission."]);
        assert_eq!(
            error.to_string(),
            "GET http://controller/api/v2/credentials/ failed: You do not have permission."
        );
    }

    #[test]
    fn field_errors_are_prefixed_with_field() {
        let error = ApiError::status(
            "DELETE",
            "http://controller/api/v2/projects/4/",
            409,
            Some(json!({"error": ["Resource is being used"], "active_jobs": [{"type": "job", "id": 7}]})),
        );
        assert_eq!(
            error.messages(),
            vec![
                "active_jobs: {\"id\":7,\"type\":\"job\"}".to_string(),
                "error: Resource is being used".to_string(),
            ]
        );
    }

    #[test]
    fn empty_body_falls_back_to_status_summary() {
        let error = ApiError::status("DELETE", "http://controller/api/v2/hosts/1/", 500, None);
        assert_eq!(error.messages(), vec!["request failed with status 500"]);
        assert!(!error.is_unauthorized());
    }

    #[test]
    fn unauthorized_is_classified() {
        let error = ApiError::status("GET", "http://controller/api/v2/me/", 401, None);
        assert!(matches!(
            ConsoleError::from(error.clone()),
            ConsoleError::Unauthorized(inner) if inner == error
        ));
        let missing = ApiError::status("GET", "http://controller/api/v2/me/", 404, None);
        assert!(missing.is_not_found());
        assert!(matches!(ConsoleError::from(missing), ConsoleError::Api(_)));
    }
}
