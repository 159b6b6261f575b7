//! Query-string codec binding list state to the location search string.
//!
//! # Design
//! - Every key a list screen writes is namespaced (`credential.page`) so several
//!   lists can share one search string; keys are handled as [`QsKey`] values
//!   rather than by string surgery.
//! - Parsing ignores foreign namespaces and overlays the parsed values on the
//!   screen's defaults; encoding omits anything equal to a default.
//! - Sequences travel comma-joined. Literal commas inside a scalar are
//!   percent-encoded, so the split happens before decoding and never tears a value.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Fields parsed as integers unless a config overrides the set.
pub const DEFAULT_INTEGER_FIELDS: [&str; 2] = ["page", "page_size"];

/// Key carrying the 1-based page number.
pub const PAGE: &str = "page";
/// Key carrying the page size.
pub const PAGE_SIZE: &str = "page_size";
/// Key carrying the sort field (`-` prefix for descending).
pub const ORDER_BY: &str = "order_by";

/// Errors raised while building a [`QsConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QsError {
    /// No namespace was supplied.
    #[error("a query-string namespace is required")]
    MissingNamespace,
    /// The namespace contains the key separator.
    #[error("query-string namespace '{namespace}' must not contain '.'")]
    InvalidNamespace {
        /// Rejected namespace.
        namespace: String,
    },
}

/// A single query-string value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Value of a declared integer field that parsed cleanly.
    Int(i64),
    /// Any other value, kept verbatim.
    Text(String),
}

impl Display for Scalar {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Text(value) => formatter.write_str(value),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Value of a parsed key: a scalar, or an ordered sequence for repeated or
/// comma-joined values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Single value.
    One(Scalar),
    /// Ordered sequence of values.
    Many(Vec<Scalar>),
}

impl ParamValue {
    /// Collapse a decoded list of parts: one part is a scalar, more is a sequence.
    #[must_use]
    pub fn from_parts(mut parts: Vec<Scalar>) -> Self {
        if parts.len() == 1 {
            Self::One(parts.remove(0))
        } else {
            Self::Many(parts)
        }
    }

    /// Iterate over the contained scalars.
    pub fn scalars(&self) -> impl Iterator<Item = &Scalar> {
        let slice: &[Scalar] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        slice.iter()
    }

    /// Whether there is nothing to encode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(values) if values.is_empty())
    }

    /// Integer view of a scalar value; numeric text is accepted too.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::One(Scalar::Int(value)) => Some(*value),
            Self::One(Scalar::Text(value)) => value.trim().parse().ok(),
            Self::Many(_) => None,
        }
    }

    /// Text view of a scalar value.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::One(Scalar::Text(value)) => Some(Cow::Borrowed(value)),
            Self::One(Scalar::Int(value)) => Some(Cow::Owned(value.to_string())),
            Self::Many(_) => None,
        }
    }

    fn into_scalars(self) -> Vec<Scalar> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }

    /// Percent-encoded location form of the value.
    fn encode(&self) -> String {
        self.scalars()
            .map(|scalar| urlencoding::encode(&scalar.to_string()).into_owned())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::One(Scalar::Int(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::One(Scalar::from(value))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::One(Scalar::Text(value))
    }
}

impl From<Vec<Scalar>> for ParamValue {
    fn from(values: Vec<Scalar>) -> Self {
        Self::Many(values)
    }
}

/// Parsed filter/sort/page state keyed by un-namespaced field name.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a [`Params`] map from `(key, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// A namespaced query-string key such as `credential.name__icontains`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QsKey {
    /// Owning list screen namespace.
    pub namespace: String,
    /// Field name passed to the API.
    pub field: String,
}

impl QsKey {
    /// Split a raw key on its first `.`; keys without a namespace yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, field) = raw.split_once('.')?;
        if namespace.is_empty() || field.is_empty() {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })
    }
}

impl Display for QsKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.namespace, self.field)
    }
}

/// Declarative description of a list screen's URL namespace and default state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QsConfig {
    namespace: String,
    default_params: Params,
    integer_fields: BTreeSet<String>,
}

impl QsConfig {
    /// Build a config with the default integer fields.
    ///
    /// # Errors
    ///
    /// Returns [`QsError::MissingNamespace`] for an empty namespace and
    /// [`QsError::InvalidNamespace`] when it contains `.`.
    pub fn new(namespace: impl Into<String>, default_params: Params) -> Result<Self, QsError> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(QsError::MissingNamespace);
        }
        if namespace.contains('.') {
            return Err(QsError::InvalidNamespace { namespace });
        }
        Ok(Self {
            namespace,
            default_params,
            integer_fields: DEFAULT_INTEGER_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    /// Replace the set of fields parsed as integers.
    #[must_use]
    pub fn with_integer_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.integer_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Namespace prefixed to every key.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Defaults applied when the search string is silent.
    #[must_use]
    pub const fn default_params(&self) -> &Params {
        &self.default_params
    }

    /// Whether `field` decodes to an integer.
    #[must_use]
    pub fn is_integer_field(&self, field: &str) -> bool {
        self.integer_fields.contains(field)
    }

    /// Namespaced key for `field`.
    #[must_use]
    pub fn key(&self, field: &str) -> QsKey {
        QsKey {
            namespace: self.namespace.clone(),
            field: field.to_string(),
        }
    }

    fn is_default(&self, field: &str, value: &ParamValue) -> bool {
        self.default_params
            .get(field)
            .is_some_and(|default| default.encode() == value.encode())
    }

    fn owns(&self, key: &QsKey) -> bool {
        key.namespace == self.namespace
    }
}

/// Parse the location search string into this screen's params.
///
/// Foreign and un-namespaced keys are ignored. Declared integer fields that do
/// not parse are kept as text. The result always includes the defaults.
#[must_use]
pub fn parse_query_string(config: &QsConfig, search: &str) -> Params {
    let mut parsed = Params::new();
    for (raw_key, raw_value) in raw_pairs(search) {
        let Some(key) = QsKey::parse(&decode_component(raw_key)) else {
            continue;
        };
        if !config.owns(&key) {
            continue;
        }
        let parts = raw_value
            .split(',')
            .map(|part| decode_scalar(config, &key.field, part))
            .collect();
        append_value(&mut parsed, key.field, ParamValue::from_parts(parts));
    }
    let mut merged = config.default_params.clone();
    merged.extend(parsed);
    merged
}

/// Encode params without namespacing, sorted by key, sequences comma-joined.
#[must_use]
pub fn encode_query_string(params: &Params) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), value.encode()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode params under the config's namespace, omitting values equal to defaults.
#[must_use]
pub fn encode_non_default_query_string(config: &QsConfig, params: &Params) -> String {
    params
        .iter()
        .filter(|(field, value)| !value.is_empty() && !config.is_default(field, value))
        .map(|(field, value)| {
            format!(
                "{}={}",
                urlencoding::encode(&config.key(field).to_string()),
                value.encode()
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Rewrite this namespace's portion of `search`, keeping every other key verbatim.
#[must_use]
pub fn update_query_string(config: &QsConfig, search: &str, params: &Params) -> String {
    let mut parts: Vec<String> = raw_pairs(search)
        .filter(|(raw_key, _)| {
            QsKey::parse(&decode_component(raw_key)).is_none_or(|key| !config.owns(&key))
        })
        .map(|(raw_key, raw_value)| format!("{raw_key}={raw_value}"))
        .collect();
    let own = encode_non_default_query_string(config, params);
    if !own.is_empty() {
        parts.push(own);
    }
    parts.join("&")
}

/// Shallow right-biased merge; keys holding sequences on both sides concatenate.
#[must_use]
pub fn merge_params(left: &Params, right: &Params) -> Params {
    let mut merged = left.clone();
    for (key, value) in right {
        match (merged.get_mut(key), value) {
            (Some(ParamValue::Many(existing)), ParamValue::Many(extra)) => {
                existing.extend(extra.iter().cloned());
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Shallow right-biased replacement.
#[must_use]
pub fn replace_params(left: &Params, right: &Params) -> Params {
    let mut replaced = left.clone();
    replaced.extend(right.iter().map(|(key, value)| (key.clone(), value.clone())));
    replaced
}

/// Remove individual values; keys that end up empty fall back to their default
/// or disappear when they have none.
#[must_use]
pub fn remove_params(config: &QsConfig, params: &Params, to_remove: &Params) -> Params {
    let mut updated = params.clone();
    for (key, doomed) in to_remove {
        let Some(current) = updated.remove(key) else {
            continue;
        };
        let doomed: Vec<String> = doomed.scalars().map(ToString::to_string).collect();
        let remaining: Vec<Scalar> = current
            .into_scalars()
            .into_iter()
            .filter(|scalar| !doomed.contains(&scalar.to_string()))
            .collect();
        if remaining.is_empty() {
            if let Some(default) = config.default_params.get(key) {
                updated.insert(key.clone(), default.clone());
            }
        } else {
            updated.insert(key.clone(), ParamValue::from_parts(remaining));
        }
    }
    updated
}

/// 1-based page number carried by `params`.
#[must_use]
pub fn current_page(params: &Params) -> i64 {
    params
        .get(PAGE)
        .and_then(ParamValue::as_int)
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

fn raw_pairs(search: &str) -> impl Iterator<Item = (&str, &str)> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
}

fn decode_scalar(config: &QsConfig, field: &str, raw: &str) -> Scalar {
    let decoded = decode_component(raw);
    if config.is_integer_field(field)
        && let Ok(value) = decoded.trim().parse::<i64>()
    {
        return Scalar::Int(value);
    }
    Scalar::Text(decoded)
}

fn append_value(params: &mut Params, field: String, value: ParamValue) {
    match params.remove(&field) {
        Some(existing) => {
            let mut scalars = existing.into_scalars();
            scalars.extend(value.into_scalars());
            params.insert(field, ParamValue::Many(scalars));
        }
        None => {
            params.insert(field, value);
        }
    }
}
