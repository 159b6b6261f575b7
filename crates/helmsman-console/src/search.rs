//! Search keys, lookup types and the param edits behind list toolbars.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use helmsman_api_models::{FieldSchema, OptionsResponse, RELATED_SEARCH_SUFFIX};

use crate::qs::{
    ORDER_BY, PAGE, PAGE_SIZE, ParamValue, Params, QsConfig, Scalar, remove_params, replace_params,
};

const OR_PREFIX: &str = "or__";
const NOT_PREFIX: &str = "not__";
const LOOKUP_SEPARATOR: &str = "__";

/// A field the API accepts as a filter, with its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableKey {
    /// Field name.
    pub key: String,
    /// Declared schema type (`string`, `datetime`, `json`, ...).
    pub field_type: Option<String>,
}

/// Fields of the GET schema marked `filterable`.
#[must_use]
pub fn searchable_keys(get: Option<&BTreeMap<String, FieldSchema>>) -> Vec<SearchableKey> {
    get.into_iter()
        .flatten()
        .filter(|(_, schema)| schema.filterable)
        .map(|(key, schema)| SearchableKey {
            key: key.clone(),
            field_type: schema.kind.clone(),
        })
        .collect()
}

/// Related filter keys with the eight-character `__search` suffix dropped.
#[must_use]
pub fn related_searchable_keys(related_search_fields: &[String]) -> Vec<String> {
    related_search_fields
        .iter()
        .map(|field| {
            let end = field.len().saturating_sub(RELATED_SEARCH_SUFFIX.len());
            field.get(..end).unwrap_or_default().to_string()
        })
        .collect()
}

/// Whether the OPTIONS response grants creation.
#[must_use]
pub const fn can_add(options: &OptionsResponse) -> bool {
    options.can_add()
}

/// Field lookups understood by the API filter backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupType {
    /// Exact match (the default).
    Exact,
    /// Case-insensitive exact match.
    Iexact,
    /// Substring match.
    Contains,
    /// Case-insensitive substring match.
    Icontains,
    /// Prefix match.
    Startswith,
    /// Case-insensitive prefix match.
    Istartswith,
    /// Suffix match.
    Endswith,
    /// Case-insensitive suffix match.
    Iendswith,
    /// Regular expression match.
    Regex,
    /// Case-insensitive regular expression match.
    Iregex,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Null check; expects a boolean.
    Isnull,
    /// Membership in a comma-separated list.
    In,
}

impl LookupType {
    /// Every lookup in picker order.
    pub const ALL: [Self; 16] = [
        Self::Exact,
        Self::Iexact,
        Self::Contains,
        Self::Icontains,
        Self::Startswith,
        Self::Istartswith,
        Self::Endswith,
        Self::Iendswith,
        Self::Regex,
        Self::Iregex,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Isnull,
        Self::In,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Iexact => "iexact",
            Self::Contains => "contains",
            Self::Icontains => "icontains",
            Self::Startswith => "startswith",
            Self::Istartswith => "istartswith",
            Self::Endswith => "endswith",
            Self::Iendswith => "iendswith",
            Self::Regex => "regex",
            Self::Iregex => "iregex",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Isnull => "isnull",
            Self::In => "in",
        }
    }

    /// Whether the lookup applies to a field of `field_type`.
    ///
    /// Case-insensitive and substring lookups are for strings only, prefix and
    /// suffix lookups are not offered for datetimes, comparisons not for json.
    #[must_use]
    pub fn available_for(self, field_type: &str) -> bool {
        match self {
            Self::Iexact | Self::Contains | Self::Icontains => field_type == "string",
            Self::Startswith | Self::Istartswith | Self::Endswith | Self::Iendswith => {
                field_type != "datetime"
            }
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => field_type != "json",
            Self::Exact | Self::Regex | Self::Iregex | Self::Isnull | Self::In => true,
        }
    }

    /// Lookups offered for `field_type`.
    #[must_use]
    pub fn for_field_type(field_type: &str) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|lookup| lookup.available_for(field_type))
            .collect()
    }
}

impl Display for LookupType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for LookupType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lookup| lookup.as_str() == value)
            .ok_or_else(|| format!("unknown lookup type '{value}'"))
    }
}

/// Decoded filter key `[or__][not__]field[__lookup]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    /// OR-ed with other filters instead of AND-ed.
    pub or: bool,
    /// Excludes matches.
    pub not: bool,
    /// Field path, possibly through relations (`organization__name`).
    pub field: String,
    /// Explicit lookup, if any.
    pub lookup: Option<LookupType>,
}

impl FilterKey {
    /// Split a raw param key into its parts.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (or, rest) = raw
            .strip_prefix(OR_PREFIX)
            .map_or((false, raw), |rest| (true, rest));
        let (not, rest) = rest
            .strip_prefix(NOT_PREFIX)
            .map_or((false, rest), |rest| (true, rest));
        let (field, lookup) = match rest.rsplit_once(LOOKUP_SEPARATOR) {
            Some((field, suffix)) if !field.is_empty() => match suffix.parse::<LookupType>() {
                Ok(lookup) => (field, Some(lookup)),
                Err(_) => (rest, None),
            },
            _ => (rest, None),
        };
        Self {
            or,
            not,
            field: field.to_string(),
            lookup,
        }
    }

    /// Whether this is an exclude filter.
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.not
    }
}

impl Display for FilterKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.or {
            formatter.write_str(OR_PREFIX)?;
        }
        if self.not {
            formatter.write_str(NOT_PREFIX)?;
        }
        formatter.write_str(&self.field)?;
        if let Some(lookup) = self.lookup {
            write!(formatter, "{LOOKUP_SEPARATOR}{lookup}")?;
        }
        Ok(())
    }
}

/// Builder for a toolbar search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    key: FilterKey,
    value: String,
}

impl SearchTerm {
    /// Filter `field` by `value` with the default lookup.
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: FilterKey {
                or: false,
                not: false,
                field: field.into(),
                lookup: None,
            },
            value: value.into(),
        }
    }

    /// Use an explicit lookup.
    #[must_use]
    pub const fn lookup(mut self, lookup: LookupType) -> Self {
        self.key.lookup = Some(lookup);
        self
    }

    /// OR with the other filters.
    #[must_use]
    pub const fn or(mut self) -> Self {
        self.key.or = true;
        self
    }

    /// Exclude matches.
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.key.not = true;
        self
    }

    /// Param key this term writes.
    #[must_use]
    pub fn key(&self) -> String {
        self.key.to_string()
    }

    /// Value this term writes.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Ascending,
    /// Descending (`-` prefix).
    Descending,
}

/// Add a search term; repeated terms on one key accumulate. Resets to page 1.
#[must_use]
pub fn with_search(config: &QsConfig, params: &Params, term: &SearchTerm) -> Params {
    let key = term.key();
    let value = Scalar::Text(term.value().to_string());
    let mut values: Vec<Scalar> = params
        .get(&key)
        .filter(|existing| config.default_params().get(&key) != Some(*existing))
        .map(|existing| existing.scalars().cloned().collect())
        .unwrap_or_default();
    if !values.contains(&value) {
        values.push(value);
    }
    let mut updated = replace_params(params, &Params::from([(key, ParamValue::from_parts(values))]));
    reset_page(config, &mut updated);
    updated
}

/// Remove one value of a filter chip.
#[must_use]
pub fn without_filter(config: &QsConfig, params: &Params, key: &str, value: &str) -> Params {
    let mut updated = remove_params(
        config,
        params,
        &Params::from([(key.to_string(), ParamValue::from(value))]),
    );
    reset_page(config, &mut updated);
    updated
}

/// Drop every filter, keeping nothing but the defaults.
#[must_use]
pub fn cleared(config: &QsConfig) -> Params {
    config.default_params().clone()
}

/// Sort by `key`; the page resets.
#[must_use]
pub fn sorted_by(config: &QsConfig, params: &Params, key: &str, order: SortOrder) -> Params {
    let order_by = match order {
        SortOrder::Ascending => key.to_string(),
        SortOrder::Descending => format!("-{key}"),
    };
    let mut updated = replace_params(
        params,
        &Params::from([(ORDER_BY.to_string(), ParamValue::from(order_by))]),
    );
    reset_page(config, &mut updated);
    updated
}

/// Current sort key and direction.
#[must_use]
pub fn current_sort(params: &Params) -> Option<(String, SortOrder)> {
    let order_by = params.get(ORDER_BY)?.as_text()?;
    Some(match order_by.strip_prefix('-') {
        Some(key) => (key.to_string(), SortOrder::Descending),
        None => (order_by.into_owned(), SortOrder::Ascending),
    })
}

/// Move to `page` (1-based, clamped).
#[must_use]
pub fn with_page(params: &Params, page: i64) -> Params {
    replace_params(
        params,
        &Params::from([(PAGE.to_string(), ParamValue::from(page.max(1)))]),
    )
}

/// Change the page size; the page resets.
#[must_use]
pub fn with_page_size(config: &QsConfig, params: &Params, page_size: u32) -> Params {
    let mut updated = replace_params(
        params,
        &Params::from([(
            PAGE_SIZE.to_string(),
            ParamValue::from(i64::from(page_size.max(1))),
        )]),
    );
    reset_page(config, &mut updated);
    updated
}

/// Filter chips: every non-default, non-paging key with its decoded form.
#[must_use]
pub fn active_filters(config: &QsConfig, params: &Params) -> Vec<(FilterKey, Vec<String>)> {
    params
        .iter()
        .filter(|(key, _)| ![PAGE, PAGE_SIZE, ORDER_BY].contains(&key.as_str()))
        .filter(|(key, value)| config.default_params().get(*key) != Some(*value))
        .map(|(key, value)| {
            (
                FilterKey::parse(key),
                value.scalars().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

fn reset_page(config: &QsConfig, params: &mut Params) {
    match config.default_params().get(PAGE) {
        Some(default) => {
            params.insert(PAGE.to_string(), default.clone());
        }
        None => {
            params.insert(PAGE.to_string(), ParamValue::from(1));
        }
    }
}
