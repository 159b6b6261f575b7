#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the orchestration REST API.
//!
//! Resource payloads are opaque to the console: only the envelope fields the
//! list machinery depends on (`id`, `count`, `results`, the OPTIONS schema) are
//! typed, everything else is carried through as JSON.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned by the API to every resource.
pub type ResourceId = i64;

/// Suffix the API appends to every entry of `related_search_fields`.
pub const RELATED_SEARCH_SUFFIX: &str = "__search";

/// Paginated list envelope returned by every collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResponse<T> {
    /// Total number of items matching the query across all pages.
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Absolute URL of the next page, when one exists.
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Absolute URL of the previous page, when one exists.
    pub previous: Option<String>,
    /// Items on the requested page.
    pub results: Vec<T>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

/// Response to an `OPTIONS` request against a collection endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptionsResponse {
    #[serde(default)]
    /// Field schemas per permitted HTTP method.
    pub actions: Actions,
    #[serde(default)]
    /// Filterable keys reachable through relationships, each suffixed with `__search`.
    pub related_search_fields: Vec<String>,
}

impl OptionsResponse {
    /// Whether the caller may create resources on this endpoint.
    ///
    /// The API only advertises a `POST` schema to users allowed to create, so the
    /// schema's presence doubles as the authorization signal.
    #[must_use]
    pub const fn can_add(&self) -> bool {
        self.actions.post.is_some()
    }
}

/// Method-keyed field schema maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Actions {
    #[serde(rename = "GET", default, skip_serializing_if = "Option::is_none")]
    /// Fields returned by reads.
    pub get: Option<BTreeMap<String, FieldSchema>>,
    #[serde(rename = "POST", default, skip_serializing_if = "Option::is_none")]
    /// Fields accepted on create; absent when the caller may not create.
    pub post: Option<BTreeMap<String, FieldSchema>>,
}

/// Schema of a single field as advertised by `OPTIONS`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    /// Declared field type (`string`, `integer`, `datetime`, `json`, ...).
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Human-readable label.
    pub label: Option<String>,
    #[serde(default)]
    /// Whether the field may be used as a list filter.
    pub filterable: bool,
    #[serde(flatten)]
    /// Remaining schema attributes, passed through untouched.
    pub extra: Map<String, Value>,
}

/// A resource row as returned inside list envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable identifier.
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Display name, when the resource has one.
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    /// Resource type discriminator.
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Related summaries, including the caller's capabilities.
    pub summary_fields: Option<SummaryFields>,
    #[serde(flatten)]
    /// Every other attribute of the payload.
    pub extra: Map<String, Value>,
}

impl Item {
    /// Minimal item carrying only an id, mostly useful in tests and fixtures.
    #[must_use]
    pub fn with_id(id: ResourceId) -> Self {
        Self {
            id,
            name: None,
            kind: None,
            summary_fields: None,
            extra: Map::new(),
        }
    }

    /// Whether the API reports that the caller may delete this item.
    ///
    /// Items without a capabilities block are treated as deletable; the server
    /// still enforces its own rules on the request.
    #[must_use]
    pub fn can_delete(&self) -> bool {
        self.summary_fields
            .as_ref()
            .and_then(|fields| fields.user_capabilities.as_ref())
            .is_none_or(|caps| caps.delete)
    }

    /// Name or a placeholder for rows that have none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Subset of `summary_fields` the console relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummaryFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Capabilities of the requesting user on the item.
    pub user_capabilities: Option<UserCapabilities>,
    #[serde(flatten)]
    /// Remaining summaries.
    pub extra: Map<String, Value>,
}

/// Per-item capability flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCapabilities {
    #[serde(default)]
    /// Caller may edit the item.
    pub edit: bool,
    #[serde(default)]
    /// Caller may delete the item.
    pub delete: bool,
    #[serde(default)]
    /// Caller may copy the item.
    pub copy: bool,
}

/// Payload for associating or disassociating a related item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssociationRequest {
    /// Identifier of the related item.
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    /// Set to detach rather than attach.
    pub disassociate: bool,
}

/// Instance-wide configuration served by `/config/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    /// Server version string.
    pub version: String,
    #[serde(flatten)]
    /// Remaining configuration attributes.
    pub extra: Map<String, Value>,
}

/// The authenticated user as served by `/me/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Me {
    /// User identifier.
    pub id: ResourceId,
    #[serde(default)]
    /// Login name.
    pub username: String,
    #[serde(default)]
    /// Superuser flag.
    pub is_superuser: bool,
    #[serde(default)]
    /// Read-only system auditor flag.
    pub is_system_auditor: bool,
}

/// Resource collections exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// OAuth applications.
    Applications,
    /// Credentials.
    Credentials,
    /// Credential input sources.
    CredentialInputSources,
    /// Credential types.
    CredentialTypes,
    /// Execution environments.
    ExecutionEnvironments,
    /// Inventory groups.
    Groups,
    /// Inventory hosts.
    Hosts,
    /// Instance groups.
    InstanceGroups,
    /// Cluster instances.
    Instances,
    /// Inventories.
    Inventories,
    /// Inventory sources.
    InventorySources,
    /// Jobs.
    Jobs,
    /// Job templates.
    JobTemplates,
    /// Labels.
    Labels,
    /// Notification templates.
    NotificationTemplates,
    /// Organizations.
    Organizations,
    /// Projects.
    Projects,
    /// Schedules.
    Schedules,
    /// Teams.
    Teams,
    /// Unified job templates (job, workflow and system templates together).
    UnifiedJobTemplates,
    /// Users.
    Users,
    /// Workflow job template nodes.
    WorkflowJobTemplateNodes,
    /// Workflow job templates.
    WorkflowJobTemplates,
}

impl ResourceKind {
    /// Every known resource kind.
    pub const ALL: [Self; 23] = [
        Self::Applications,
        Self::Credentials,
        Self::CredentialInputSources,
        Self::CredentialTypes,
        Self::ExecutionEnvironments,
        Self::Groups,
        Self::Hosts,
        Self::InstanceGroups,
        Self::Instances,
        Self::Inventories,
        Self::InventorySources,
        Self::Jobs,
        Self::JobTemplates,
        Self::Labels,
        Self::NotificationTemplates,
        Self::Organizations,
        Self::Projects,
        Self::Schedules,
        Self::Teams,
        Self::UnifiedJobTemplates,
        Self::Users,
        Self::WorkflowJobTemplateNodes,
        Self::WorkflowJobTemplates,
    ];

    /// Collection path segment (also the name accepted on the command line).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applications => "applications",
            Self::Credentials => "credentials",
            Self::CredentialInputSources => "credential_input_sources",
            Self::CredentialTypes => "credential_types",
            Self::ExecutionEnvironments => "execution_environments",
            Self::Groups => "groups",
            Self::Hosts => "hosts",
            Self::InstanceGroups => "instance_groups",
            Self::Instances => "instances",
            Self::Inventories => "inventories",
            Self::InventorySources => "inventory_sources",
            Self::Jobs => "jobs",
            Self::JobTemplates => "job_templates",
            Self::Labels => "labels",
            Self::NotificationTemplates => "notification_templates",
            Self::Organizations => "organizations",
            Self::Projects => "projects",
            Self::Schedules => "schedules",
            Self::Teams => "teams",
            Self::UnifiedJobTemplates => "unified_job_templates",
            Self::Users => "users",
            Self::WorkflowJobTemplateNodes => "workflow_job_template_nodes",
            Self::WorkflowJobTemplates => "workflow_job_templates",
        }
    }

    /// Query-string namespace used by list screens of this kind.
    #[must_use]
    pub const fn qs_namespace(self) -> &'static str {
        match self {
            Self::Applications => "applications",
            Self::Credentials => "credential",
            Self::CredentialInputSources => "credential_input_source",
            Self::CredentialTypes => "credential_type",
            Self::ExecutionEnvironments => "execution_environments",
            Self::Groups => "group",
            Self::Hosts => "host",
            Self::InstanceGroups => "instance-group",
            Self::Instances => "instance",
            Self::Inventories => "inventory",
            Self::InventorySources => "inventory_source",
            Self::Jobs => "job",
            Self::JobTemplates => "job_template",
            Self::Labels => "label",
            Self::NotificationTemplates => "notification-templates",
            Self::Organizations => "organization",
            Self::Projects => "project",
            Self::Schedules => "schedules",
            Self::Teams => "team",
            Self::UnifiedJobTemplates => "template",
            Self::Users => "user",
            Self::WorkflowJobTemplateNodes => "workflow_job_template_node",
            Self::WorkflowJobTemplates => "workflow_job_template",
        }
    }

    /// Default sort key for list screens of this kind.
    #[must_use]
    pub const fn default_order_by(self) -> &'static str {
        match self {
            Self::Jobs => "-finished",
            Self::Instances => "hostname",
            Self::WorkflowJobTemplateNodes => "id",
            _ => "name",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResource(pub String);

impl Display for UnknownResource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "unknown resource '{}'", self.0)
    }
}

impl std::error::Error for UnknownResource {}

impl FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownResource(value.to_string()))
    }
}

/// Path of an endpoint relative to the API prefix, always ending with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Collection endpoint, e.g. `credentials/`.
    #[must_use]
    pub fn collection(kind: ResourceKind) -> Self {
        Self(format!("{}/", kind.as_str()))
    }

    /// Detail endpoint, e.g. `credentials/7/`.
    #[must_use]
    pub fn detail(kind: ResourceKind, id: ResourceId) -> Self {
        Self(format!("{}/{id}/", kind.as_str()))
    }

    /// Sub-collection of a resource, e.g. `inventory_sources/3/hosts/`.
    #[must_use]
    pub fn related(kind: ResourceKind, id: ResourceId, related: &str) -> Self {
        Self(format!("{}/{id}/{}/", kind.as_str(), related.trim_matches('/')))
    }

    /// Fixed endpoint outside the resource collections, e.g. `config/`.
    #[must_use]
    pub fn named(path: &str) -> Self {
        Self(format!("{}/", path.trim_matches('/')))
    }

    /// Relative path string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }
}

impl Display for Endpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
