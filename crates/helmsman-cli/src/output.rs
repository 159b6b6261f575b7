//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use helmsman_api_models::{Item, ResourceId, ResourceKind};
use helmsman_console::ListData;
use helmsman_console::delete_details::RelatedResourceCount;
use helmsman_console::search::SearchableKey;
use helmsman_console::session::SessionInfo;
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// What `options` reports about a collection.
#[derive(Debug, Serialize)]
pub(crate) struct OptionsReport {
    pub(crate) resource: String,
    pub(crate) can_add: bool,
    pub(crate) searchable_keys: Vec<SearchableKeyView>,
    pub(crate) related_search_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchableKeyView {
    pub(crate) key: String,
    #[serde(rename = "type")]
    pub(crate) field_type: Option<String>,
    pub(crate) lookups: Vec<&'static str>,
}

impl From<SearchableKey> for SearchableKeyView {
    fn from(value: SearchableKey) -> Self {
        let lookups = value
            .field_type
            .as_deref()
            .map(helmsman_console::search::LookupType::for_field_type)
            .unwrap_or_default()
            .into_iter()
            .map(|lookup| lookup.as_str())
            .collect();
        Self {
            key: value.key,
            field_type: value.field_type,
            lookups,
        }
    }
}

/// What `rm` did, or would do without `--yes`.
#[derive(Debug, Default, Serialize)]
pub(crate) struct RemovalReport {
    pub(crate) resource: String,
    pub(crate) action: &'static str,
    pub(crate) dry_run: bool,
    pub(crate) requested: Vec<ResourceId>,
    pub(crate) succeeded: Vec<ResourceId>,
    pub(crate) failed: Vec<FailureView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) related: Vec<RelatedView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) related_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FailureView {
    pub(crate) id: ResourceId,
    pub(crate) messages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RelatedView {
    pub(crate) label: String,
    pub(crate) count: u64,
}

impl From<RelatedResourceCount> for RelatedView {
    fn from(value: RelatedResourceCount) -> Self {
        Self {
            label: value.label,
            count: value.count,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_list(
    kind: ResourceKind,
    data: &ListData,
    page: i64,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "count": data.count,
            "page": page,
            "results": data.items,
        })),
        OutputFormat::Table => {
            println!("{:<8} {:<40} TYPE", "ID", "NAME");
            for item in &data.items {
                println!("{}", list_row(item));
            }
            println!("{}", list_footer(kind, data, page));
            Ok(())
        }
    }
}

fn list_row(item: &Item) -> String {
    format!(
        "{:<8} {:<40} {}",
        item.id,
        item.display_name(),
        item.kind.as_deref().unwrap_or("-")
    )
}

fn list_footer(kind: ResourceKind, data: &ListData, page: i64) -> String {
    format!(
        "{} of {} {kind} (page {page})",
        data.items.len(),
        data.count
    )
}

pub(crate) fn render_item(item: &Item, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(item),
        OutputFormat::Table => {
            println!("id: {}", item.id);
            println!("name: {}", item.display_name());
            if let Some(kind) = &item.kind {
                println!("type: {kind}");
            }
            for (key, value) in &item.extra {
                println!("{key}: {}", scalar_text(value));
            }
            if !item.can_delete() {
                println!("(delete not permitted)");
            }
            Ok(())
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn render_options(report: &OptionsReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!("resource: {}", report.resource);
            println!("can add: {}", if report.can_add { "yes" } else { "no" });
            println!("{:<32} {:<12} LOOKUPS", "KEY", "TYPE");
            for key in &report.searchable_keys {
                println!(
                    "{:<32} {:<12} {}",
                    key.key,
                    key.field_type.as_deref().unwrap_or("-"),
                    key.lookups.join(",")
                );
            }
            if !report.related_search_keys.is_empty() {
                println!("related: {}", report.related_search_keys.join(", "));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_removal(report: &RemovalReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            for line in removal_lines(report) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn removal_lines(report: &RemovalReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.related.is_empty() {
        lines.push("referenced by:".to_string());
        for related in &report.related {
            lines.push(format!("  {}: {}", related.label, related.count));
        }
    }
    if let Some(error) = &report.related_error {
        lines.push(format!("could not load related resources: {error}"));
    }
    if report.dry_run {
        lines.push(format!(
            "would {} {} {} item(s): {}",
            report.action,
            report.requested.len(),
            report.resource,
            join_ids(&report.requested)
        ));
        return lines;
    }
    if !report.succeeded.is_empty() {
        lines.push(format!(
            "{}: {}",
            past_tense(report.action),
            join_ids(&report.succeeded)
        ));
    }
    for failure in &report.failed {
        lines.push(format!(
            "failed [{}]: {}",
            failure.id,
            failure.messages.join("; ")
        ));
    }
    lines
}

fn past_tense(action: &str) -> &'static str {
    match action {
        "disassociate" => "disassociated",
        _ => "deleted",
    }
}

fn join_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn render_session(info: &SessionInfo, format: OutputFormat) -> CliResult<()> {
    let profile = info.profile();
    match format {
        OutputFormat::Json => print_json(&json!({
            "version": info.version,
            "user": info.me,
            "is_superuser": profile.is_superuser,
            "is_system_auditor": profile.is_system_auditor,
            "is_org_admin": profile.is_org_admin,
        })),
        OutputFormat::Table => {
            println!("server: {}", info.version);
            println!("user: {} (id {})", info.me.username, info.me.id);
            let mut roles = Vec::new();
            if profile.is_superuser {
                roles.push("superuser");
            }
            if profile.is_system_auditor {
                roles.push("system auditor");
            }
            if profile.is_org_admin {
                roles.push("organization admin");
            }
            if roles.is_empty() {
                roles.push("normal user");
            }
            println!("roles: {}", roles.join(", "));
            Ok(())
        }
    }
}
