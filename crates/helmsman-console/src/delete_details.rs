//! Counts of related resources shown before a destructive action.
//!
//! Details are best effort: a failure is reported next to the confirmation but
//! never blocks the delete itself.

use futures_util::future::{BoxFuture, try_join_all};
use helmsman_api_models::{Endpoint, ResourceId, ResourceKind};

use crate::api::ResourceApi;
use crate::error::{ApiError, ApiResult};
use crate::qs::{ParamValue, Params};

/// One labelled count request.
pub struct RelatedCountRequest<'a> {
    /// Label shown next to the count.
    pub label: &'static str,
    request: BoxFuture<'a, ApiResult<u64>>,
}

impl<'a> RelatedCountRequest<'a> {
    /// Pair a label with a pending count.
    #[must_use]
    pub const fn new(label: &'static str, request: BoxFuture<'a, ApiResult<u64>>) -> Self {
        Self { label, request }
    }
}

/// Non-zero count of resources referencing the item being deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedResourceCount {
    /// Collaborator label.
    pub label: String,
    /// Number of referencing resources.
    pub count: u64,
}

/// Run every request concurrently and keep the non-zero counts.
///
/// Returns `Ok(None)` when nothing references the item.
///
/// # Errors
///
/// The first failing request aborts the lookup and its error is returned.
pub async fn related_resource_delete_counts(
    requests: Vec<RelatedCountRequest<'_>>,
) -> ApiResult<Option<Vec<RelatedResourceCount>>> {
    let counts = try_join_all(requests.into_iter().map(|entry| async move {
        let count = entry.request.await?;
        Ok::<_, ApiError>(RelatedResourceCount {
            label: entry.label.to_string(),
            count,
        })
    }))
    .await?;
    let present: Vec<RelatedResourceCount> =
        counts.into_iter().filter(|entry| entry.count > 0).collect();
    Ok((!present.is_empty()).then_some(present))
}

/// Details for a pending delete; only a single selection is looked up.
///
/// # Errors
///
/// Propagates the first failing count request.
pub async fn delete_details_for(
    api: &dyn ResourceApi,
    kind: ResourceKind,
    ids: &[ResourceId],
) -> ApiResult<Option<Vec<RelatedResourceCount>>> {
    match ids {
        [id] => {
            related_resource_delete_counts(related_resource_delete_requests(api, kind, *id)).await
        }
        _ => Ok(None),
    }
}

/// Collaborators that reference a resource of `kind`.
#[must_use]
pub fn related_resource_delete_requests(
    api: &dyn ResourceApi,
    kind: ResourceKind,
    id: ResourceId,
) -> Vec<RelatedCountRequest<'_>> {
    let count = |label: &'static str, target: ResourceKind, key: &'static str| {
        RelatedCountRequest::new(label, Box::pin(count_filtered(api, target, key, id)))
    };
    let related = |label: &'static str, related: &'static str| {
        RelatedCountRequest::new(
            label,
            Box::pin(count_at(api, Endpoint::related(kind, id, related))),
        )
    };

    match kind {
        ResourceKind::Credentials => vec![
            count("Job Templates", ResourceKind::JobTemplates, "credentials"),
            count("Projects", ResourceKind::Projects, "credentials"),
            count("Inventory Sources", ResourceKind::InventorySources, "credentials__id"),
            count(
                "Credential Input Sources",
                ResourceKind::CredentialInputSources,
                "source_credential",
            ),
            count(
                "Execution Environments",
                ResourceKind::ExecutionEnvironments,
                "credential",
            ),
        ],
        ResourceKind::CredentialTypes => vec![count(
            "Credentials",
            ResourceKind::Credentials,
            "credential_type__id",
        )],
        ResourceKind::Inventories => vec![
            count("Job Templates", ResourceKind::JobTemplates, "inventory"),
            count(
                "Workflow Job Templates",
                ResourceKind::WorkflowJobTemplates,
                "inventory",
            ),
        ],
        ResourceKind::InventorySources => vec![
            count(
                "Workflow Job Template Nodes",
                ResourceKind::WorkflowJobTemplateNodes,
                "unified_job_template",
            ),
            related("Groups", "groups"),
            related("Hosts", "hosts"),
        ],
        ResourceKind::Projects => vec![
            count("Job Templates", ResourceKind::JobTemplates, "project"),
            count(
                "Workflow Job Template Nodes",
                ResourceKind::WorkflowJobTemplateNodes,
                "unified_job_template",
            ),
            count(
                "Inventory Sources",
                ResourceKind::InventorySources,
                "source_project",
            ),
        ],
        ResourceKind::JobTemplates
        | ResourceKind::WorkflowJobTemplates
        | ResourceKind::UnifiedJobTemplates => vec![count(
            "Workflow Job Template Nodes",
            ResourceKind::WorkflowJobTemplateNodes,
            "unified_job_template",
        )],
        ResourceKind::Organizations => vec![
            count("Credentials", ResourceKind::Credentials, "organization"),
            count("Teams", ResourceKind::Teams, "organization"),
            count(
                "Notification Templates",
                ResourceKind::NotificationTemplates,
                "organization",
            ),
            count(
                "Execution Environments",
                ResourceKind::ExecutionEnvironments,
                "organization",
            ),
            count("Projects", ResourceKind::Projects, "organization"),
            count("Inventories", ResourceKind::Inventories, "organization"),
            count("Applications", ResourceKind::Applications, "organization"),
        ],
        ResourceKind::ExecutionEnvironments => vec![
            count(
                "Templates",
                ResourceKind::UnifiedJobTemplates,
                "execution_environment",
            ),
            count("Projects", ResourceKind::Projects, "default_environment"),
            count(
                "Organizations",
                ResourceKind::Organizations,
                "default_environment",
            ),
            RelatedCountRequest::new(
                "Workflow Job Template Nodes",
                Box::pin(workflow_nodes_using_environment(api, id)),
            ),
        ],
        ResourceKind::InstanceGroups => vec![
            count("Organizations", ResourceKind::Organizations, "instance_groups"),
            count("Inventories", ResourceKind::Inventories, "instance_groups"),
            count("Templates", ResourceKind::UnifiedJobTemplates, "instance_groups"),
        ],
        ResourceKind::Instances => vec![count(
            "Instance Groups",
            ResourceKind::InstanceGroups,
            "instances",
        )],
        _ => Vec::new(),
    }
}

async fn count_filtered(
    api: &dyn ResourceApi,
    kind: ResourceKind,
    key: &'static str,
    id: ResourceId,
) -> ApiResult<u64> {
    api.list(kind, &filter(key, id))
        .await
        .map(|page| page.count)
}

async fn count_at(api: &dyn ResourceApi, endpoint: Endpoint) -> ApiResult<u64> {
    api.list_at(&endpoint, &Params::new())
        .await
        .map(|page| page.count)
}

async fn workflow_nodes_using_environment(api: &dyn ResourceApi, id: ResourceId) -> ApiResult<u64> {
    let sources = api
        .list(
            ResourceKind::InventorySources,
            &filter("execution_environment", id),
        )
        .await?;
    let counts = try_join_all(sources.results.iter().map(|source| async move {
        api.list(
            ResourceKind::WorkflowJobTemplateNodes,
            &filter("unified_job_template", source.id),
        )
        .await
    }))
    .await?;
    Ok(counts.iter().map(|page| page.count).sum())
}

fn filter(key: &str, id: ResourceId) -> Params {
    Params::from([(key.to_string(), ParamValue::from(id))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    #[tokio::test]
    async fn only_non_zero_counts_are_reported() {
        let api = FakeApi::default();
        api.set_count(&Endpoint::collection(ResourceKind::JobTemplates), 2);
        api.set_count(&Endpoint::collection(ResourceKind::Projects), 0);
        api.set_count(&Endpoint::collection(ResourceKind::InventorySources), 0);
        api.set_count(&Endpoint::collection(ResourceKind::CredentialInputSources), 0);
        api.set_count(&Endpoint::collection(ResourceKind::ExecutionEnvironments), 1);

        let details = related_resource_delete_counts(related_resource_delete_requests(
            &api,
            ResourceKind::Credentials,
            7,
        ))
        .await
        .unwrap();

        assert_eq!(
            details,
            Some(vec![
                RelatedResourceCount {
                    label: "Job Templates".to_string(),
                    count: 2,
                },
                RelatedResourceCount {
                    label: "Execution Environments".to_string(),
                    count: 1,
                },
            ])
        );
        let calls = api.list_calls();
        assert!(calls.iter().any(|(path, params)| path == "job_templates/"
            && params.get("credentials") == Some(&ParamValue::from(7))));
    }

    #[tokio::test]
    async fn nothing_referencing_collapses_to_none() {
        let api = FakeApi::default();
        api.set_count(&Endpoint::collection(ResourceKind::Credentials), 0);

        let details = related_resource_delete_counts(related_resource_delete_requests(
            &api,
            ResourceKind::CredentialTypes,
            3,
        ))
        .await
        .unwrap();

        assert_eq!(details, None);
    }

    #[tokio::test]
    async fn first_error_is_returned() {
        let api = FakeApi::default();
        api.fail_endpoint(&Endpoint::collection(ResourceKind::WorkflowJobTemplates), 500);

        let error = related_resource_delete_counts(related_resource_delete_requests(
            &api,
            ResourceKind::Inventories,
            1,
        ))
        .await
        .unwrap_err();

        assert_eq!(error.status, Some(500));
    }

    #[tokio::test]
    async fn inventory_source_counts_use_related_endpoints() {
        let api = FakeApi::default();
        api.set_count(&Endpoint::collection(ResourceKind::WorkflowJobTemplateNodes), 0);
        api.set_count(&Endpoint::related(ResourceKind::InventorySources, 4, "groups"), 3);
        api.set_count(&Endpoint::related(ResourceKind::InventorySources, 4, "hosts"), 12);

        let details = delete_details_for(&api, ResourceKind::InventorySources, &[4])
            .await
            .unwrap()
            .unwrap();

        let labels: Vec<_> = details.iter().map(|entry| entry.label.as_str()).collect();
        assert_eq!(labels, vec!["Groups", "Hosts"]);
    }

    #[tokio::test]
    async fn execution_environment_sums_workflow_nodes_over_sources() {
        let api = FakeApi::with_items(ResourceKind::InventorySources, [10, 11]);
        api.set_count(&Endpoint::collection(ResourceKind::UnifiedJobTemplates), 0);
        api.set_count(&Endpoint::collection(ResourceKind::Projects), 0);
        api.set_count(&Endpoint::collection(ResourceKind::Organizations), 0);
        api.set_count(&Endpoint::collection(ResourceKind::WorkflowJobTemplateNodes), 3);

        let details = delete_details_for(&api, ResourceKind::ExecutionEnvironments, &[2])
            .await
            .unwrap();

        assert_eq!(
            details,
            Some(vec![RelatedResourceCount {
                label: "Workflow Job Template Nodes".to_string(),
                count: 6,
            }])
        );
    }

    #[tokio::test]
    async fn workflow_nodes_are_counted_per_inventory_source() {
        let api = FakeApi::with_items(ResourceKind::InventorySources, [21, 22, 23]);
        api.set_count(&Endpoint::collection(ResourceKind::WorkflowJobTemplateNodes), 2);

        let total = workflow_nodes_using_environment(&api, 5).await.unwrap();

        assert_eq!(total, 6);
        let calls = api.list_calls();
        assert_eq!(
            calls[0],
            (
                "inventory_sources/".to_string(),
                filter("execution_environment", 5)
            )
        );
        let mut sources: Vec<i64> = calls
            .iter()
            .filter(|(path, _)| path == "workflow_job_template_nodes/")
            .filter_map(|(_, params)| params.get("unified_job_template").and_then(ParamValue::as_int))
            .collect();
        sources.sort_unstable();
        assert_eq!(sources, vec![21, 22, 23]);
    }

    #[tokio::test]
    async fn multiple_selection_skips_lookup() {
        let api = FakeApi::default();
        let details = delete_details_for(&api, ResourceKind::Credentials, &[1, 2])
            .await
            .unwrap();
        assert_eq!(details, None);
        assert!(api.list_calls().is_empty());
    }

    #[tokio::test]
    async fn custom_requests_are_supported() {
        let failing: RelatedCountRequest<'_> = RelatedCountRequest::new(
            "Broken",
            Box::pin(async { Err::<u64, _>(ApiError::transport("GET", "x/", "offline")) }),
        );
        let fine = RelatedCountRequest::new("Fine", Box::pin(async { Ok::<u64, ApiError>(1) }));

        assert!(related_resource_delete_counts(vec![fine, failing]).await.is_err());
    }
}
