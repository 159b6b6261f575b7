//! Who is signed in and what the server is.

use helmsman_api_models::{Endpoint, Me, ResourceKind};
use tracing::{debug, warn};

use crate::context::ConsoleContext;
use crate::error::{ConsoleError, ConsoleResult};
use crate::qs::{ParamValue, Params};

/// Server and user facts loaded once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Server version string.
    pub version: String,
    /// The authenticated user.
    pub me: Me,
    /// Organizations the user administers.
    pub admin_org_count: u64,
}

/// Role flags derived from [`SessionInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProfile {
    /// Full administrative rights.
    pub is_superuser: bool,
    /// Read-only access to everything.
    pub is_system_auditor: bool,
    /// Administers at least one organization.
    pub is_org_admin: bool,
}

/// Loader for [`SessionInfo`].
pub struct Session;

impl Session {
    /// Fetch server config and the current user concurrently, then the count of
    /// organizations the user administers.
    ///
    /// # Errors
    ///
    /// A 401 from any call yields [`ConsoleError::Unauthorized`]; other failures
    /// yield [`ConsoleError::Api`].
    pub async fn load(ctx: &ConsoleContext) -> ConsoleResult<SessionInfo> {
        let api = ctx.api();
        let (config, me) = tokio::try_join!(api.config(), api.me()).map_err(|err| {
            let error = ConsoleError::from(err);
            if matches!(error, ConsoleError::Unauthorized(_)) {
                warn!("session rejected by server");
            }
            error
        })?;

        let admin_of = Endpoint::related(ResourceKind::Users, me.id, "admin_of_organizations");
        let params = Params::from([("page_size".to_string(), ParamValue::from(1))]);
        let admin_org_count = api.list_at(&admin_of, &params).await?.count;

        debug!(version = %config.version, user = %me.username, admin_org_count, "session loaded");
        Ok(SessionInfo {
            version: config.version,
            me,
            admin_org_count,
        })
    }
}

impl SessionInfo {
    /// Role flags for gating UI.
    #[must_use]
    pub const fn profile(&self) -> UserProfile {
        UserProfile {
            is_superuser: self.me.is_superuser,
            is_system_auditor: self.me.is_system_auditor,
            is_org_admin: self.admin_org_count > 0,
        }
    }
}
