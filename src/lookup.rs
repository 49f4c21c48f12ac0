//! The permission lookup client: does a role set hold an action on one
//! object?
//!
//! Lookups are fail-closed. Transport errors and timeouts come back as `Err`
//! from [`PermissionLookup::try_has_action`] and as `false` from
//! [`PermissionLookup::has_action`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AclError;
use crate::remote::{ManageService, PermissionQuery, PermissionScope};
use crate::types::ObjectType;

/// Run one remote call under a time budget.
pub(crate) async fn bounded<T, F>(operation: &str, budget: Duration, fut: F) -> Result<T, AclError>
where
    F: Future<Output = Result<T, AclError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(AclError::timeout(operation, budget)),
    }
}

/// The fine-grained question asked for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCheck<'a> {
    pub tenant_id: &'a str,
    pub role_ids: &'a [String],
    pub app_id: &'a str,
    pub object_type: ObjectType,
    pub object_id: &'a str,
    pub action_key: &'a str,
}

impl ActionCheck<'_> {
    /// Folder permissions live in the tenant-common namespace; everything else
    /// is looked up per app.
    pub fn query(&self) -> PermissionQuery {
        let (scope, app_id) = if self.object_type.is_tenant_common() {
            (PermissionScope::Common, String::new())
        } else {
            (PermissionScope::App, self.app_id.to_string())
        };
        PermissionQuery {
            database: self.tenant_id.to_string(),
            role_ids: self.role_ids.to_vec(),
            scope,
            app_id,
            action_type: self.object_type,
            object_id: self.object_id.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct PermissionLookup {
    service: Arc<dyn ManageService>,
    timeout: Duration,
}

impl PermissionLookup {
    pub fn new(service: Arc<dyn ManageService>, timeout: Duration) -> Self {
        PermissionLookup { service, timeout }
    }

    pub async fn try_has_action(&self, check: &ActionCheck<'_>) -> Result<bool, AclError> {
        let query = check.query();
        let objects = bounded(
            "permission lookup",
            self.timeout,
            self.service.find_permission_actions(&query),
        )
        .await?;

        // Any role enabling the action on this object grants it.
        let granted = objects
            .iter()
            .filter(|o| o.object_id == check.object_id)
            .any(|o| o.action_map.get(check.action_key).copied().unwrap_or(false));

        debug!(
            event = "Lookup",
            phase = "Result",
            tenant = check.tenant_id,
            object_type = %check.object_type,
            object = check.object_id,
            action = check.action_key,
            scope = ?query.scope,
            granted
        );
        Ok(granted)
    }

    pub async fn has_action(&self, check: &ActionCheck<'_>) -> bool {
        match self.try_has_action(check).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(
                    event = "Lookup",
                    phase = "Failed",
                    tenant = check.tenant_id,
                    object = check.object_id,
                    action = check.action_key,
                    error = %e
                );
                false
            }
        }
    }
}
