//! Tenant-level entitlement for license-gated domains.
//!
//! A tenant is entitled to a domain when its subscription level carries an
//! allow entry of the domain's allow type, and that entry lists a `read`
//! action that the manage service's action catalog also knows under the same
//! object and group.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AclError;
use crate::lookup::bounded;
use crate::remote::{ActionRecord, AllowRecord, ManageService};

const ENTITLING_ACTION: &str = "read";

#[derive(Clone)]
pub struct EntitlementChecker {
    service: Arc<dyn ManageService>,
    timeout: Duration,
}

impl EntitlementChecker {
    pub fn new(service: Arc<dyn ManageService>, timeout: Duration) -> Self {
        EntitlementChecker { service, timeout }
    }

    pub async fn try_is_entitled(&self, tenant_id: &str, allow_type: &str) -> Result<bool, AclError> {
        let customer = bounded("find customer", self.timeout, self.service.find_customer(tenant_id)).await?;
        let level = bounded("find level", self.timeout, self.service.find_level(&customer.level)).await?;
        if level.allows.is_empty() {
            debug!(event = "Entitlement", phase = "EmptyLevel", tenant = tenant_id, level = %level.level_id);
            return Ok(false);
        }
        let allows = bounded(
            "find level allows",
            self.timeout,
            self.service.find_level_allows(&level.allows),
        )
        .await?;
        let actions = bounded("find actions", self.timeout, self.service.find_actions()).await?;
        Ok(grants(&allows, &actions, allow_type))
    }

    /// Fail-closed wrapper: any remote error means not entitled.
    pub async fn is_entitled(&self, tenant_id: &str, allow_type: &str) -> bool {
        match self.try_is_entitled(tenant_id, allow_type).await {
            Ok(entitled) => {
                debug!(event = "Entitlement", phase = "Result", tenant = tenant_id, allow_type, entitled);
                entitled
            }
            Err(e) => {
                warn!(event = "Entitlement", phase = "Failed", tenant = tenant_id, allow_type, error = %e);
                false
            }
        }
    }
}

fn grants(allows: &[AllowRecord], actions: &[ActionRecord], allow_type: &str) -> bool {
    allows
        .iter()
        .filter(|a| a.allow_type == allow_type)
        .any(|a| {
            a.actions.iter().any(|x| {
                x.api_key == ENTITLING_ACTION
                    && actions.iter().any(|y| {
                        y.action_object == a.allow_type
                            && y.action_key == x.api_key
                            && y.action_group == x.group_key
                    })
            })
        })
}
