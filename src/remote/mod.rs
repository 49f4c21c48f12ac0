//! Outbound, read-only queries against the manage service that owns roles,
//! permission documents, customers, subscription levels and allow lists.

mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::types::ObjectType;

pub use memory::{GrantTarget, InMemoryManageService};

/// Which permission namespace a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    /// Scoped to one app.
    App,
    /// Shared by every app in the tenant.
    Common,
}

/// Query for the action maps a set of roles holds on one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionQuery {
    pub database: String,
    pub role_ids: Vec<String>,
    pub scope: PermissionScope,
    /// Empty for [`PermissionScope::Common`].
    pub app_id: String,
    pub action_type: ObjectType,
    pub object_id: String,
}

/// The action map stored for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectActions {
    pub object_id: String,
    pub action_map: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub level_id: String,
    pub allows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowAction {
    pub api_key: String,
    pub group_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRecord {
    pub allow_id: String,
    pub allow_type: String,
    pub actions: Vec<AllowAction>,
}

/// A row of the manage service's global action catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_key: String,
    pub action_object: String,
    pub action_group: String,
}

#[async_trait]
pub trait ManageService: Send + Sync {
    async fn find_permission_actions(
        &self,
        query: &PermissionQuery,
    ) -> Result<Vec<ObjectActions>, AclError>;

    async fn find_customer(&self, customer_id: &str) -> Result<CustomerRecord, AclError>;

    async fn find_level(&self, level_id: &str) -> Result<LevelRecord, AclError>;

    async fn find_level_allows(&self, allow_ids: &[String]) -> Result<Vec<AllowRecord>, AclError>;

    async fn find_actions(&self) -> Result<Vec<ActionRecord>, AclError>;
}
