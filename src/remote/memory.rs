//! An in-process [`ManageService`] for tests, demos and single-node setups.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ActionRecord, AllowRecord, CustomerRecord, LevelRecord, ManageService, ObjectActions,
    PermissionQuery, PermissionScope,
};
use crate::error::AclError;
use crate::types::ObjectType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PermissionKey {
    database: String,
    scope: PermissionScope,
    app_id: String,
    role_id: String,
    action_type: ObjectType,
    object_id: String,
}

/// Where a granted action map is stored.
#[derive(Debug, Clone)]
pub struct GrantTarget<'a> {
    pub database: &'a str,
    pub app_id: Option<&'a str>,
    pub role_id: &'a str,
    pub action_type: ObjectType,
    pub object_id: &'a str,
}

#[derive(Default)]
pub struct InMemoryManageService {
    permissions: RwLock<HashMap<PermissionKey, BTreeMap<String, bool>>>,
    customers: RwLock<HashMap<String, CustomerRecord>>,
    levels: RwLock<HashMap<String, LevelRecord>>,
    allows: RwLock<HashMap<String, AllowRecord>>,
    actions: RwLock<Vec<ActionRecord>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl InMemoryManageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an action map. `app_id: None` stores into the tenant-common
    /// namespace.
    pub fn grant(&self, target: GrantTarget<'_>, actions: &[(&str, bool)]) -> Result<(), AclError> {
        let (scope, app_id) = match target.app_id {
            Some(app) => (PermissionScope::App, app.to_string()),
            None => (PermissionScope::Common, String::new()),
        };
        let key = PermissionKey {
            database: target.database.to_string(),
            scope,
            app_id,
            role_id: target.role_id.to_string(),
            action_type: target.action_type,
            object_id: target.object_id.to_string(),
        };
        let map = actions.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self.permissions.write()?.insert(key, map);
        Ok(())
    }

    pub fn add_customer(&self, customer_id: &str, level: &str) -> Result<(), AclError> {
        self.customers.write()?.insert(
            customer_id.to_string(),
            CustomerRecord {
                customer_id: customer_id.to_string(),
                level: level.to_string(),
            },
        );
        Ok(())
    }

    pub fn add_level(&self, level_id: &str, allows: &[&str]) -> Result<(), AclError> {
        self.levels.write()?.insert(
            level_id.to_string(),
            LevelRecord {
                level_id: level_id.to_string(),
                allows: allows.iter().map(|a| a.to_string()).collect(),
            },
        );
        Ok(())
    }

    pub fn add_allow(&self, allow: AllowRecord) -> Result<(), AclError> {
        self.allows.write()?.insert(allow.allow_id.clone(), allow);
        Ok(())
    }

    pub fn add_action(&self, action: ActionRecord) -> Result<(), AclError> {
        self.actions.write()?.push(action);
        Ok(())
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent call, to exercise timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) -> Result<(), AclError> {
        *self.delay.write()? = delay;
        Ok(())
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &str) -> Result<(), AclError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read()?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AclError::Remote(format!("{operation}: service unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ManageService for InMemoryManageService {
    async fn find_permission_actions(
        &self,
        query: &PermissionQuery,
    ) -> Result<Vec<ObjectActions>, AclError> {
        self.enter("find_permission_actions").await?;
        let permissions = self.permissions.read()?;
        let found = query
            .role_ids
            .iter()
            .filter_map(|role_id| {
                let key = PermissionKey {
                    database: query.database.clone(),
                    scope: query.scope,
                    app_id: query.app_id.clone(),
                    role_id: role_id.clone(),
                    action_type: query.action_type,
                    object_id: query.object_id.clone(),
                };
                permissions.get(&key).map(|map| ObjectActions {
                    object_id: query.object_id.clone(),
                    action_map: map.clone(),
                })
            })
            .collect();
        Ok(found)
    }

    async fn find_customer(&self, customer_id: &str) -> Result<CustomerRecord, AclError> {
        self.enter("find_customer").await?;
        self.customers
            .read()?
            .get(customer_id)
            .cloned()
            .ok_or_else(|| AclError::Remote(format!("customer '{customer_id}' not found")))
    }

    async fn find_level(&self, level_id: &str) -> Result<LevelRecord, AclError> {
        self.enter("find_level").await?;
        self.levels
            .read()?
            .get(level_id)
            .cloned()
            .ok_or_else(|| AclError::Remote(format!("level '{level_id}' not found")))
    }

    async fn find_level_allows(&self, allow_ids: &[String]) -> Result<Vec<AllowRecord>, AclError> {
        self.enter("find_level_allows").await?;
        let allows = self.allows.read()?;
        Ok(allow_ids
            .iter()
            .filter_map(|id| allows.get(id).cloned())
            .collect())
    }

    async fn find_actions(&self) -> Result<Vec<ActionRecord>, AclError> {
        self.enter("find_actions").await?;
        Ok(self.actions.read()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(scope: PermissionScope, app_id: &str) -> PermissionQuery {
        PermissionQuery {
            database: "t1".into(),
            role_ids: vec!["r1".into(), "r2".into()],
            scope,
            app_id: app_id.into(),
            action_type: ObjectType::Datastore,
            object_id: "D".into(),
        }
    }

    #[tokio::test]
    async fn test_grants_are_found_per_scope() {
        let svc = InMemoryManageService::new();
        svc.grant(
            GrantTarget {
                database: "t1",
                app_id: Some("a1"),
                role_id: "r2",
                action_type: ObjectType::Datastore,
                object_id: "D",
            },
            &[("read", true)],
        )
        .unwrap();

        let found = svc
            .find_permission_actions(&query(PermissionScope::App, "a1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action_map.get("read"), Some(&true));

        let other_app = svc
            .find_permission_actions(&query(PermissionScope::App, "a2"))
            .await
            .unwrap();
        assert!(other_app.is_empty());

        let common = svc
            .find_permission_actions(&query(PermissionScope::Common, ""))
            .await
            .unwrap();
        assert!(common.is_empty());
        assert_eq!(svc.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_service_errors() {
        let svc = InMemoryManageService::new();
        svc.set_failing(true);
        assert!(matches!(
            svc.find_actions().await,
            Err(AclError::Remote(_))
        ));
        svc.set_failing(false);
        assert!(svc.find_actions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_customer_is_an_error() {
        let svc = InMemoryManageService::new();
        assert!(svc.find_customer("nobody").await.is_err());
    }
}
