//! Administrative fact edits: replace or clear a role's permissions, replace
//! or clear a user's role assignments.
//!
//! Each operation writes through the engine, which updates the authoritative
//! store and the local snapshot, and then publishes an invalidation so other
//! instances reload. Publishing never fails the operation.

use std::collections::BTreeSet;

use tracing::info;

use crate::catalog::ActionCatalog;
use crate::engine::PolicyEngine;
use crate::error::AclError;
use crate::propagate::PolicyChangePropagator;
use crate::types::{PermissionDocument, PermissionFact};

/// Expand permission documents into the permission facts of `role_id`.
///
/// Every enabled action key becomes one fact per catalog route that carries
/// it. Keys without a route are dropped.
pub fn expand_documents(
    catalog: &ActionCatalog,
    role_id: &str,
    documents: &[PermissionDocument],
) -> BTreeSet<PermissionFact> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.actions
                .iter()
                .flat_map(|entry| entry.enabled_keys())
                .flat_map(move |key| catalog.templates_for(doc.action_type, key))
        })
        .map(|mapping| PermissionFact::new(role_id, mapping.path(), mapping.method))
        .collect()
}

#[derive(Clone)]
pub struct PolicyAdmin {
    engine: PolicyEngine,
    propagator: PolicyChangePropagator,
}

impl PolicyAdmin {
    pub fn new(engine: PolicyEngine, propagator: PolicyChangePropagator) -> Self {
        PolicyAdmin { engine, propagator }
    }

    /// Replace a role's permission facts with the expansion of `documents`.
    /// Returns the number of facts the role holds afterwards.
    pub async fn set_role_permissions(
        &self,
        role_id: &str,
        documents: &[PermissionDocument],
    ) -> Result<usize, AclError> {
        self.engine.clear_permissions(role_id).await?;
        let facts: Vec<PermissionFact> = expand_documents(self.engine.catalog(), role_id, documents)
            .into_iter()
            .collect();
        self.engine.add_permissions(&facts).await?;
        info!(
            event = "Admin",
            phase = "SetRolePermissions",
            role = role_id,
            documents = documents.len(),
            facts = facts.len()
        );
        self.propagator.notify().await;
        Ok(facts.len())
    }

    /// Returns the number of facts removed.
    pub async fn clear_role_permissions(&self, role_id: &str) -> Result<usize, AclError> {
        let removed = self.engine.clear_permissions(role_id).await?;
        info!(event = "Admin", phase = "ClearRolePermissions", role = role_id, removed);
        self.propagator.notify().await;
        Ok(removed)
    }

    /// Replace a user's groupings with every `roles x apps` pair. Returns the
    /// number of groupings the user holds afterwards.
    pub async fn set_user_roles(
        &self,
        user_id: &str,
        role_ids: &[String],
        app_ids: &[String],
    ) -> Result<usize, AclError> {
        self.engine.clear_groupings(user_id).await?;
        let pairs: BTreeSet<(&str, &str)> = role_ids
            .iter()
            .flat_map(|role| app_ids.iter().map(move |app| (role.as_str(), app.as_str())))
            .collect();
        for (role, app) in &pairs {
            self.engine.add_grouping(user_id, role, app).await?;
        }
        info!(
            event = "Admin",
            phase = "SetUserRoles",
            user = user_id,
            roles = role_ids.len(),
            apps = app_ids.len()
        );
        self.propagator.notify().await;
        Ok(pairs.len())
    }

    /// Returns the number of groupings removed.
    pub async fn clear_user_roles(&self, user_id: &str) -> Result<usize, AclError> {
        let removed = self.engine.clear_groupings(user_id).await?;
        info!(event = "Admin", phase = "ClearUserRoles", user = user_id, removed);
        self.propagator.notify().await;
        Ok(removed)
    }
}
