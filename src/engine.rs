use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::adapter::FactAdapter;
use crate::catalog::{self, ActionCatalog};
use crate::config::{AclConfig, GroupingOnly};
use crate::entitlement::EntitlementChecker;
use crate::error::AclError;
use crate::lookup::{ActionCheck, PermissionLookup, bounded};
use crate::metrics;
use crate::path_match;
use crate::remote::ManageService;
use crate::types::{
    AllowReason, AuthzRequest, Decision, DenyReason, FactFilter, FactSet, GroupingFact,
    HttpMethod, ObjectType, PermissionFact, SnapshotScope, SnapshotVersion,
};

/// An immutable set of facts plus the metadata of the load that produced it.
///
/// Readers hold an `Arc` to a snapshot for as long as they need it; reloads
/// and mutations swap in a new one and never touch a published snapshot.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    facts: FactSet,
    version: SnapshotVersion,
}

impl PolicySnapshot {
    fn new(facts: FactSet, generation: u64, scope: SnapshotScope) -> Self {
        let version = SnapshotVersion {
            generation,
            scope,
            groupings: facts.groupings.len(),
            permissions: facts.permissions.len(),
            loaded_at: SystemTime::now(),
        };
        PolicySnapshot { facts, version }
    }

    pub fn version(&self) -> &SnapshotVersion {
        &self.version
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn has_grouping(&self, user_id: &str, app_id: &str) -> bool {
        self.facts
            .groupings
            .iter()
            .any(|g| g.user_id == user_id && g.app_id == app_id)
    }

    /// Roles the user holds inside one app.
    pub fn roles_for(&self, user_id: &str, app_id: &str) -> BTreeSet<&str> {
        self.facts
            .groupings
            .iter()
            .filter(|g| g.user_id == user_id && g.app_id == app_id)
            .map(|g| g.role_id.as_str())
            .collect()
    }

    pub fn permissions_of<'a>(&'a self, role_id: &'a str) -> impl Iterator<Item = &'a PermissionFact> {
        self.facts
            .permissions
            .iter()
            .filter(move |p| p.role_id == role_id)
    }
}

/// Permission lines that survived the coarse match and share one catalog row.
struct MatchedLines<'a> {
    object_type: Option<ObjectType>,
    action_key: Option<&'static str>,
    role_ids: BTreeSet<&'a str>,
}

/// The policy store and enforcer. Cloneable and thread-safe.
#[derive(Clone)]
pub struct PolicyEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    adapter: Arc<dyn FactAdapter>,
    lookup: PermissionLookup,
    entitlement: EntitlementChecker,
    config: Arc<AclConfig>,
    catalog: &'static ActionCatalog,
    snapshot: RwLock<Arc<PolicySnapshot>>,
    generation: AtomicU64,
    // Serializes full loads and mutations; readers never take it.
    writer: AsyncMutex<()>,
}

impl PolicyEngine {
    /// Build an engine with an empty snapshot. Nothing is loaded until
    /// [`PolicyEngine::load_full`] runs.
    pub fn new(
        adapter: Arc<dyn FactAdapter>,
        service: Arc<dyn ManageService>,
        config: AclConfig,
    ) -> Self {
        let lookup = PermissionLookup::new(Arc::clone(&service), config.lookup_timeout());
        let entitlement = EntitlementChecker::new(service, config.lookup_timeout());
        PolicyEngine {
            inner: Arc::new(EngineInner {
                adapter,
                lookup,
                entitlement,
                config: Arc::new(config),
                catalog: catalog::global(),
                snapshot: RwLock::new(Arc::new(PolicySnapshot::new(
                    FactSet::default(),
                    0,
                    SnapshotScope::Full,
                ))),
                generation: AtomicU64::new(0),
                writer: AsyncMutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &AclConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &'static ActionCatalog {
        self.inner.catalog
    }

    /// Get the current full snapshot.
    pub fn current_snapshot(&self) -> Arc<PolicySnapshot> {
        // A poisoned lock still holds a whole snapshot; swaps are a single store.
        let guard = self
            .inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn current_version(&self) -> SnapshotVersion {
        self.current_snapshot().version().clone()
    }

    fn admin_timeout(&self) -> Duration {
        self.inner.config.admin_timeout()
    }

    fn publish(&self, facts: FactSet, phase: &'static str) -> SnapshotVersion {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(PolicySnapshot::new(facts, generation, SnapshotScope::Full));
        let version = snapshot.version().clone();
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
        debug!(
            event = "PolicyReload",
            phase,
            generation = version.generation,
            groupings = version.groupings,
            permissions = version.permissions
        );
        metrics::record_reload(&version);
        version
    }

    /// Apply a local edit to a copy of the current facts and publish it.
    fn publish_edit<F>(&self, phase: &'static str, edit: F) -> SnapshotVersion
    where
        F: FnOnce(&mut FactSet),
    {
        let mut facts = self.current_snapshot().facts().clone();
        edit(&mut facts);
        self.publish(facts, phase)
    }

    /// Replace the working snapshot with every fact in the authoritative
    /// store. On failure the previous snapshot stays in place.
    pub async fn load_full(&self) -> Result<SnapshotVersion, AclError> {
        let _writer = self.inner.writer.lock().await;
        self.load_full_locked().await
    }

    /// Like [`PolicyEngine::load_full`], but returns `Ok(None)` without
    /// loading when another load or mutation is in flight.
    pub async fn try_load_full(&self) -> Result<Option<SnapshotVersion>, AclError> {
        let Ok(_writer) = self.inner.writer.try_lock() else {
            debug!(event = "PolicyReload", phase = "Skipped");
            return Ok(None);
        };
        self.load_full_locked().await.map(Some)
    }

    async fn load_full_locked(&self) -> Result<SnapshotVersion, AclError> {
        let facts = bounded(
            "full policy load",
            self.admin_timeout(),
            self.inner.adapter.load_facts(None),
        )
        .await
        .inspect_err(|e| warn!(event = "PolicyReload", phase = "Failed", error = %e))?;
        Ok(self.publish(facts, "Full"))
    }

    /// Load only the facts one principal's request can touch. The result is
    /// private to the caller and never replaces the working snapshot.
    pub async fn load_filtered(&self, filter: &FactFilter) -> Result<Arc<PolicySnapshot>, AclError> {
        let facts = bounded(
            "filtered policy load",
            self.inner.config.lookup_timeout(),
            self.inner.adapter.load_facts(Some(filter)),
        )
        .await?;
        let snapshot = PolicySnapshot::new(
            facts,
            self.inner.generation.load(Ordering::SeqCst),
            SnapshotScope::Filtered,
        );
        debug!(
            event = "PolicyLoad",
            phase = "Filtered",
            user = %filter.user_id,
            role = %filter.role_id,
            app = %filter.app_id,
            groupings = snapshot.version.groupings,
            permissions = snapshot.version.permissions
        );
        Ok(Arc::new(snapshot))
    }

    pub async fn add_permission(
        &self,
        role_id: &str,
        path: &str,
        method: HttpMethod,
    ) -> Result<bool, AclError> {
        let fact = PermissionFact::new(role_id, path, method);
        let _writer = self.inner.writer.lock().await;
        let added = bounded(
            "add permission",
            self.admin_timeout(),
            self.inner.adapter.add_permission(&fact),
        )
        .await?;
        self.publish_edit("AddPermission", |facts| {
            facts.permissions.insert(fact);
        });
        Ok(added)
    }

    /// Add many permission facts under one writer lock and publish a single
    /// snapshot. Returns how many facts were new to the store.
    pub async fn add_permissions(&self, facts: &[PermissionFact]) -> Result<usize, AclError> {
        let _writer = self.inner.writer.lock().await;
        let mut added = 0;
        for fact in facts {
            if bounded(
                "add permission",
                self.admin_timeout(),
                self.inner.adapter.add_permission(fact),
            )
            .await?
            {
                added += 1;
            }
        }
        self.publish_edit("AddPermissions", |set| {
            set.permissions.extend(facts.iter().cloned());
        });
        Ok(added)
    }

    pub async fn clear_permissions(&self, role_id: &str) -> Result<usize, AclError> {
        let _writer = self.inner.writer.lock().await;
        let removed = bounded(
            "clear permissions",
            self.admin_timeout(),
            self.inner.adapter.remove_permissions(role_id),
        )
        .await?;
        self.publish_edit("ClearPermissions", |facts| {
            facts.permissions.retain(|p| p.role_id != role_id);
        });
        Ok(removed)
    }

    pub async fn add_grouping(
        &self,
        user_id: &str,
        role_id: &str,
        app_id: &str,
    ) -> Result<bool, AclError> {
        let fact = GroupingFact::new(user_id, role_id, app_id);
        let _writer = self.inner.writer.lock().await;
        let added = bounded(
            "add grouping",
            self.admin_timeout(),
            self.inner.adapter.add_grouping(&fact),
        )
        .await?;
        self.publish_edit("AddGrouping", |facts| {
            facts.groupings.insert(fact);
        });
        Ok(added)
    }

    pub async fn clear_groupings(&self, user_id: &str) -> Result<usize, AclError> {
        let _writer = self.inner.writer.lock().await;
        let removed = bounded(
            "clear groupings",
            self.admin_timeout(),
            self.inner.adapter.remove_groupings(user_id),
        )
        .await?;
        self.publish_edit("ClearGroupings", |facts| {
            facts.groupings.retain(|g| g.user_id != user_id);
        });
        Ok(removed)
    }

    /// Evaluate a request against the current full snapshot.
    pub async fn enforce(&self, request: &AuthzRequest) -> Decision {
        let snapshot = self.current_snapshot();
        self.enforce_with(&snapshot, request).await
    }

    /// Evaluate a request against a given snapshot, full or filtered.
    ///
    /// Permission lines count only for roles the user holds in the request's
    /// app. Of those lines, any one that grants is enough.
    pub async fn enforce_with(&self, snapshot: &PolicySnapshot, request: &AuthzRequest) -> Decision {
        let principal = &request.principal;
        let app_id = principal.current_app_id.as_str();

        let entry = self.inner.catalog.resolve_request(&request.path, request.method);
        if let Some(entry) = entry {
            if entry.object_type == ObjectType::Folder
                && self.inner.config.is_public_folder(&request.object_id)
            {
                return Decision::Allow(AllowReason::PublicFolder);
            }
        }

        let roles = snapshot.roles_for(&principal.user_id, app_id);
        let groups = self.match_lines(snapshot, &roles, &request.path, request.method);

        if groups.is_empty() {
            if !roles.is_empty() && self.inner.config.grouping_only == GroupingOnly::AllowIfGrouped {
                // A licensed object type is never opened by a grouping alone.
                let gate = entry.and_then(|e| self.inner.config.license_gate(e.object_type));
                if let Some(gate) = gate {
                    if !self
                        .inner
                        .entitlement
                        .is_entitled(&principal.tenant_id, &gate.allow_type)
                        .await
                    {
                        return Decision::Deny(DenyReason::NotEntitled);
                    }
                }
                return Decision::Allow(AllowReason::GroupingOnly);
            }
            return Decision::Deny(DenyReason::NoMatchingPolicy);
        }

        let mut denied = None;
        for lines in groups.values() {
            let decision = self.decide_lines(lines, request).await;
            if decision.is_allowed() {
                return decision;
            }
            if denied.is_none() {
                denied = Some(decision);
            }
        }
        denied.unwrap_or(Decision::Deny(DenyReason::NoMatchingPolicy))
    }

    /// Coarse match: permission lines of the user's roles whose template and
    /// method fit the request, grouped by the catalog row they stand for.
    fn match_lines<'a>(
        &self,
        snapshot: &'a PolicySnapshot,
        roles: &BTreeSet<&'a str>,
        path: &str,
        method: HttpMethod,
    ) -> BTreeMap<(String, HttpMethod), MatchedLines<'a>> {
        let mut groups: BTreeMap<(String, HttpMethod), MatchedLines<'a>> = BTreeMap::new();
        for &role in roles {
            for line in snapshot.permissions_of(role) {
                if line.method != method || !path_match::matches(path, &line.path) {
                    continue;
                }
                let entry = self.inner.catalog.resolve(&line.path, line.method);
                groups
                    .entry((line.path.clone(), line.method))
                    .or_insert_with(|| MatchedLines {
                        object_type: entry.map(|e| e.object_type),
                        action_key: entry.map(|e| e.action_key),
                        role_ids: BTreeSet::new(),
                    })
                    .role_ids
                    .insert(line.role_id.as_str());
            }
        }
        groups
    }

    async fn decide_lines(&self, lines: &MatchedLines<'_>, request: &AuthzRequest) -> Decision {
        let principal = &request.principal;

        let Some(object_type) = lines.object_type else {
            return Decision::Deny(DenyReason::NoAction);
        };

        if let Some(gate) = self.inner.config.license_gate(object_type) {
            return if self
                .inner
                .entitlement
                .is_entitled(&principal.tenant_id, &gate.allow_type)
                .await
            {
                Decision::Allow(AllowReason::Entitled)
            } else {
                Decision::Deny(DenyReason::NotEntitled)
            };
        }

        let Some(action_key) = lines.action_key else {
            return Decision::Deny(DenyReason::NoAction);
        };

        let role_ids: Vec<String> = lines.role_ids.iter().map(|r| r.to_string()).collect();
        let check = ActionCheck {
            tenant_id: &principal.tenant_id,
            role_ids: &role_ids,
            app_id: &principal.current_app_id,
            object_type,
            object_id: &request.object_id,
            action_key,
        };
        match self.inner.lookup.try_has_action(&check).await {
            Ok(true) => Decision::Allow(AllowReason::FineGrained),
            Ok(false) => Decision::Deny(DenyReason::LookupDenied),
            Err(e) => {
                warn!(
                    event = "Enforce",
                    phase = "LookupFailed",
                    user = %principal.user_id,
                    tenant = %principal.tenant_id,
                    object = %request.object_id,
                    action = action_key,
                    error = %e
                );
                Decision::Deny(DenyReason::LookupFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests;
