//! The authoritative fact store behind the engine.
//!
//! The engine never owns facts; it caches what a [`FactAdapter`] returns. Any
//! document or relational store can sit behind the trait as long as it keeps
//! set semantics for both fact shapes.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::AclError;
use crate::types::{FactFilter, FactSet, GroupingFact, PermissionFact};

#[async_trait]
pub trait FactAdapter: Send + Sync {
    /// Every fact, or only those a filter selects.
    async fn load_facts(&self, filter: Option<&FactFilter>) -> Result<FactSet, AclError>;

    /// Returns `false` when the fact was already present.
    async fn add_permission(&self, fact: &PermissionFact) -> Result<bool, AclError>;

    /// Remove every permission fact of a role, returning how many went.
    async fn remove_permissions(&self, role_id: &str) -> Result<usize, AclError>;

    async fn add_grouping(&self, fact: &GroupingFact) -> Result<bool, AclError>;

    /// Remove every grouping fact of a user, returning how many went.
    async fn remove_groupings(&self, user_id: &str) -> Result<usize, AclError>;
}

/// Facts held in process memory.
///
/// Two engines handed the same `Arc<MemoryAdapter>` behave like two service
/// instances sharing one database.
#[derive(Default)]
pub struct MemoryAdapter {
    facts: RwLock<FactSet>,
    loads: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: FactSet) -> Self {
        MemoryAdapter {
            facts: RwLock::new(facts),
            ..Default::default()
        }
    }

    /// Number of `load_facts` calls served, full or filtered.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AclError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AclError::Store("memory adapter is unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FactAdapter for MemoryAdapter {
    async fn load_facts(&self, filter: Option<&FactFilter>) -> Result<FactSet, AclError> {
        self.check()?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        let facts = self.facts.read()?;
        Ok(match filter {
            Some(filter) => facts.filtered(filter),
            None => facts.clone(),
        })
    }

    async fn add_permission(&self, fact: &PermissionFact) -> Result<bool, AclError> {
        self.check()?;
        Ok(self.facts.write()?.permissions.insert(fact.clone()))
    }

    async fn remove_permissions(&self, role_id: &str) -> Result<usize, AclError> {
        self.check()?;
        let mut facts = self.facts.write()?;
        let before = facts.permissions.len();
        facts.permissions.retain(|p| p.role_id != role_id);
        let removed = before - facts.permissions.len();
        debug!(event = "Adapter", phase = "RemovePermissions", role = role_id, removed);
        Ok(removed)
    }

    async fn add_grouping(&self, fact: &GroupingFact) -> Result<bool, AclError> {
        self.check()?;
        Ok(self.facts.write()?.groupings.insert(fact.clone()))
    }

    async fn remove_groupings(&self, user_id: &str) -> Result<usize, AclError> {
        self.check()?;
        let mut facts = self.facts.write()?;
        let before = facts.groupings.len();
        facts.groupings.retain(|g| g.user_id != user_id);
        let removed = before - facts.groupings.len();
        debug!(event = "Adapter", phase = "RemoveGroupings", user = user_id, removed);
        Ok(removed)
    }
}
