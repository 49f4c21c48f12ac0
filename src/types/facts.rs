//! The two fact shapes held by the authoritative store.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::method::HttpMethod;

/// "user has role within app".
#[derive(
    Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct GroupingFact {
    pub user_id: String,
    pub role_id: String,
    pub app_id: String,
}

impl GroupingFact {
    pub fn new<U: Into<String>, R: Into<String>, A: Into<String>>(
        user_id: U,
        role_id: R,
        app_id: A,
    ) -> Self {
        GroupingFact {
            user_id: user_id.into(),
            role_id: role_id.into(),
            app_id: app_id.into(),
        }
    }
}

impl Display for GroupingFact {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "g, {}, {}, {}", self.user_id, self.role_id, self.app_id)
    }
}

/// "role may call this path template with this verb".
#[derive(
    Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct PermissionFact {
    pub role_id: String,
    pub path: String,
    pub method: HttpMethod,
}

impl PermissionFact {
    pub fn new<R: Into<String>, P: Into<String>>(role_id: R, path: P, method: HttpMethod) -> Self {
        PermissionFact {
            role_id: role_id.into(),
            path: path.into(),
            method,
        }
    }
}

impl Display for PermissionFact {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "p, {}, {}, {}", self.role_id, self.path, self.method)
    }
}

/// A set of facts with set semantics: inserting a duplicate is a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactSet {
    pub groupings: BTreeSet<GroupingFact>,
    pub permissions: BTreeSet<PermissionFact>,
}

impl FactSet {
    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty() && self.permissions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groupings.len() + self.permissions.len()
    }

    /// Keep only the facts a filter selects.
    pub fn filtered(&self, filter: &FactFilter) -> FactSet {
        FactSet {
            groupings: self
                .groupings
                .iter()
                .filter(|g| filter.selects_grouping(g))
                .cloned()
                .collect(),
            permissions: self
                .permissions
                .iter()
                .filter(|p| filter.selects_permission(p))
                .cloned()
                .collect(),
        }
    }
}

/// The per-request load query: groupings of `(user, app)` OR permissions of
/// `(role, template, method)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FactFilter {
    pub user_id: String,
    pub app_id: String,
    pub role_id: String,
    pub path: String,
    pub method: HttpMethod,
}

impl FactFilter {
    pub fn selects_grouping(&self, g: &GroupingFact) -> bool {
        g.user_id == self.user_id && g.app_id == self.app_id
    }

    pub fn selects_permission(&self, p: &PermissionFact) -> bool {
        p.role_id == self.role_id && p.path == self.path && p.method == self.method
    }
}
