//! The authenticated caller, as handed over by the identity layer.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AclError;

/// A user acting inside one tenant ("database") and one app.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct Principal {
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub current_app_id: String,
}

impl Principal {
    pub fn new<U: Into<String>, T: Into<String>, A: Into<String>>(
        user_id: U,
        tenant_id: T,
        role_ids: Vec<String>,
        current_app_id: A,
    ) -> Self {
        Principal {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            role_ids,
            current_app_id: current_app_id.into(),
        }
    }

    /// The role used to scope the filtered snapshot.
    ///
    /// Fails when the identity layer handed over a principal without roles.
    pub fn primary_role(&self) -> Result<&str, AclError> {
        self.role_ids
            .first()
            .map(String::as_str)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                AclError::Unauthorized(format!("principal '{}' carries no roles", self.user_id))
            })
    }

    pub(crate) fn validate(&self) -> Result<(), AclError> {
        if self.user_id.is_empty() {
            return Err(AclError::Unauthorized("principal has no user id".to_string()));
        }
        if self.tenant_id.is_empty() {
            return Err(AclError::Unauthorized(format!(
                "principal '{}' has no tenant",
                self.user_id
            )));
        }
        Ok(())
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}@{}/{}[{}]",
            self.user_id,
            self.tenant_id,
            self.current_app_id,
            self.role_ids.join(",")
        )
    }
}
