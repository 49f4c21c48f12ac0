//! Engine configuration.
//!
//! Defaults come from the `#[serde(default = ...)]` functions below, a config
//! file (any format the `config` crate understands) overrides them, and
//! `ACL__*` environment variables override both, e.g.
//! `ACL__LOOKUP_TIMEOUT_MS=1500`.

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::AclError;
use crate::types::ObjectType;

/// What to do when the principal is grouped into the app but no permission
/// fact covers the requested route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupingOnly {
    #[default]
    Deny,
    AllowIfGrouped,
}

/// One license-gated domain: requests for `object_type` are decided by the
/// tenant's subscription including an allow entry of `allow_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseGate {
    pub object_type: ObjectType,
    pub allow_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclConfig {
    /// Safety-net full reload period.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Budget for each remote call made while authorizing a request.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Budget for full loads and administrative fact-store writes.
    #[serde(default = "default_admin_timeout_ms")]
    pub admin_timeout_ms: u64,

    #[serde(default = "default_invalidation_topic")]
    pub invalidation_topic: String,

    /// Folder ids every authenticated user of a tenant may use.
    #[serde(default = "default_public_folder_ids")]
    pub public_folder_ids: Vec<String>,

    /// Tenants whose principals are never checked.
    #[serde(default = "default_system_tenants")]
    pub system_tenants: Vec<String>,

    #[serde(default = "default_license_gates")]
    pub license_gates: Vec<LicenseGate>,

    #[serde(default)]
    pub grouping_only: GroupingOnly,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            admin_timeout_ms: default_admin_timeout_ms(),
            invalidation_topic: default_invalidation_topic(),
            public_folder_ids: default_public_folder_ids(),
            system_tenants: default_system_tenants(),
            license_gates: default_license_gates(),
            grouping_only: GroupingOnly::default(),
        }
    }
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}

fn default_lookup_timeout_ms() -> u64 {
    2_000
}

fn default_admin_timeout_ms() -> u64 {
    120_000
}

fn default_invalidation_topic() -> String {
    "acl.refresh".to_string()
}

fn default_public_folder_ids() -> Vec<String> {
    ["public", "company", "user"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_system_tenants() -> Vec<String> {
    vec!["system".to_string()]
}

fn default_license_gates() -> Vec<LicenseGate> {
    vec![LicenseGate {
        object_type: ObjectType::Journal,
        allow_type: "journal".to_string(),
    }]
}

impl AclConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_timeout_ms)
    }

    pub fn is_public_folder(&self, object_id: &str) -> bool {
        self.public_folder_ids.iter().any(|id| id == object_id)
    }

    pub fn is_system_tenant(&self, tenant_id: &str) -> bool {
        self.system_tenants.iter().any(|t| t == tenant_id)
    }

    pub fn license_gate(&self, object_type: ObjectType) -> Option<&LicenseGate> {
        self.license_gates
            .iter()
            .find(|g| g.object_type == object_type)
    }

    /// Load from an optional file, then apply `ACL__*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AclError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("ACL").separator("__").try_parsing(true))
            .build()?;
        let cfg: AclConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, AclError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        let cfg: AclConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AclError> {
        if self.refresh_interval_ms == 0 {
            return Err(AclError::Config("refresh_interval_ms must be positive".into()));
        }
        if self.lookup_timeout_ms == 0 || self.admin_timeout_ms == 0 {
            return Err(AclError::Config("timeouts must be positive".into()));
        }
        if self.invalidation_topic.trim().is_empty() {
            return Err(AclError::Config("invalidation_topic must not be empty".into()));
        }
        Ok(())
    }
}
