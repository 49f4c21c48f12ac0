//! Coarse resource categories that decide the permission namespace.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// The resource category an action operates on.
///
/// `Folder` permissions are tenant-common: they are shared across all apps of a
/// tenant. Every other category is scoped to one app.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectType {
    Datastore,
    Report,
    Folder,
    Journal,
}

impl ObjectType {
    /// Name of the route parameter that carries the object id, if any.
    pub fn id_param(&self) -> Option<&'static str> {
        match self {
            ObjectType::Datastore => Some("d_id"),
            ObjectType::Report => Some("rp_id"),
            ObjectType::Folder => Some("fo_id"),
            ObjectType::Journal => None,
        }
    }

    pub fn is_tenant_common(&self) -> bool {
        matches!(self, ObjectType::Folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_object_type_round_trips_through_str() {
        for ty in ObjectType::iter() {
            assert_eq!(ObjectType::from_str(ty.as_ref()).unwrap(), ty);
        }
    }

    #[test]
    fn test_only_folders_are_tenant_common() {
        let common: Vec<ObjectType> = ObjectType::iter().filter(|t| t.is_tenant_common()).collect();
        assert_eq!(common, vec![ObjectType::Folder]);
    }

    #[test]
    fn test_id_params() {
        assert_eq!(ObjectType::Datastore.id_param(), Some("d_id"));
        assert_eq!(ObjectType::Report.id_param(), Some("rp_id"));
        assert_eq!(ObjectType::Folder.id_param(), Some("fo_id"));
        assert_eq!(ObjectType::Journal.id_param(), None);
    }
}
