//! Authorization request type.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::method::HttpMethod;
use super::principal::Principal;
use crate::catalog;

/// One incoming API call, reduced to what the authorizer needs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct AuthzRequest {
    pub principal: Principal,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub object_id: String,
}

impl AuthzRequest {
    pub fn new<P: Into<String>, O: Into<String>>(
        principal: Principal,
        path: P,
        method: HttpMethod,
        object_id: O,
    ) -> Self {
        AuthzRequest {
            principal,
            path: path.into(),
            method,
            object_id: object_id.into(),
        }
    }

    /// Build a request whose object id is taken from the path itself.
    ///
    /// Paths that are not catalogued get an empty object id.
    pub fn from_path<P: Into<String>>(principal: Principal, path: P, method: HttpMethod) -> Self {
        let path = path.into();
        let object_id = catalog::global()
            .object_id_from_path(&path, method)
            .unwrap_or_default();
        AuthzRequest {
            principal,
            path,
            method,
            object_id,
        }
    }
}
