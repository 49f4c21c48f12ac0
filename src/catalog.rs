//! The fixed action catalog: which `(path template, method)` pairs carry
//! fine-grained action semantics, and which action and object type each one
//! stands for.
//!
//! Pairs that are not in the catalog are not protected by per-object checks.

use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use crate::error::AclError;
use crate::path_match::{self, PathTemplate};
use crate::types::{HttpMethod, ObjectType};

use crate::types::HttpMethod::{Delete, Get, Patch, Post, Put};
use crate::types::ObjectType::{Datastore, Folder, Journal, Report};

const WEB: &str = "/internal/api/v1/web";

/// `(template below WEB, method, action key, object type)`
const ROUTES: &[(&str, HttpMethod, &str, ObjectType)] = &[
    ("/item/datastores/:d_id/items/:i_id/contract", Put, "contract_update", Datastore),
    ("/item/datastores/:d_id/items/:i_id/terminate", Put, "midway_cancel", Datastore),
    ("/item/datastores/:d_id/items/:i_id/debt", Put, "estimate_update", Datastore),
    ("/item/datastores/:d_id/items/:i_id/contractExpire", Put, "contract_expire", Datastore),
    ("/item/datastores/:d_id/items/print", Post, "pdf", Datastore),
    ("/item/clear/datastores/:d_id/items", Delete, "clear", Datastore),
    ("/item/datastores/:d_id/items", Patch, "group", Datastore),
    ("/item/datastores/:d_id/items/owners", Post, "group", Datastore),
    ("/history/datastores/:d_id/histories", Get, "history", Datastore),
    ("/history/datastores/:d_id/download", Get, "history", Datastore),
    ("/item/datastores/:d_id/items/search", Post, "read", Datastore),
    ("/item/datastores/:d_id/items/:i_id", Get, "read", Datastore),
    ("/item/datastores/:d_id/items", Post, "insert", Datastore),
    ("/item/datastores/:d_id/items/:i_id", Put, "update", Datastore),
    ("/item/datastores/:d_id/items/:i_id", Delete, "delete", Datastore),
    ("/mapping/datastores/:d_id/upload", Post, "mapping_upload", Datastore),
    ("/mapping/datastores/:d_id/download", Post, "mapping_download", Datastore),
    ("/item/import/image/datastores/:d_id/items", Post, "image", Datastore),
    ("/item/import/csv/datastores/:d_id/items", Post, "csv", Datastore),
    ("/item/import/csv/datastores/:d_id/check/items", Post, "inventory", Datastore),
    ("/item/datastores/:d_id/prs/download", Post, "principal_repayment", Datastore),
    ("/item/datastores/:d_id/items/download", Post, "data", Datastore),
    ("/report/reports/:rp_id", Get, "read", Report),
    ("/report/reports/:rp_id/data", Post, "read", Report),
    ("/report/gen/reports/:rp_id/data", Post, "read", Report),
    ("/report/reports/:rp_id/download", Post, "read", Report),
    ("/file/folders/:fo_id/files", Get, "read", Folder),
    ("/file/download/folders/:fo_id/files/:file_id", Get, "read", Folder),
    ("/file/folders/:fo_id/upload", Post, "write", Folder),
    ("/file/folders/:fo_id/files/:file_id", Delete, "delete", Folder),
    ("/journal/journals", Get, "read", Journal),
    ("/journal/journals/:j_id", Get, "read", Journal),
    ("/journal/journals", Post, "read", Journal),
    ("/journal/compute/journals", Get, "read", Journal),
    ("/journal/journals/:j_id", Put, "read", Journal),
];

/// One catalog row.
#[derive(Debug, Clone, Serialize)]
pub struct ActionMapping {
    #[serde(serialize_with = "serialize_template")]
    pub template: Arc<PathTemplate>,
    pub method: HttpMethod,
    pub action_key: &'static str,
    pub object_type: ObjectType,
}

fn serialize_template<S: serde::Serializer>(
    t: &Arc<PathTemplate>,
    ser: S,
) -> Result<S::Ok, S::Error> {
    ser.serialize_str(t.as_str())
}

impl ActionMapping {
    pub fn path(&self) -> &str {
        self.template.as_str()
    }
}

/// The compiled, immutable catalog.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    entries: Vec<ActionMapping>,
}

impl ActionCatalog {
    /// Compile the built-in route table.
    pub fn builtin() -> Result<Self, AclError> {
        Self::from_rows(
            ROUTES
                .iter()
                .map(|(path, method, key, ty)| (format!("{WEB}{path}"), *method, *key, *ty)),
        )
    }

    pub fn from_rows<I>(rows: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = (String, HttpMethod, &'static str, ObjectType)>,
    {
        let entries = rows
            .into_iter()
            .map(|(path, method, action_key, object_type)| {
                Ok(ActionMapping {
                    template: path_match::compiled(&path)?,
                    method,
                    action_key,
                    object_type,
                })
            })
            .collect::<Result<Vec<_>, AclError>>()?;
        debug!(event = "Catalog", phase = "Compiled", entries = entries.len());
        Ok(ActionCatalog { entries })
    }

    pub fn entries(&self) -> &[ActionMapping] {
        &self.entries
    }

    /// Look up an exact `(template, method)` pair.
    pub fn resolve(&self, template: &str, method: HttpMethod) -> Option<&ActionMapping> {
        self.entries
            .iter()
            .find(|e| e.method == method && e.path() == template)
    }

    /// Find the entry whose template matches a concrete request path.
    ///
    /// When several templates match, the one with the fewest parameter
    /// segments wins, then table order.
    pub fn resolve_request(&self, path: &str, method: HttpMethod) -> Option<&ActionMapping> {
        self.entries
            .iter()
            .filter(|e| e.method == method && e.template.is_match(path))
            .min_by_key(|e| e.template.param_count())
    }

    pub fn is_protected(&self, path: &str, method: HttpMethod) -> bool {
        self.resolve_request(path, method).is_some()
    }

    /// Inverse lookup: every route an enabled action key grants.
    pub fn templates_for(
        &self,
        object_type: ObjectType,
        action_key: &str,
    ) -> impl Iterator<Item = &ActionMapping> {
        self.entries
            .iter()
            .filter(move |e| e.object_type == object_type && e.action_key == action_key)
    }

    /// Every action key known for an object type, sorted.
    pub fn action_keys(&self, object_type: ObjectType) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.object_type == object_type)
            .map(|e| e.action_key)
            .unique()
            .sorted()
            .collect()
    }

    /// The object id carried in a concrete request path, if it is catalogued
    /// and its object type names an id parameter.
    pub fn object_id_from_path(&self, path: &str, method: HttpMethod) -> Option<String> {
        let entry = self.resolve_request(path, method)?;
        let param = entry.object_type.id_param()?;
        entry.template.captures(path)?.remove(param)
    }
}

static CATALOG: Lazy<ActionCatalog> = Lazy::new(|| {
    // ROUTES is static; test_builtin_catalog_compiles keeps it valid.
    ActionCatalog::builtin().unwrap_or_else(|e| panic!("built-in action catalog is invalid: {e}"))
});

/// The process-wide built-in catalog.
pub fn global() -> &'static ActionCatalog {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn web(p: &str) -> String {
        format!("{WEB}{p}")
    }

    #[test]
    fn test_builtin_catalog_compiles() {
        let catalog = ActionCatalog::builtin().unwrap();
        assert_eq!(catalog.entries().len(), ROUTES.len());
    }

    #[test]
    fn test_resolve_exact_template() {
        let entry = global()
            .resolve(&web("/item/datastores/:d_id/items/search"), Post)
            .unwrap();
        assert_eq!(entry.action_key, "read");
        assert_eq!(entry.object_type, Datastore);
        assert!(global().resolve(&web("/item/datastores/:d_id/items/search"), Get).is_none());
    }

    #[parameterized(
        search = { "/item/datastores/D/items/search", Post, Some(("read", Datastore)) },
        get_item = { "/item/datastores/D/items/I", Get, Some(("read", Datastore)) },
        insert = { "/item/datastores/D/items", Post, Some(("insert", Datastore)) },
        owners = { "/item/datastores/D/items/owners", Post, Some(("group", Datastore)) },
        history = { "/history/datastores/D/download", Get, Some(("history", Datastore)) },
        report = { "/report/gen/reports/R/data", Post, Some(("read", Report)) },
        folder_upload = { "/file/folders/F/upload", Post, Some(("write", Folder)) },
        journal = { "/journal/journals/J", Put, Some(("read", Journal)) },
        dashboard = { "/dashboard/dashboards", Get, None },
        wrong_method = { "/report/reports/R/data", Get, None },
        partial_segment = { "/item/datastores/D/items2", Post, None },
    )]
    fn test_resolve_request(
        path: &str,
        method: HttpMethod,
        expected: Option<(&str, ObjectType)>,
    ) {
        let got = global()
            .resolve_request(&web(path), method)
            .map(|e| (e.action_key, e.object_type));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_most_specific_template_wins() {
        let catalog = ActionCatalog::from_rows(vec![
            (web("/x/:a/:b"), Get, "generic", Datastore),
            (web("/x/:a/fixed"), Get, "specific", Datastore),
        ])
        .unwrap();
        let entry = catalog.resolve_request(&web("/x/1/fixed"), Get).unwrap();
        assert_eq!(entry.action_key, "specific");
        let entry = catalog.resolve_request(&web("/x/1/other"), Get).unwrap();
        assert_eq!(entry.action_key, "generic");
    }

    #[test]
    fn test_templates_for_group_action() {
        let paths: Vec<(String, HttpMethod)> = global()
            .templates_for(Datastore, "group")
            .map(|e| (e.path().to_string(), e.method))
            .collect();
        assert_eq!(
            paths,
            vec![
                (web("/item/datastores/:d_id/items"), Patch),
                (web("/item/datastores/:d_id/items/owners"), Post),
            ]
        );
        assert_eq!(global().templates_for(Report, "group").count(), 0);
    }

    #[test]
    fn test_action_keys_are_unique_and_sorted() {
        assert_eq!(global().action_keys(Folder), vec!["delete", "read", "write"]);
        assert_eq!(global().action_keys(Report), vec!["read"]);
    }

    #[parameterized(
        datastore = { "/item/datastores/D7/items/I1", Get, Some("D7") },
        report = { "/report/reports/R2/download", Post, Some("R2") },
        folder = { "/file/folders/company/files", Get, Some("company") },
        journal_has_no_object = { "/journal/journals", Get, None },
        uncatalogued = { "/user/users", Get, None },
    )]
    fn test_object_id_from_path(path: &str, method: HttpMethod, expected: Option<&str>) {
        assert_eq!(
            global().object_id_from_path(&web(path), method).as_deref(),
            expected
        );
    }

    #[test]
    fn test_catalog_rows_serialize_with_template_text() {
        let entry = global().resolve(&web("/report/reports/:rp_id"), Get).unwrap();
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["template"], serde_json::json!(web("/report/reports/:rp_id")));
        assert_eq!(json["object_type"], serde_json::json!("report"));
        assert_eq!(json["method"], serde_json::json!("GET"));
    }
}
