const SEARCH: &str = "/item/datastores/:d_id/items/search";

#[tokio::test]
async fn test_public_folder_needs_no_facts() {
    let f = fixture();
    for folder in ["public", "company", "user"] {
        let req = request("u1", &["r1"], "a1", &format!("/file/folders/{folder}/files"), HttpMethod::Get, folder);
        assert_eq!(f.engine.enforce(&req).await, Allow(AllowReason::PublicFolder));
    }
    assert_eq!(f.service.calls(), 0);
}

#[tokio::test]
async fn test_no_grouping_no_match() {
    let f = fixture();
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NoMatchingPolicy));
    assert_eq!(f.service.calls(), 0);
}

#[tokio::test]
async fn test_grouping_in_other_app_does_not_count() {
    let f = fixture();
    f.group("u1", "r1", "a2").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("read", true)]);
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NoMatchingPolicy));
}

#[parameterized(
    deny_by_default = { GroupingOnly::Deny, Deny(DenyReason::NoMatchingPolicy) },
    allow_if_grouped = { GroupingOnly::AllowIfGrouped, Allow(AllowReason::GroupingOnly) },
)]
#[test_macro(tokio::test)]
async fn test_grouping_without_permission(policy: GroupingOnly, expected: Decision) {
    let f = fixture_with(AclConfig {
        grouping_only: policy,
        ..AclConfig::default()
    });
    f.group("u1", "r1", "a1").await;
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, expected);
}

#[parameterized(
    granted = { &[("read", true)], Allow(AllowReason::FineGrained) },
    disabled = { &[("read", false)], Deny(DenyReason::LookupDenied) },
    other_action = { &[("delete", true)], Deny(DenyReason::LookupDenied) },
    nothing_stored = { &[], Deny(DenyReason::LookupDenied) },
)]
#[test_macro(tokio::test)]
async fn test_fine_grained_lookup(actions: &[(&str, bool)], expected: Decision) {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    if !actions.is_empty() {
        f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", actions);
    }
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, expected);
}

#[tokio::test]
async fn test_lookup_is_object_scoped() {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("read", true)]);
    let req = request("u1", &["r1"], "a1", "/item/datastores/E/items/search", HttpMethod::Post, "E");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::LookupDenied));
}

#[tokio::test]
async fn test_lookup_failure_denies() {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("read", true)]);
    f.service.set_failing(true);
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::LookupFailed));
}

#[tokio::test]
async fn test_any_grouped_role_may_grant() {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.group("u1", "r2", "a1").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    f.permit("r2", SEARCH, HttpMethod::Post).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("read", false)]);
    f.grant(Some("a1"), "r2", ObjectType::Datastore, "D", &[("read", true)]);
    let req = request("u1", &["r1", "r2"], "a1", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, Allow(AllowReason::FineGrained));
    // Both roles went out in a single lookup.
    assert_eq!(f.service.calls(), 1);
}

#[parameterized(
    same_app = { "a1" },
    other_app = { "a2" },
)]
#[test_macro(tokio::test)]
async fn test_folder_permissions_are_tenant_common(app: &str) {
    let f = fixture();
    f.group("u1", "r1", app).await;
    f.permit("r1", "/file/folders/:fo_id/files", HttpMethod::Get).await;
    f.grant(None, "r1", ObjectType::Folder, "F", &[("read", true)]);
    let req = request("u1", &["r1"], app, "/file/folders/F/files", HttpMethod::Get, "F");
    assert_eq!(f.engine.enforce(&req).await, Allow(AllowReason::FineGrained));
}

#[tokio::test]
async fn test_datastore_permissions_are_app_scoped() {
    let f = fixture();
    f.group("u1", "r1", "a2").await;
    f.permit("r1", SEARCH, HttpMethod::Post).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("read", true)]);
    let req = request("u1", &["r1"], "a2", "/item/datastores/D/items/search", HttpMethod::Post, "D");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::LookupDenied));
}

#[tokio::test]
async fn test_uncatalogued_permission_line_has_no_action() {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.engine
        .add_permission("r1", "/custom/widgets/:w_id", HttpMethod::Get)
        .await
        .unwrap();
    let req = AuthzRequest::new(
        Principal::new("u1", TENANT, vec!["r1".into()], "a1"),
        "/custom/widgets/W",
        HttpMethod::Get,
        "W",
    );
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NoAction));
    assert_eq!(f.service.calls(), 0);
}

#[tokio::test]
async fn test_method_must_match() {
    let f = fixture();
    f.group("u1", "r1", "a1").await;
    f.permit("r1", "/item/datastores/:d_id/items/:i_id", HttpMethod::Get).await;
    f.grant(Some("a1"), "r1", ObjectType::Datastore, "D", &[("delete", true)]);
    let req = request("u1", &["r1"], "a1", "/item/datastores/D/items/I", HttpMethod::Delete, "D");
    assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NoMatchingPolicy));
}

mod license_gate {
    use super::*;
    use crate::remote::{ActionRecord, AllowAction, AllowRecord};

    fn entitle(f: &Fixture, level_allows: &[&str]) {
        f.service.add_customer(TENANT, "basic").unwrap();
        f.service.add_level("basic", level_allows).unwrap();
        f.service
            .add_allow(AllowRecord {
                allow_id: "journal-read".into(),
                allow_type: "journal".into(),
                actions: vec![AllowAction {
                    api_key: "read".into(),
                    group_key: "journal".into(),
                }],
            })
            .unwrap();
        f.service
            .add_action(ActionRecord {
                action_key: "read".into(),
                action_object: "journal".into(),
                action_group: "journal".into(),
            })
            .unwrap();
    }

    async fn journal_fixture() -> Fixture {
        let f = fixture();
        f.group("u1", "r1", "a1").await;
        f.permit("r1", "/journal/journals", HttpMethod::Get).await;
        f
    }

    #[tokio::test]
    async fn test_entitled_tenant_is_allowed() {
        let f = journal_fixture().await;
        entitle(&f, &["journal-read"]);
        let req = request("u1", &["r1"], "a1", "/journal/journals", HttpMethod::Get, "");
        assert_eq!(f.engine.enforce(&req).await, Allow(AllowReason::Entitled));
    }

    #[tokio::test]
    async fn test_level_without_journal_allow_is_denied() {
        let f = journal_fixture().await;
        entitle(&f, &[]);
        // Object permissions do not matter for a gated domain.
        f.grant(Some("a1"), "r1", ObjectType::Journal, "", &[("read", true)]);
        let req = request("u1", &["r1"], "a1", "/journal/journals", HttpMethod::Get, "");
        assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NotEntitled));
    }

    #[tokio::test]
    async fn test_entitlement_failure_is_denied() {
        let f = journal_fixture().await;
        entitle(&f, &["journal-read"]);
        f.service.set_failing(true);
        let req = request("u1", &["r1"], "a1", "/journal/journals", HttpMethod::Get, "");
        assert_eq!(f.engine.enforce(&req).await, Deny(DenyReason::NotEntitled));
    }

    #[parameterized(
        not_entitled = { &[], Deny(DenyReason::NotEntitled) },
        entitled = { &["journal-read"], Allow(AllowReason::GroupingOnly) },
    )]
    #[test_macro(tokio::test)]
    async fn test_grouping_only_still_checks_license(level_allows: &[&str], expected: Decision) {
        let f = fixture_with(AclConfig {
            grouping_only: GroupingOnly::AllowIfGrouped,
            ..AclConfig::default()
        });
        f.group("u1", "r1", "a1").await;
        entitle(&f, level_allows);
        let req = request("u1", &["r1"], "a1", "/journal/journals", HttpMethod::Get, "");
        assert_eq!(f.engine.enforce(&req).await, expected);
    }
}
