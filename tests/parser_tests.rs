use kc2spicedb::diagnostics::WarningKind;
use kc2spicedb::error::ParseError;
use kc2spicedb::parser::realm::RoleRef;
use kc2spicedb::parser::realm_parser::{parse_realm, RealmParser};
use kc2spicedb::parser::structure::JsonSchemaValidator;
use serde_json::json;

mod support;

fn malformed_message(raw: &str) -> String {
    match parse_realm(raw) {
        Err(ParseError::MalformedInput(message)) => message,
        other => panic!("expected MalformedInput, got {other:?}"),
    }
}

#[test]
fn parses_acme_in_declaration_order() {
    let model = support::parse_fixture("acme");

    assert_eq!(model.name, "acme");
    let roles: Vec<&str> = model.realm_roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(roles, vec!["viewer", "editor", "admin"]);
    assert_eq!(
        model.realm_roles[0].description.as_deref(),
        Some("Read-only access")
    );

    assert_eq!(model.composites.len(), 1);
    assert_eq!(model.composites[0].role, RoleRef::realm("admin"));
    assert_eq!(
        model.composites[0].members,
        vec![RoleRef::realm("viewer"), RoleRef::realm("editor")]
    );

    let groups: Vec<(&str, Option<&str>)> = model
        .groups
        .iter()
        .map(|g| (g.path.as_str(), g.parent.as_deref()))
        .collect();
    assert_eq!(groups, vec![("/eng", None), ("/eng/eng-leads", Some("/eng"))]);
}

#[test]
fn client_roles_keep_file_order_and_scope() {
    let model = support::parse_fixture("clients");

    let clients: Vec<&str> = model.clients.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(clients, vec!["billing", "storefront"]);
    assert_eq!(model.client_role_count(), 3);

    let staff = model
        .composite(&RoleRef::realm("staff"))
        .expect("staff should be composite");
    assert_eq!(
        staff.members,
        vec![
            RoleRef::realm("customer"),
            RoleRef::client("billing", "read-invoices")
        ]
    );

    let finance = model.group("/finance").expect("finance group");
    assert_eq!(
        finance.role_mappings,
        vec![
            RoleRef::realm("staff"),
            RoleRef::client("billing", "manage-invoices")
        ]
    );
    let auditors = model.group("/finance/auditors").expect("derived subgroup path");
    assert_eq!(auditors.parent.as_deref(), Some("/finance"));
}

#[test]
fn realm_name_falls_back_to_id() {
    let model = parse_realm(r#"{"id": "legacy", "roles": {}}"#).expect("id should name the realm");
    assert_eq!(model.name, "legacy");
    assert!(model.realm_roles.is_empty());
    assert!(model.groups.is_empty());
}

#[test]
fn missing_realm_name_is_malformed() {
    let message = malformed_message(r#"{"roles": {}}"#);
    assert!(message.contains("`realm`"), "got: {message}");

    let message = malformed_message(r#"{"realm": 7, "roles": {}}"#);
    assert!(message.contains("must be a string"), "got: {message}");

    let message = malformed_message(r#"{"realm": "  ", "roles": {}}"#);
    assert!(message.contains("must not be empty"), "got: {message}");
}

#[test]
fn roles_container_is_required_and_must_be_an_object() {
    let message = malformed_message(r#"{"realm": "acme"}"#);
    assert!(message.contains("`roles`"), "got: {message}");

    let message = malformed_message(r#"{"realm": "acme", "roles": []}"#);
    assert!(message.contains("must be an object"), "got: {message}");
}

#[test]
fn non_object_documents_are_malformed() {
    assert!(malformed_message("not json").contains("invalid JSON"));
    assert!(malformed_message("[1, 2]").contains("JSON object"));
}

#[test]
fn role_names_are_unique_per_scope() {
    let message = malformed_message(
        r#"{"realm": "acme", "roles": {"realm": [{"name": "viewer"}, {"name": "viewer"}]}}"#,
    );
    assert!(message.contains("\"viewer\" is declared twice"), "got: {message}");

    // The same name in two clients (or realm and client) is fine.
    let model = parse_realm(
        r#"{"realm": "acme", "roles": {
            "realm": [{"name": "read"}],
            "client": {"a": [{"name": "read"}], "b": [{"name": "read"}]}
        }}"#,
    )
    .expect("names are scoped");
    assert_eq!(model.roles().count(), 3);
}

#[test]
fn roles_need_a_name() {
    let message = malformed_message(r#"{"realm": "acme", "roles": {"realm": [{"composite": false}]}}"#);
    assert!(message.contains("has no name"), "got: {message}");
}

#[test]
fn composite_members_are_recorded_without_resolution() {
    let model = support::parse_fixture("dangling_member");
    let admin = model
        .composite(&RoleRef::realm("admin"))
        .expect("admin should be composite");
    assert_eq!(
        admin.members,
        vec![RoleRef::realm("viewer"), RoleRef::realm("ghost")]
    );
    assert!(!model.has_role(&RoleRef::realm("ghost")));
}

#[test]
fn composites_of_non_composite_roles_are_ignored() {
    let model = parse_realm(
        r#"{"realm": "acme", "roles": {"realm": [
            {"name": "viewer"},
            {"name": "editor", "composite": false, "composites": {"realm": ["viewer"]}}
        ]}}"#,
    )
    .expect("parses");
    assert!(model.composites.is_empty());
}

#[test]
fn duplicate_composite_members_collapse() {
    let model = parse_realm(
        r#"{"realm": "acme", "roles": {"realm": [
            {"name": "viewer"},
            {"name": "admin", "composite": true, "composites": {"realm": ["viewer", "viewer"]}}
        ]}}"#,
    )
    .expect("parses");
    assert_eq!(model.composites[0].members, vec![RoleRef::realm("viewer")]);
}

#[test]
fn flat_groups_attach_to_parent_paths() {
    let model = parse_realm(
        r#"{"realm": "acme", "roles": {}, "groups": [
            {"name": "leads", "parentPath": "/eng"},
            {"name": "eng"}
        ]}"#,
    )
    .expect("parent declared later still resolves");

    let leads = model.group("/eng/leads").expect("path derived from parent");
    assert_eq!(leads.parent.as_deref(), Some("/eng"));
    let children: Vec<&str> = model.children("/eng").map(|g| g.name.as_str()).collect();
    assert_eq!(children, vec!["leads"]);
}

#[test]
fn unresolvable_parent_fails_in_strict_mode() {
    let raw = r#"{"realm": "acme", "roles": {}, "groups": [
        {"name": "orphan", "path": "/missing/orphan", "parent": "/missing"}
    ]}"#;

    match parse_realm(raw) {
        Err(ParseError::DanglingReference(reference)) => {
            assert_eq!(reference.owner, "group \"/missing/orphan\"");
            assert_eq!(reference.target, "parent group \"/missing\"");
        }
        other => panic!("expected DanglingReference, got {other:?}"),
    }
}

#[test]
fn unresolvable_parent_is_rerooted_in_lenient_mode() {
    let raw = r#"{"realm": "acme", "roles": {}, "groups": [
        {"name": "orphan", "path": "/missing/orphan", "parent": "/missing"}
    ]}"#;

    let parsed = RealmParser::new()
        .parse_str(raw, false)
        .expect("lenient parsing keeps the group");
    assert_eq!(parsed.model.groups[0].parent, None);
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(parsed.warnings[0].kind, WarningKind::ReRootedGroup);
    assert!(parsed.warnings[0].message.contains("/missing"));
}

#[test]
fn duplicate_group_paths_are_malformed() {
    let message = malformed_message(
        r#"{"realm": "acme", "roles": {}, "groups": [{"name": "eng"}, {"name": "eng"}]}"#,
    );
    assert!(message.contains("\"/eng\" is declared twice"), "got: {message}");
}

#[test]
fn structural_validator_rejects_before_extraction() {
    let validator = JsonSchemaValidator::new(&json!({
        "type": "object",
        "required": ["realm", "enabled"],
        "properties": { "enabled": { "type": "boolean" } }
    }))
    .expect("schema compiles");
    let parser = RealmParser::new().with_structural_validator(validator);

    let err = parser
        .parse_str(r#"{"realm": "acme", "roles": {}}"#, true)
        .expect_err("enabled is required");
    match err {
        ParseError::SchemaViolation(violations) => {
            assert_eq!(violations.len(), 1);
            assert!(violations[0].contains("enabled"), "got: {violations:?}");
        }
        other => panic!("expected SchemaViolation, got {other:?}"),
    }

    let parsed = parser
        .parse_str(&support::read_fixture_realm("acme"), true)
        .expect("acme satisfies the schema");
    assert_eq!(parsed.model.name, "acme");
}

#[test]
fn summary_lists_roles_composites_and_groups() {
    let summary = support::parse_fixture("clients").summary();
    let expected = "\
Keycloak realm \"shop\"
- Realm roles: customer, staff
- Client \"billing\" roles: read-invoices, manage-invoices
- Client \"storefront\" roles: publish
- Composite role staff includes: customer, billing:read-invoices
- Composite role billing:manage-invoices includes: billing:read-invoices
- Composite role storefront:publish includes: staff
- Group /finance (roles: staff, billing:manage-invoices)
- Group /finance/auditors (roles: billing:read-invoices)
- Group /support (roles: customer)";
    assert_eq!(summary, expected);
}
