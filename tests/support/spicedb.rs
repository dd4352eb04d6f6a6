use kc2spicedb::generator::relationships::Relationship;
use reqwest::Client;
use serde_json::{json, Value};

pub(crate) const PRESHARED_KEY: &str = "kc2spicedb-test-key";

async fn expect_success_json(response: reqwest::Response, action: &str) -> Value {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|e| panic!("{action} response should decode: {e}"));
    assert!(status.is_success(), "{action} failed ({status}): {body:#}");
    body
}

pub(crate) async fn write_schema(client: &Client, base: &str, schema: &str) {
    let response = client
        .post(format!("{base}/v1/schema/write"))
        .bearer_auth(PRESHARED_KEY)
        .json(&json!({ "schema": schema }))
        .send()
        .await
        .expect("schema write request should succeed");

    expect_success_json(response, "Schema write").await;
}

fn relationship_json(relationship: &Relationship) -> Value {
    let mut subject = json!({
        "object": {
            "objectType": relationship.subject_type,
            "objectId": relationship.subject_id
        }
    });
    if let Some(relation) = &relationship.subject_relation {
        subject["optionalRelation"] = json!(relation);
    }
    json!({
        "resource": {
            "objectType": relationship.resource_type,
            "objectId": relationship.resource_id
        },
        "relation": relationship.relation,
        "subject": subject
    })
}

pub(crate) async fn write_relationships(
    client: &Client,
    base: &str,
    relationships: &[Relationship],
) {
    let updates: Vec<Value> = relationships
        .iter()
        .map(|r| json!({ "operation": "OPERATION_TOUCH", "relationship": relationship_json(r) }))
        .collect();

    let response = client
        .post(format!("{base}/v1/relationships/write"))
        .bearer_auth(PRESHARED_KEY)
        .json(&json!({ "updates": updates }))
        .send()
        .await
        .expect("relationship write request should succeed");

    expect_success_json(response, "Relationship write").await;
}

/// Assign `user:<user>` directly on `relation` of a singleton object.
pub(crate) fn user_relationship(
    resource_type: &str,
    resource_id: &str,
    relation: &str,
    user: &str,
) -> Relationship {
    Relationship {
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        relation: relation.to_string(),
        subject_type: "user".to_string(),
        subject_id: user.to_string(),
        subject_relation: None,
    }
}

pub(crate) async fn check_permission(
    client: &Client,
    base: &str,
    resource_type: &str,
    resource_id: &str,
    permission: &str,
    user: &str,
) -> bool {
    let response = client
        .post(format!("{base}/v1/permissions/check"))
        .bearer_auth(PRESHARED_KEY)
        .json(&json!({
            "consistency": { "fullyConsistent": true },
            "resource": { "objectType": resource_type, "objectId": resource_id },
            "permission": permission,
            "subject": { "object": { "objectType": "user", "objectId": user } }
        }))
        .send()
        .await
        .expect("check request should succeed");

    let body = expect_success_json(response, "Check").await;

    body["permissionship"]
        .as_str()
        .expect("missing permissionship")
        == "PERMISSIONSHIP_HAS_PERMISSION"
}
