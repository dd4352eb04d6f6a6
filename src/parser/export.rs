//! Serde shapes of the parts of a Keycloak realm export the translator reads.
//!
//! Everything not listed here (users, clients, flows, keys, ...) is ignored.
//! Client-keyed objects stay as JSON maps so that the file's key order
//! survives deserialization.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Top level of a realm export document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RealmExport {
    /// Realm name.
    #[serde(default)]
    pub realm: Option<Value>,
    /// Realm id; older exports only carry this.
    #[serde(default)]
    pub id: Option<Value>,
    /// Role container.
    #[serde(default)]
    pub roles: Option<Value>,
    /// Top-level groups.
    #[serde(default)]
    pub groups: Vec<GroupExport>,
}

/// The `roles` object.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RolesExport {
    /// Realm-level roles.
    #[serde(default)]
    pub realm: Vec<RoleExport>,
    /// Client id → array of role objects.
    #[serde(default)]
    pub client: Map<String, Value>,
}

/// A single role representation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleExport {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub composite: bool,
    #[serde(default)]
    pub composites: Option<CompositesExport>,
}

/// Members of a composite role.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompositesExport {
    /// Realm role names.
    #[serde(default)]
    pub realm: Vec<String>,
    /// Client id → role names.
    #[serde(default)]
    pub client: Map<String, Value>,
}

/// A group, possibly with nested subgroups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupExport {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Parent group path, for groups declared flat at the top level.
    #[serde(default, alias = "parentPath")]
    pub parent: Option<String>,
    #[serde(default)]
    pub realm_roles: Vec<String>,
    /// Client id → role names granted to the group.
    #[serde(default)]
    pub client_roles: Map<String, Value>,
    #[serde(default)]
    pub sub_groups: Vec<GroupExport>,
}
