/// Serde shapes of the Keycloak realm export document.
pub(crate) mod export;
/// Identifier canonicalization for schema names and relationship object ids.
pub mod names;
/// Normalized realm model: roles, clients, groups, composite mappings.
pub mod realm;
/// Realm export parsing into the realm model.
pub mod realm_parser;
/// Optional JSON-Schema validation of the raw export.
pub mod structure;
