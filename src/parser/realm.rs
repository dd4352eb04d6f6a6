use std::collections::HashMap;
use std::fmt;

/// Reference to a role, either realm-scoped or scoped to a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleRef {
    /// A realm role, by name.
    Realm(String),
    /// A client role, by client id and role name.
    Client {
        /// Client id (`clientId` in the export).
        client: String,
        /// Role name within the client.
        role: String,
    },
}

impl RoleRef {
    /// Realm role reference.
    pub fn realm(name: impl Into<String>) -> Self {
        Self::Realm(name.into())
    }

    /// Client role reference.
    pub fn client(client: impl Into<String>, role: impl Into<String>) -> Self {
        Self::Client {
            client: client.into(),
            role: role.into(),
        }
    }

    /// Human-readable description used in diagnostics, e.g. `client role "app:read"`.
    pub fn describe(&self) -> String {
        match self {
            RoleRef::Realm(_) => format!("role \"{self}\""),
            RoleRef::Client { .. } => format!("client role \"{self}\""),
        }
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRef::Realm(name) => write!(f, "{name}"),
            RoleRef::Client { client, role } => write!(f, "{client}:{role}"),
        }
    }
}

/// A role declared in the realm or in one of its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Role name, unique within its scope.
    pub name: String,
    /// Optional description from the export.
    pub description: Option<String>,
    /// Whether the export flags the role as composite.
    pub composite: bool,
}

/// A client and its roles, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client id.
    pub id: String,
    /// Roles declared for the client.
    pub roles: Vec<Role>,
}

/// A composite role and its declared members.
///
/// Members are recorded as written; whether they exist is decided later by
/// the graph builder and validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeMapping {
    /// The composite role.
    pub role: RoleRef,
    /// Member roles, first occurrence order, without duplicates.
    pub members: Vec<RoleRef>,
}

/// A group, linked to its parent by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Unique path, e.g. `/eng/eng-leads`.
    pub path: String,
    /// Path of the parent group, `None` for top-level groups.
    pub parent: Option<String>,
    /// Roles granted to every member of the group.
    pub role_mappings: Vec<RoleRef>,
}

/// Normalized, immutable view of one realm export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmModel {
    /// Realm name.
    pub name: String,
    /// Realm roles in declaration order.
    pub realm_roles: Vec<Role>,
    /// Clients in declaration order.
    pub clients: Vec<Client>,
    /// Groups in declaration order (a parent always precedes nested subgroups).
    pub groups: Vec<Group>,
    /// Composite mappings, realm roles first, then client roles in client order.
    pub composites: Vec<CompositeMapping>,
}

impl RealmModel {
    /// Iterate every declared role with its reference, in canonical order.
    pub fn roles(&self) -> impl Iterator<Item = (RoleRef, &Role)> + '_ {
        let realm = self
            .realm_roles
            .iter()
            .map(|role| (RoleRef::realm(&role.name), role));
        let client = self.clients.iter().flat_map(|client| {
            client
                .roles
                .iter()
                .map(move |role| (RoleRef::client(&client.id, &role.name), role))
        });
        realm.chain(client)
    }

    /// True when `role` names a declared role.
    pub fn has_role(&self, role: &RoleRef) -> bool {
        match role {
            RoleRef::Realm(name) => self.realm_roles.iter().any(|r| &r.name == name),
            RoleRef::Client { client, role } => self
                .clients
                .iter()
                .find(|c| &c.id == client)
                .is_some_and(|c| c.roles.iter().any(|r| &r.name == role)),
        }
    }

    /// The composite mapping of `role`, if it is composite.
    pub fn composite(&self, role: &RoleRef) -> Option<&CompositeMapping> {
        self.composites.iter().find(|c| &c.role == role)
    }

    /// Look up a group by path.
    pub fn group(&self, path: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.path == path)
    }

    /// Direct subgroups of the group at `path`, in declaration order.
    pub fn children<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.parent.as_deref() == Some(path))
    }

    /// Direct subgroups of every group, keyed by parent path, each list in
    /// declaration order.
    pub fn children_by_parent(&self) -> HashMap<&str, Vec<&Group>> {
        let mut index: HashMap<&str, Vec<&Group>> = HashMap::new();
        for group in &self.groups {
            if let Some(parent) = group.parent.as_deref() {
                index.entry(parent).or_default().push(group);
            }
        }
        index
    }

    /// Number of client roles across all clients.
    pub fn client_role_count(&self) -> usize {
        self.clients.iter().map(|c| c.roles.len()).sum()
    }

    /// Plain-text summary of the realm, used as context for schema enhancement.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Keycloak realm \"{}\"", self.name)];

        if !self.realm_roles.is_empty() {
            lines.push(format!(
                "- Realm roles: {}",
                join_names(self.realm_roles.iter().map(|r| r.name.as_str()))
            ));
        }
        for client in &self.clients {
            if client.roles.is_empty() {
                continue;
            }
            lines.push(format!(
                "- Client \"{}\" roles: {}",
                client.id,
                join_names(client.roles.iter().map(|r| r.name.as_str()))
            ));
        }
        for composite in &self.composites {
            let members = composite
                .members
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            lines.push(format!(
                "- Composite role {} includes: {}",
                composite.role,
                if members.is_empty() {
                    "(nothing)".to_string()
                } else {
                    members.join(", ")
                }
            ));
        }
        for group in &self.groups {
            let mut line = format!("- Group {}", group.path);
            if !group.role_mappings.is_empty() {
                let roles = group
                    .role_mappings
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                line.push_str(&format!(" (roles: {})", roles.join(", ")));
            }
            lines.push(line);
        }

        if lines.len() == 1 {
            lines.push("(No roles or groups)".to_string());
        }
        lines.join("\n")
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
