//! Schema graph intermediate representation.
//!
//! The graph is produced once by [`crate::generator::graph_builder`], checked
//! by [`crate::generator::validator`], and rendered by
//! [`crate::generator::serializer`]. Every collection is a `Vec` whose order
//! is fixed by the builder, so rendering never depends on hash iteration.

use std::fmt;

use crate::parser::realm::RoleRef;

/// Name of the atomic subject definition.
pub const USER_DEFINITION: &str = "user";
/// Relation carrying direct role assignments.
pub const ASSIGNEE_RELATION: &str = "assignee";
/// Relation carrying group membership.
pub const MEMBER_RELATION: &str = "member";
/// Permission of a composite role.
pub const GRANTED_PERMISSION: &str = "granted";

/// The Keycloak object a definition was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The built-in `user` subject type.
    Subject,
    /// A realm or client role.
    Role(RoleRef),
    /// A group, by path.
    Group(String),
}

impl Origin {
    /// Short source identifier used in cycle reports (`admin`, `app:read`, `/eng`).
    pub fn label(&self) -> String {
        match self {
            Origin::Subject => USER_DEFINITION.to_string(),
            Origin::Role(role) => role.to_string(),
            Origin::Group(path) => path.clone(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Subject => write!(f, "subject type \"{USER_DEFINITION}\""),
            Origin::Role(RoleRef::Realm(name)) => write!(f, "realm role \"{name}\""),
            Origin::Role(role @ RoleRef::Client { .. }) => write!(f, "client role \"{role}\""),
            Origin::Group(path) => write!(f, "group \"{path}\""),
        }
    }
}

/// An allowed subject type of a relation: `user` or `group_eng#member`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectType {
    /// Definition the subject belongs to.
    pub definition: String,
    /// Relation on that definition, for subject sets.
    pub relation: Option<String>,
}

impl SubjectType {
    /// A plain object subject.
    pub fn object(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            relation: None,
        }
    }

    /// A subject set (`definition#relation`).
    pub fn set(definition: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            relation: Some(relation.into()),
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}#{relation}", self.definition),
            None => write!(f, "{}", self.definition),
        }
    }
}

/// A typed edge from a resource to its allowed subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation name.
    pub name: String,
    /// Allowed subject types, in declaration order.
    pub subjects: Vec<SubjectType>,
}

/// One term of a permission union.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A relation or permission on the same definition.
    Local(String),
    /// Walk `via`, then evaluate `target` on each subject reached.
    Arrow {
        /// Relation on this definition.
        via: String,
        /// Relation or permission on the subject definition.
        target: String,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(name) => write!(f, "{name}"),
            Operand::Arrow { via, target } => write!(f, "{via}->{target}"),
        }
    }
}

/// A named union over relations and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    /// Permission name.
    pub name: String,
    /// Union operands, in declaration order.
    pub union: Vec<Operand>,
}

/// A resource type of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Definition name.
    pub name: String,
    /// Keycloak object this definition stands for.
    pub origin: Origin,
    /// Relations, in declaration order.
    pub relations: Vec<Relation>,
    /// Permissions, in declaration order.
    pub permissions: Vec<Permission>,
}

impl Definition {
    pub(crate) fn new(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            origin,
            relations: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Look up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Look up a permission by name.
    pub fn permission(&self, name: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.name == name)
    }

    /// True when `name` is a relation or permission of this definition.
    pub fn declares(&self, name: &str) -> bool {
        self.relation(name).is_some() || self.permission(name).is_some()
    }

    /// Append a relation unless one with the same name exists; first declaration wins.
    pub(crate) fn ensure_relation(&mut self, name: impl Into<String>, subjects: Vec<SubjectType>) {
        let name = name.into();
        if self.relation(&name).is_none() {
            self.relations.push(Relation { name, subjects });
        }
    }

    pub(crate) fn push_permission(&mut self, name: impl Into<String>, union: Vec<Operand>) {
        self.permissions.push(Permission {
            name: name.into(),
            union,
        });
    }
}

/// What a loosely recorded reference pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A composite role member.
    CompositeMember,
    /// A role granted to a group.
    GroupRoleMapping,
}

/// A reference from the realm model that resolved to no definition.
///
/// The builder records these instead of emitting edges; the validator decides
/// whether they are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// What kind of reference this was.
    pub kind: ReferenceKind,
    /// Object holding the reference.
    pub owner: Origin,
    /// The missing role.
    pub target: RoleRef,
}

/// The relation/permission graph of one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaGraph {
    /// Realm the graph was built from.
    pub realm: String,
    /// Definitions in emission order.
    pub definitions: Vec<Definition>,
    /// References the builder could not resolve.
    pub unresolved: Vec<UnresolvedReference>,
}

impl SchemaGraph {
    /// Look up a definition by name.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Definitions produced from roles.
    pub fn role_definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(|d| matches!(d.origin, Origin::Role(_)))
    }

    /// Definitions produced from groups.
    pub fn group_definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(|d| matches!(d.origin, Origin::Group(_)))
    }
}
