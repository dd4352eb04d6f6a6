//! [`RealmModel`] → [`SchemaGraph`].
//!
//! The builder is a pure function of the realm model. Composite roles are
//! composed through arrows onto their members' own relation or permission
//! instead of being flattened, and subgroups are referenced through their own
//! `member` relation, so each membership fact lives on exactly one edge.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::generator::graph::{
    Definition, Operand, Origin, ReferenceKind, SchemaGraph, SubjectType, UnresolvedReference,
    ASSIGNEE_RELATION, GRANTED_PERMISSION, MEMBER_RELATION, USER_DEFINITION,
};
use crate::parser::names::{bounded_identifier, disambiguated_identifier};
use crate::parser::realm::{Group, RealmModel, RoleRef};

/// Schema definition name of a role, before collisions are resolved.
pub fn role_definition_name(role: &RoleRef) -> String {
    match role {
        RoleRef::Realm(name) => bounded_identifier("role_", name),
        RoleRef::Client { client, role } => {
            bounded_identifier("client_", &format!("{client}_role_{role}"))
        }
    }
}

/// Schema definition name of a group, before collisions are resolved.
pub fn group_definition_name(path: &str) -> String {
    bounded_identifier("group_", path)
}

/// Name of the relation linking a composite role to one of its members.
pub fn includes_relation_name(member_definition: &str) -> String {
    bounded_identifier("includes_", member_definition)
}

/// Definition names of every role and group of one realm.
///
/// Objects whose canonical names collide (`read-all` and `read_all`, or the
/// groups `/a-b` and `/a/b`) all get a suffix hashed from their source
/// identifier, so neither is silently merged into the other.
#[derive(Debug, Clone, Default)]
pub struct DefinitionNames {
    roles: HashMap<RoleRef, String>,
    groups: HashMap<String, String>,
}

impl DefinitionNames {
    /// Assign names to every role and group of `model`.
    pub fn for_model(model: &RealmModel) -> Self {
        let candidates: Vec<(Origin, String)> = model
            .roles()
            .map(|(role, _)| {
                let name = role_definition_name(&role);
                (Origin::Role(role), name)
            })
            .chain(model.groups.iter().map(|group| {
                (
                    Origin::Group(group.path.clone()),
                    group_definition_name(&group.path),
                )
            }))
            .collect();

        let mut uses: HashMap<String, usize> = HashMap::new();
        for (_, name) in &candidates {
            *uses.entry(name.clone()).or_default() += 1;
        }

        let mut names = Self::default();
        for (origin, name) in candidates {
            let name = if uses.get(&name).copied().unwrap_or(0) > 1 {
                let unique = disambiguated_identifier(&name, &origin.to_string());
                info!("{origin} shares the name {name} and is emitted as {unique}");
                unique
            } else {
                name
            };
            match origin {
                Origin::Role(role) => {
                    names.roles.insert(role, name);
                }
                Origin::Group(path) => {
                    names.groups.insert(path, name);
                }
                Origin::Subject => {}
            }
        }
        names
    }

    /// Definition name of `role`.
    pub fn role(&self, role: &RoleRef) -> String {
        self.roles
            .get(role)
            .cloned()
            .unwrap_or_else(|| role_definition_name(role))
    }

    /// Definition name of the group at `path`.
    pub fn group(&self, path: &str) -> String {
        self.groups
            .get(path)
            .cloned()
            .unwrap_or_else(|| group_definition_name(path))
    }
}

/// Build the schema graph of `model`.
///
/// Definitions come out as `user`, realm roles, client roles (client by
/// client), then groups with every parent before its children.
pub fn build(model: &RealmModel) -> SchemaGraph {
    let names = DefinitionNames::for_model(model);
    let children = model.children_by_parent();
    let groups = group_order(model, &children);
    let mut unresolved = Vec::new();
    let mut unresolved_mappings = Vec::new();

    // Group role mappings and including composites become extra subject
    // types on the role's assignee relation.
    let mut grants: HashMap<&RoleRef, Vec<SubjectType>> = HashMap::new();
    for group in &groups {
        for role in &group.role_mappings {
            if model.has_role(role) {
                grants
                    .entry(role)
                    .or_default()
                    .push(SubjectType::set(names.group(&group.path), MEMBER_RELATION));
            } else {
                unresolved_mappings.push(UnresolvedReference {
                    kind: ReferenceKind::GroupRoleMapping,
                    owner: Origin::Group(group.path.clone()),
                    target: role.clone(),
                });
            }
        }
    }
    for mapping in &model.composites {
        let holders = SubjectType::set(names.role(&mapping.role), ASSIGNEE_RELATION);
        for member in mapping.members.iter().filter(|m| model.has_role(m)) {
            let subjects = grants.entry(member).or_default();
            if !subjects.contains(&holders) {
                subjects.push(holders.clone());
            }
        }
    }

    let mut definitions = vec![Definition::new(USER_DEFINITION, Origin::Subject)];

    for (role_ref, _) in model.roles() {
        let mut definition = Definition::new(names.role(&role_ref), Origin::Role(role_ref.clone()));

        let mut subjects = vec![SubjectType::object(USER_DEFINITION)];
        if let Some(extra) = grants.get(&role_ref) {
            subjects.extend(extra.iter().cloned());
        }
        definition.ensure_relation(ASSIGNEE_RELATION, subjects);

        if let Some(mapping) = model.composite(&role_ref) {
            let mut union = vec![Operand::Local(ASSIGNEE_RELATION.to_string())];
            for member in &mapping.members {
                if !model.has_role(member) {
                    unresolved.push(UnresolvedReference {
                        kind: ReferenceKind::CompositeMember,
                        owner: Origin::Role(role_ref.clone()),
                        target: member.clone(),
                    });
                    continue;
                }

                let member_definition = names.role(member);
                let via = includes_relation_name(&member_definition);
                let target = if model.composite(member).is_some() {
                    GRANTED_PERMISSION
                } else {
                    ASSIGNEE_RELATION
                };
                definition.ensure_relation(
                    via.clone(),
                    vec![SubjectType::object(member_definition)],
                );
                union.push(Operand::Arrow {
                    via,
                    target: target.to_string(),
                });
            }
            definition.push_permission(GRANTED_PERMISSION, union);
        }

        debug!(
            "definition {} for {}: {} relation(s), {} permission(s)",
            definition.name,
            definition.origin,
            definition.relations.len(),
            definition.permissions.len()
        );
        definitions.push(definition);
    }

    for group in &groups {
        let mut definition =
            Definition::new(names.group(&group.path), Origin::Group(group.path.clone()));
        let mut subjects = vec![SubjectType::object(USER_DEFINITION)];
        if let Some(subgroups) = children.get(group.path.as_str()) {
            subjects.extend(
                subgroups
                    .iter()
                    .map(|child| SubjectType::set(names.group(&child.path), MEMBER_RELATION)),
            );
        }
        definition.ensure_relation(MEMBER_RELATION, subjects);

        debug!(
            "definition {} for {}",
            definition.name, definition.origin
        );
        definitions.push(definition);
    }

    // Composite members first, then group mappings, each in emission order.
    unresolved.extend(unresolved_mappings);

    SchemaGraph {
        realm: model.name.clone(),
        definitions,
        unresolved,
    }
}

/// Groups in emission order: depth-first from each top-level group, children
/// in declaration order. Groups unreachable from a top-level group (only
/// possible when parents form a cycle) follow in declaration order.
fn group_order<'a>(
    model: &'a RealmModel,
    children: &HashMap<&'a str, Vec<&'a Group>>,
) -> Vec<&'a Group> {
    let mut ordered = Vec::with_capacity(model.groups.len());
    let mut visited = HashSet::new();

    for root in model.groups.iter().filter(|g| g.parent.is_none()) {
        let mut stack = vec![root];
        while let Some(group) = stack.pop() {
            if !visited.insert(group.path.as_str()) {
                continue;
            }
            ordered.push(group);
            if let Some(subgroups) = children.get(group.path.as_str()) {
                stack.extend(subgroups.iter().rev().copied());
            }
        }
    }
    for group in &model.groups {
        if visited.insert(group.path.as_str()) {
            ordered.push(group);
        }
    }

    ordered
}
