//! Structural checks on the schema graph.
//!
//! Checks run in a fixed order so the first reported error is stable:
//! duplicate definition names, composite role cycles, group cycles,
//! unresolved realm references, then expression resolution.

use std::collections::HashMap;

use tracing::debug;

use crate::diagnostics::{Warning, WarningKind};
use crate::error::{CycleScope, DanglingReference, ValidationError};
use crate::generator::graph::{
    Operand, Origin, ReferenceKind, Relation, SchemaGraph, UnresolvedReference,
    ASSIGNEE_RELATION,
};

/// A schema graph that passed [`validate`].
///
/// Only a validated graph can be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedGraph {
    graph: SchemaGraph,
    warnings: Vec<Warning>,
}

impl ValidatedGraph {
    /// The underlying graph.
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Warnings produced while validating (lenient mode only).
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Split into graph and warnings.
    pub fn into_parts(self) -> (SchemaGraph, Vec<Warning>) {
        (self.graph, self.warnings)
    }
}

/// Validate `graph`.
///
/// In strict mode the first unresolved realm reference is fatal; otherwise
/// each one becomes a [`WarningKind::DroppedReference`] warning (the builder
/// never emitted the edge).
pub fn validate(graph: SchemaGraph, strict: bool) -> Result<ValidatedGraph, ValidationError> {
    check_duplicate_definitions(&graph)?;
    check_cycles(&graph, CycleScope::CompositeRole)?;
    check_cycles(&graph, CycleScope::Group)?;
    let warnings = check_unresolved(&graph.unresolved, strict)?;
    check_expressions(&graph)?;

    debug!(
        "validated {} definition(s) for realm '{}'",
        graph.definitions.len(),
        graph.realm
    );
    Ok(ValidatedGraph { graph, warnings })
}

fn check_duplicate_definitions(graph: &SchemaGraph) -> Result<(), ValidationError> {
    let mut seen: HashMap<&str, &Origin> = HashMap::new();
    for definition in &graph.definitions {
        if let Some(first) = seen.insert(definition.name.as_str(), &definition.origin) {
            return Err(ValidationError::DuplicateDefinition {
                name: definition.name.clone(),
                first: first.to_string(),
                second: definition.origin.to_string(),
            });
        }
    }
    Ok(())
}

fn in_scope(origin: &Origin, scope: CycleScope) -> bool {
    match scope {
        CycleScope::CompositeRole => matches!(origin, Origin::Role(_)),
        CycleScope::Group => matches!(origin, Origin::Group(_)),
    }
}

/// Relations whose subjects are dependencies of the definition.
///
/// A role's assignee relation also admits the holders of every composite
/// that includes it; those point back up the composite graph and are not
/// dependencies.
fn is_dependency(relation: &Relation, scope: CycleScope) -> bool {
    match scope {
        CycleScope::CompositeRole => relation.name != ASSIGNEE_RELATION,
        CycleScope::Group => true,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first search over dependency edges that stay inside `scope`.
fn check_cycles(graph: &SchemaGraph, scope: CycleScope) -> Result<(), ValidationError> {
    let index: HashMap<&str, usize> = graph
        .definitions
        .iter()
        .enumerate()
        .filter(|(_, d)| in_scope(&d.origin, scope))
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let edges: Vec<Vec<usize>> = graph
        .definitions
        .iter()
        .map(|definition| {
            if !in_scope(&definition.origin, scope) {
                return Vec::new();
            }
            let mut targets = Vec::new();
            for relation in definition
                .relations
                .iter()
                .filter(|r| is_dependency(r, scope))
            {
                for subject in &relation.subjects {
                    if let Some(&target) = index.get(subject.definition.as_str()) {
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
            }
            targets
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; graph.definitions.len()];
    for start in 0..graph.definitions.len() {
        if edges[start].is_empty() || marks[start] != Mark::Unvisited {
            continue;
        }
        if let Some(cycle) = find_cycle(start, &edges, &mut marks) {
            let cycle = cycle
                .into_iter()
                .map(|i| graph.definitions[i].origin.label())
                .collect();
            return Err(ValidationError::CyclicDependency { scope, cycle });
        }
    }
    Ok(())
}

/// Walk from `start`; returns the first cycle found, closed on its first node.
fn find_cycle(start: usize, edges: &[Vec<usize>], marks: &mut [Mark]) -> Option<Vec<usize>> {
    // Each frame is a node and the index of its next edge to follow.
    let mut stack = vec![(start, 0usize)];
    marks[start] = Mark::OnStack;

    while let Some(frame) = stack.last_mut() {
        let (node, next_edge) = *frame;
        let Some(&next) = edges[node].get(next_edge) else {
            marks[node] = Mark::Done;
            stack.pop();
            continue;
        };
        frame.1 += 1;

        match marks[next] {
            Mark::OnStack => {
                let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                let mut cycle: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                marks[next] = Mark::OnStack;
                stack.push((next, 0));
            }
            Mark::Done => {}
        }
    }
    None
}

fn check_unresolved(
    unresolved: &[UnresolvedReference],
    strict: bool,
) -> Result<Vec<Warning>, ValidationError> {
    let mut warnings = Vec::new();
    for reference in unresolved {
        let dangling = DanglingReference {
            owner: reference.owner.to_string(),
            target: reference.target.describe(),
        };
        if strict {
            return Err(ValidationError::DanglingReference(dangling));
        }
        let omitted = match reference.kind {
            ReferenceKind::CompositeMember => "composite member omitted",
            ReferenceKind::GroupRoleMapping => "role mapping omitted",
        };
        warnings.push(Warning::new(
            WarningKind::DroppedReference,
            reference.owner.to_string(),
            format!("{dangling}; {omitted}"),
        ));
    }
    Ok(warnings)
}

fn check_expressions(graph: &SchemaGraph) -> Result<(), ValidationError> {
    let unresolved = |definition: &str, reference: String| ValidationError::UnresolvedExpression {
        definition: definition.to_string(),
        reference,
    };

    for definition in &graph.definitions {
        for relation in &definition.relations {
            for subject in &relation.subjects {
                let Some(target) = graph.definition(&subject.definition) else {
                    return Err(unresolved(&definition.name, subject.to_string()));
                };
                if let Some(name) = &subject.relation {
                    if target.relation(name).is_none() {
                        return Err(unresolved(&definition.name, subject.to_string()));
                    }
                }
            }
        }

        for permission in &definition.permissions {
            for operand in &permission.union {
                match operand {
                    Operand::Local(name) => {
                        if !definition.declares(name) {
                            return Err(unresolved(&definition.name, operand.to_string()));
                        }
                    }
                    Operand::Arrow { via, target } => {
                        let Some(relation) = definition.relation(via) else {
                            return Err(unresolved(&definition.name, operand.to_string()));
                        };
                        let walks = relation.subjects.iter().all(|subject| {
                            graph
                                .definition(&subject.definition)
                                .is_some_and(|d| d.declares(target))
                        });
                        if !walks {
                            return Err(unresolved(&definition.name, operand.to_string()));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::graph::{Definition, SubjectType, USER_DEFINITION};
    use crate::parser::realm::RoleRef;

    fn graph(definitions: Vec<Definition>) -> SchemaGraph {
        SchemaGraph {
            realm: "acme".to_string(),
            definitions,
            unresolved: Vec::new(),
        }
    }

    fn role(name: &str) -> Definition {
        let mut definition = Definition::new(format!("role_{name}"), Origin::Role(RoleRef::realm(name)));
        definition.ensure_relation("assignee", vec![SubjectType::object(USER_DEFINITION)]);
        definition
    }

    #[test]
    fn self_including_role_is_a_cycle_of_length_one() {
        let mut admin = role("admin");
        admin.ensure_relation("includes_role_admin", vec![SubjectType::object("role_admin")]);
        let err = validate(
            graph(vec![Definition::new(USER_DEFINITION, Origin::Subject), admin]),
            true,
        )
        .expect_err("self inclusion must be rejected");

        assert_eq!(
            err.to_string(),
            "cyclic composite role dependency: admin → admin"
        );
    }

    #[test]
    fn two_definitions_with_one_name_are_rejected() {
        let mut twin = role("reader");
        twin.origin = Origin::Role(RoleRef::client("app", "reader"));
        let err = validate(
            graph(vec![Definition::new(USER_DEFINITION, Origin::Subject), role("reader"), twin]),
            false,
        )
        .expect_err("role_reader is declared twice");
        match err {
            ValidationError::DuplicateDefinition {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "role_reader");
                assert_eq!(first, "realm role \"reader\"");
                assert_eq!(second, "client role \"app:reader\"");
            }
            other => panic!("expected a duplicate definition, got {other}"),
        }
    }

    #[test]
    fn arrow_to_missing_permission_is_unresolved() {
        let viewer = role("viewer");
        let mut admin = role("admin");
        admin.ensure_relation("includes_role_viewer", vec![SubjectType::object("role_viewer")]);
        admin.push_permission(
            "granted",
            vec![
                Operand::Local("assignee".to_string()),
                Operand::Arrow {
                    via: "includes_role_viewer".to_string(),
                    target: "granted".to_string(),
                },
            ],
        );

        let err = validate(
            graph(vec![Definition::new(USER_DEFINITION, Origin::Subject), viewer, admin]),
            true,
        )
        .expect_err("viewer has no granted permission");
        match err {
            ValidationError::UnresolvedExpression {
                definition,
                reference,
            } => {
                assert_eq!(definition, "role_admin");
                assert_eq!(reference, "includes_role_viewer->granted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn subject_type_must_name_a_declared_definition() {
        let mut viewer = role("viewer");
        viewer.relations[0]
            .subjects
            .push(SubjectType::set("group_ghost", "member"));

        let err = validate(
            graph(vec![Definition::new(USER_DEFINITION, Origin::Subject), viewer]),
            false,
        )
        .expect_err("group_ghost is not declared");
        assert!(matches!(err, ValidationError::UnresolvedExpression { .. }));
    }
}
