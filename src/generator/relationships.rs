//! Structural relationships that wire the schema's singleton objects together.
//!
//! The schema alone only declares which edges may exist. Composite
//! inclusion, group nesting and group role mappings are facts of the realm,
//! so they are also emitted as relationships between the per-realm singleton
//! objects. Relationships to individual users are not known from an export
//! and are never produced here.

use std::fmt;

use crate::generator::graph::USER_DEFINITION;
use crate::generator::validator::ValidatedGraph;
use crate::parser::names::object_id;

/// One relationship in SpiceDB's text form
/// `type:id#relation@subject_type:subject_id[#subject_relation]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Resource definition.
    pub resource_type: String,
    /// Resource object id.
    pub resource_id: String,
    /// Relation on the resource.
    pub relation: String,
    /// Subject definition.
    pub subject_type: String,
    /// Subject object id.
    pub subject_id: String,
    /// Relation on the subject, for subject sets.
    pub subject_relation: Option<String>,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}:{}",
            self.resource_type, self.resource_id, self.relation, self.subject_type, self.subject_id
        )?;
        if let Some(relation) = &self.subject_relation {
            write!(f, "#{relation}")?;
        }
        Ok(())
    }
}

/// Every relationship between definitions of `graph`, in graph order.
pub fn structural_relationships(graph: &ValidatedGraph) -> Vec<Relationship> {
    let graph = graph.graph();
    let id = object_id(&graph.realm);

    let mut relationships = Vec::new();
    for definition in &graph.definitions {
        for relation in &definition.relations {
            for subject in &relation.subjects {
                if subject.definition == USER_DEFINITION && subject.relation.is_none() {
                    continue;
                }
                relationships.push(Relationship {
                    resource_type: definition.name.clone(),
                    resource_id: id.clone(),
                    relation: relation.name.clone(),
                    subject_type: subject.definition.clone(),
                    subject_id: id.clone(),
                    subject_relation: subject.relation.clone(),
                });
            }
        }
    }
    relationships
}

/// One relationship per line.
pub fn format_relationships(relationships: &[Relationship]) -> String {
    let mut out = String::new();
    for relationship in relationships {
        out.push_str(&relationship.to_string());
        out.push('\n');
    }
    out
}
