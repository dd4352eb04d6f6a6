//! Rendering of a validated graph as SpiceDB schema text.

use std::fmt;

use crate::generator::graph::{Definition, Origin, Permission, Relation};
use crate::generator::validator::ValidatedGraph;

/// Render `graph` as schema text. Never fails: validity is established upstream.
pub fn serialize(graph: &ValidatedGraph) -> String {
    graph.to_string()
}

impl fmt::Display for ValidatedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph();
        writeln!(
            f,
            "// Generated from Keycloak realm \"{}\".",
            comment_text(&graph.realm)
        )?;
        for definition in &graph.definitions {
            writeln!(f)?;
            write_definition(f, definition)?;
        }
        Ok(())
    }
}

fn write_definition(f: &mut impl fmt::Write, definition: &Definition) -> fmt::Result {
    if definition.origin != Origin::Subject {
        writeln!(f, "/** {} */", comment_text(&definition.origin.to_string()))?;
    }
    if definition.relations.is_empty() && definition.permissions.is_empty() {
        return writeln!(f, "definition {} {{}}", definition.name);
    }

    writeln!(f, "definition {} {{", definition.name)?;
    for relation in &definition.relations {
        writeln!(f, "    {}", render_relation(relation))?;
    }
    for permission in &definition.permissions {
        writeln!(f, "    {}", render_permission(permission))?;
    }
    writeln!(f, "}}")
}

fn render_relation(relation: &Relation) -> String {
    let subjects = relation
        .subjects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    format!("relation {}: {}", relation.name, subjects.join(" | "))
}

fn render_permission(permission: &Permission) -> String {
    let operands = permission
        .union
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    format!("permission {} = {}", permission.name, operands.join(" + "))
}

/// Make arbitrary realm text safe inside `//` and `/** */` comments.
fn comment_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .replace("*/", "* /")
}
