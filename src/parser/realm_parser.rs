//! Realm export → [`RealmModel`].

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::diagnostics::{Warning, WarningKind};
use crate::error::{DanglingReference, ParseError};
use crate::parser::export::{CompositesExport, GroupExport, RealmExport, RoleExport, RolesExport};
use crate::parser::realm::{Client, CompositeMapping, Group, RealmModel, Role, RoleRef};
use crate::parser::structure::StructuralValidator;

/// A parsed realm together with the warnings produced while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedRealm {
    /// The normalized realm.
    pub model: RealmModel,
    /// Non-fatal conditions (lenient mode only).
    pub warnings: Vec<Warning>,
}

/// Configurable realm export parser.
#[derive(Default)]
pub struct RealmParser {
    structural: Option<Box<dyn StructuralValidator>>,
}

impl RealmParser {
    /// Parser without structural validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `validator` over the raw document before extracting anything.
    pub fn with_structural_validator(mut self, validator: impl StructuralValidator + 'static) -> Self {
        self.structural = Some(Box::new(validator));
        self
    }

    /// Parse export text.
    pub fn parse_str(&self, raw: &str, strict: bool) -> Result<ParsedRealm, ParseError> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|e| ParseError::MalformedInput(format!("invalid JSON: {e}")))?;
        self.parse_value(&document, strict)
    }

    /// Parse an already-decoded export document.
    ///
    /// With `strict` set, a group whose parent path resolves to nothing is an
    /// error; otherwise the group is treated as top-level and a warning is
    /// recorded.
    pub fn parse_value(&self, document: &Value, strict: bool) -> Result<ParsedRealm, ParseError> {
        if let Some(validator) = &self.structural {
            validator
                .validate(document)
                .map_err(ParseError::SchemaViolation)?;
        }

        if !document.is_object() {
            return Err(ParseError::MalformedInput(
                "top level must be a JSON object".to_string(),
            ));
        }
        let export: RealmExport = decode(document.clone(), "realm export")?;

        let name = realm_name(&export)?;
        let roles = match export.roles {
            Some(value @ Value::Object(_)) => decode::<RolesExport>(value, "`roles`")?,
            Some(other) => {
                return Err(ParseError::MalformedInput(format!(
                    "`roles` must be an object, found {}",
                    json_kind(&other)
                )))
            }
            None => {
                return Err(ParseError::MalformedInput(
                    "missing required field `roles`".to_string(),
                ))
            }
        };

        let mut composites = Vec::new();
        let realm_roles = extract_roles(&roles.realm, "realm", &mut composites, |name| {
            RoleRef::realm(name)
        })?;

        let mut clients = Vec::new();
        for (client_id, value) in &roles.client {
            let entries: Vec<RoleExport> =
                decode(value.clone(), &format!("roles of client \"{client_id}\""))?;
            let roles = extract_roles(
                &entries,
                &format!("client \"{client_id}\""),
                &mut composites,
                |name| RoleRef::client(client_id, name),
            )?;
            clients.push(Client {
                id: client_id.clone(),
                roles,
            });
        }

        let mut groups = Vec::new();
        for group in &export.groups {
            flatten_group(group, None, &mut groups)?;
        }
        let warnings = resolve_group_parents(&mut groups, strict)?;

        let model = RealmModel {
            name,
            realm_roles,
            clients,
            groups,
            composites,
        };

        info!(
            "parsed realm '{}': {} realm roles, {} client roles, {} groups",
            model.name,
            model.realm_roles.len(),
            model.client_role_count(),
            model.groups.len()
        );
        if !model.composites.is_empty() {
            info!("found {} composite role(s)", model.composites.len());
        }

        Ok(ParsedRealm { model, warnings })
    }
}

/// Parse export text strictly, without structural validation.
pub fn parse_realm(raw: &str) -> Result<RealmModel, ParseError> {
    RealmParser::new().parse_str(raw, true).map(|parsed| parsed.model)
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ParseError> {
    serde_json::from_value(value)
        .map_err(|e| ParseError::MalformedInput(format!("invalid {what}: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn realm_name(export: &RealmExport) -> Result<String, ParseError> {
    let candidate = export.realm.as_ref().or(export.id.as_ref());
    match candidate {
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(name.clone()),
        Some(Value::String(_)) => Err(ParseError::MalformedInput(
            "realm name must not be empty".to_string(),
        )),
        Some(other) => Err(ParseError::MalformedInput(format!(
            "realm name must be a string, found {}",
            json_kind(other)
        ))),
        None => Err(ParseError::MalformedInput(
            "missing required field `realm`".to_string(),
        )),
    }
}

fn extract_roles(
    entries: &[RoleExport],
    scope: &str,
    composites: &mut Vec<CompositeMapping>,
    to_ref: impl Fn(&str) -> RoleRef,
) -> Result<Vec<Role>, ParseError> {
    let mut seen = HashSet::new();
    let mut roles = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        let name = match entry.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(ParseError::MalformedInput(format!(
                    "role #{idx} of {scope} has no name"
                )))
            }
        };
        if !seen.insert(name.clone()) {
            return Err(ParseError::MalformedInput(format!(
                "role \"{name}\" is declared twice in {scope}"
            )));
        }

        if entry.composite {
            let members = composite_members(entry.composites.as_ref(), &name)?;
            debug!("composite role {} has {} member(s)", to_ref(&name), members.len());
            composites.push(CompositeMapping {
                role: to_ref(&name),
                members,
            });
        } else if entry.composites.is_some() {
            debug!("ignoring composites of non-composite role {}", to_ref(&name));
        }

        roles.push(Role {
            name,
            description: entry.description.clone(),
            composite: entry.composite,
        });
    }

    Ok(roles)
}

fn composite_members(
    composites: Option<&CompositesExport>,
    owner: &str,
) -> Result<Vec<RoleRef>, ParseError> {
    let Some(composites) = composites else {
        return Ok(Vec::new());
    };

    let mut members = Vec::new();
    for name in &composites.realm {
        push_unique(&mut members, RoleRef::realm(name));
    }
    let what = format!("composites of role \"{owner}\"");
    for role in client_role_refs(&composites.client, &what)? {
        push_unique(&mut members, role);
    }
    Ok(members)
}

fn client_role_refs(map: &Map<String, Value>, what: &str) -> Result<Vec<RoleRef>, ParseError> {
    let mut refs = Vec::new();
    for (client, value) in map {
        let names: Vec<String> = decode(value.clone(), &format!("{what} for client \"{client}\""))?;
        refs.extend(names.into_iter().map(|name| RoleRef::client(client, name)));
    }
    Ok(refs)
}

fn push_unique(members: &mut Vec<RoleRef>, role: RoleRef) {
    if !members.contains(&role) {
        members.push(role);
    }
}

fn flatten_group(
    export: &GroupExport,
    enclosing: Option<&str>,
    out: &mut Vec<Group>,
) -> Result<(), ParseError> {
    let name = match export.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(ParseError::MalformedInput(match enclosing {
                Some(parent) => format!("a subgroup of \"{parent}\" has no name"),
                None => "a top-level group has no name".to_string(),
            }))
        }
    };

    // Nesting wins over an explicit `parent` field.
    let parent = match enclosing {
        Some(path) => Some(path.to_string()),
        None => export.parent.clone().filter(|p| !p.trim().is_empty()),
    };
    let path = export.path.clone().unwrap_or_else(|| match &parent {
        Some(parent) => format!("{}/{name}", parent.trim_end_matches('/')),
        None => format!("/{name}"),
    });

    if out.iter().any(|g| g.path == path) {
        return Err(ParseError::MalformedInput(format!(
            "group path \"{path}\" is declared twice"
        )));
    }

    let mut role_mappings = Vec::new();
    for role in &export.realm_roles {
        push_unique(&mut role_mappings, RoleRef::realm(role));
    }
    let what = format!("client roles of group \"{path}\"");
    for role in client_role_refs(&export.client_roles, &what)? {
        push_unique(&mut role_mappings, role);
    }

    out.push(Group {
        name,
        path: path.clone(),
        parent,
        role_mappings,
    });

    for child in &export.sub_groups {
        flatten_group(child, Some(&path), out)?;
    }
    Ok(())
}

fn resolve_group_parents(groups: &mut [Group], strict: bool) -> Result<Vec<Warning>, ParseError> {
    let known: HashSet<String> = groups.iter().map(|g| g.path.clone()).collect();
    let mut warnings = Vec::new();

    for group in groups.iter_mut() {
        let Some(parent) = group.parent.clone() else {
            continue;
        };
        if known.contains(&parent) {
            continue;
        }
        let reference = DanglingReference {
            owner: format!("group \"{}\"", group.path),
            target: format!("parent group \"{parent}\""),
        };
        if strict {
            return Err(ParseError::DanglingReference(reference));
        }
        warnings.push(Warning::new(
            WarningKind::ReRootedGroup,
            format!("group \"{}\"", group.path),
            format!("{reference}; treating the group as top-level"),
        ));
        group.parent = None;
    }

    Ok(warnings)
}
