//! Error types for the translation pipeline.
//!
//! Parsing and validation failures are fatal. Enhancement failures are not
//! errors of the pipeline at all: they surface as warnings and the
//! deterministic baseline is used (see [`crate::enhance::EnhanceError`]).

use std::fmt;

use thiserror::Error;

pub use crate::generator::grammar::GrammarError;

/// A reference from one realm object to another that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Object holding the reference, e.g. `role "admin"`.
    pub owner: String,
    /// What the reference points at, e.g. `role "ghost"`.
    pub target: String,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} references undefined {}", self.owner, self.target)
    }
}

/// Which dependency graph a cycle was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleScope {
    /// Composite role membership.
    CompositeRole,
    /// Group parent/child nesting.
    Group,
}

impl fmt::Display for CycleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleScope::CompositeRole => write!(f, "composite role"),
            CycleScope::Group => write!(f, "group"),
        }
    }
}

/// Failure to turn a raw realm export into a realm model.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document lacks the minimum required shape.
    #[error("malformed realm export: {0}")]
    MalformedInput(String),

    /// The configured structural validator rejected the document.
    #[error("realm export violates the configured JSON schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    /// A group names a parent path that no group declares.
    #[error("dangling reference: {0}")]
    DanglingReference(DanglingReference),
}

/// Failure of a structural check on the schema graph.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A composite role or group transitively contains itself.
    #[error("cyclic {scope} dependency: {}", .cycle.join(" → "))]
    CyclicDependency {
        /// Graph the cycle was found in.
        scope: CycleScope,
        /// Source identifiers along the cycle; the first entry is repeated at the end.
        cycle: Vec<String>,
    },

    /// A loosely recorded reference could not be resolved in strict mode.
    #[error("dangling reference: {0}")]
    DanglingReference(DanglingReference),

    /// Two realm objects map onto the same schema definition name.
    #[error("definition '{name}' is produced by both {first} and {second}")]
    DuplicateDefinition {
        /// The colliding definition name.
        name: String,
        /// Source object of the first definition.
        first: String,
        /// Source object of the second definition.
        second: String,
    },

    /// A relation or permission refers to something the graph does not declare.
    #[error("definition '{definition}' refers to undeclared '{reference}'")]
    UnresolvedExpression {
        /// Definition holding the reference.
        definition: String,
        /// The reference as it would be rendered.
        reference: String,
    },
}

/// Any fatal failure of a translation run.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The realm export could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The schema graph failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TranslateError {
    /// The dangling reference behind this error, if that is what it is.
    pub fn dangling_reference(&self) -> Option<&DanglingReference> {
        match self {
            TranslateError::Parse(ParseError::DanglingReference(reference))
            | TranslateError::Validation(ValidationError::DanglingReference(reference)) => {
                Some(reference)
            }
            _ => None,
        }
    }

    /// True when the run failed because of a composite role or group cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            TranslateError::Validation(ValidationError::CyclicDependency { .. })
        )
    }
}
