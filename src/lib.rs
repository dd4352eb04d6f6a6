//! Translate Keycloak realm exports into `SpiceDB` schemas.
#![warn(missing_docs)]

/// Non-fatal conditions reported alongside a translation.
pub mod diagnostics;
/// Optional external schema enhancement: collaborator trait, bounded calls, clients.
pub mod enhance;
/// Error taxonomy shared by the parser, validator, and orchestrator.
pub mod error;
/// Schema graph construction, validation, serialization, and grammar checks.
pub mod generator;
/// Atomic file output and markdown report generation.
pub mod output;
/// Realm export parsing into a normalized realm model.
pub mod parser;
/// Translation orchestrator: the single entry point over the whole pipeline.
pub mod translate;

pub use error::{GrammarError, ParseError, TranslateError, ValidationError};
pub use translate::{translate, TranslateOptions, Translation, Translator};
