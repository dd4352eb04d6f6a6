//! Parse → build → validate → serialize, with optional enhancement.
//!
//! The deterministic baseline is always produced first. An enhancement
//! candidate can only replace it after passing [`check_schema`]; every
//! enhancement failure is reported as a warning and the baseline is kept.

use std::sync::Arc;

use tracing::info;

use crate::diagnostics::{Warning, WarningKind};
use crate::enhance::{
    request_candidate, strip_code_fences, EnhanceConfig, EnhancementRequest, Enhancer,
};
use crate::error::TranslateError;
use crate::generator::grammar::check_schema;
use crate::generator::graph_builder;
use crate::generator::relationships::{structural_relationships, Relationship};
use crate::generator::serializer::serialize;
use crate::generator::validator;
use crate::parser::realm::RealmModel;
use crate::parser::realm_parser::{ParsedRealm, RealmParser};
use crate::parser::structure::StructuralValidator;

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Ask the configured enhancer for a candidate before settling on the baseline.
    pub enhance: bool,
    /// Treat unresolved references as fatal instead of dropping them with a warning.
    pub strict: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            enhance: false,
            strict: true,
        }
    }
}

/// Which producer the returned schema came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// The deterministic translator.
    Baseline,
    /// An accepted enhancement candidate.
    Enhanced {
        /// Name of the enhancer that produced it.
        enhancer: String,
    },
}

/// Size of the translated realm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationCounts {
    /// Realm roles.
    pub realm_roles: usize,
    /// Client roles across all clients.
    pub client_roles: usize,
    /// Composite roles.
    pub composite_roles: usize,
    /// Groups, nested ones included.
    pub groups: usize,
    /// Definitions in the baseline schema.
    pub definitions: usize,
}

impl TranslationCounts {
    fn new(model: &RealmModel, definitions: usize) -> Self {
        Self {
            realm_roles: model.realm_roles.len(),
            client_roles: model.client_role_count(),
            composite_roles: model.composites.len(),
            groups: model.groups.len(),
            definitions,
        }
    }
}

/// Result of a successful translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Realm name.
    pub realm: String,
    /// Schema text, ending in a single newline.
    pub schema: String,
    /// Producer of `schema`.
    pub source: SchemaSource,
    /// Non-fatal conditions, in the order they were found.
    pub warnings: Vec<Warning>,
    /// Structural relationships of the baseline schema; empty when an
    /// enhanced schema was accepted instead.
    pub relationships: Vec<Relationship>,
    /// Realm and schema sizes.
    pub counts: TranslationCounts,
}

/// Configured translation pipeline.
#[derive(Default)]
pub struct Translator {
    parser: RealmParser,
    enhancer: Option<(Arc<dyn Enhancer>, EnhanceConfig)>,
}

impl Translator {
    /// Pipeline without structural validation or enhancer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every raw export with `validator` before parsing it.
    pub fn with_structural_validator(
        mut self,
        validator: impl StructuralValidator + 'static,
    ) -> Self {
        self.parser = self.parser.with_structural_validator(validator);
        self
    }

    /// Use `enhancer` when a run asks for enhancement.
    pub fn with_enhancer(mut self, enhancer: impl Enhancer + 'static, config: EnhanceConfig) -> Self {
        self.enhancer = Some((Arc::new(enhancer), config));
        self
    }

    /// Translate one realm export.
    pub fn translate(
        &self,
        raw: &str,
        options: &TranslateOptions,
    ) -> Result<Translation, TranslateError> {
        let ParsedRealm { model, mut warnings } = self.parser.parse_str(raw, options.strict)?;

        let graph = graph_builder::build(&model);
        let validated = validator::validate(graph, options.strict)?;
        warnings.extend_from_slice(validated.warnings());

        let baseline = serialize(&validated);
        let counts = TranslationCounts::new(&model, validated.graph().definitions.len());
        info!(
            "baseline schema for realm '{}': {} definition(s)",
            model.name, counts.definitions
        );

        let enhanced = if options.enhance {
            self.enhance(&model, &baseline, &mut warnings)
        } else {
            None
        };

        let translation = match enhanced {
            Some((enhancer, schema)) => {
                info!("using schema proposed by enhancer '{enhancer}'");
                Translation {
                    realm: model.name,
                    schema,
                    source: SchemaSource::Enhanced { enhancer },
                    warnings,
                    relationships: Vec::new(),
                    counts,
                }
            }
            None => Translation {
                realm: model.name,
                schema: baseline,
                source: SchemaSource::Baseline,
                warnings,
                relationships: structural_relationships(&validated),
                counts,
            },
        };
        Ok(translation)
    }

    /// An accepted candidate and the enhancer's name, or `None` to keep the baseline.
    fn enhance(
        &self,
        model: &RealmModel,
        baseline: &str,
        warnings: &mut Vec<Warning>,
    ) -> Option<(String, String)> {
        let Some((enhancer, config)) = &self.enhancer else {
            warnings.push(Warning::new(
                WarningKind::EnhancementFailed,
                "enhancement",
                "no enhancer configured; using the deterministic schema",
            ));
            return None;
        };

        let request = Arc::new(EnhancementRequest {
            realm: model.name.clone(),
            baseline: baseline.to_string(),
            summary: model.summary(),
        });

        let candidate = match request_candidate(enhancer, &request, config) {
            Ok(candidate) => candidate,
            Err(err) => {
                warnings.push(Warning::new(
                    WarningKind::EnhancementFailed,
                    enhancer.name(),
                    format!("{err}; using the deterministic schema"),
                ));
                return None;
            }
        };

        let candidate = strip_code_fences(&candidate);
        match check_schema(candidate) {
            Ok(_) => Some((enhancer.name().to_string(), format!("{candidate}\n"))),
            Err(err) => {
                warnings.push(Warning::new(
                    WarningKind::EnhancementRejected,
                    enhancer.name(),
                    format!("{err}; using the deterministic schema"),
                ));
                None
            }
        }
    }
}

/// Translate one realm export with a default [`Translator`], returning the schema text.
pub fn translate(raw: &str, options: &TranslateOptions) -> Result<String, TranslateError> {
    Translator::new()
        .translate(raw, options)
        .map(|translation| translation.schema)
}
