/// Well-formedness check for SpiceDB schema text.
pub mod grammar;
/// Schema graph intermediate representation.
pub mod graph;
/// Realm model to schema graph construction.
pub mod graph_builder;
/// Structural relationships between the schema's singleton objects.
pub mod relationships;
/// SpiceDB schema text rendering.
pub mod serializer;
/// Cycle, duplicate and reference checks on the schema graph.
pub mod validator;
