/// Writes the schema, relationships, and report to disk atomically.
pub mod formatter;
/// Builds a Markdown summary of a translation run.
pub mod report;
