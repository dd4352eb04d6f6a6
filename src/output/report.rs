use std::fmt;

use crate::translate::{SchemaSource, Translation};

/// Markdown summary of one translation run.
pub struct Report<'a>(pub &'a Translation);

/// Build the markdown report for `translation`.
pub fn build_report(translation: &Translation) -> String {
    Report(translation).to_string()
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let translation = self.0;
        let counts = &translation.counts;

        writeln!(f, "# kc2spicedb Translation Report")?;
        writeln!(f)?;
        writeln!(f, "Realm: `{}`", translation.realm)?;
        match &translation.source {
            SchemaSource::Baseline => writeln!(f, "Schema source: deterministic translation")?,
            SchemaSource::Enhanced { enhancer } => {
                writeln!(f, "Schema source: enhancer `{enhancer}`")?
            }
        }
        writeln!(f)?;

        writeln!(f, "## Summary")?;
        writeln!(f)?;
        writeln!(f, "| Item | Count |")?;
        writeln!(f, "|------|-------|")?;
        writeln!(f, "| Realm roles | {} |", counts.realm_roles)?;
        writeln!(f, "| Client roles | {} |", counts.client_roles)?;
        writeln!(f, "| Composite roles | {} |", counts.composite_roles)?;
        writeln!(f, "| Groups | {} |", counts.groups)?;
        writeln!(f, "| Schema definitions | {} |", counts.definitions)?;
        writeln!(
            f,
            "| Structural relationships | {} |",
            translation.relationships.len()
        )?;

        writeln!(f)?;
        writeln!(f, "## Warnings")?;
        writeln!(f)?;
        if translation.warnings.is_empty() {
            writeln!(f, "None.")?;
        }
        for warning in &translation.warnings {
            writeln!(
                f,
                "- **[{}]** {}: {}",
                warning.kind, warning.subject, warning.message
            )?;
        }

        Ok(())
    }
}
