use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::generator::relationships::format_relationships;
use crate::output::report;
use crate::translate::Translation;

/// Failure to write translation output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The output file name is unusable.
    #[error("invalid output name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Companion files written next to the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Artifacts {
    /// `<name>_report.md`
    pub report: bool,
    /// `<name>_relationships.txt`
    pub relationships: bool,
}

/// Write the schema to `schema_file` and the requested companions next to it.
///
/// Companions are named after the schema file's stem. Returns every path
/// written, schema first.
pub fn write_output(
    schema_file: &Path,
    translation: &Translation,
    artifacts: Artifacts,
) -> Result<Vec<PathBuf>, OutputError> {
    let name = schema_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    validate_output_name(name)?;

    let dir = match schema_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    write_atomic(schema_file, &translation.schema)?;
    written.push(schema_file.to_path_buf());

    if artifacts.report {
        let path = dir.join(format!("{name}_report.md"));
        write_atomic(&path, &report::build_report(translation))?;
        written.push(path);
    }
    if artifacts.relationships {
        let path = dir.join(format!("{name}_relationships.txt"));
        write_atomic(&path, &format_relationships(&translation.relationships))?;
        written.push(path);
    }

    Ok(written)
}

/// Write `contents` to `path` through a temporary file in the same directory,
/// so an existing file is only replaced by complete output.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), OutputError> {
    let write_err = |source: io::Error| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    file.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn validate_output_name(name: &str) -> Result<(), OutputError> {
    let invalid = |reason: &'static str| OutputError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::CurDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return Err(invalid("traversal segments are not allowed"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("path separators are not allowed"));
    }
    Ok(())
}
