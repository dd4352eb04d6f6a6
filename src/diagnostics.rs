use std::fmt;

/// Category of a non-fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// An unresolved role reference was omitted (lenient mode).
    DroppedReference,
    /// A group with an unresolvable parent was treated as top-level (lenient mode).
    ReRootedGroup,
    /// The enhancement collaborator failed, timed out, or is not configured.
    EnhancementFailed,
    /// The enhancement candidate did not pass the grammar check.
    EnhancementRejected,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::DroppedReference => write!(f, "dropped reference"),
            WarningKind::ReRootedGroup => write!(f, "re-rooted group"),
            WarningKind::EnhancementFailed => write!(f, "enhancement failed"),
            WarningKind::EnhancementRejected => write!(f, "enhancement rejected"),
        }
    }
}

/// A condition worth reporting that does not abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// What kind of condition this is.
    pub kind: WarningKind,
    /// The realm object (or collaborator) the warning is about.
    pub subject: String,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    /// Create a warning and log it.
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(kind = %warning.kind, subject = %warning.subject, "{}", warning.message);
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}
