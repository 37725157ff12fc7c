//! Error types produced while loading patterns or assembling source

use std::fmt;
use std::path::PathBuf;

/// The fixed message table a pattern's error template indexes into
/// (spec.md §7, carried over verbatim from the original implementation)
pub const ERROR_MESSAGES: &[&str] = &[
    "Value out of range.",
    "Invalid syntax.",
    "Address out of range.",
    "",
    "",
    "Register out of range.",
    "Port number out of range.",
];

/// Look up a numbered error message, falling back to a generic description
/// for codes outside the fixed table
pub fn error_message(code: i128) -> String {
    if code >= 0 && (code as usize) < ERROR_MESSAGES.len() && !ERROR_MESSAGES[code as usize].is_empty() {
        ERROR_MESSAGES[code as usize].to_string()
    } else {
        format!("error code {code}")
    }
}

/// A fatal error: one that aborts the whole run rather than just the
/// current line (spec.md §4.9)
#[derive(Debug)]
pub enum AssembleError {
    /// The pattern file could not be read
    PatternFileRead { path: PathBuf, source: std::io::Error },
    /// A source file (top-level or `.include`d) could not be read
    SourceFileRead { path: PathBuf, source: std::io::Error },
    /// The output, export or import file could not be written/read
    Io { path: PathBuf, source: std::io::Error },
}

impl std::error::Error for AssembleError {}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::PatternFileRead { path, source } => {
                write!(f, "failed to read pattern file {}: {source}", path.display())
            }
            AssembleError::SourceFileRead { path, source } => {
                write!(f, "failed to read source file {}: {source}", path.display())
            }
            AssembleError::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
        }
    }
}

/// A recoverable condition encountered while assembling one line
/// (spec.md §7). These never abort the pass; they are logged and the
/// pass continues, matching the two-pass diagnostic-suppression rule.
#[derive(Debug, Clone)]
pub enum LineDiagnostic {
    /// No pattern row matched the line
    SyntaxError,
    /// A label reference in the line resolved to nothing
    UndefinedLabel,
    /// A label name was already defined earlier in this pass
    DuplicateLabel { name: String },
    /// A label name collides with a frozen pattern symbol
    LabelShadowsSymbol { name: String },
    /// A pattern row's error template fired
    RangeError { code: i128 },
    /// `.ERROR` directive style user message (reserved for pattern authors)
    User { message: String },
    /// `!!` bundle present but no `.vliw`/`EPIC` rows define a matching set
    MissingVliwDefinition,
}

impl fmt::Display for LineDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineDiagnostic::SyntaxError => write!(f, "Mnemonic/syntax error."),
            LineDiagnostic::UndefinedLabel => write!(f, "undefined label error."),
            LineDiagnostic::DuplicateLabel { name } => {
                write!(f, "label '{name}' already defined.")
            }
            LineDiagnostic::LabelShadowsSymbol { name } => {
                write!(f, "'{name}' is a pattern file symbol.")
            }
            LineDiagnostic::RangeError { code } => {
                write!(f, "Error code {code} {}", error_message(*code))
            }
            LineDiagnostic::User { message } => write!(f, "{message}"),
            LineDiagnostic::MissingVliwDefinition => {
                write!(f, "No vliw instruction-set defined.")
            }
        }
    }
}
