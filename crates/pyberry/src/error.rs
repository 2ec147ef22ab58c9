//! Errors raised while translating a script.

use std::path::PathBuf;

/// Error that aborts a translation run.
///
/// Every variant is terminal: translation is a pure function of its input,
/// so there is no partial output and nothing to retry.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("unsupported construct `{node_kind}`: {context}")]
    UnsupportedConstruct { node_kind: String, context: String },

    #[error("malformed assignment target: {description}")]
    MalformedTarget { description: String },

    #[error("syntax error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl TranslateError {
    pub fn unsupported(node_kind: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            node_kind: node_kind.into(),
            context: context.into(),
        }
    }

    pub fn malformed(description: impl Into<String>) -> Self {
        Self::MalformedTarget {
            description: description.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a source line to the error's context.
    ///
    /// Only the innermost statement tags the error; outer statements leave
    /// an already-located error alone.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::UnsupportedConstruct { node_kind, context } if !context.contains(" (line ") => {
                Self::UnsupportedConstruct {
                    node_kind,
                    context: format!("{context} (line {line})"),
                }
            }
            Self::MalformedTarget { description } if !description.contains(" (line ") => {
                Self::MalformedTarget {
                    description: format!("{description} (line {line})"),
                }
            }
            other => other,
        }
    }

    /// Short stable name of the error kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedConstruct { .. } => "unsupported-construct",
            Self::MalformedTarget { .. } => "malformed-target",
            Self::Parse { .. } => "parse",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
        }
    }
}
