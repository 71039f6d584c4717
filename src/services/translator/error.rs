// Translation Errors
//
// Typed failures raised inside the engine. Lexical errors abort the whole
// request; structural and unsupported-construct errors are recoverable and
// resolved by the configured policy in the conversion service.

use thiserror::Error;

/// What kind of lexical construct was left open at end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalErrorKind {
    UnterminatedQuote(char),
    UnterminatedBlockComment,
}

impl std::fmt::Display for LexicalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexicalErrorKind::UnterminatedQuote(q) => write!(f, "unterminated {} quote", q),
            LexicalErrorKind::UnterminatedBlockComment => write!(f, "unterminated block comment"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Lexical error: {kind} starting at line {line}, column {column}")]
    Lexical {
        kind: LexicalErrorKind,
        line: usize,
        column: usize,
    },

    #[error("Statement {statement}: {message}")]
    Structural { statement: usize, message: String },

    #[error("Statement {statement}: unsupported construct {construct}")]
    Unsupported { statement: usize, construct: String },

    #[error("Formatting failed: {0}")]
    Format(String),
}

impl ConversionError {
    /// Build a lexical error from a byte offset into the scanned text
    pub fn lexical(kind: LexicalErrorKind, source: &str, offset: usize) -> Self {
        let (line, column) = line_col(source, offset);
        ConversionError::Lexical { kind, line, column }
    }

    pub fn structural(statement: usize, message: impl Into<String>) -> Self {
        ConversionError::Structural {
            statement,
            message: message.into(),
        }
    }

    pub fn unsupported(statement: usize, construct: impl Into<String>) -> Self {
        ConversionError::Unsupported {
            statement,
            construct: construct.into(),
        }
    }

    /// Whether the policy may recover from this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversionError::Structural { .. } | ConversionError::Unsupported { .. }
        )
    }

    /// Statement index the error refers to, if any
    pub fn statement(&self) -> Option<usize> {
        match self {
            ConversionError::Structural { statement, .. }
            | ConversionError::Unsupported { statement, .. } => Some(*statement),
            _ => None,
        }
    }
}

/// 1-based line and column of a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(pos) => before[pos + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
