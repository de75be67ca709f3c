//! Error types for parsing and compilation.

use thiserror::Error;

use crate::span::{render, Span};

/// Error during lexing or parsing.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Optional suggestion for fixing the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    /// Add a hint to the error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let mut out = render(source, self.span, &format!("error: {}", self.message));
        if let Some(hint) = &self.hint {
            out.push_str(&format!("   = hint: {}\n", hint));
        }
        out
    }
}

/// Kinds of compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// A `:name` parameter with no bound value.
    UnboundParameter,
    /// `between` with a lower bound above the upper bound.
    InvalidRange,
    /// A literal where a different kind of value is required.
    InvalidLiteral,
    /// A structurally invalid query (bad paging, misplaced aggregate, ...).
    InvalidQuery,
}

/// Error during compilation (AST to plan).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    /// Error kind for programmatic handling.
    pub kind: CompileErrorKind,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, kind: CompileErrorKind) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
        }
    }

    pub fn unbound_parameter(name: &str, span: Span) -> Self {
        Self::new(
            format!("no value bound for parameter ':{}'", name),
            span,
            CompileErrorKind::UnboundParameter,
        )
    }

    pub fn invalid_literal(message: impl Into<String>, span: Span) -> Self {
        Self::new(message, span, CompileErrorKind::InvalidLiteral)
    }

    pub fn invalid_query(message: impl Into<String>, span: Span) -> Self {
        Self::new(message, span, CompileErrorKind::InvalidQuery)
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        render(
            source,
            self.span,
            &format!("error[{:?}]: {}", self.kind, self.message),
        )
    }
}

/// A combined error type for the public API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LangError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
}

impl LangError {
    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        match self {
            LangError::Parse(e) => e.format_with_source(source),
            LangError::Compile(e) => e.format_with_source(source),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LangError::Parse(e) => e.span,
            LangError::Compile(e) => e.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_formatting() {
        let source = "select m fron Member m";
        let err = ParseError::new("expected 'from', found identifier 'fron'", Span::new(9, 13))
            .with_hint("did you mean 'from'?");

        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1:10"));
        assert!(formatted.contains("expected 'from'"));
        assert!(formatted.contains("hint: did you mean 'from'?"));
    }

    #[test]
    fn test_compile_error_formatting() {
        let source = "select m from Member m where m.username = :name";
        let err = CompileError::unbound_parameter("name", Span::new(42, 47));
        let formatted = LangError::from(err).format_with_source(source);
        assert!(formatted.starts_with("error[UnboundParameter]: no value bound for parameter ':name'"));
        assert!(formatted.contains("line 1:43"));
    }
}
