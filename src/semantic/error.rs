//! Two-tier error handling for the semantic engine.
//!
//! **Diagnostics** are recoverable, user-facing problems (unresolved
//! references, wrong-kind-of-field, join-crossing restrictions, partial
//! stages). They are collected against the offending span and resolution
//! continues, so the final output is a best-effort model plus the
//! accumulated list — never a hard abort.
//!
//! **Internal errors** signal AST shapes that valid syntax cannot produce
//! (a bug in the system, not in the user's query). They abort the enclosing
//! resolution unit.

use crate::ast::Span;

/// Result type for operations that can hit an internal error.
pub type SemanticResult<T> = Result<T, InternalError>;

/// Compiler-bug-class failures: malformed AST shapes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalError {
    #[error("internal error: nested view '{name}' declared outside a query space")]
    NestOutsideQuerySpace { name: String },
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A problem in the user's query.
    Error,
    /// A warning that doesn't affect the emitted model.
    Warning,
}

/// A diagnostic message with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The span in the source where the diagnostic applies.
    pub span: Span,
    /// The severity level.
    pub severity: Severity,
    /// The diagnostic message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} (at {:?})", level, self.message, self.span)
    }
}

/// The explicit diagnostics collector threaded through resolution.
///
/// Replaces node-mutation: resolution stays referentially transparent with
/// respect to its inputs, and the collector is the one mutable output.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error against a span.
    pub fn log(&mut self, span: Span, message: impl Into<String>) {
        self.items.push(Diagnostic::error(span, message));
    }

    /// Record a warning against a span.
    pub fn warn(&mut self, span: Span, message: impl Into<String>) {
        self.items.push(Diagnostic::warning(span, message));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if any error-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Consume the collector, yielding the accumulated list.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
