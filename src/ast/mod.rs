//! AST node types for the analytical query language.
//!
//! Parsing is an external collaborator: the semantic engine consumes an
//! already-built AST. This module defines the shapes that engine understands:
//!
//! - Expressions (literals, references, operators, aggregate/analytic calls)
//! - Field paths (possibly multi-segment, crossing joins)
//! - Stage clauses (group_by, aggregate, select, nest, index, where, limit)
//! - View declarations (fresh, extending, refined) and nest declarations
//!
//! Declaration shapes are closed tagged unions; there is no declaration
//! class hierarchy. Every node carries the span it was parsed from so
//! diagnostics can point back at the source.

pub mod span;

use serde::{Deserialize, Serialize};

pub use span::{Span, Spanned};

// ============================================================================
// Expressions
// ============================================================================

/// An expression, as delivered by the parser.
///
/// Number literals keep their raw text: classification (integer vs float vs
/// unparseable) is the semantic layer's job, not the parser's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal, raw source text.
    NumberLit(String),
    /// A string literal.
    StringLit(String),
    /// A boolean literal.
    BoolLit(bool),
    /// A reference to a field, parameter, or view.
    FieldRef(FieldPath),
    /// A binary operation.
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinaryOp,
        right: Box<Spanned<Expr>>,
    },
    /// An aggregate function call: `sum(amount)`, `count()`.
    Agg {
        func: AggFunc,
        arg: Option<Box<Spanned<Expr>>>,
    },
    /// An analytic (window) function call: `rank()`, `lag(total)`.
    Analytic {
        func: AnalyticFunc,
        arg: Option<Box<Spanned<Expr>>>,
    },
}

impl Expr {
    /// Create a single-segment field reference.
    pub fn field(name: impl Into<String>, span: Span) -> Self {
        Expr::FieldRef(FieldPath {
            segments: vec![Spanned::new(name.into(), span)],
        })
    }

    /// Create a multi-segment field reference from `(name, span)` pairs.
    pub fn path(segments: Vec<(String, Span)>) -> Self {
        Expr::FieldRef(FieldPath {
            segments: segments
                .into_iter()
                .map(|(name, span)| Spanned::new(name, span))
                .collect(),
        })
    }

    /// Create a number literal from raw text.
    pub fn number(text: impl Into<String>) -> Self {
        Expr::NumberLit(text.into())
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    And,
    Or,
}

impl BinaryOp {
    /// True if this operator yields a boolean result.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::And | BinaryOp::Or
        )
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

/// Analytic (window) functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticFunc {
    Rank,
    RowNumber,
    Lag,
    Lead,
}

/// A dotted reference path: `amount` or `carrier.nickname`.
///
/// More than one segment means the reference reaches through a joined,
/// struct-valued field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPath {
    pub segments: Vec<Spanned<String>>,
}

impl FieldPath {
    /// The span covering the whole path.
    pub fn span(&self) -> Span {
        let start = self.segments.first().map(|s| s.span.start).unwrap_or(0);
        let end = self.segments.last().map(|s| s.span.end).unwrap_or(0);
        start..end
    }

    /// Render the path as dotted source text.
    pub fn dotted(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.value.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// True if the path crosses a join (more than one segment).
    pub fn crosses_join(&self) -> bool {
        self.segments.len() > 1
    }
}

// ============================================================================
// Clauses
// ============================================================================

/// One `name is expr` (or bare reference) element of a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Explicit output name, if the declaration carries one.
    pub name: Option<Spanned<String>>,
    /// The defining expression.
    pub expr: Spanned<Expr>,
    /// Optional annotation attached by the parser.
    pub annotation: Option<String>,
}

impl FieldDecl {
    /// A bare reference: output name is the last path segment.
    pub fn bare(path: FieldPath) -> Self {
        let span = path.span();
        Self {
            name: None,
            expr: Spanned::new(Expr::FieldRef(path), span),
            annotation: None,
        }
    }

    /// A named declaration: `name is expr`.
    pub fn named(name: impl Into<String>, name_span: Span, expr: Spanned<Expr>) -> Self {
        Self {
            name: Some(Spanned::new(name.into(), name_span)),
            expr,
            annotation: None,
        }
    }

    /// The output column name, if one can be derived.
    ///
    /// Explicit names win; a bare reference falls back to its last segment.
    /// Any other unnamed expression has no derivable name.
    pub fn output_name(&self) -> Option<&str> {
        if let Some(name) = &self.name {
            return Some(&name.value);
        }
        match &self.expr.value {
            Expr::FieldRef(path) => path.segments.last().map(|s| s.value.as_str()),
            _ => None,
        }
    }
}

/// A clause inside one pipeline stage segment.
///
/// `Where` and `Limit` are non-defining: a stage carrying only them has no
/// operation kind and is stripped as partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// Grouping columns (pins the stage to reduce).
    GroupBy(Vec<FieldDecl>),
    /// Aggregate columns (pins the stage to reduce).
    Aggregate(Vec<FieldDecl>),
    /// Analytic columns computed over the stage output.
    Calculate(Vec<FieldDecl>),
    /// Scalar projection columns (pins the stage to project).
    Select(Vec<FieldDecl>),
    /// Index over the named fields (pins the stage to index).
    Index(Vec<FieldPath>),
    /// Nested views embedded as fields (pins the stage to reduce).
    Nest(Vec<NestDecl>),
    /// A filter over the stage input.
    Where(Spanned<Expr>),
    /// Row limit.
    Limit(u64),
}

/// The clause set of one `-> { ... }` pipeline segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageClauses {
    pub clauses: Vec<Spanned<Clause>>,
}

impl StageClauses {
    pub fn new(clauses: Vec<Spanned<Clause>>) -> Self {
        Self { clauses }
    }
}

// ============================================================================
// View declarations
// ============================================================================

/// A view ("turtle") declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDecl {
    /// The declared view name.
    pub name: Spanned<String>,
    /// Optional annotation attached by the parser.
    pub annotation: Option<String>,
    /// The declaration body.
    pub body: ViewBody,
}

/// The body of a view or inline-nest declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewBody {
    /// A named view to extend, if any: `v is other_view + { ... }`.
    pub base: Option<FieldPath>,
    /// The `+ { ... }` refinement gesture, if any.
    pub refinement: Option<StageClauses>,
    /// Appended `-> { ... }` stage segments.
    pub stages: Vec<StageClauses>,
}

impl ViewBody {
    /// A body that only declares its own stages.
    pub fn fresh(stages: Vec<StageClauses>) -> Self {
        Self {
            base: None,
            refinement: None,
            stages,
        }
    }

    /// A body extending a named view.
    pub fn extending(base: FieldPath) -> Self {
        Self {
            base: Some(base),
            refinement: None,
            stages: Vec::new(),
        }
    }

    /// Attach a refinement gesture.
    pub fn with_refinement(mut self, refinement: StageClauses) -> Self {
        self.refinement = Some(refinement);
        self
    }
}

// ============================================================================
// Nest declarations
// ============================================================================

/// A view embedded as a field of an enclosing query stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestDecl {
    /// The declared field name.
    pub name: Spanned<String>,
    /// Optional annotation attached by the parser.
    pub annotation: Option<String>,
    /// The declaration shape.
    pub kind: NestDeclKind,
}

/// The shape of a nest declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NestDeclKind {
    /// `nest: n is { group_by: ... }` — declares its own clauses.
    Inline(ViewBody),
    /// `nest: n is some_name` — a bare reference, resolved against the
    /// enclosing space. May land on a view or on a plain field.
    Ref(FieldPath),
}
