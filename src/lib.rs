//! # Katydid
//!
//! Semantic analysis engine for a declarative analytical query language.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            AST (views, nests, stage clauses)             │
//! │         (produced by an external parser)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [field spaces + entry registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │         Name resolution + type classification            │
//! │         (scalar / aggregate / analytic)                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [view/turtle + nest resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │       TurtleDef / Pipeline / StructDef model             │
//! │       (handed to an external SQL generator)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine consumes an AST and an externally-resolved base schema and
//! produces a serializable pipeline model. It does not parse, generate
//! SQL, execute queries, or talk to any database.

pub mod ast;
pub mod model;
pub mod semantic;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::ast::{
        Clause, Expr, FieldDecl, FieldPath, NestDecl, NestDeclKind, Span, Spanned, StageClauses,
        ViewBody, ViewDecl,
    };
    pub use crate::model::{
        DataType, ExpressionType, FieldDef, NumberKind, Pipeline, Stage, StageField, StageKind,
        StructDef, TurtleDef, TypeDesc,
    };
    pub use crate::semantic::{
        AnalysisResult, Analyzer, CompileOptions, Diagnostic, Diagnostics, FieldSpace,
        InternalError, Severity,
    };
}

pub use semantic::{AnalysisResult, Analyzer, CompileOptions};
