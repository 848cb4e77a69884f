//! The semantic analysis engine.
//!
//! Consumes an AST and an externally-resolved base schema; produces a
//! serializable pipeline model plus accumulated diagnostics:
//!
//! ```text
//! AST view/nest declarations
//!        │
//!        ▼ [field space lookups, entry registry]
//! Type classification at each reference
//!        │
//!        ▼ [view/turtle resolver + struct resolver re-scoping]
//! TurtleDef / Pipeline / StructDef model
//! ```
//!
//! Resolution is single-threaded, synchronous, and performs no I/O; each
//! compile is a pure, bounded-recursion computation over a finite AST.

pub mod classify;
pub mod error;
pub mod nest;
pub mod space;
pub mod structres;
pub mod view;

use crate::ast::{NestDecl, ViewDecl};
use crate::model::pipeline::TurtleDef;
use crate::model::structs::StructDef;

pub use error::{Diagnostic, Diagnostics, InternalError, SemanticResult, Severity};
pub use nest::resolve_nest_into;
pub use space::{FieldSpace, SpaceArena};
pub use structres::final_struct;
pub use view::{strip_partial_stages, ViewResolver};

// ============================================================================
// Options
// ============================================================================

/// Options for semantic analysis.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// The "scalar lens" experiment: a plain scalar field may stand in for
    /// a view wherever a view is expected, by implicit single-field
    /// wrapping.
    pub scalar_lens: bool,
}

impl CompileOptions {
    /// Enable or disable the scalar-lens experiment.
    pub fn with_scalar_lens(mut self, enabled: bool) -> Self {
        self.scalar_lens = enabled;
        self
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Result of analyzing one declaration: a best-effort model plus the
/// accumulated diagnostic list.
#[derive(Debug)]
pub struct AnalysisResult {
    /// The resolved view, if resolution reached finalization.
    pub turtle: Option<TurtleDef>,
    /// Diagnostic messages collected during resolution.
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    /// Returns true if analysis produced a model without errors.
    pub fn is_ok(&self) -> bool {
        self.turtle.is_some() && !self.has_errors()
    }

    /// Returns true if there are any error diagnostics.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns only the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

/// Entry point for semantic analysis over a base schema.
///
/// Each call is an independent compilation unit: the transient field-space
/// graph is built, consulted, and discarded; only the emitted model and
/// diagnostics survive.
#[derive(Debug, Default)]
pub struct Analyzer {
    options: CompileOptions,
}

impl Analyzer {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Resolve a view declaration against a base schema.
    ///
    /// Diagnostics never abort resolution; an `Err` means a malformed AST
    /// (a bug in the producer, not in the user's query).
    pub fn resolve_view(
        &self,
        schema: &StructDef,
        decl: &ViewDecl,
    ) -> SemanticResult<AnalysisResult> {
        let mut diags = Diagnostics::new();
        let mut arena = SpaceArena::new();
        let space = FieldSpace::static_over(schema);
        let mut resolver = ViewResolver::new(&self.options, &mut arena, &mut diags);
        let turtle = resolver.resolve_view(decl, &space)?;
        Ok(AnalysisResult {
            turtle: Some(turtle),
            diagnostics: diags.into_vec(),
        })
    }

    /// Resolve a nest declaration into an existing field space.
    ///
    /// The space must be the query variant, and `arena` must be the arena
    /// the space was opened in — the registered entry's enclosing-space
    /// back-reference is an index into it. Anything other than a query
    /// space is a fatal internal error.
    pub fn resolve_nest(
        &self,
        arena: &mut SpaceArena,
        space: &mut FieldSpace,
        decl: &NestDecl,
    ) -> SemanticResult<Vec<Diagnostic>> {
        let mut diags = Diagnostics::new();
        let mut resolver = ViewResolver::new(&self.options, arena, &mut diags);
        nest::resolve_nest_into(&mut resolver, decl, space)?;
        Ok(diags.into_vec())
    }
}
