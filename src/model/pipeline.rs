//! The emitted query model: pipelines, stages, and view definitions.
//!
//! This is the stable contract handed to a downstream SQL generator. Each
//! stage carries a kind tag and an ordered list of field definitions; a
//! pipeline materialized under a name becomes a `TurtleDef`.

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Span, Spanned};

use super::types::TypeDesc;

/// The defining operation kind of a stage.
///
/// A well-formed stage carries exactly one; a stage with none is "partial"
/// and is stripped before the model is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    /// Group + aggregate (also the home of nested views).
    Reduce,
    /// Scalar select.
    Project,
    /// Search index over named fields.
    Index,
    /// Raw SQL passthrough.
    Raw,
}

/// One resolved output field of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFieldDef {
    /// Output column name.
    pub name: String,
    /// Resolved type descriptor.
    pub type_desc: TypeDesc,
    /// The defining expression.
    pub expr: Expr,
    /// Where the field was declared.
    pub location: Span,
    /// Optional annotation carried from the declaration.
    pub annotation: Option<String>,
}

/// A field of a stage: an expression column or an embedded view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageField {
    Expr(QueryFieldDef),
    Nest(TurtleDef),
}

impl StageField {
    /// The output name of this field.
    pub fn name(&self) -> &str {
        match self {
            StageField::Expr(f) => &f.name,
            StageField::Nest(t) => &t.name,
        }
    }
}

/// A resolved filter riding on a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub expr: Expr,
    pub location: Span,
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stage {
    /// The defining operation kind; `None` marks a partial stage.
    pub kind: Option<StageKind>,
    /// Ordered output fields.
    pub fields: Vec<StageField>,
    /// Filters over the stage input.
    pub filters: Vec<FilterDef>,
    /// Optional row limit.
    pub limit: Option<u64>,
    /// Raw SQL text, for `Raw` stages.
    pub raw_sql: Option<String>,
}

impl Stage {
    /// A stage of the given kind with no fields yet.
    pub fn of_kind(kind: StageKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// True if no defining operation kind is present.
    pub fn is_partial(&self) -> bool {
        self.kind.is_none()
    }

    /// Look up an output field by name.
    pub fn field(&self, name: &str) -> Option<&StageField> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// An ordered sequence of stages transforming one schema into another.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// True if any stage is partial.
    pub fn has_partial_stages(&self) -> bool {
        self.stages.iter().any(Stage::is_partial)
    }
}

/// A named, reusable view compiled to a pipeline.
///
/// Immutable once emitted; referencing it by name from another view
/// triggers refinement, and nesting it embeds it in an enclosing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurtleDef {
    pub name: String,
    pub pipeline: Pipeline,
    pub annotation: Option<String>,
    pub location: Span,
}

impl TurtleDef {
    pub fn new(name: impl Into<String>, pipeline: Pipeline, location: Span) -> Self {
        Self {
            name: name.into(),
            pipeline,
            annotation: None,
            location,
        }
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// Serialize the view to JSON for the SQL-generation backend.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
