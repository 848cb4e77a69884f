//! View ("turtle") resolution: the central algorithm.
//!
//! Given a view declaration — possibly extending another view by name,
//! possibly refined with extra clauses — produce the final pipeline:
//!
//! 1. Resolve the extended base, if named (join restrictions, the
//!    scalar-lens relaxation, best-effort empty base on failure).
//! 2. Re-scope: compute the pipeline's output schema and resolve the
//!    declaration's own clauses against it.
//! 3. Append the declaration's own stages.
//! 4. Apply the trailing refinement when no named base was extended.
//! 5. Finalize as a `TurtleDef`, stripping partial stages.
//!
//! Failures are diagnostics, not faults: sibling declarations keep
//! compiling and the emitted model is best-effort.

use crate::ast::{
    Clause, Expr, FieldDecl, FieldPath, Span, Spanned, StageClauses, ViewBody, ViewDecl,
};
use crate::model::pipeline::{
    FilterDef, Pipeline, QueryFieldDef, Stage, StageField, StageKind, TurtleDef,
};
use crate::model::structs::StructDef;
use crate::model::types::{DataType, ExpressionType, TypeDesc};

use super::classify;
use super::error::{Diagnostics, SemanticResult};
use super::nest;
use super::space::{
    DuplicateName, FieldEntry, FieldSpace, LookupResult, QuerySpace, SpaceArena, SpaceEntry,
};
use super::structres::final_struct;
use super::CompileOptions;

// ============================================================================
// Scopes
// ============================================================================

/// A resolution scope: either a plain field space, or an in-progress query
/// space chained to the scope it was opened inside (later clauses of a
/// stage see fields declared by earlier clauses, then fall back outward).
#[derive(Clone, Copy)]
pub(crate) enum Scope<'s> {
    Space(&'s FieldSpace),
    Query {
        space: &'s QuerySpace,
        outer: Option<&'s Scope<'s>>,
    },
}

impl<'s> Scope<'s> {
    pub(crate) fn lookup(&self, segments: &[Spanned<String>]) -> LookupResult {
        match self {
            Scope::Space(fs) => fs.lookup(segments),
            Scope::Query { space, outer } => match space.lookup(segments) {
                found @ LookupResult::Found(_) => found,
                not_found @ LookupResult::NotFound(_) => match outer {
                    Some(o) => o.lookup(segments),
                    None => not_found,
                },
            },
        }
    }

    pub(crate) fn base_struct(&self) -> &StructDef {
        match self {
            Scope::Space(fs) => fs.base_struct(),
            Scope::Query { space, .. } => space.base(),
        }
    }
}

/// What classification a clause expects of its expressions.
#[derive(Clone, Copy)]
enum ExpectedClass {
    /// Must be scalar (`group_by`, `select`).
    Scalar(&'static str),
    /// Must be aggregate (`aggregate`).
    Aggregate,
    /// Lifted to analytic (`calculate` accepts anything).
    Analytic,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves view declarations into pipelines.
pub struct ViewResolver<'a> {
    pub(crate) options: &'a CompileOptions,
    pub(crate) arena: &'a mut SpaceArena,
    pub(crate) diags: &'a mut Diagnostics,
}

impl<'a> ViewResolver<'a> {
    pub fn new(
        options: &'a CompileOptions,
        arena: &'a mut SpaceArena,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self {
            options,
            arena,
            diags,
        }
    }

    /// Resolve a view declaration against a field space.
    pub fn resolve_view(&mut self, decl: &ViewDecl, fs: &FieldSpace) -> SemanticResult<TurtleDef> {
        self.resolve_body(
            &decl.name,
            decl.annotation.clone(),
            &decl.body,
            Scope::Space(fs),
            false,
        )
    }

    /// Resolve a view body in a scope. Shared between top-level views and
    /// inline nests (which force a grouping classification).
    pub(crate) fn resolve_body(
        &mut self,
        name: &Spanned<String>,
        annotation: Option<String>,
        body: &ViewBody,
        scope: Scope<'_>,
        force_grouping: bool,
    ) -> SemanticResult<TurtleDef> {
        let base_struct = scope.base_struct().clone();
        let mut annotation = annotation;
        let mut pipeline = Pipeline::empty();

        // Step 1: resolve the extended base, if named.
        if let Some(base_path) = &body.base {
            match scope.lookup(&base_path.segments) {
                LookupResult::NotFound(msg) => {
                    self.diags.log(base_path.span(), msg);
                }
                LookupResult::Found(entry) => {
                    if let Some(turtle) = entry.turtle() {
                        if base_path.crosses_join() {
                            self.diags
                                .log(base_path.span(), "Cannot use view from join");
                        } else {
                            pipeline = turtle.pipeline.clone();
                            if annotation.is_none() {
                                annotation = turtle.annotation.clone();
                            }
                        }
                    } else if let Some(type_desc) = scalar_lens_target(&entry, self.options) {
                        pipeline = scalar_wrap_pipeline(base_path, &type_desc);
                    } else {
                        self.diags.log(
                            base_path.span(),
                            format!("Expected `{}` to be a query", base_path.dotted()),
                        );
                    }
                }
            }

            // The refinement gesture applies to the named base.
            if let Some(refinement) = &body.refinement {
                pipeline =
                    self.refine(&base_struct, pipeline, refinement, name.span.clone())?;
            }
        }

        // Steps 2+3: append own stages. The first stage of an empty
        // pipeline resolves in the original scope; afterwards each stage
        // re-scopes against the output of everything built so far.
        for segment in &body.stages {
            let stage = if pipeline.is_empty() {
                self.build_stage(segment, &base_struct, Some(&scope), name.span.clone())?
            } else {
                let input = final_struct(&base_struct, &pipeline);
                self.build_stage(segment, &input, None, name.span.clone())?
            };
            pipeline.stages.push(stage);
        }

        // Step 4: trailing refinement, only when no named base was extended.
        if body.base.is_none() {
            if let Some(refinement) = &body.refinement {
                pipeline =
                    self.refine(&base_struct, pipeline, refinement, name.span.clone())?;
            }
        }

        // Nested sub-queries always yield a grouped result set: kind-less
        // stages with fields are classified as grouping, and a project
        // stage is coerced to one.
        if force_grouping {
            for stage in &mut pipeline.stages {
                match stage.kind {
                    None if !stage.fields.is_empty() => stage.kind = Some(StageKind::Reduce),
                    Some(StageKind::Project) => stage.kind = Some(StageKind::Reduce),
                    _ => {}
                }
            }
        }

        // Step 5: finalize and strip partial stages.
        let (clean, stripped) = strip_partial_stages(&pipeline);
        if stripped > 0 {
            self.diags.log(
                name.span.clone(),
                "Can't determine view type (`group_by` / `aggregate` / `nest`, `select`, `index`)",
            );
        }

        let mut turtle = TurtleDef::new(name.value.clone(), clean, name.span.clone());
        turtle.annotation = annotation;
        Ok(turtle)
    }

    // ------------------------------------------------------------------
    // Refinement operator
    // ------------------------------------------------------------------

    /// Append or merge extra clauses onto a pipeline.
    ///
    /// Merges into the last stage when the clause set is compatible with
    /// its defining operation kind; otherwise opens a new stage over the
    /// pipeline's output schema. Sequential, not associative-commutative.
    pub(crate) fn refine(
        &mut self,
        base: &StructDef,
        mut pipeline: Pipeline,
        clauses: &StageClauses,
        location: Span,
    ) -> SemanticResult<Pipeline> {
        let implied = implied_kind(clauses);
        let merge = match (pipeline.stages.last(), implied) {
            (Some(last), Some(kind)) => last.kind.is_none() || last.kind == Some(kind),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if merge {
            let last_index = pipeline.stages.len() - 1;
            let prefix = Pipeline {
                stages: pipeline.stages[..last_index].to_vec(),
            };
            let input = final_struct(base, &prefix);
            let seed = pipeline.stages[last_index].clone();
            let merged =
                self.build_stage_seeded(Some(&seed), clauses, &input, None, location)?;
            pipeline.stages[last_index] = merged;
        } else {
            let input = final_struct(base, &pipeline);
            let stage = self.build_stage(clauses, &input, None, location)?;
            pipeline.stages.push(stage);
        }
        Ok(pipeline)
    }

    // ------------------------------------------------------------------
    // Stage building
    // ------------------------------------------------------------------

    fn build_stage(
        &mut self,
        clauses: &StageClauses,
        input: &StructDef,
        outer: Option<&Scope<'_>>,
        location: Span,
    ) -> SemanticResult<Stage> {
        self.build_stage_seeded(None, clauses, input, outer, location)
    }

    /// Build one stage from a clause set, optionally seeded with an
    /// existing stage's fields (the refinement merge case).
    fn build_stage_seeded(
        &mut self,
        seed: Option<&Stage>,
        clauses: &StageClauses,
        input: &StructDef,
        outer: Option<&Scope<'_>>,
        location: Span,
    ) -> SemanticResult<Stage> {
        let mut space = QuerySpace::over(input, location, self.arena);
        let mut kind = seed.and_then(|s| s.kind);
        let mut filters = seed.map(|s| s.filters.clone()).unwrap_or_default();
        let mut limit = seed.and_then(|s| s.limit);

        if let Some(seed) = seed {
            self.seed_space(&mut space, seed);
        }

        for clause in &clauses.clauses {
            match &clause.value {
                Clause::GroupBy(decls) => {
                    if self.pin_kind(&mut kind, StageKind::Reduce, &clause.span, "group_by") {
                        for decl in decls {
                            self.add_expr_field(
                                &mut space,
                                outer,
                                decl,
                                ExpectedClass::Scalar("group_by"),
                            );
                        }
                    }
                }
                Clause::Aggregate(decls) => {
                    if self.pin_kind(&mut kind, StageKind::Reduce, &clause.span, "aggregate") {
                        for decl in decls {
                            self.add_expr_field(&mut space, outer, decl, ExpectedClass::Aggregate);
                        }
                    }
                }
                Clause::Calculate(decls) => {
                    // Non-defining: a calculate-only stage stays partial.
                    for decl in decls {
                        self.add_expr_field(&mut space, outer, decl, ExpectedClass::Analytic);
                    }
                }
                Clause::Select(decls) => {
                    if self.pin_kind(&mut kind, StageKind::Project, &clause.span, "select") {
                        for decl in decls {
                            self.add_expr_field(
                                &mut space,
                                outer,
                                decl,
                                ExpectedClass::Scalar("select"),
                            );
                        }
                    }
                }
                Clause::Index(paths) => {
                    if self.pin_kind(&mut kind, StageKind::Index, &clause.span, "index") {
                        for path in paths {
                            self.add_index_field(&mut space, outer, path);
                        }
                    }
                }
                Clause::Nest(decls) => {
                    if self.pin_kind(&mut kind, StageKind::Reduce, &clause.span, "nest") {
                        for decl in decls {
                            nest::resolve_nest_in_query(self, decl, &mut space, outer)?;
                        }
                    }
                }
                Clause::Where(expr) => {
                    let desc = self.classify_in(&expr.value, &space, outer);
                    match desc.expression_type {
                        ExpressionType::Scalar => filters.push(FilterDef {
                            expr: expr.value.clone(),
                            location: expr.span.clone(),
                        }),
                        ExpressionType::Aggregate => self.diags.log(
                            expr.span.clone(),
                            "Aggregate expressions are not allowed in `where`",
                        ),
                        ExpressionType::Analytic => self.diags.log(
                            expr.span.clone(),
                            "Analytic expressions are not allowed in `where`",
                        ),
                    }
                }
                Clause::Limit(n) => {
                    limit = Some(*n);
                }
            }
        }

        Ok(Stage {
            kind,
            fields: space.into_result(),
            filters,
            limit,
            raw_sql: seed.and_then(|s| s.raw_sql.clone()),
        })
    }

    /// Re-declare an existing stage's fields into a fresh merge space so
    /// refinements see them and duplicate names are rejected.
    fn seed_space(&mut self, space: &mut QuerySpace, seed: &Stage) {
        for field in &seed.fields {
            let entry = match field {
                StageField::Expr(f) => SpaceEntry::Field(FieldEntry::Column {
                    type_desc: f.type_desc.clone(),
                }),
                StageField::Nest(turtle) => SpaceEntry::Field(FieldEntry::NestedView {
                    turtle: turtle.clone(),
                    enclosing: space.id(),
                }),
            };
            // Seed fields came from a well-formed stage; names are unique.
            let _ = space.push_field(field.name().to_string(), entry, field.clone());
        }
    }

    fn pin_kind(
        &mut self,
        kind: &mut Option<StageKind>,
        wanted: StageKind,
        span: &Span,
        clause: &str,
    ) -> bool {
        match *kind {
            None => {
                *kind = Some(wanted);
                true
            }
            Some(existing) if existing == wanted => true,
            Some(existing) => {
                self.diags.log(
                    span.clone(),
                    format!(
                        "`{}` is not allowed in a {} stage",
                        clause,
                        kind_name(existing)
                    ),
                );
                false
            }
        }
    }

    fn add_expr_field(
        &mut self,
        space: &mut QuerySpace,
        outer: Option<&Scope<'_>>,
        decl: &FieldDecl,
        expected: ExpectedClass,
    ) {
        let Some(name) = decl.output_name() else {
            self.diags.log(
                decl.expr.span.clone(),
                "Expression requires a name: use `name is expression`",
            );
            return;
        };
        let name = name.to_string();

        // Surface the resolution failure for bare references; classification
        // alone would silently yield an unknown type.
        if let Expr::FieldRef(path) = &decl.expr.value {
            if let LookupResult::NotFound(msg) = self.lookup_in(space, outer, &path.segments) {
                self.diags.log(path.span(), msg);
                return;
            }
        }

        let mut desc = self.classify_in(&decl.expr.value, space, outer);
        match expected {
            ExpectedClass::Scalar(clause) => match desc.expression_type {
                ExpressionType::Scalar => {}
                ExpressionType::Aggregate => {
                    self.diags.log(
                        decl.expr.span.clone(),
                        format!("Cannot use an aggregate expression in `{}`", clause),
                    );
                    return;
                }
                ExpressionType::Analytic => {
                    self.diags.log(
                        decl.expr.span.clone(),
                        format!("Cannot use an analytic expression in `{}`", clause),
                    );
                    return;
                }
            },
            ExpectedClass::Aggregate => match desc.expression_type {
                ExpressionType::Aggregate => {}
                ExpressionType::Scalar => {
                    self.diags.log(
                        decl.expr.span.clone(),
                        "Expected an aggregate expression in `aggregate`",
                    );
                    return;
                }
                ExpressionType::Analytic => {
                    self.diags.log(
                        decl.expr.span.clone(),
                        "Cannot use an analytic expression in `aggregate`",
                    );
                    return;
                }
            },
            ExpectedClass::Analytic => {
                desc = desc.compose_with(ExpressionType::Analytic);
            }
        }

        let entry = SpaceEntry::Field(FieldEntry::Column {
            type_desc: desc.clone(),
        });
        let field = StageField::Expr(QueryFieldDef {
            name: name.clone(),
            type_desc: desc,
            expr: decl.expr.value.clone(),
            location: decl.expr.span.clone(),
            annotation: decl.annotation.clone(),
        });
        if let Err(DuplicateName(taken)) = space.push_field(name, entry, field) {
            self.diags.log(
                decl.expr.span.clone(),
                format!("'{}' is already defined", taken),
            );
        }
    }

    fn add_index_field(
        &mut self,
        space: &mut QuerySpace,
        outer: Option<&Scope<'_>>,
        path: &FieldPath,
    ) {
        match self.lookup_in(space, outer, &path.segments) {
            LookupResult::NotFound(msg) => self.diags.log(path.span(), msg),
            LookupResult::Found(entry) => {
                let Some(name) = path.segments.last().map(|s| s.value.clone()) else {
                    return;
                };
                let desc = entry.type_desc();
                let entry = SpaceEntry::Field(FieldEntry::Column {
                    type_desc: desc.clone(),
                });
                let field = StageField::Expr(QueryFieldDef {
                    name: name.clone(),
                    type_desc: desc,
                    expr: Expr::FieldRef(path.clone()),
                    location: path.span(),
                    annotation: None,
                });
                if let Err(DuplicateName(taken)) = space.push_field(name, entry, field) {
                    self.diags
                        .log(path.span(), format!("'{}' is already defined", taken));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Scope plumbing
    // ------------------------------------------------------------------

    pub(crate) fn lookup_in(
        &self,
        space: &QuerySpace,
        outer: Option<&Scope<'_>>,
        segments: &[Spanned<String>],
    ) -> LookupResult {
        match space.lookup(segments) {
            found @ LookupResult::Found(_) => found,
            not_found @ LookupResult::NotFound(_) => match outer {
                Some(scope) => match scope.lookup(segments) {
                    found @ LookupResult::Found(_) => found,
                    LookupResult::NotFound(_) => not_found,
                },
                None => not_found,
            },
        }
    }

    fn classify_in(
        &self,
        expr: &Expr,
        space: &QuerySpace,
        outer: Option<&Scope<'_>>,
    ) -> TypeDesc {
        classify::classify_with(expr, |path| {
            match self.lookup_in(space, outer, &path.segments) {
                LookupResult::Found(entry) => Some(entry.type_desc()),
                LookupResult::NotFound(_) => None,
            }
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn kind_name(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Reduce => "grouping",
        StageKind::Project => "project",
        StageKind::Index => "index",
        StageKind::Raw => "raw",
    }
}

/// The stage kind a clause set pins, if any.
fn implied_kind(clauses: &StageClauses) -> Option<StageKind> {
    for clause in &clauses.clauses {
        let kind = match &clause.value {
            Clause::GroupBy(_) | Clause::Aggregate(_) | Clause::Nest(_) => Some(StageKind::Reduce),
            Clause::Select(_) => Some(StageKind::Project),
            Clause::Index(_) => Some(StageKind::Index),
            Clause::Calculate(_) | Clause::Where(_) | Clause::Limit(_) => None,
        };
        if kind.is_some() {
            return kind;
        }
    }
    None
}

/// The scalar-lens target type, when the relaxation applies: the entry is a
/// plain scalar column whose underlying type is not itself a struct, and
/// the experiment is enabled.
fn scalar_lens_target(entry: &SpaceEntry, options: &CompileOptions) -> Option<TypeDesc> {
    if !options.scalar_lens {
        return None;
    }
    match entry {
        SpaceEntry::Field(FieldEntry::Column { type_desc })
            if type_desc.expression_type == ExpressionType::Scalar
                && type_desc.data_type != DataType::Struct =>
        {
            Some(type_desc.clone())
        }
        _ => None,
    }
}

/// Synthesize a one-stage pipeline: a reduce stage projecting exactly the
/// referenced field. Used by the scalar lens and by atomic-field nests.
pub(crate) fn scalar_wrap_pipeline(path: &FieldPath, type_desc: &TypeDesc) -> Pipeline {
    let name = path
        .segments
        .last()
        .map(|s| s.value.clone())
        .unwrap_or_default();
    let mut stage = Stage::of_kind(StageKind::Reduce);
    stage.fields.push(StageField::Expr(QueryFieldDef {
        name,
        type_desc: type_desc.clone(),
        expr: Expr::FieldRef(path.clone()),
        location: path.span(),
        annotation: None,
    }));
    Pipeline {
        stages: vec![stage],
    }
}

/// Strip partial stages from a pipeline, returning the clean pipeline and
/// how many stages were removed. Idempotent: a clean pipeline comes back
/// unchanged.
pub fn strip_partial_stages(pipeline: &Pipeline) -> (Pipeline, usize) {
    let stages: Vec<Stage> = pipeline
        .stages
        .iter()
        .filter(|s| !s.is_partial())
        .cloned()
        .collect();
    let stripped = pipeline.stages.len() - stages.len();
    (Pipeline { stages }, stripped)
}
