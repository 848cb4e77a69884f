//! Nest resolution: views embedded as fields of an enclosing query stage.
//!
//! Three declaration shapes, all normalized to a `TurtleDef` registered in
//! the enclosing query space:
//!
//! - Inline (declares its own clauses) — resolved like a view, forced to a
//!   grouping classification.
//! - Bare reference to an existing view — wrapped under the nest's name.
//! - Bare reference to a plain field — synthesized into a single-field
//!   reduce pipeline under the scalar lens, rejected with a tailored
//!   message otherwise.
//!
//! A nest declared into a non-query space is a fatal internal error: valid
//! syntax cannot produce that shape.

use crate::ast::{NestDecl, NestDeclKind, Spanned};
use crate::model::pipeline::{StageField, TurtleDef};
use crate::model::types::ExpressionType;

use super::error::{InternalError, SemanticResult};
use super::space::{DuplicateName, FieldEntry, FieldSpace, LookupResult, QuerySpace, SpaceEntry};
use super::view::{scalar_wrap_pipeline, Scope, ViewResolver};

/// Resolve a nest declaration into a field space.
///
/// The space must be the query variant; anything else signals a malformed
/// AST and aborts the enclosing resolution unit.
pub fn resolve_nest_into(
    resolver: &mut ViewResolver<'_>,
    decl: &NestDecl,
    space: &mut FieldSpace,
) -> SemanticResult<()> {
    let Some(query) = space.as_query_mut() else {
        return Err(InternalError::NestOutsideQuerySpace {
            name: decl.name.value.clone(),
        });
    };
    resolve_nest_in_query(resolver, decl, query, None)
}

/// Resolve a nest declaration inside a known query space.
pub(crate) fn resolve_nest_in_query(
    resolver: &mut ViewResolver<'_>,
    decl: &NestDecl,
    space: &mut QuerySpace,
    outer: Option<&Scope<'_>>,
) -> SemanticResult<()> {
    match &decl.kind {
        NestDeclKind::Inline(body) => {
            // A nested view may refine a base, but only in a single
            // refinement stage.
            if body.base.is_some() && !body.stages.is_empty() {
                resolver.diags.log(
                    decl.name.span.clone(),
                    "Cannot add stages after refining a nested view",
                );
            }
            let scope = Scope::Query {
                space: &*space,
                outer,
            };
            let turtle = resolver.resolve_body(
                &decl.name,
                decl.annotation.clone(),
                body,
                scope,
                true,
            )?;
            register(resolver, space, &decl.name, turtle);
            Ok(())
        }
        NestDeclKind::Ref(path) => {
            let result = resolver.lookup_in(space, outer, &path.segments);
            let entry = match result {
                LookupResult::NotFound(msg) => {
                    resolver.diags.log(path.span(), msg);
                    return Ok(());
                }
                LookupResult::Found(entry) => entry,
            };

            // Join-crossing is rejected for every bare-reference nest,
            // independent of the scalar-lens flag.
            if path.crosses_join() {
                resolver
                    .diags
                    .log(path.span(), "Cannot nest view from join");
                return Ok(());
            }

            if let Some(turtle) = entry.turtle() {
                let wrapped = TurtleDef {
                    name: decl.name.value.clone(),
                    pipeline: turtle.pipeline.clone(),
                    annotation: decl.annotation.clone().or_else(|| turtle.annotation.clone()),
                    location: decl.name.span.clone(),
                };
                register(resolver, space, &decl.name, wrapped);
                return Ok(());
            }

            let desc = entry.type_desc();
            match desc.expression_type {
                ExpressionType::Analytic => {
                    resolver.diags.log(
                        path.span(),
                        format!(
                            "`{}` is an analytic expression; did you mean to use a `calculate` operation instead?",
                            path.dotted()
                        ),
                    );
                }
                ExpressionType::Aggregate => {
                    resolver.diags.log(
                        path.span(),
                        format!(
                            "`{}` is an aggregate expression; did you mean to use an `aggregate` operation instead?",
                            path.dotted()
                        ),
                    );
                }
                ExpressionType::Scalar => {
                    let atomic = match &entry {
                        SpaceEntry::Field(field) => field.is_atomic(),
                        SpaceEntry::Parameter(_) => false,
                    };

                    if atomic && resolver.options.scalar_lens {
                        let pipeline = scalar_wrap_pipeline(path, &desc);
                        let turtle = TurtleDef {
                            name: decl.name.value.clone(),
                            pipeline,
                            annotation: decl.annotation.clone(),
                            location: decl.name.span.clone(),
                        };
                        register(resolver, space, &decl.name, turtle);
                    } else if atomic {
                        resolver.diags.log(
                            path.span(),
                            format!(
                                "`{}` is not a query; did you mean to use a `group_by` or `select` operation instead?",
                                path.dotted()
                            ),
                        );
                    } else {
                        resolver.diags.log(
                            path.span(),
                            format!("Expected `{}` to be a query", path.dotted()),
                        );
                    }
                }
            }
            Ok(())
        }
    }
}

/// Register a resolved nest into the enclosing query space, recording the
/// back-reference to that space.
fn register(
    resolver: &mut ViewResolver<'_>,
    space: &mut QuerySpace,
    name: &Spanned<String>,
    turtle: TurtleDef,
) {
    let entry = SpaceEntry::Field(FieldEntry::NestedView {
        turtle: turtle.clone(),
        enclosing: space.id(),
    });
    if let Err(DuplicateName(taken)) =
        space.push_field(name.value.clone(), entry, StageField::Nest(turtle))
    {
        resolver
            .diags
            .log(name.span.clone(), format!("'{}' is already defined", taken));
    }
}
