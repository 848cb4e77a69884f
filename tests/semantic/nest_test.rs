//! Integration tests for nest resolution: inline bodies, view references,
//! plain-field references, and the scalar lens.

use katydid::ast::{
    AnalyticFunc, Clause, Expr, FieldDecl, FieldPath, NestDecl, NestDeclKind, Spanned,
    StageClauses, ViewBody, ViewDecl,
};
use katydid::model::{DataType, StageField, StageKind, StructDef, TypeDesc};
use katydid::semantic::space::{FieldEntry, FieldSpace, LookupResult, QuerySpace, SpaceEntry};
use katydid::semantic::{resolve_nest_into, Diagnostics, InternalError, ViewResolver};
use katydid::{Analyzer, AnalysisResult, CompileOptions};

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

fn seg(name: &str) -> Spanned<String> {
    Spanned::new(name.to_string(), 0..name.len())
}

fn path(segments: &[&str]) -> FieldPath {
    FieldPath {
        segments: segments.iter().map(|s| seg(s)).collect(),
    }
}

fn flights() -> StructDef {
    StructDef::new("flights")
        .with_column("carrier", DataType::String)
        .with_column("distance", DataType::integer())
        .with_join(
            "origin",
            StructDef::new("airports").with_column("code", DataType::String),
        )
}

fn group_by(names: &[&str]) -> Spanned<Clause> {
    let decls = names.iter().map(|n| FieldDecl::bare(path(&[*n]))).collect();
    Spanned::new(Clause::GroupBy(decls), 0..1)
}

fn stage(clauses: Vec<Spanned<Clause>>) -> StageClauses {
    StageClauses::new(clauses)
}

fn nest_clause(decls: Vec<NestDecl>) -> Spanned<Clause> {
    Spanned::new(Clause::Nest(decls), 0..1)
}

fn nest_ref(name: &str, target: &[&str]) -> NestDecl {
    NestDecl {
        name: seg(name),
        annotation: None,
        kind: NestDeclKind::Ref(path(target)),
    }
}

fn nest_inline(name: &str, body: ViewBody) -> NestDecl {
    NestDecl {
        name: seg(name),
        annotation: None,
        kind: NestDeclKind::Inline(body),
    }
}

/// Resolve a one-stage view whose stage carries the given nest clause.
fn resolve_with_nest(schema: &StructDef, options: CompileOptions, nest: NestDecl) -> AnalysisResult {
    let view = ViewDecl {
        name: seg("outer"),
        annotation: None,
        body: ViewBody::fresh(vec![stage(vec![group_by(&["carrier"]), nest_clause(vec![nest])])]),
    };
    Analyzer::new(options).resolve_view(schema, &view).unwrap()
}

fn flights_with_by_carrier() -> StructDef {
    let view = ViewDecl {
        name: seg("by_carrier"),
        annotation: None,
        body: ViewBody::fresh(vec![stage(vec![group_by(&["carrier"])])]),
    };
    let result = Analyzer::default().resolve_view(&flights(), &view).unwrap();
    flights().with_turtle(result.turtle.unwrap())
}

fn nest_field<'a>(result: &'a AnalysisResult, name: &str) -> Option<&'a StageField> {
    result
        .turtle
        .as_ref()?
        .pipeline
        .stages
        .first()?
        .field(name)
}

// ----------------------------------------------------------------------
// Inline nests
// ----------------------------------------------------------------------

#[test]
fn test_inline_nest_embeds_its_pipeline() {
    let nest = nest_inline(
        "by_distance",
        ViewBody::fresh(vec![stage(vec![group_by(&["distance"])])]),
    );
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest);

    assert!(result.is_ok());
    match nest_field(&result, "by_distance") {
        Some(StageField::Nest(turtle)) => {
            assert_eq!(turtle.pipeline.stages.len(), 1);
            assert_eq!(turtle.pipeline.stages[0].kind, Some(StageKind::Reduce));
        }
        other => panic!("expected a nest field, got {:?}", other),
    }
}

#[test]
fn test_inline_nest_is_forced_to_grouping() {
    // `calculate` alone pins no stage kind; inside a nest the stage is
    // still classified as a grouping.
    let rank = Expr::Analytic {
        func: AnalyticFunc::Rank,
        arg: None,
    };
    let nest = nest_inline(
        "ranked",
        ViewBody::fresh(vec![stage(vec![Spanned::new(
            Clause::Calculate(vec![FieldDecl::named("r", 0..1, Spanned::new(rank, 5..11))]),
            0..1,
        )])]),
    );
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest);

    match nest_field(&result, "ranked") {
        Some(StageField::Nest(turtle)) => {
            assert_eq!(turtle.pipeline.stages[0].kind, Some(StageKind::Reduce));
        }
        other => panic!("expected a nest field, got {:?}", other),
    }
}

#[test]
fn test_inline_nest_select_is_coerced_to_grouping() {
    // A project stage inside a nest still yields a grouped result set.
    let nest = nest_inline(
        "listed",
        ViewBody::fresh(vec![stage(vec![Spanned::new(
            Clause::Select(vec![FieldDecl::bare(path(&["carrier"]))]),
            0..1,
        )])]),
    );
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest);

    assert!(result.is_ok(), "diagnostics: {:?}", result.diagnostics);
    match nest_field(&result, "listed") {
        Some(StageField::Nest(turtle)) => {
            assert_eq!(turtle.pipeline.stages[0].kind, Some(StageKind::Reduce));
            assert_eq!(turtle.pipeline.stages[0].fields[0].name(), "carrier");
        }
        other => panic!("expected a nest field, got {:?}", other),
    }
}

#[test]
fn test_inline_nest_sees_enclosing_scope() {
    // The inner body references a field only the outer schema defines.
    let nest = nest_inline(
        "inner",
        ViewBody::fresh(vec![stage(vec![group_by(&["distance"])])]),
    );
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest);
    assert!(result.is_ok(), "diagnostics: {:?}", result.diagnostics);
}

#[test]
fn test_inline_nest_refinement_cannot_add_stages() {
    let body = ViewBody::extending(path(&["by_carrier"])).with_refinement(stage(vec![]));
    let body = ViewBody {
        stages: vec![stage(vec![group_by(&["carrier"])])],
        ..body
    };
    let nest = nest_inline("n", body);
    let result = resolve_with_nest(&flights_with_by_carrier(), CompileOptions::default(), nest);

    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message == "Cannot add stages after refining a nested view"));
}

// ----------------------------------------------------------------------
// Reference nests
// ----------------------------------------------------------------------

#[test]
fn test_nest_reference_to_view_is_renamed() {
    let nest = nest_ref("top_carriers", &["by_carrier"]);
    let result = resolve_with_nest(&flights_with_by_carrier(), CompileOptions::default(), nest);

    assert!(result.is_ok(), "diagnostics: {:?}", result.diagnostics);
    match nest_field(&result, "top_carriers") {
        Some(StageField::Nest(turtle)) => {
            assert_eq!(turtle.name, "top_carriers");
            assert_eq!(turtle.pipeline.stages.len(), 1);
        }
        other => panic!("expected a nest field, got {:?}", other),
    }
}

#[test]
fn test_nest_reference_through_join_always_rejected() {
    // The restriction does not depend on the scalar lens.
    for lens in [false, true] {
        let options = CompileOptions::default().with_scalar_lens(lens);
        let result = resolve_with_nest(&flights(), options, nest_ref("n", &["origin", "code"]));

        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message == "Cannot nest view from join"));
        assert!(nest_field(&result, "n").is_none());
    }
}

#[test]
fn test_nest_of_plain_field_rejected_without_lens() {
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest_ref("n", &["distance"]));

    assert!(result.has_errors());
    insta::assert_snapshot!(
        &result.diagnostics[0].message,
        @"`distance` is not a query; did you mean to use a `group_by` or `select` operation instead?"
    );
    assert!(nest_field(&result, "n").is_none());
}

#[test]
fn test_nest_of_plain_field_wrapped_under_lens() {
    let options = CompileOptions::default().with_scalar_lens(true);
    let result = resolve_with_nest(&flights(), options, nest_ref("n", &["distance"]));

    assert!(result.is_ok(), "diagnostics: {:?}", result.diagnostics);
    match nest_field(&result, "n") {
        Some(StageField::Nest(turtle)) => {
            assert_eq!(turtle.name, "n");
            assert_eq!(turtle.pipeline.stages.len(), 1);
            assert_eq!(turtle.pipeline.stages[0].kind, Some(StageKind::Reduce));
            assert_eq!(turtle.pipeline.stages[0].fields[0].name(), "distance");
        }
        other => panic!("expected a nest field, got {:?}", other),
    }
}

#[test]
fn test_nest_of_aggregate_entry_has_tailored_message() {
    // The aggregate message does not depend on the scalar lens.
    for lens in [false, true] {
        let mut arena = katydid::semantic::SpaceArena::new();
        let mut query = QuerySpace::over(&flights(), 0..0, &mut arena);
        query
            .new_entry(
                "total",
                SpaceEntry::Field(FieldEntry::Column {
                    type_desc: TypeDesc::aggregate(DataType::integer()),
                }),
            )
            .unwrap();
        let mut space = FieldSpace::Query(query);

        let analyzer = Analyzer::new(CompileOptions::default().with_scalar_lens(lens));
        let diags = analyzer
            .resolve_nest(&mut arena, &mut space, &nest_ref("n", &["total"]))
            .unwrap();

        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].message,
            "`total` is an aggregate expression; did you mean to use an `aggregate` operation instead?"
        );
    }
}

#[test]
fn test_nest_of_analytic_entry_has_tailored_message() {
    let mut arena = katydid::semantic::SpaceArena::new();
    let mut query = QuerySpace::over(&flights(), 0..0, &mut arena);
    query
        .new_entry(
            "r",
            SpaceEntry::Field(FieldEntry::Column {
                type_desc: TypeDesc::analytic(DataType::integer()),
            }),
        )
        .unwrap();
    let mut space = FieldSpace::Query(query);

    let diags = Analyzer::default()
        .resolve_nest(&mut arena, &mut space, &nest_ref("n", &["r"]))
        .unwrap();

    assert_eq!(
        diags[0].message,
        "`r` is an analytic expression; did you mean to use a `calculate` operation instead?"
    );
}

#[test]
fn test_nest_of_unresolved_name_logs_and_continues() {
    let result = resolve_with_nest(&flights(), CompileOptions::default(), nest_ref("n", &["nope"]));

    assert!(result.has_errors());
    assert!(result.diagnostics[0].message.contains("'nope' is not defined"));
    // The enclosing view still resolves.
    assert_eq!(
        result.turtle.unwrap().pipeline.stages[0].fields.len(),
        1
    );
}

#[test]
fn test_duplicate_nest_name_rejected() {
    let view = ViewDecl {
        name: seg("outer"),
        annotation: None,
        body: ViewBody::fresh(vec![stage(vec![
            group_by(&["carrier"]),
            nest_clause(vec![
                nest_ref("carrier", &["by_carrier"]),
            ]),
        ])]),
    };
    let result = Analyzer::default()
        .resolve_view(&flights_with_by_carrier(), &view)
        .unwrap();

    assert!(result.has_errors());
    assert!(result.diagnostics[0].message.contains("'carrier' is already defined"));
}

// ----------------------------------------------------------------------
// Space requirements
// ----------------------------------------------------------------------

#[test]
fn test_nest_outside_query_space_is_internal_error() {
    let mut arena = katydid::semantic::SpaceArena::new();
    let mut space = FieldSpace::static_over(&flights());
    let err = Analyzer::default()
        .resolve_nest(&mut arena, &mut space, &nest_ref("n", &["distance"]))
        .unwrap_err();

    assert_eq!(
        err,
        InternalError::NestOutsideQuerySpace {
            name: "n".to_string()
        }
    );
}

#[test]
fn test_nested_view_records_enclosing_space() {
    let mut arena = katydid::semantic::SpaceArena::new();
    let mut space = FieldSpace::Query(QuerySpace::over(&flights(), 0..0, &mut arena));
    let options = CompileOptions::default();
    let mut diags = Diagnostics::new();

    let nest = nest_inline(
        "n",
        ViewBody::fresh(vec![stage(vec![group_by(&["distance"])])]),
    );
    {
        let mut resolver = ViewResolver::new(&options, &mut arena, &mut diags);
        resolve_nest_into(&mut resolver, &nest, &mut space).unwrap();
    }
    assert!(diags.is_empty());

    let query = space.as_query_mut().unwrap();
    match query.lookup(&[seg("n")]) {
        LookupResult::Found(SpaceEntry::Field(FieldEntry::NestedView { enclosing, .. })) => {
            assert_eq!(enclosing, query.id());
            assert_eq!(arena.get(enclosing).unwrap().source, "flights");
        }
        other => panic!("expected a nested-view entry, got {:?}", other),
    }
}

#[test]
fn test_resolve_nest_shares_the_caller_arena() {
    // The back-reference recorded by `Analyzer::resolve_nest` is an index
    // into the arena the query space was opened in.
    let mut arena = katydid::semantic::SpaceArena::new();
    let mut space = FieldSpace::Query(QuerySpace::over(
        &flights_with_by_carrier(),
        0..0,
        &mut arena,
    ));

    let diags = Analyzer::default()
        .resolve_nest(&mut arena, &mut space, &nest_ref("n", &["by_carrier"]))
        .unwrap();
    assert!(diags.is_empty());

    let query = space.as_query_mut().unwrap();
    match query.lookup(&[seg("n")]) {
        LookupResult::Found(SpaceEntry::Field(FieldEntry::NestedView { enclosing, .. })) => {
            assert_eq!(enclosing, query.id());
            assert_eq!(arena.get(enclosing).unwrap().source, "flights");
        }
        other => panic!("expected a nested-view entry, got {:?}", other),
    }
}
