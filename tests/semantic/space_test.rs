//! Integration tests for field spaces, the entry registry, and parameters.

use katydid::ast::{Expr, Spanned};
use katydid::model::{DataType, ExpressionType, StructDef, TypeDesc};
use katydid::semantic::space::{
    FieldEntry, FieldSpace, LookupResult, ParameterEntry, QuerySpace, SpaceArena, SpaceEntry,
};

fn seg(name: &str) -> Spanned<String> {
    Spanned::new(name.to_string(), 0..name.len())
}

fn flights() -> StructDef {
    let airports = StructDef::new("airports")
        .with_column("code", DataType::String)
        .with_join(
            "state_facts",
            StructDef::new("state_facts").with_column("popular_name", DataType::String),
        );
    StructDef::new("flights")
        .with_column("carrier", DataType::String)
        .with_column("distance", DataType::integer())
        .with_join("origin", airports)
}

#[test]
fn test_lookup_recurses_through_chained_joins() {
    let space = FieldSpace::static_over(&flights());

    assert!(space.lookup(&[seg("origin"), seg("code")]).is_found());
    assert!(space
        .lookup(&[seg("origin"), seg("state_facts"), seg("popular_name")])
        .is_found());
}

#[test]
fn test_lookup_failure_messages() {
    let space = FieldSpace::static_over(&flights());

    match space.lookup(&[seg("missing")]) {
        LookupResult::NotFound(msg) => assert_eq!(msg, "'missing' is not defined"),
        _ => panic!("expected NotFound"),
    }
    match space.lookup(&[seg("carrier"), seg("code")]) {
        LookupResult::NotFound(msg) => {
            assert_eq!(msg, "'carrier' is not a join, cannot look up 'code' inside it")
        }
        _ => panic!("expected NotFound"),
    }
    // Failure inside a join names the inner segment.
    match space.lookup(&[seg("origin"), seg("missing")]) {
        LookupResult::NotFound(msg) => assert_eq!(msg, "'missing' is not defined"),
        _ => panic!("expected NotFound"),
    }
}

#[test]
fn test_query_space_result_order_is_declaration_order() {
    use katydid::model::{QueryFieldDef, StageField};

    let mut arena = SpaceArena::new();
    let mut space = QuerySpace::over(&flights(), 0..0, &mut arena);

    for name in ["b", "a", "c"] {
        let desc = TypeDesc::scalar(DataType::String);
        space
            .push_field(
                name,
                SpaceEntry::Field(FieldEntry::Column {
                    type_desc: desc.clone(),
                }),
                StageField::Expr(QueryFieldDef {
                    name: name.to_string(),
                    type_desc: desc,
                    expr: Expr::field(name, 0..1),
                    location: 0..1,
                    annotation: None,
                }),
            )
            .unwrap();
    }

    let names: Vec<&str> = space.result().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
}

#[test]
fn test_query_space_rejects_duplicate_declaration() {
    let mut arena = SpaceArena::new();
    let mut space = QuerySpace::over(&flights(), 0..0, &mut arena);
    let entry = SpaceEntry::Field(FieldEntry::Column {
        type_desc: TypeDesc::scalar(DataType::String),
    });

    space.new_entry("carrier", entry.clone()).unwrap();
    let err = space.new_entry("carrier", entry).unwrap_err();
    assert_eq!(err.to_string(), "'carrier' is already defined");
}

#[test]
fn test_abstract_parameter_types_lazily_from_declaration() {
    let mut arena = SpaceArena::new();
    let mut space = QuerySpace::over(&flights(), 0..0, &mut arena);
    space
        .new_entry(
            "min_distance",
            SpaceEntry::Parameter(ParameterEntry::abstract_from(Expr::number("500"))),
        )
        .unwrap();

    match space.lookup(&[seg("min_distance")]) {
        LookupResult::Found(entry) => {
            let desc = entry.type_desc();
            assert_eq!(desc.data_type, DataType::integer());
            assert_eq!(desc.expression_type, ExpressionType::Scalar);
        }
        _ => panic!("expected Found"),
    }
}

#[test]
fn test_defined_parameter_keeps_its_type() {
    let mut arena = SpaceArena::new();
    let mut space = QuerySpace::over(&flights(), 0..0, &mut arena);
    space
        .new_entry(
            "region",
            SpaceEntry::Parameter(ParameterEntry::defined(TypeDesc::scalar(DataType::String))),
        )
        .unwrap();

    match space.lookup(&[seg("region")]) {
        LookupResult::Found(entry) => assert_eq!(entry.type_desc().data_type, DataType::String),
        _ => panic!("expected Found"),
    }
}

#[test]
fn test_arena_survives_space_teardown() {
    let mut arena = SpaceArena::new();
    let id = {
        let space = QuerySpace::over(&flights(), 3..9, &mut arena);
        space.id()
    };

    // The record outlives the space that registered it.
    let meta = arena.get(id).unwrap();
    assert_eq!(meta.source, "flights");
    assert_eq!(meta.location, 3..9);
}
