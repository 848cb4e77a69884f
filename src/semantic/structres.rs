//! Struct resolution: the schema a pipeline produces.
//!
//! `final_struct` applies each stage's projection/grouping semantics in
//! sequence over a base schema. It is a pure function of its inputs, used
//! whenever a later stage or a trailing refinement needs to resolve names
//! against the *output* of everything built so far.

use crate::model::pipeline::{Pipeline, Stage, StageField, StageKind};
use crate::model::structs::{FieldDef, StructDef};
use crate::model::types::{DataType, TypeDesc};

/// Compute the schema produced at the end of a pipeline.
pub fn final_struct(base: &StructDef, pipeline: &Pipeline) -> StructDef {
    pipeline
        .stages
        .iter()
        .fold(base.clone(), |current, stage| apply_stage(&current, stage))
}

/// The output schema of a single stage over its input schema.
fn apply_stage(input: &StructDef, stage: &Stage) -> StructDef {
    match stage.kind {
        // Raw SQL passes its input through; its true schema is unknowable
        // without a dialect backend.
        Some(StageKind::Raw) | None => input.clone(),
        Some(StageKind::Index) => index_struct(&input.name),
        Some(StageKind::Reduce) | Some(StageKind::Project) => {
            let mut out = StructDef::new(input.name.clone());
            for field in &stage.fields {
                out.fields.push(output_field(field));
            }
            out
        }
    }
}

fn output_field(field: &StageField) -> FieldDef {
    match field {
        // The stage boundary resets classification: an aggregate output
        // column is a plain scalar for whatever reads it downstream.
        StageField::Expr(f) => FieldDef::Atomic {
            name: f.name.clone(),
            type_desc: TypeDesc::scalar(f.type_desc.data_type.clone()),
        },
        StageField::Nest(turtle) => FieldDef::Turtle {
            name: turtle.name.clone(),
            turtle: Box::new(turtle.clone()),
        },
    }
}

/// The fixed schema of an index stage.
fn index_struct(name: &str) -> StructDef {
    StructDef::new(name)
        .with_column("field_name", DataType::String)
        .with_column("field_value", DataType::String)
        .with_column("weight", DataType::number())
}
