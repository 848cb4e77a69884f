//! The emitted semantic model.
//!
//! These types are what the engine produces: serializable, with no
//! dependency on the transient resolution graph that built them.

pub mod pipeline;
pub mod structs;
pub mod types;

pub use pipeline::{FilterDef, Pipeline, QueryFieldDef, Stage, StageField, StageKind, TurtleDef};
pub use structs::{FieldDef, StructDef};
pub use types::{DataType, ExpressionType, NumberKind, TypeDesc};
