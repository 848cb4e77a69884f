//! Schema types: ordered, typed field sets.
//!
//! A `StructDef` is what a pipeline stage reads from and what it produces.
//! Fields may be plain columns, struct-valued joins (which make multi-segment
//! references resolvable), or views defined on the schema itself.

use serde::{Deserialize, Serialize};

use super::pipeline::TurtleDef;
use super::types::{DataType, TypeDesc};

/// A named field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDef {
    /// A plain, leaf column.
    Atomic { name: String, type_desc: TypeDesc },
    /// A joined, struct-valued field carrying its own schema.
    Join { name: String, struct_def: StructDef },
    /// A view defined on this schema.
    Turtle { name: String, turtle: Box<TurtleDef> },
}

impl FieldDef {
    /// Create an atomic scalar column.
    pub fn column(name: impl Into<String>, data_type: DataType) -> Self {
        FieldDef::Atomic {
            name: name.into(),
            type_desc: TypeDesc::scalar(data_type),
        }
    }

    /// The field's name.
    pub fn name(&self) -> &str {
        match self {
            FieldDef::Atomic { name, .. } => name,
            FieldDef::Join { name, .. } => name,
            FieldDef::Turtle { name, .. } => name,
        }
    }

    /// The field's type descriptor.
    ///
    /// Joins are struct-typed and views are turtle-typed, both scalar
    /// classified (classification tracks usage, not shape).
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            FieldDef::Atomic { type_desc, .. } => type_desc.clone(),
            FieldDef::Join { .. } => TypeDesc::scalar(DataType::Struct),
            FieldDef::Turtle { .. } => TypeDesc::scalar(DataType::Turtle),
        }
    }
}

/// An ordered set of named, typed fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    /// Create an empty schema with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add an atomic column.
    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.push(FieldDef::column(name, data_type));
        self
    }

    /// Add a joined, struct-valued field.
    pub fn with_join(mut self, name: impl Into<String>, struct_def: StructDef) -> Self {
        self.fields.push(FieldDef::Join {
            name: name.into(),
            struct_def,
        });
        self
    }

    /// Add a view field.
    pub fn with_turtle(mut self, turtle: TurtleDef) -> Self {
        self.fields.push(FieldDef::Turtle {
            name: turtle.name.clone(),
            turtle: Box::new(turtle),
        });
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// True if a field with this name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}
