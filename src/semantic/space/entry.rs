//! Space entries: what a name inside a field space resolves to.
//!
//! Entries form a closed tagged union over fields and parameters. A nested
//! view entry records which enclosing query space it was declared into as
//! an arena index — a validation-only relation, never an ownership edge, so
//! teardown is simply discarding the arena.

use std::cell::OnceCell;

use crate::ast::{Expr, Span};
use crate::model::structs::StructDef;
use crate::model::types::{DataType, TypeDesc};
use crate::model::TurtleDef;
use crate::semantic::classify;

/// Stable index of a query space in a [`SpaceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySpaceId(pub usize);

/// What a nested view records about its enclosing query space.
#[derive(Debug, Clone)]
pub struct QuerySpaceMeta {
    /// The schema name the space was opened over.
    pub source: String,
    /// Where the stage was declared.
    pub location: Span,
}

/// Arena of query-space records, addressed by stable indices.
#[derive(Debug, Default)]
pub struct SpaceArena {
    query_spaces: Vec<QuerySpaceMeta>,
}

impl SpaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query space, returning its stable id.
    pub fn register(&mut self, meta: QuerySpaceMeta) -> QuerySpaceId {
        let id = QuerySpaceId(self.query_spaces.len());
        self.query_spaces.push(meta);
        id
    }

    /// Look up a query-space record.
    pub fn get(&self, id: QuerySpaceId) -> Option<&QuerySpaceMeta> {
        self.query_spaces.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.query_spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_spaces.is_empty()
    }
}

/// An entry registered under a name in a field space.
///
/// Once registered, an entry is immutable; a second registration under the
/// same name fails at the registry.
#[derive(Debug, Clone)]
pub enum SpaceEntry {
    Field(FieldEntry),
    Parameter(ParameterEntry),
}

impl SpaceEntry {
    /// The entry's type descriptor.
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            SpaceEntry::Field(f) => f.type_desc(),
            SpaceEntry::Parameter(p) => p.type_desc(),
        }
    }

    /// The wrapped view definition, for view-shaped entries.
    pub fn turtle(&self) -> Option<&TurtleDef> {
        match self {
            SpaceEntry::Field(f) => f.turtle(),
            SpaceEntry::Parameter(_) => None,
        }
    }
}

/// Field entry variants.
#[derive(Debug, Clone)]
pub enum FieldEntry {
    /// A plain column referencing a schema column.
    Column { type_desc: TypeDesc },
    /// A joined, struct-valued field; re-entered for multi-segment lookup.
    Join { struct_def: StructDef },
    /// A resolved view.
    View { turtle: TurtleDef },
    /// A view declared as a nested sub-query within an enclosing query
    /// space. The back-reference is used only for validation.
    NestedView {
        turtle: TurtleDef,
        enclosing: QuerySpaceId,
    },
}

impl FieldEntry {
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            FieldEntry::Column { type_desc } => type_desc.clone(),
            FieldEntry::Join { .. } => TypeDesc::scalar(DataType::Struct),
            FieldEntry::View { .. } | FieldEntry::NestedView { .. } => {
                TypeDesc::scalar(DataType::Turtle)
            }
        }
    }

    pub fn turtle(&self) -> Option<&TurtleDef> {
        match self {
            FieldEntry::View { turtle } => Some(turtle),
            FieldEntry::NestedView { turtle, .. } => Some(turtle),
            _ => None,
        }
    }

    /// True for a plain leaf column of non-struct type.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            FieldEntry::Column { type_desc } if type_desc.data_type != DataType::Struct
        )
    }
}

/// Parameter entry variants.
#[derive(Debug, Clone)]
pub enum ParameterEntry {
    /// Bound to a declaration expression; type computed lazily on first use.
    Abstract {
        decl: Expr,
        cached: OnceCell<TypeDesc>,
    },
    /// A concrete, already-typed parameter.
    Defined { type_desc: TypeDesc },
}

impl ParameterEntry {
    /// An abstract parameter typed lazily from its declaration.
    pub fn abstract_from(decl: Expr) -> Self {
        ParameterEntry::Abstract {
            decl,
            cached: OnceCell::new(),
        }
    }

    /// A defined parameter with a concrete type.
    pub fn defined(type_desc: TypeDesc) -> Self {
        ParameterEntry::Defined { type_desc }
    }

    pub fn type_desc(&self) -> TypeDesc {
        match self {
            ParameterEntry::Abstract { decl, cached } => cached
                .get_or_init(|| classify::classify_standalone(decl))
                .clone(),
            ParameterEntry::Defined { type_desc } => type_desc.clone(),
        }
    }
}
