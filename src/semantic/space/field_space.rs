//! Field spaces: name-resolution scopes over schemas and query stages.
//!
//! Three variants with different mutability and input/output semantics:
//!
//! - **Static**: read-only, backed by an already-resolved schema.
//! - **Dynamic**: mutable, built incrementally while a stage is declared.
//! - **Query**: a dynamic space specialized for a query stage, with a
//!   result accumulator distinct from its input — a stage simultaneously
//!   reads upstream columns and defines new output columns that may shadow
//!   them.

use std::collections::HashMap;

use crate::ast::{Span, Spanned};
use crate::model::pipeline::StageField;
use crate::model::structs::{FieldDef, StructDef};

use super::entry::{FieldEntry, QuerySpaceId, QuerySpaceMeta, SpaceArena, SpaceEntry};

/// Registration failure: the name already exists in the space.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("'{0}' is already defined")]
pub struct DuplicateName(pub String);

/// Result of a name lookup.
///
/// Ambiguous or unresolvable segments yield `NotFound` with a diagnostic
/// message, not a fault.
#[derive(Debug, Clone)]
pub enum LookupResult {
    Found(SpaceEntry),
    NotFound(String),
}

impl LookupResult {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }
}

// ============================================================================
// Entry registry
// ============================================================================

/// The name → entry mapping inside a field space.
///
/// Names are unique; insertion order is irrelevant for lookup but defines
/// output column order for dynamic and query spaces.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    index: HashMap<String, usize>,
    entries: Vec<(String, SpaceEntry)>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; fails if the name is taken.
    pub fn declare(&mut self, name: impl Into<String>, entry: SpaceEntry) -> Result<(), DuplicateName> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DuplicateName(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, entry));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SpaceEntry> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpaceEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Build a registry from a resolved schema.
fn registry_from_struct(schema: &StructDef) -> EntryRegistry {
    let mut registry = EntryRegistry::new();
    for field in &schema.fields {
        let entry = match field {
            FieldDef::Atomic { type_desc, .. } => SpaceEntry::Field(FieldEntry::Column {
                type_desc: type_desc.clone(),
            }),
            FieldDef::Join { struct_def, .. } => SpaceEntry::Field(FieldEntry::Join {
                struct_def: struct_def.clone(),
            }),
            FieldDef::Turtle { turtle, .. } => SpaceEntry::Field(FieldEntry::View {
                turtle: (**turtle).clone(),
            }),
        };
        // Schema field names are unique by construction.
        let _ = registry.declare(field.name(), entry);
    }
    registry
}

/// Resolve a multi-segment path against a registry.
///
/// Resolving past the first segment requires the prior segment to resolve
/// to a struct-valued (joined) field, recursively re-entering that field's
/// own space.
fn lookup_in(registry: &EntryRegistry, segments: &[Spanned<String>]) -> LookupResult {
    let Some(first) = segments.first() else {
        return LookupResult::NotFound("empty reference".to_string());
    };
    let Some(entry) = registry.get(&first.value) else {
        return LookupResult::NotFound(format!("'{}' is not defined", first.value));
    };
    if segments.len() == 1 {
        return LookupResult::Found(entry.clone());
    }
    match entry {
        SpaceEntry::Field(FieldEntry::Join { struct_def }) => {
            let inner = registry_from_struct(struct_def);
            lookup_in(&inner, &segments[1..])
        }
        _ => LookupResult::NotFound(format!(
            "'{}' is not a join, cannot look up '{}' inside it",
            first.value, segments[1].value
        )),
    }
}

// ============================================================================
// Space variants
// ============================================================================

/// Read-only space over an already-resolved schema.
#[derive(Debug)]
pub struct StaticSpace {
    source: StructDef,
    registry: EntryRegistry,
}

impl StaticSpace {
    pub fn from_struct(schema: &StructDef) -> Self {
        Self {
            source: schema.clone(),
            registry: registry_from_struct(schema),
        }
    }

    pub fn lookup(&self, segments: &[Spanned<String>]) -> LookupResult {
        lookup_in(&self.registry, segments)
    }

    pub fn source(&self) -> &StructDef {
        &self.source
    }
}

/// Mutable space built incrementally while a stage is declared.
///
/// Exposes the pre-stage input and accumulates new entries destined for
/// the output schema.
#[derive(Debug)]
pub struct DynamicSpace {
    base: StructDef,
    input: EntryRegistry,
    declared: EntryRegistry,
}

impl DynamicSpace {
    pub fn over(schema: &StructDef) -> Self {
        Self {
            base: schema.clone(),
            input: registry_from_struct(schema),
            declared: EntryRegistry::new(),
        }
    }

    /// Register a new entry destined for the output schema.
    pub fn declare(&mut self, name: impl Into<String>, entry: SpaceEntry) -> Result<(), DuplicateName> {
        self.declared.declare(name, entry)
    }

    /// Resolve against new declarations first, then the input.
    ///
    /// New output columns shadow upstream columns on lookup (shadowing on
    /// *declaration* is still rejected within the declared set).
    pub fn lookup(&self, segments: &[Spanned<String>]) -> LookupResult {
        if let Some(first) = segments.first() {
            if self.declared.get(&first.value).is_some() {
                return lookup_in(&self.declared, segments);
            }
        }
        lookup_in(&self.input, segments)
    }

    /// Resolve against the pre-stage input only.
    pub fn lookup_input(&self, segments: &[Spanned<String>]) -> LookupResult {
        lookup_in(&self.input, segments)
    }

    pub fn base(&self) -> &StructDef {
        &self.base
    }
}

/// A dynamic space specialized for a query stage.
///
/// Tracks a separate result accumulator distinct from its input space.
#[derive(Debug)]
pub struct QuerySpace {
    dynamic: DynamicSpace,
    result: Vec<StageField>,
    id: QuerySpaceId,
}

impl QuerySpace {
    /// Open a query space over a stage input schema, registering it in the
    /// arena.
    pub fn over(schema: &StructDef, location: Span, arena: &mut SpaceArena) -> Self {
        let id = arena.register(QuerySpaceMeta {
            source: schema.name.clone(),
            location,
        });
        Self {
            dynamic: DynamicSpace::over(schema),
            result: Vec::new(),
            id,
        }
    }

    pub fn id(&self) -> QuerySpaceId {
        self.id
    }

    /// Register a new entry without pushing an output field.
    pub fn new_entry(&mut self, name: impl Into<String>, entry: SpaceEntry) -> Result<(), DuplicateName> {
        self.dynamic.declare(name, entry)
    }

    /// Register an entry and append the corresponding output field.
    ///
    /// Declaration order defines output column order.
    pub fn push_field(
        &mut self,
        name: impl Into<String>,
        entry: SpaceEntry,
        field: StageField,
    ) -> Result<(), DuplicateName> {
        self.dynamic.declare(name, entry)?;
        self.result.push(field);
        Ok(())
    }

    pub fn lookup(&self, segments: &[Spanned<String>]) -> LookupResult {
        self.dynamic.lookup(segments)
    }

    /// Resolve against the pre-stage input only.
    pub fn lookup_input(&self, segments: &[Spanned<String>]) -> LookupResult {
        self.dynamic.lookup_input(segments)
    }

    pub fn base(&self) -> &StructDef {
        self.dynamic.base()
    }

    /// The accumulated output fields, in declaration order.
    pub fn result(&self) -> &[StageField] {
        &self.result
    }

    /// Consume the space, yielding the accumulated output fields.
    pub fn into_result(self) -> Vec<StageField> {
        self.result
    }
}

// ============================================================================
// Unified space
// ============================================================================

/// A name-resolution scope: one of the three space variants.
#[derive(Debug)]
pub enum FieldSpace {
    Static(StaticSpace),
    Dynamic(DynamicSpace),
    Query(QuerySpace),
}

impl FieldSpace {
    /// A static space over a resolved schema (top-level `from` inputs).
    pub fn static_over(schema: &StructDef) -> Self {
        FieldSpace::Static(StaticSpace::from_struct(schema))
    }

    /// Resolve a multi-segment reference.
    pub fn lookup(&self, segments: &[Spanned<String>]) -> LookupResult {
        match self {
            FieldSpace::Static(s) => s.lookup(segments),
            FieldSpace::Dynamic(d) => d.lookup(segments),
            FieldSpace::Query(q) => q.lookup(segments),
        }
    }

    /// True for the query variant.
    pub fn is_query(&self) -> bool {
        matches!(self, FieldSpace::Query(_))
    }

    pub fn as_query_mut(&mut self) -> Option<&mut QuerySpace> {
        match self {
            FieldSpace::Query(q) => Some(q),
            _ => None,
        }
    }

    /// The schema this space resolves against (the stage input for dynamic
    /// and query spaces).
    pub fn base_struct(&self) -> &StructDef {
        match self {
            FieldSpace::Static(s) => s.source(),
            FieldSpace::Dynamic(d) => d.base(),
            FieldSpace::Query(q) => q.base(),
        }
    }
}
