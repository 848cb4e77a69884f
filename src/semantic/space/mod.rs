//! Name-resolution scopes and their entry registry.

pub mod entry;
pub mod field_space;

pub use entry::{FieldEntry, ParameterEntry, QuerySpaceId, QuerySpaceMeta, SpaceArena, SpaceEntry};
pub use field_space::{
    DuplicateName, DynamicSpace, EntryRegistry, FieldSpace, LookupResult, QuerySpace, StaticSpace,
};
