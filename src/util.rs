//! Small utilities shared across the crate.

use std::any::{self, TypeId};
use std::cmp;
use std::fmt;
use std::hash;

/// A [`TypeId`] that remembers the name of the type it identifies.
///
/// Equality, ordering and hashing delegate to the [`TypeId`];
/// the name only exists so that diagnostics can say
/// which component type a registry entry belongs to.
#[derive(Clone, Copy)]
pub struct DbgTypeId {
    id:   TypeId,
    name: &'static str,
}

impl DbgTypeId {
    /// Creates a token identifying `T`.
    pub fn of<T: 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: any::type_name::<T>() }
    }

    /// The name of the identified type.
    pub fn name(&self) -> &'static str { self.name }
}

impl PartialEq for DbgTypeId {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for DbgTypeId {}

impl PartialOrd for DbgTypeId {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for DbgTypeId {
    fn cmp(&self, other: &Self) -> cmp::Ordering { self.id.cmp(&other.id) }
}

impl hash::Hash for DbgTypeId {
    fn hash<H: hash::Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

impl fmt::Debug for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}

impl fmt::Display for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}
