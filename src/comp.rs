//! Component types and their compile-time flags.
//!
//! A component is a piece of data keyed by entity id and typed by its Rust
//! type. Component types are statically known; their behavioural flags are
//! associated constants so that the pools can specialise storage without any
//! runtime registration step beyond creating the pool itself.

use crate::range::EntityId;

/// A type that can be attached to entities and stored in a
/// [pool](crate::pool::ComponentPool).
///
/// All flags default to the plain per-entity component. Override the
/// constants to opt into the special behaviours:
///
/// ```ignore
/// struct FrameCount(u64);
///
/// impl rangec::Component for FrameCount {
///     const GLOBAL_INIT: Option<fn() -> Self> = Some(|| FrameCount(0));
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    /// The component carries no payload; its pool stores ranges only.
    /// Tagged types must be zero-sized.
    const TAGGED: bool = false;

    /// The component is cleared at every commit.
    const TRANSIENT: bool = false;

    /// The component is read-only in systems; requesting write access to it
    /// is a contract violation.
    const IMMUTABLE: bool = false;

    /// `Some` marks the component global: a single shared value not bound to
    /// any entity, created by the given function when the pool is built.
    /// Global components cannot be tagged or transient.
    const GLOBAL_INIT: Option<fn() -> Self> = None;

    /// Whether two values are interchangeable for chunk combining. Adjacent
    /// buffered adds whose values compare equal under this relation collapse
    /// into one chunk at commit. The default never combines; types with
    /// cheap equality typically forward to `==`.
    fn merge_eq(_left: &Self, _right: &Self) -> bool { false }
}

pub(crate) fn is_global<T: Component>() -> bool { T::GLOBAL_INIT.is_some() }

/// Names the parent of the carrying entity.
///
/// The hierarchy support is entirely driven by this component: an entity
/// with a `ParentId` is a child of the named entity, an entity without one
/// is a root. The hierarchy must be a forest; a `ParentId` chain that loops
/// back on itself is a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentId(pub EntityId);

impl Component for ParentId {}
