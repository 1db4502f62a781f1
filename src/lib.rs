//! A range-compressed entity-component-system core.
//!
//! # What lives here
//! Entities are plain signed 32-bit ids; they are never materialised.
//! Components are attached to *ranges* of ids at once and stored
//! range-compressed: each [pool](pool::ComponentPool) keeps a sorted list of
//! chunks, one contiguous value array per run of ids, over a skip-augmented
//! linked list whose nodes never move. Bulk insertion, removal and
//! iteration therefore cost per *range*, not per entity.
//!
//! # Deferred mutation
//! `add_component` and `remove_component` only enqueue into per-thread
//! buffers; [`World::commit_changes`] is the single serialisation point
//! that applies them (removes first, then adds). Producers on any thread
//! can enqueue concurrently without locks in the hot path.
//!
//! # Systems
//! A system is a plain function over a tuple of parameter markers:
//! [`EntityId`], [`Read`], [`Write`], [`Not`] filters and [`Parent`].
//! [`World::make_system`] decomposes the tuple into the system's read and
//! write sets; systems whose sets conflict (write-write or write-read on a
//! shared type) are grouped into pipelines and run serially in declaration
//! order, while distinct pipelines run concurrently on a worker pool.
//! Inside a system, iteration parallelises across disjoint ranges unless
//! opted out.
//!
//! # Component flags
//! [`Component`] flags select storage behaviour per type: *tagged* (no
//! payload, ranges only), *transient* (cleared at every commit), *global*
//! (one shared value, not entity-bound) and *immutable* (read-only in
//! systems). Variant groups declare sets of component types of which an
//! entity may carry at most one.

#![cfg_attr(debug_assertions, allow(dead_code))]

mod contract;

pub mod comp;
pub use comp::{Component, ParentId};

pub mod range;
pub use range::{EntityId, EntityRange};

pub mod pool;
pub use pool::ComponentPool;

pub mod system;
pub use system::{Not, Parent, ParentArg, Read, SystemOptions, Write};

pub mod tracer;

pub mod world;
pub use world::{SystemId, World};

pub mod util;

pub(crate) mod list;
pub(crate) mod scatter;
pub(crate) mod scheduler;
pub(crate) mod tls;
