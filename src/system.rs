//! Systems: user functions executed over the entities matching their
//! parameter list.
//!
//! A system is registered with [`World::make_system`](crate::World::make_system)
//! and decomposed at build time: its parameter tuple yields the read/write
//! sets for the scheduler and the query shape for the intersection engine,
//! and the shape selects one of four flavours (ranged, hierarchy, sorted,
//! global), each with its own argument-cache layout behind a uniform
//! build/run interface.

use std::time::Duration;

use parking_lot::Mutex;

use crate::world::Registry;

pub mod param;
pub use param::{Not, Parent, ParentArg, Read, Write};

pub(crate) mod intersect;

mod instance;
pub(crate) use instance::{AnySystem, SortFn, SystemBox};

#[cfg(test)]
mod tests;

/// Options accepted by [`World::make_system_with`](crate::World::make_system_with).
#[derive(Default)]
pub struct SystemOptions {
    pub(crate) group:        i32,
    pub(crate) not_parallel: bool,
    pub(crate) interval:     Option<Duration>,
}

impl SystemOptions {
    pub fn new() -> Self { Self::default() }

    /// Assigns the system to an execution group. Groups run sequentially in
    /// ascending order; the default group is 0.
    pub fn group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Disables parallel iteration inside the system.
    pub fn not_parallel(mut self) -> Self {
        self.not_parallel = true;
        self
    }

    /// Requires at least `interval` of wall-clock time between two runs of
    /// the system; runs in between are skipped.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Dual form of [`interval`](Self::interval): at most `hz` runs per
    /// second.
    pub fn frequency(mut self, hz: f64) -> Self {
        self.interval = Some(Duration::from_secs_f64(1.0 / hz));
        self
    }
}

/// A registered system plus the metadata the scheduler plans with.
pub(crate) struct SystemCell {
    pub(crate) system:       Mutex<Box<dyn AnySystem>>,
    pub(crate) accesses:     Vec<param::Access>,
    pub(crate) group:        i32,
    pub(crate) not_parallel: bool,
    pub(crate) enabled:      bool,
}

impl SystemCell {
    /// Runs the system on the calling thread, rebuilding its cache first if
    /// a commit invalidated it.
    pub(crate) fn run_locked(&self, registry: &Registry, parallel: bool) {
        let mut system =
            self.system.try_lock().expect("a system is scheduled to exactly one pipeline");
        system.maintain_and_run(registry, parallel && !self.not_parallel);
    }
}
