//! Instrumentation hooks for commits and system execution.
//!
//! A [`Tracer`] receives scheduling-related events from the world. All
//! methods default to no-ops, so implementations only override what they
//! observe. [`Log`] forwards every event to the [`log`] facade.

use std::time::Duration;

use crate::util::DbgTypeId;

/// A handler that receives commit and scheduling events.
pub trait Tracer: Send + Sync {
    /// A commit starts.
    fn commit_start(&self) {}

    /// One pool finished draining its deferred queues.
    fn commit_pool(&self, _pool: DbgTypeId) {}

    /// A commit ends.
    fn commit_end(&self, _elapsed: Duration) {}

    /// The schedule was (re)derived from the registered systems.
    fn schedule_built(&self, _groups: usize, _pipelines: usize) {}

    /// A run cycle starts.
    fn run_start(&self) {}

    /// A run cycle ends.
    fn run_end(&self, _elapsed: Duration) {}

    /// An execution group starts dispatching its pipelines.
    fn group_start(&self, _group: i32, _pipelines: usize) {}

    /// A system starts running.
    fn system_start(&self, _index: usize) {}

    /// A system finished running.
    fn system_end(&self, _index: usize, _elapsed: Duration) {}
}

/// An empty tracer.
pub struct Noop;

impl Tracer for Noop {}

/// A tracer that logs all events at the given level.
pub struct Log(
    /// The log level to log events with.
    pub log::Level,
);

impl Tracer for Log {
    fn commit_start(&self) { log::log!(self.0, "commit: start") }

    fn commit_pool(&self, pool: DbgTypeId) { log::log!(self.0, "commit: drained pool {pool}") }

    fn commit_end(&self, elapsed: Duration) { log::log!(self.0, "commit: done in {elapsed:?}") }

    fn schedule_built(&self, groups: usize, pipelines: usize) {
        log::log!(self.0, "schedule: {groups} group(s), {pipelines} pipeline(s)");
    }

    fn run_start(&self) { log::log!(self.0, "run: start") }

    fn run_end(&self, elapsed: Duration) { log::log!(self.0, "run: done in {elapsed:?}") }

    fn group_start(&self, group: i32, pipelines: usize) {
        log::log!(self.0, "run: group {group} with {pipelines} pipeline(s)");
    }

    fn system_start(&self, index: usize) { log::log!(self.0, "run: system #{index} start") }

    fn system_end(&self, index: usize, elapsed: Duration) {
        log::log!(self.0, "run: system #{index} done in {elapsed:?}");
    }
}
