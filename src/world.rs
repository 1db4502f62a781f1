//! The world owns the pool registry and the systems.
//!
//! Data flow per cycle: buffered `add_component` / `remove_component` calls
//! land in per-thread pool queues; [`commit_changes`](World::commit_changes)
//! drains them into the chunk lists and invalidates the argument caches of
//! affected systems; [`run_systems`](World::run_systems) dispatches the
//! schedule, rebuilding stale caches lazily on the way.
//!
//! Buffered mutation only needs `&World`, so producer threads can enqueue
//! concurrently; commit and run are the serialisation points and take
//! `&mut World`.

use std::cmp::Ordering;
use std::time::Instant;

use parking_lot::Mutex;

use crate::comp::{is_global, Component};
use crate::contract::pre;
use crate::range::{EntityId, EntityRange};
use crate::scheduler::{self, Executor, Schedule};
use crate::system::param::{Access, Params};
use crate::system::{SortFn, SystemBox, SystemCell, SystemOptions};
use crate::tracer::{Noop, Tracer};
use crate::util::DbgTypeId;

mod registry;
pub use registry::Registry;

#[cfg(test)]
mod tests;

/// Identifies a system registered in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(usize);

/// The context owning all component pools and systems.
pub struct World {
    registry: Registry,
    systems:  Vec<SystemCell>,
    schedule: Option<Schedule>,
    executor: Executor,
    tracer:   Box<dyn Tracer>,
}

impl World {
    /// A world with the default configuration: one worker thread per host
    /// core (minus the caller) and no tracing.
    pub fn new() -> Self { Self::builder().build() }

    pub fn builder() -> Builder { Builder::default() }

    /// Creates the pool for `T`. Buffered access to unregistered component
    /// types is a contract violation, so register every type up front (the
    /// types in system parameter lists are registered automatically).
    pub fn register_component<T: Component>(&mut self) { self.registry.register::<T>() }

    /// Declares `A` and `B` members of one variant group: an entity may
    /// carry at most one of them. Adding one to an entity queues removal of
    /// the other; the later add wins.
    pub fn register_variant<A: Component, B: Component>(&mut self) {
        self.registry.register_variant::<A, B>();
    }

    /// Queues `value` for every entity in `range` (a range or a single id).
    /// Applied at the next commit.
    pub fn add_component<T: Component + Clone>(&self, range: impl Into<EntityRange>, value: T) {
        let range = range.into();
        self.registry.cut_variants(DbgTypeId::of::<T>(), range);
        self.registry.get::<T>().add(range, value);
    }

    /// Queues one value per entity, copied from `values`.
    pub fn add_component_span<T: Component + Clone>(
        &self,
        range: impl Into<EntityRange>,
        values: &[T],
    ) {
        let range = range.into();
        self.registry.cut_variants(DbgTypeId::of::<T>(), range);
        self.registry.get::<T>().add_span(range, values);
    }

    /// Queues a generator invoked once per id at the next commit.
    pub fn add_component_generator<T: Component>(
        &self,
        range: impl Into<EntityRange>,
        generator: impl FnMut(EntityId) -> T + Send + 'static,
    ) {
        let range = range.into();
        self.registry.cut_variants(DbgTypeId::of::<T>(), range);
        self.registry.get::<T>().add_generator(range, generator);
    }

    /// Queues removal of `T` from every entity in `range`.
    pub fn remove_component<T: Component>(&self, range: impl Into<EntityRange>) {
        self.registry.get::<T>().remove(range);
    }

    /// The committed component of `id`, if any.
    pub fn get_component<T: Component>(&self, id: impl Into<EntityId>) -> Option<&T> {
        self.registry.try_get::<T>()?.find(id)
    }

    /// Mutable access to the committed component of `id`.
    ///
    /// Mutating through this accessor does not flag the pool; call
    /// [`notify_modified`](Self::notify_modified) if dependent system
    /// caches must rebuild.
    pub fn get_component_mut<T: Component>(&mut self, id: impl Into<EntityId>) -> Option<&mut T> {
        let id = id.into();
        if self.registry.try_get::<T>().is_none() {
            return None;
        }
        self.registry.get_mut::<T>().find_mut(id)
    }

    /// Whether every entity in `range` carries `T`.
    pub fn has_component<T: Component>(&self, range: impl Into<EntityRange>) -> bool {
        self.registry.try_get::<T>().is_some_and(|pool| pool.has_entity_range(range.into()))
    }

    /// The values of `range` as one contiguous slice, or `None` if any
    /// entity is missing or the range spans chunks. Invalidated by the next
    /// commit.
    pub fn get_components<T: Component>(&self, range: impl Into<EntityRange>) -> Option<&[T]> {
        self.registry.try_get::<T>()?.get_components(range.into())
    }

    /// The shared value of a global component.
    pub fn get_shared<T: Component>(&self) -> &T { self.registry.get::<T>().get_shared() }

    /// Mutable access to the shared value of a global component, creating
    /// its pool on demand.
    pub fn get_shared_mut<T: Component>(&mut self) -> &mut T {
        pre!(is_global::<T>(), "component {} is not global", std::any::type_name::<T>());
        self.registry.register::<T>();
        self.registry.get_mut::<T>().get_shared_mut()
    }

    /// The number of committed components of `T` (1 for globals).
    pub fn get_component_count<T: Component>(&self) -> usize {
        self.registry.try_get::<T>().map_or(0, |pool| pool.num_components())
    }

    /// The number of entities carrying `T`.
    pub fn get_entity_count<T: Component>(&self) -> usize {
        self.registry.try_get::<T>().map_or(0, |pool| pool.num_entities())
    }

    /// Flags `T` as externally mutated so dependent system caches rebuild
    /// at the next commit.
    pub fn notify_modified<T: Component>(&mut self) {
        self.registry.get_mut::<T>().notify_modified();
    }

    /// Drops all committed components of `T` immediately. Argument caches
    /// of systems touching `T` are invalidated right away, since their
    /// cached pointers die with the chunks.
    pub fn clear_component<T: Component>(&mut self) {
        self.registry.get_mut::<T>().clear();
        let token = DbgTypeId::of::<T>();
        for cell in &mut self.systems {
            if cell.accesses.iter().any(|access| access.ty == token) {
                cell.system.get_mut().invalidate();
            }
        }
    }

    /// Registers a system over the parameter tuple `P` with default
    /// options. Component types named by `P` are registered on the fly.
    ///
    /// ```ignore
    /// let id = world.make_system::<(EntityId, Write<Pos>, Read<Vel>), _>(
    ///     |(id, pos, vel): (EntityId, &mut Pos, &Vel)| { pos.0 += vel.0; },
    /// );
    /// ```
    pub fn make_system<P, F>(&mut self, func: F) -> SystemId
    where
        P: Params,
        F: for<'a> Fn(P::Args<'a>) + Send + Sync + 'static,
    {
        self.make_system_with::<P, F>(func, SystemOptions::new())
    }

    /// Registers a system with explicit [`SystemOptions`].
    pub fn make_system_with<P, F>(&mut self, func: F, options: SystemOptions) -> SystemId
    where
        P: Params,
        F: for<'a> Fn(P::Args<'a>) + Send + Sync + 'static,
    {
        let boxed = SystemBox::<P, F>::new(&mut self.registry, func, options.interval, None);
        self.push_system::<P>(Box::new(boxed), options, None)
    }

    /// Registers a sorted system: entities are visited in the order defined
    /// by `compare` over their `K` components. `K` joins the required set.
    pub fn make_sorted_system<P, K, F, C>(
        &mut self,
        func: F,
        compare: C,
        options: SystemOptions,
    ) -> SystemId
    where
        P: Params,
        K: Component,
        F: for<'a> Fn(P::Args<'a>) + Send + Sync + 'static,
        C: Fn(&K, &K) -> Ordering + Send + Sync + 'static,
    {
        self.registry.register::<K>();
        let sort: SortFn = Box::new(move |registry: &Registry, a, b| {
            let pool = registry.get::<K>();
            let left = pool.find(a).expect("sort key coverage is part of the required set");
            let right = pool.find(b).expect("sort key coverage is part of the required set");
            compare(left, right)
        });

        let mut boxed = SystemBox::<P, F>::new(&mut self.registry, func, options.interval, Some(sort));
        boxed.require(DbgTypeId::of::<K>());
        let key_access =
            Access { ty: DbgTypeId::of::<K>(), mutable: false, global: is_global::<K>() };
        self.push_system::<P>(Box::new(boxed), options, Some(key_access))
    }

    fn push_system<P: Params>(
        &mut self,
        system: Box<dyn crate::system::AnySystem>,
        options: SystemOptions,
        extra_access: Option<Access>,
    ) -> SystemId {
        let mut accesses = Vec::new();
        P::collect_access(&mut accesses);
        accesses.extend(extra_access);

        // A write to a global would alias across parallel iterations;
        // force such systems onto the serial path.
        let not_parallel =
            options.not_parallel || accesses.iter().any(|access| access.global && access.mutable);

        self.systems.push(SystemCell {
            system: Mutex::new(system),
            accesses,
            group: options.group,
            not_parallel,
            enabled: true,
        });
        self.schedule = None;
        SystemId(self.systems.len() - 1)
    }

    /// Enables or disables a system. Disabled systems are skipped by
    /// [`run_systems`](Self::run_systems).
    pub fn enable_system(&mut self, id: SystemId, enabled: bool) {
        self.systems[id.0].enabled = enabled;
    }

    /// Runs a single system on the calling thread, even if disabled.
    pub fn run_system(&mut self, id: SystemId) {
        let cell = &self.systems[id.0];
        cell.run_locked(&self.registry, false);
    }

    /// Applies all buffered mutations: drains every pool's per-thread
    /// queues (removes first, then adds), invalidates the argument caches
    /// of systems whose pools changed, then clears the pool flags.
    pub fn commit_changes(&mut self) {
        let started = Instant::now();
        self.tracer.commit_start();

        for (token, pool) in self.registry.pools_mut() {
            pool.process_changes();
            self.tracer.commit_pool(token);
        }

        let registry = &self.registry;
        for cell in &mut self.systems {
            if cell.accesses.iter().any(|access| registry.has_changed(access.ty)) {
                cell.system.get_mut().invalidate();
            }
        }

        for (_, pool) in self.registry.pools_mut() {
            pool.clear_flags();
        }

        self.tracer.commit_end(started.elapsed());
    }

    /// Executes all enabled systems once and returns when they completed.
    pub fn run_systems(&mut self) {
        let started = Instant::now();
        self.tracer.run_start();

        if self.schedule.is_none() {
            let metas: Vec<(i32, &[Access])> = self
                .systems
                .iter()
                .map(|cell| (cell.group, cell.accesses.as_slice()))
                .collect();
            let schedule = scheduler::build(&metas);
            let pipelines = schedule.groups.iter().map(|group| group.pipelines.len()).sum();
            self.tracer.schedule_built(schedule.groups.len(), pipelines);
            self.schedule = Some(schedule);
        }

        let schedule = self.schedule.as_ref().expect("schedule was just built");
        self.executor.run(schedule, &self.systems, &self.registry, &*self.tracer);

        self.tracer.run_end(started.elapsed());
    }

    /// [`commit_changes`](Self::commit_changes) followed by
    /// [`run_systems`](Self::run_systems).
    pub fn update_systems(&mut self) {
        self.commit_changes();
        self.run_systems();
    }
}

impl Default for World {
    fn default() -> Self { Self::new() }
}

/// Configures a [`World`] before construction.
pub struct Builder {
    concurrency: Option<usize>,
    tracer:      Box<dyn Tracer>,
}

impl Default for Builder {
    fn default() -> Self { Self { concurrency: None, tracer: Box::new(Noop) } }
}

impl Builder {
    /// The number of worker threads. 0 disables threading entirely;
    /// defaults to the host parallelism minus the calling thread.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Installs a tracer receiving commit and scheduling events.
    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn build(self) -> World {
        let concurrency = self.concurrency.unwrap_or_else(Executor::host_concurrency);
        World {
            registry: Registry::new(),
            systems:  Vec::new(),
            schedule: None,
            executor: Executor::new(concurrency),
            tracer:   self.tracer,
        }
    }
}
