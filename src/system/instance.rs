//! The four system flavours behind one build/run interface.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::comp::ParentId;
use crate::contract::pre;
use crate::pool::ComponentPool;
use crate::range::{EntityId, EntityRange};
use crate::system::intersect::{self, QueryPlan};
use crate::system::param::Params;
use crate::world::Registry;

/// Compares two entities through the sorted flavour's key component.
pub(crate) type SortFn = Box<dyn Fn(&Registry, EntityId, EntityId) -> Ordering + Send + Sync>;

/// The type-erased face of a system instance.
pub(crate) trait AnySystem: Send {
    /// Rebuilds the argument cache if a commit invalidated it, then runs
    /// the system, unless its interval has not elapsed yet.
    fn maintain_and_run(&mut self, registry: &Registry, parallel: bool);

    /// Marks the argument cache stale.
    fn invalidate(&mut self);
}

/// One cached entry of a ranged system: a matched range and the per-param
/// fetch state at its first entity.
struct RangeEntry<P: Params> {
    range:   EntityRange,
    sources: P::Sources,
}

/// One cached entry of a hierarchy or sorted system.
struct EntityEntry<P: Params> {
    id:      EntityId,
    depth:   u32,
    root:    EntityId,
    sources: P::Sources,
}

enum Flavor<P: Params> {
    /// Linear iteration over matched ranges; the default and cheapest path.
    Ranged { entries: Vec<RangeEntry<P>> },
    /// Topologically ordered per-entity arguments; `levels` holds the end
    /// index of each depth level. Levels run in order, parallel within.
    Hierarchy { entries: Vec<EntityEntry<P>>, levels: Vec<usize> },
    /// Per-entity arguments ordered by the user predicate over the key
    /// component; re-sorted whenever the cache rebuilds.
    Sorted { entries: Vec<EntityEntry<P>> },
    /// All parameters are global; invoked exactly once per run.
    Global,
}

pub(crate) struct SystemBox<P: Params, F> {
    func:     F,
    plan:     QueryPlan,
    flavor:   Flavor<P>,
    sort:     Option<SortFn>,
    dirty:    bool,
    interval: Option<Duration>,
    last_run: Option<Instant>,
}

impl<P, F> SystemBox<P, F>
where
    P: Params,
    F: for<'a> Fn(P::Args<'a>) + Send + Sync + 'static,
{
    /// Builds a system instance, selecting the flavour from the parameter
    /// shape: a parent parameter forces the hierarchy flavour, a sort
    /// predicate the sorted flavour, a parameter list without any
    /// entity-bound component the global flavour.
    pub(crate) fn new(
        registry: &mut Registry,
        func: F,
        interval: Option<Duration>,
        sort: Option<SortFn>,
    ) -> Self {
        P::register(registry);
        let shapes = P::shapes();
        let plan = QueryPlan::from_shapes(&shapes);

        let flavor = if sort.is_some() {
            pre!(!plan.has_parents(), "sorted systems cannot take parent parameters");
            pre!(
                !plan.required.is_empty(),
                "sorted systems need at least one required component"
            );
            Flavor::Sorted { entries: Vec::new() }
        } else if plan.has_parents() {
            Flavor::Hierarchy { entries: Vec::new(), levels: Vec::new() }
        } else if plan.required.is_empty() {
            pre!(
                plan.filters.is_empty(),
                "a system with only filters and globals matches no entities"
            );
            pre!(!plan.globals.is_empty(), "a system must take at least one component parameter");
            Flavor::Global
        } else {
            Flavor::Ranged { entries: Vec::new() }
        };

        pre!(plan.parents.len() <= 1, "a system can take at most one parent parameter");
        let mut seen: Vec<crate::util::DbgTypeId> = Vec::new();
        for ty in plan.required.iter().chain(&plan.filters).chain(&plan.globals) {
            pre!(!seen.contains(ty), "component parameter {ty} is specified more than once");
            seen.push(*ty);
        }

        Self { func, plan, flavor, sort, dirty: true, interval, last_run: None }
    }

    /// Makes the sorted flavour's key component part of the required set.
    pub(crate) fn require(&mut self, ty: crate::util::DbgTypeId) {
        if !self.plan.required.contains(&ty) {
            self.plan.required.push(ty);
        }
    }

    fn rebuild(&mut self, registry: &Registry) {
        let Self { plan, flavor, sort, .. } = self;
        match flavor {
            Flavor::Global => {}
            Flavor::Ranged { entries } => {
                entries.clear();
                for range in intersect::matching_ranges(registry, plan) {
                    entries.push(RangeEntry { range, sources: P::sources(registry, range) });
                }
            }
            Flavor::Hierarchy { entries, levels } => {
                entries.clear();
                levels.clear();
                let parent_pool = registry.get::<ParentId>();
                let bound = parent_pool.num_entities();
                let mut memo = HashMap::new();

                for range in intersect::matching_ranges(registry, plan) {
                    let base = P::sources(registry, range);
                    for (offset, id) in range.iter().enumerate() {
                        let (depth, root) = hierarchy_info(parent_pool, id, &mut memo, bound);
                        entries.push(EntityEntry {
                            id,
                            depth,
                            root,
                            sources: P::shift(base, offset),
                        });
                    }
                }

                entries.sort_by_key(|entry| (entry.depth, entry.root, entry.id));
                let mut last_depth = None;
                for (index, entry) in entries.iter().enumerate() {
                    if last_depth.is_some() && last_depth != Some(entry.depth) {
                        levels.push(index);
                    }
                    last_depth = Some(entry.depth);
                }
                levels.push(entries.len());
            }
            Flavor::Sorted { entries } => {
                entries.clear();
                for range in intersect::matching_ranges(registry, plan) {
                    let base = P::sources(registry, range);
                    for (offset, id) in range.iter().enumerate() {
                        entries.push(EntityEntry {
                            id,
                            depth: 0,
                            root: id,
                            sources: P::shift(base, offset),
                        });
                    }
                }
                let sort = sort.as_ref().expect("sorted flavour always carries a predicate");
                entries.sort_by(|a, b| sort(registry, a.id, b.id));
            }
        }
    }

    fn run(&self, registry: &Registry, parallel: bool) {
        match &self.flavor {
            Flavor::Global => {
                let sources = P::sources(registry, EntityRange::single(0));
                // Safety: all parameters are global; the offset is unused.
                let args = unsafe { P::args(sources, EntityId(0), 0) };
                (self.func)(args);
            }
            Flavor::Ranged { entries } => {
                if parallel && entries.len() > 1 {
                    entries.par_iter().for_each(|entry| self.run_range(entry));
                } else {
                    for entry in entries {
                        self.run_range(entry);
                    }
                }
            }
            Flavor::Hierarchy { entries, levels } => {
                let mut start = 0;
                for &end in levels {
                    let level = &entries[start..end];
                    if parallel && level.len() > 1 {
                        level.par_iter().for_each(|entry| self.run_entity(entry));
                    } else {
                        for entry in level {
                            self.run_entity(entry);
                        }
                    }
                    start = end;
                }
            }
            // the order is the whole point; always sequential
            Flavor::Sorted { entries } => {
                for entry in entries {
                    self.run_entity(entry);
                }
            }
        }
    }

    fn run_range(&self, entry: &RangeEntry<P>) {
        for offset in 0..entry.range.count() {
            // Safety: the offset stays within the matched range, and the
            // scheduler granted the accesses this system declared.
            let args = unsafe { P::args(entry.sources, entry.range.first(), offset) };
            (self.func)(args);
        }
    }

    fn run_entity(&self, entry: &EntityEntry<P>) {
        // Safety: per-entity sources were shifted to offset zero at build.
        let args = unsafe { P::args(entry.sources, entry.id, 0) };
        (self.func)(args);
    }
}

impl<P, F> AnySystem for SystemBox<P, F>
where
    P: Params,
    F: for<'a> Fn(P::Args<'a>) + Send + Sync + 'static,
{
    fn maintain_and_run(&mut self, registry: &Registry, parallel: bool) {
        if let (Some(interval), Some(last_run)) = (self.interval, self.last_run) {
            if last_run.elapsed() < interval {
                return;
            }
        }
        if self.dirty {
            self.rebuild(registry);
            self.dirty = false;
        }
        self.run(registry, parallel);
        self.last_run = Some(Instant::now());
    }

    fn invalidate(&mut self) { self.dirty = true; }
}

/// Resolves the depth and root of `id` by climbing its parent chain,
/// memoising every node on the way. Roots (entities without a [`ParentId`])
/// have depth 0.
fn hierarchy_info(
    pool: &ComponentPool<ParentId>,
    id: EntityId,
    memo: &mut HashMap<i32, (u32, EntityId)>,
    bound: usize,
) -> (u32, EntityId) {
    let mut chain = Vec::new();
    let mut cursor = id;
    let (mut depth, root) = loop {
        if let Some(&info) = memo.get(&cursor.0) {
            break info;
        }
        match pool.find(cursor) {
            None => break (0, cursor),
            Some(&ParentId(parent)) => {
                pre!(
                    chain.len() <= bound,
                    "parent chain of {id} exceeds the entity count; hierarchies must be forests"
                );
                chain.push(cursor);
                cursor = parent;
            }
        }
    };
    memo.entry(cursor.0).or_insert((depth, root));

    for &node in chain.iter().rev() {
        depth += 1;
        memo.insert(node.0, (depth, root));
    }
    (depth, root)
}
