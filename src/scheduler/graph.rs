//! Pipeline derivation from read/write sets.
//!
//! Two systems conflict if they touch the same component type and at least
//! one of them writes it. Pipelines are the transitive closure of the
//! conflict relation within one execution group: every pair of systems in
//! distinct pipelines is free to run concurrently, while systems inside a
//! pipeline stay in declaration order. Read-read sharing never merges
//! pipelines.

use std::collections::HashMap;

use bitvec::vec::BitVec;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::system::param::Access;
use crate::util::DbgTypeId;

pub(crate) struct Schedule {
    pub(crate) groups: Vec<ScheduleGroup>,
}

pub(crate) struct ScheduleGroup {
    pub(crate) group:     i32,
    pub(crate) pipelines: Vec<Pipeline>,
}

/// A set of systems that must execute serially, in declaration order.
pub(crate) struct Pipeline {
    /// Membership bitset over the full system index space.
    pub(crate) members: BitVec,
    /// Member indices in declaration order.
    pub(crate) order:   Vec<usize>,
}

/// Derives the schedule for `systems`, given in declaration order as
/// `(group, accesses)` pairs.
pub(crate) fn build(systems: &[(i32, &[Access])]) -> Schedule {
    let group_ids: Vec<i32> = systems.iter().map(|(group, _)| *group).sorted().dedup().collect();

    let groups = group_ids
        .into_iter()
        .map(|group| {
            let members: Vec<usize> = systems
                .iter()
                .enumerate()
                .filter(|(_, (g, _))| *g == group)
                .map(|(index, _)| index)
                .collect();
            ScheduleGroup { group, pipelines: partition(systems, &members) }
        })
        .collect();

    Schedule { groups }
}

/// Partitions the systems of one group into pipelines.
///
/// A single left-to-right pass tracks, per component type, the last writer
/// and the readers since that writer; each access unions the current system
/// with exactly the prior systems it conflicts with, and the union-find
/// fixed point is the pipeline partition.
fn partition(systems: &[(i32, &[Access])], members: &[usize]) -> Vec<Pipeline> {
    let mut uf = UnionFind::new(members.len());
    let mut last_writer: HashMap<DbgTypeId, usize> = HashMap::new();
    let mut readers_since: HashMap<DbgTypeId, Vec<usize>> = HashMap::new();

    for (pos, &index) in members.iter().enumerate() {
        for access in systems[index].1 {
            if access.mutable {
                if let Some(&writer) = last_writer.get(&access.ty) {
                    uf.union(pos, writer);
                }
                for &reader in readers_since.get(&access.ty).map_or(&[][..], Vec::as_slice) {
                    uf.union(pos, reader);
                }
                readers_since.remove(&access.ty);
                last_writer.insert(access.ty, pos);
            } else {
                if let Some(&writer) = last_writer.get(&access.ty) {
                    uf.union(pos, writer);
                }
                readers_since.entry(access.ty).or_default().push(pos);
            }
        }
    }

    let mut pipelines: IndexMap<usize, Pipeline> = IndexMap::new();
    for (pos, &index) in members.iter().enumerate() {
        let root = uf.find(pos);
        let pipeline = pipelines.entry(root).or_insert_with(|| Pipeline {
            members: BitVec::repeat(false, systems.len()),
            order:   Vec::new(),
        });
        pipeline.members.set(index, true);
        pipeline.order.push(index);
    }
    pipelines.into_values().collect()
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self { Self { parent: (0..len).collect() } }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut cursor = node;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }
}
