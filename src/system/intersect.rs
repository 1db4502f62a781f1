//! The intersection engine.
//!
//! Computes the entity ranges a system iterates: the ranges where every
//! required pool has coverage and no filter pool does, with entities whose
//! parent fails the parent-subtype predicate cut out. Output ranges are
//! clipped at the chunk boundaries of every required pool, so a single base
//! pointer per pool is valid across each range.

use crate::comp::ParentId;
use crate::contract::pre;
use crate::range::EntityRange;
use crate::system::param::{ParamShape, SubShape};
use crate::util::DbgTypeId;
use crate::world::Registry;

/// The pool-level query derived from a system's parameter shapes.
pub(crate) struct QueryPlan {
    pub(crate) required: Vec<DbgTypeId>,
    pub(crate) filters:  Vec<DbgTypeId>,
    pub(crate) parents:  Vec<Vec<SubShape>>,
    pub(crate) globals:  Vec<DbgTypeId>,
}

impl QueryPlan {
    pub(crate) fn from_shapes(shapes: &[ParamShape]) -> Self {
        let mut plan = Self {
            required: Vec::new(),
            filters:  Vec::new(),
            parents:  Vec::new(),
            globals:  Vec::new(),
        };
        for shape in shapes {
            match shape {
                ParamShape::Required(ty) => plan.required.push(*ty),
                ParamShape::Filter(ty) => plan.filters.push(*ty),
                ParamShape::Global(ty) => plan.globals.push(*ty),
                ParamShape::EntityId => {}
                ParamShape::Parent(subs) => {
                    plan.required.push(DbgTypeId::of::<ParentId>());
                    plan.parents.push(subs.clone());
                }
            }
        }
        plan
    }

    pub(crate) fn has_parents(&self) -> bool { !self.parents.is_empty() }
}

/// Produces the maximal entity ranges matching the plan, ascending and
/// clipped at required-pool chunk boundaries.
pub(crate) fn matching_ranges(registry: &Registry, plan: &QueryPlan) -> Vec<EntityRange> {
    pre!(!plan.required.is_empty(), "a non-global system needs at least one required component");

    let mut acc: Option<Vec<EntityRange>> = None;
    for &ty in &plan.required {
        let ranges = registry.any(ty).chunk_ranges();
        acc = Some(match acc {
            None => ranges.to_vec(),
            Some(acc) => intersect_lists(&acc, ranges),
        });
        if acc.as_ref().is_some_and(Vec::is_empty) {
            return Vec::new();
        }
    }
    let mut acc = acc.expect("required set is non-empty");

    for &ty in &plan.filters {
        acc = subtract_lists(&acc, registry.any(ty).chunk_ranges());
        if acc.is_empty() {
            return Vec::new();
        }
    }

    for subs in &plan.parents {
        let cuts = parent_cuts(registry, &acc, subs);
        if !cuts.is_empty() {
            acc = subtract_lists(&acc, &cuts);
        }
    }

    acc
}

/// Intersects two ascending disjoint range lists. Output pieces are never
/// merged across input boundaries, which is what keeps every piece inside a
/// single chunk of both inputs.
pub(crate) fn intersect_lists(a: &[EntityRange], b: &[EntityRange]) -> Vec<EntityRange> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x.overlaps(y) {
            out.push(EntityRange::intersect(x, y));
        }
        // advance the laggard
        if x.last() <= y.last() {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Removes the coverage of `minus` from `base`; both ascending and disjoint.
pub(crate) fn subtract_lists(base: &[EntityRange], minus: &[EntityRange]) -> Vec<EntityRange> {
    let mut out = Vec::new();
    let mut j = 0;
    for &range in base {
        let mut rest = Some(range);
        while let Some(piece) = rest {
            while j < minus.len() && minus[j].last() < piece.first() {
                j += 1;
            }
            if j >= minus.len() || !minus[j].overlaps(piece) {
                out.push(piece);
                rest = None;
                continue;
            }
            match EntityRange::subtract(piece, minus[j]) {
                (None, None) => rest = None,
                (Some(left), Some(right)) => {
                    out.push(left);
                    rest = Some(right);
                    j += 1;
                }
                (Some(single), None) => {
                    if single.last() < minus[j].first() {
                        // the cut removed the right end; the cutter may
                        // still reach into later base ranges
                        out.push(single);
                        rest = None;
                    } else {
                        // the cut removed the left end
                        rest = Some(single);
                        j += 1;
                    }
                }
                (None, Some(_)) => unreachable!("subtract never returns only a right piece"),
            }
        }
    }
    out
}

/// Collects the entities in `ranges` whose parent fails the subtype
/// predicate: every required parent sub-component present, every
/// parent-filter absent.
fn parent_cuts(
    registry: &Registry,
    ranges: &[EntityRange],
    subs: &[SubShape],
) -> Vec<EntityRange> {
    let parent_pool = registry.get::<ParentId>();
    let mut cuts: Vec<EntityRange> = Vec::new();
    for &range in ranges {
        for id in range.iter() {
            let &ParentId(pid) =
                parent_pool.find(id).expect("intersection guarantees parent id coverage");
            let satisfied = subs.iter().all(|sub| {
                let covered = registry.any(sub.ty).covers(pid);
                covered != sub.filter
            });
            if !satisfied {
                merge_or_add(&mut cuts, EntityRange::single(id));
            }
        }
    }
    cuts
}

/// Extends the last range when adjacent, otherwise appends.
fn merge_or_add(list: &mut Vec<EntityRange>, range: EntityRange) {
    match list.last_mut() {
        Some(last) if last.adjacent(range) => *last = EntityRange::merge(*last, range),
        _ => list.push(range),
    }
}

#[cfg(test)]
mod tests {
    use super::{intersect_lists, subtract_lists};
    use crate::range::EntityRange;

    fn r(first: i32, last: i32) -> EntityRange { EntityRange::new(first, last) }

    #[test]
    fn intersect_basic() {
        assert_eq!(intersect_lists(&[r(0, 10)], &[r(5, 15)]), vec![r(5, 10)]);
        assert_eq!(intersect_lists(&[r(0, 3)], &[r(5, 9)]), vec![]);
        assert_eq!(
            intersect_lists(&[r(0, 10), r(20, 30)], &[r(5, 25)]),
            vec![r(5, 10), r(20, 25)]
        );
    }

    #[test]
    fn intersect_preserves_chunk_boundaries() {
        // seamless coverage on one side must not fuse across the boundary
        assert_eq!(
            intersect_lists(&[r(0, 9), r(10, 20)], &[r(0, 20)]),
            vec![r(0, 9), r(10, 20)]
        );
    }

    #[test]
    fn subtract_basic() {
        assert_eq!(subtract_lists(&[r(0, 10)], &[r(4, 5)]), vec![r(0, 3), r(6, 10)]);
        assert_eq!(subtract_lists(&[r(0, 10)], &[r(0, 10)]), vec![]);
        assert_eq!(subtract_lists(&[r(0, 10)], &[]), vec![r(0, 10)]);
        assert_eq!(subtract_lists(&[r(0, 10)], &[r(8, 15)]), vec![r(0, 7)]);
        assert_eq!(subtract_lists(&[r(0, 10)], &[r(-5, 2)]), vec![r(3, 10)]);
    }

    #[test]
    fn subtract_one_cutter_spanning_many_ranges() {
        assert_eq!(
            subtract_lists(&[r(0, 4), r(6, 10), r(12, 16)], &[r(3, 13)]),
            vec![r(0, 2), r(14, 16)]
        );
    }

    #[test]
    fn subtract_many_cutters_in_one_range() {
        assert_eq!(
            subtract_lists(&[r(0, 20)], &[r(2, 3), r(7, 8), r(15, 25)]),
            vec![r(0, 1), r(4, 6), r(9, 14)]
        );
    }
}
