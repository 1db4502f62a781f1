//! An ordered singly-linked list with skip pointers (the "power list").
//!
//! Every node carries two forward pointers: `next[0]` is the ordinary
//! successor and `next[1]` is a long-range skip. By convention the head's
//! `next[1]` always points at the tail. After a rebalance the skips form a
//! jump structure that lets a search halve the remaining distance per
//! comparison, giving O(log n) lookups.
//!
//! Rebalancing is lazy: `insert` and `erase` only set a flag, and the next
//! [`iter_balancing`](PowerList::iter_balancing) traversal re-installs the
//! skips in-stream, so one ordered walk pays for one rebalance. An explicit
//! [`rebalance`](PowerList::rebalance) is also available. Iteration through
//! a shared reference never rebalances.
//!
//! Nodes are allocated through the [scatter allocator](crate::scatter) and
//! never move, so callers may retain pointers to node payloads across
//! inserts. After an erase the skip structure may reference freed nodes;
//! searches fall back to plain successor walks until the next rebalance
//! rewrites every skip.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ptr::{self, NonNull};

use crate::contract::{assert_audit, pre};
use crate::scatter::{RawSpan, ScatterAllocator};

struct Node<T> {
    /// `next[0]` is the successor, `next[1]` the skip (null = no skip).
    next: [*mut Node<T>; 2],
    data: T,
}

pub(crate) struct PowerList<T> {
    head:            *mut Node<T>,
    len:             usize,
    needs_rebalance: bool,
    /// Set when an erase may have left stale skip pointers behind.
    erased:          bool,
    alloc:           ScatterAllocator<Node<T>>,
}

// Safety: shared methods only read through the node pointers; all mutation
// requires `&mut self`. The payloads are `T`, so the list is exactly as
// thread-safe as `T` itself.
unsafe impl<T: Send> Send for PowerList<T> {}
unsafe impl<T: Sync> Sync for PowerList<T> {}

impl<T> PowerList<T> {
    pub fn new() -> Self {
        Self {
            head:            ptr::null_mut(),
            len:             0,
            needs_rebalance: false,
            erased:          false,
            alloc:           ScatterAllocator::new(),
        }
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.head.is_null() }

    pub fn front(&self) -> Option<&T> {
        // Safety: `head` is either null or a live node.
        (!self.head.is_null()).then(|| unsafe { &(*self.head).data })
    }

    pub fn back(&self) -> Option<&T> {
        // Safety: the head's skip is maintained as the tail pointer.
        (!self.head.is_null()).then(|| unsafe { &(*(*self.head).next[1]).data })
    }

    /// Walks the list looking for the first node whose payload does not
    /// compare [`Less`](Ordering::Less) against the probe encoded in `cmp`.
    /// Returns `(predecessor, node)`, either of which may be null.
    ///
    /// Skips are only consulted while they are known not to dangle. A skip
    /// is taken only if its target still compares `Less`, so the final step
    /// onto the returned node is always through `next[0]`, which keeps the
    /// predecessor exact.
    fn search_lower(&self, cmp: &impl Fn(&T) -> Ordering) -> (*mut Node<T>, *mut Node<T>) {
        let use_skips = !self.erased;
        let mut prev: *mut Node<T> = ptr::null_mut();
        let mut curr = self.head;
        // Safety: all non-null pointers reachable through `next` are live
        // nodes of this list; the `erased` flag excludes stale skips.
        unsafe {
            while !curr.is_null() && cmp(&(*curr).data) == Ordering::Less {
                prev = curr;
                let skip = (*curr).next[1];
                curr = if use_skips
                    && !skip.is_null()
                    && skip != curr
                    && cmp(&(*skip).data) == Ordering::Less
                {
                    skip
                } else {
                    (*curr).next[0]
                };
            }
        }
        (prev, curr)
    }

    /// Returns the payload matching the probe exactly.
    pub fn find_by(&self, cmp: impl Fn(&T) -> Ordering) -> Option<&T> {
        self.find_with_next_by(cmp).map(|(data, _)| data)
    }

    /// Returns the payload matching the probe exactly, plus its successor.
    pub fn find_with_next_by(&self, cmp: impl Fn(&T) -> Ordering) -> Option<(&T, Option<&T>)> {
        let (_, node) = self.search_lower(&cmp);
        if node.is_null() {
            return None;
        }
        // Safety: `node` is a live node of this list.
        unsafe {
            if cmp(&(*node).data) == Ordering::Equal {
                let next = (*node).next[0];
                let next = if next.is_null() { None } else { Some(&(*next).data) };
                Some((&(*node).data, next))
            } else {
                None
            }
        }
    }

    /// Returns the first payload that does not compare `Less` against the
    /// probe.
    pub fn lower_bound_by(&self, cmp: impl Fn(&T) -> Ordering) -> Option<&T> {
        let (_, node) = self.search_lower(&cmp);
        // Safety: `node` is a live node of this list.
        (!node.is_null()).then(|| unsafe { &(*node).data })
    }

    /// Returns a mutable reference to the payload matching the probe exactly.
    pub fn find_mut_by(&mut self, cmp: impl Fn(&T) -> Ordering) -> Option<&mut T> {
        let (_, node) = self.search_lower(&cmp);
        if node.is_null() {
            return None;
        }
        // Safety: `node` is a live node; the borrow is exclusive.
        unsafe {
            if cmp(&(*node).data) == Ordering::Equal {
                Some(&mut (*node).data)
            } else {
                None
            }
        }
    }

    pub fn iter(&self) -> Iter<'_, T> { Iter { curr: self.head, _list: self } }

    /// Iterates while executing the pending rebalance in-stream. The
    /// rebalance completes even if the iterator is dropped early.
    pub fn iter_balancing(&mut self) -> BalancingIter<'_, T> {
        let helper = (self.needs_rebalance && self.len >= 2)
            // Safety: the list is non-empty with at least 2 nodes.
            .then(|| unsafe { BalanceHelper::new(self.head, self.len) });
        BalancingIter { curr: self.head, helper, list: self }
    }

    /// Re-installs the skip structure immediately.
    pub fn rebalance(&mut self) {
        if self.needs_rebalance && !self.head.is_null() {
            if self.len >= 2 {
                // Safety: head is live and the list holds `len >= 2` nodes.
                unsafe {
                    let mut helper = BalanceHelper::new(self.head, self.len);
                    helper.finish();
                }
            } else {
                // Safety: single live node; it is its own tail.
                unsafe { (*self.head).next[1] = self.head };
            }
        }
        self.needs_rebalance = false;
        self.erased = false;
    }

    pub fn insert(&mut self, value: T)
    where
        T: Ord,
    {
        let node = self.alloc.allocate_one().as_ptr();
        // Safety: `node` is fresh storage from the allocator; all linked
        // pointers below are live nodes of this list.
        unsafe {
            ptr::write(node, Node { next: [ptr::null_mut(), ptr::null_mut()], data: value });

            if self.head.is_null() {
                self.head = node;
                (*node).next[1] = node;
            } else if (*node).data < (*self.head).data {
                self.link_before_head(node);
            } else {
                let tail = (*self.head).next[1];
                if (*tail).data < (*node).data {
                    // after the tail
                    (*tail).next[0] = node;
                    (*tail).next[1] = node;
                    (*self.head).next[1] = node;
                } else {
                    let probe: &T = &(*node).data;
                    let (prev, curr) = self.search_lower(&|data| data.cmp(probe));
                    if prev.is_null() {
                        self.link_before_head(node);
                    } else {
                        (*prev).next[0] = node;
                        (*node).next[0] = curr;
                        // inherit the successor's skip; it points forward
                        // from here as well
                        (*node).next[1] = if curr.is_null() { ptr::null_mut() } else { (*curr).next[1] };
                    }
                }
            }
        }
        self.len += 1;
        self.needs_rebalance = true;
    }

    /// Safety: `node` is an unlinked live node, the list is non-empty.
    unsafe fn link_before_head(&mut self, node: *mut Node<T>) {
        (*node).next[0] = self.head;
        (*node).next[1] = (*self.head).next[1];
        self.head = node;
    }

    /// Removes the node matching `value`, returning its payload.
    pub fn remove(&mut self, value: &T) -> Option<T>
    where
        T: Ord,
    {
        let (prev, node) = self.search_lower(&|data| data.cmp(value));
        if node.is_null() {
            return None;
        }
        // Safety: `node` is live; `prev` is its exact predecessor.
        unsafe {
            if &(*node).data == value {
                Some(self.unlink(prev, node))
            } else {
                None
            }
        }
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: Ord,
    {
        self.find_by(|data| data.cmp(value)).is_some()
    }

    pub fn find(&self, value: &T) -> Option<&T>
    where
        T: Ord,
    {
        self.find_by(|data| data.cmp(value))
    }

    /// Replaces the contents with an already-sorted sequence, built through
    /// a single bulk allocation and balanced on the spot.
    pub fn assign(&mut self, values: Vec<T>)
    where
        T: Ord,
    {
        assert_audit!(
            values.windows(2).all(|pair| pair[0] <= pair[1]),
            "bulk-assigned values must be sorted"
        );

        // Always reset so the bulk allocation below is a single span.
        self.clear();
        if values.is_empty() {
            return;
        }

        let count = values.len();
        let mut base: Option<NonNull<Node<T>>> = None;
        self.alloc.allocate_with(count, |span| {
            assert_audit!(
                base.is_none() && span.len == count,
                "bulk build expects a single span from a fresh allocator"
            );
            base = Some(span.ptr);
        });
        let base = base.expect("allocation did not produce a span").as_ptr();

        // Safety: `base` addresses `count` fresh node slots.
        unsafe {
            for (index, value) in values.into_iter().enumerate() {
                let next =
                    if index + 1 < count { base.add(index + 1) } else { ptr::null_mut() };
                ptr::write(base.add(index), Node { next: [next, ptr::null_mut()], data: value });
            }
        }

        self.head = base;
        self.len = count;
        self.needs_rebalance = true;
        self.erased = false;
        self.rebalance();
    }

    pub fn clear(&mut self) {
        // Safety: walks live nodes exactly once, dropping each payload; the
        // node storage itself is reclaimed by replacing the allocator.
        unsafe {
            let mut node = self.head;
            while !node.is_null() {
                let next = (*node).next[0];
                assert_audit!(node != next, "node points to itself");
                ptr::drop_in_place(&mut (*node).data);
                node = next;
            }
        }
        self.alloc = ScatterAllocator::new();
        self.head = ptr::null_mut();
        self.len = 0;
        self.needs_rebalance = false;
        self.erased = false;
    }

    pub fn cursor_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut { prev: ptr::null_mut(), curr: self.head, list: self }
    }

    /// Unlinks `node` and returns its payload.
    ///
    /// Safety: `node` is a live node of this list and `prev` is its exact
    /// predecessor (null when `node` is the head).
    unsafe fn unlink(&mut self, prev: *mut Node<T>, node: *mut Node<T>) -> T {
        let next = (*node).next[0];
        if prev.is_null() {
            let tail = (*self.head).next[1];
            self.head = next;
            if !next.is_null() {
                // the successor inherits the tail convention
                (*next).next[1] = tail;
            }
        } else {
            (*prev).next[0] = next;
            if next.is_null() {
                (*self.head).next[1] = prev;
            }
        }
        self.len -= 1;
        self.needs_rebalance = true;
        self.erased = true;

        let data = ptr::read(&(*node).data);
        self.alloc.deallocate(RawSpan { ptr: NonNull::new_unchecked(node), len: 1 });
        data
    }
}

impl<T> Default for PowerList<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Drop for PowerList<T> {
    fn drop(&mut self) {
        // Safety: same walk as `clear`; the allocator frees the node storage.
        unsafe {
            let mut node = self.head;
            while !node.is_null() {
                let next = (*node).next[0];
                ptr::drop_in_place(&mut (*node).data);
                node = next;
            }
        }
    }
}

pub(crate) struct Iter<'a, T> {
    curr:  *mut Node<T>,
    _list: &'a PowerList<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.curr.is_null() {
            return None;
        }
        // Safety: `curr` is a live node; the shared borrow on the list
        // outlives the yielded reference.
        unsafe {
            let data = &(*self.curr).data;
            self.curr = (*self.curr).next[0];
            Some(data)
        }
    }
}

/// One stepper per power-of-two stride; the heap is keyed on the next index
/// at which the stepper installs a skip.
struct Stepper<T> {
    target: usize,
    size:   usize,
    from:   *mut Node<T>,
}

impl<T> PartialEq for Stepper<T> {
    fn eq(&self, other: &Self) -> bool { self.target == other.target }
}

impl<T> Eq for Stepper<T> {}

impl<T> PartialOrd for Stepper<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for Stepper<T> {
    // inverted so that the std max-heap behaves as a min-heap on `target`
    fn cmp(&self, other: &Self) -> Ordering { other.target.cmp(&self.target) }
}

struct BalanceHelper<T> {
    heap:  BinaryHeap<Stepper<T>>,
    curr:  *mut Node<T>,
    index: usize,
}

impl<T> BalanceHelper<T> {
    /// Safety: `head` is the live head of a list holding `count >= 2` nodes.
    unsafe fn new(head: *mut Node<T>, count: usize) -> Self {
        let log_n = (usize::BITS - (count - 1).leading_zeros()) as usize;
        let mut heap = BinaryHeap::with_capacity(log_n);
        let mut current = head;
        let mut step = count;
        for i in 0..log_n {
            heap.push(Stepper { target: i + step, size: step, from: current });
            current = (*current).next[0];
            step >>= 1;
        }
        Self { heap, curr: head, index: 0 }
    }

    fn done(&self) -> bool {
        // Safety: `curr` is always a live node.
        unsafe { (*self.curr).next[0].is_null() }
    }

    /// Processes the current index and advances by one node.
    ///
    /// Safety: `done()` is false.
    unsafe fn step(&mut self) {
        // Reset the skip of every visited node; steppers behind re-install
        // long jumps over it, leaving no stale pointer anywhere.
        (*self.curr).next[1] = ptr::null_mut();

        while let Some(mut top) = self.heap.peek_mut() {
            if top.target != self.index {
                break;
            }
            (*top.from).next[1] = (*self.curr).next[0];
            top.from = self.curr;
            top.target += top.size;
        }

        self.curr = (*self.curr).next[0];
        self.index += 1;
    }

    /// Runs the remaining steps and re-points all pending steppers (this
    /// also restores the head-to-tail convention via the full-length
    /// stepper).
    ///
    /// Safety: the list structure has not been mutated since `new`.
    unsafe fn finish(&mut self) {
        while !self.done() {
            self.step();
        }
        (*self.curr).next[1] = ptr::null_mut();
        let last = self.curr;
        for stepper in self.heap.drain() {
            if stepper.from != last {
                (*stepper.from).next[1] = last;
            }
        }
    }
}

pub(crate) struct BalancingIter<'a, T> {
    curr:   *mut Node<T>,
    helper: Option<BalanceHelper<T>>,
    list:   &'a mut PowerList<T>,
}

impl<'a, T: Copy> Iterator for BalancingIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.curr.is_null() {
            return None;
        }
        // Safety: `curr` is live; the helper advances in lock-step with the
        // walk and only rewrites skip pointers, never successors.
        unsafe {
            let value = (*self.curr).data;
            if let Some(helper) = &mut self.helper {
                if !helper.done() {
                    helper.step();
                }
            }
            self.curr = (*self.curr).next[0];
            Some(value)
        }
    }
}

impl<'a, T> Drop for BalancingIter<'a, T> {
    fn drop(&mut self) {
        if let Some(mut helper) = self.helper.take() {
            // Safety: the exclusive borrow on the list means the structure
            // cannot have changed since the iterator was created.
            unsafe { helper.finish() };
            self.list.needs_rebalance = false;
            self.list.erased = false;
        } else if self.list.needs_rebalance && self.list.len == 1 {
            // Safety: single live node; it is its own tail.
            unsafe { (*self.list.head).next[1] = self.list.head };
            self.list.needs_rebalance = false;
            self.list.erased = false;
        }
    }
}

/// A mutating walk used by commit to splice chunks while traversing once.
pub(crate) struct CursorMut<'a, T> {
    prev: *mut Node<T>,
    curr: *mut Node<T>,
    list: &'a mut PowerList<T>,
}

impl<'a, T> CursorMut<'a, T> {
    pub fn peek(&self) -> Option<&T> {
        // Safety: `curr` is live or null.
        (!self.curr.is_null()).then(|| unsafe { &(*self.curr).data })
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        // Safety: `curr` is live or null; the cursor borrows exclusively.
        (!self.curr.is_null()).then(|| unsafe { &mut (*self.curr).data })
    }

    pub fn advance(&mut self) {
        pre!(!self.curr.is_null(), "cannot advance a cursor past the end");
        // Safety: `curr` is live.
        unsafe {
            self.prev = self.curr;
            self.curr = (*self.curr).next[0];
        }
    }

    /// Removes the current node and moves the cursor to its successor.
    pub fn remove_current(&mut self) -> T {
        pre!(!self.curr.is_null(), "no current node to remove");
        // Safety: `curr` is live and `prev` is its exact predecessor.
        unsafe {
            let next = (*self.curr).next[0];
            let data = self.list.unlink(self.prev, self.curr);
            self.curr = next;
            data
        }
    }

    /// Links a new node directly after the current one. The cursor stays on
    /// the current node.
    pub fn insert_after(&mut self, value: T) {
        pre!(!self.curr.is_null(), "no current node to insert after");
        let node = self.list.alloc.allocate_one().as_ptr();
        // Safety: `node` is fresh storage; `curr` is live.
        unsafe {
            let next = (*self.curr).next[0];
            ptr::write(node, Node { next: [next, ptr::null_mut()], data: value });
            (*self.curr).next[0] = node;
            if next.is_null() {
                // the new node is the tail now
                (*self.list.head).next[1] = node;
            }
        }
        self.list.len += 1;
        self.list.needs_rebalance = true;
    }
}

#[cfg(test)]
mod tests {
    use super::PowerList;

    #[test]
    fn empty_list() {
        let mut list = PowerList::<i32>::new();
        assert_eq!(list.remove(&123), None);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(!list.contains(&0));
    }

    #[test]
    fn construction_from_a_range() {
        let mut list = PowerList::new();
        list.assign((-2..2).collect());
        for value in -2..2 {
            assert!(list.contains(&value), "value {value} not found");
        }
        assert!(!list.contains(&2));
        assert_eq!(list.front(), Some(&-2));
        assert_eq!(list.back(), Some(&1));
    }

    #[test]
    fn insert_empty() {
        let mut list = PowerList::new();
        list.insert(23);
        assert!(list.contains(&23));
    }

    #[test]
    fn insert_before_head() {
        let mut list = PowerList::new();
        list.insert(23);
        list.insert(22);
        assert!(list.contains(&23));
        assert!(list.contains(&22));
        assert_eq!(list.front(), Some(&22));
    }

    #[test]
    fn insert_after_tail() {
        let mut list = PowerList::new();
        list.insert(23);
        list.insert(24);
        assert!(list.contains(&23));
        assert_eq!(list.back(), Some(&24));
    }

    #[test]
    fn insert_in_middle() {
        let mut list = PowerList::new();
        list.insert(22);
        list.insert(24);
        list.insert(23);
        assert!(list.contains(&23));
        let values: Vec<i32> = list.iter().copied().collect();
        assert_eq!(values, vec![22, 23, 24]);
    }

    #[test]
    fn insert_remove_insert() {
        let mut list = PowerList::new();
        list.insert(23);
        assert_eq!(list.remove(&23), Some(23));
        list.insert(24);
        assert!(!list.contains(&23));
        assert!(list.contains(&24));
    }

    #[test]
    fn assign_replaces_contents() {
        let mut list = PowerList::new();
        list.assign((-2..2).collect());
        list.assign((0..4).collect());
        list.assign((4..8).collect());
        assert_eq!(list.len(), 4);
        for value in 4..8 {
            assert!(list.contains(&value), "value {value} not found");
        }
        assert!(!list.contains(&0));
    }

    #[test]
    fn remove_from_empty() {
        let mut list = PowerList::<i32>::new();
        assert_eq!(list.remove(&23), None);
        assert!(list.is_empty());
    }

    #[test]
    fn remove_head() {
        let mut list = PowerList::new();
        list.assign((0..8).collect());
        assert_eq!(list.remove(&0), Some(0));
        for value in 1..8 {
            assert!(list.contains(&value), "value {value} not found");
        }
        assert_eq!(list.len(), 7);
        assert_eq!(list.front(), Some(&1));
        assert_eq!(list.back(), Some(&7));
    }

    #[test]
    fn remove_tail() {
        let mut list = PowerList::new();
        list.assign((0..8).collect());
        assert_eq!(list.remove(&7), Some(7));
        for value in 0..7 {
            assert!(list.contains(&value), "value {value} not found");
        }
        assert_eq!(list.len(), 7);
        assert_eq!(list.back(), Some(&6));
    }

    #[test]
    fn remove_middle() {
        let mut list = PowerList::new();
        list.assign((0..8).collect());
        for value in 1..7 {
            assert_eq!(list.remove(&value), Some(value));
        }
        let survivors: Vec<i32> = (0..8).filter(|v| list.contains(v)).collect();
        assert_eq!(survivors, vec![0, 7]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn explicit_rebalance() {
        let mut list = PowerList::new();
        for value in -200..200 {
            list.insert(value);
        }
        list.rebalance();
        assert!(list.contains(&1));
        assert!(list.contains(&-200));
        assert!(list.contains(&199));
    }

    #[test]
    fn implicit_rebalance_through_iteration() {
        let mut list = PowerList::new();
        for value in -100..200 {
            list.insert(value);
        }
        let sum: i32 = list.iter_balancing().sum();
        assert!(sum > 0);
        assert!(list.contains(&1));
        // a second iteration sees the same sequence
        let values: Vec<i32> = list.iter().copied().collect();
        assert_eq!(values, (-100..200).collect::<Vec<i32>>());
    }

    #[test]
    fn iota_and_mutate() {
        // 102 sequential values, then point mutations around the edges.
        let mut list = PowerList::new();
        for value in -2..100 {
            list.insert(value);
        }
        assert_eq!(list.len(), 102);

        for _ in list.iter_balancing() {}

        for value in -2..100 {
            assert!(list.contains(&value), "value {value} not found");
        }
        assert!(!list.contains(&-3));

        list.insert(100);
        list.insert(101);
        list.insert(-3);
        assert_eq!(list.remove(&83), Some(83));

        assert!(!list.contains(&83));
        assert!(list.contains(&82));
        assert!(list.contains(&84));
        assert!(list.contains(&-3));
        assert!(list.contains(&101));
        assert_eq!(list.len(), 104);
        assert_eq!(list.front(), Some(&-3));
        assert_eq!(list.back(), Some(&101));
    }

    #[test]
    fn search_after_erase_before_rebalance() {
        let mut list = PowerList::new();
        list.assign((0..64).collect());
        assert_eq!(list.remove(&32), Some(32));
        // skips may be stale here; searches must still be exact
        assert!(!list.contains(&32));
        assert!(list.contains(&31));
        assert!(list.contains(&33));
        list.rebalance();
        assert!(list.contains(&63));
    }

    #[test]
    fn cursor_surgery() {
        let mut list = PowerList::new();
        list.assign(vec![10, 20, 30, 40]);

        let mut cursor = list.cursor_mut();
        while let Some(&value) = cursor.peek() {
            if value == 20 {
                assert_eq!(cursor.remove_current(), 20);
            } else {
                if value == 10 {
                    cursor.insert_after(15);
                }
                cursor.advance();
            }
        }
        drop(cursor);

        let values: Vec<i32> = list.iter().copied().collect();
        assert_eq!(values, vec![10, 15, 30, 40]);
        assert_eq!(list.back(), Some(&40));

        // removing the tail through the cursor keeps the tail pointer exact
        let mut cursor = list.cursor_mut();
        cursor.advance();
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.remove_current(), 40);
        drop(cursor);
        assert_eq!(list.back(), Some(&30));
    }

    #[test]
    fn drops_payloads() {
        let mut list = PowerList::new();
        list.assign(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]);
        assert_eq!(list.remove(&"b".to_owned()), Some("b".to_owned()));
        drop(list);
    }
}
