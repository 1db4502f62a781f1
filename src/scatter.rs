//! A non-moving bulk allocator.
//!
//! One logical request for `count` elements may be satisfied by several
//! physical spans: the allocator first fills holes from its free-list, then
//! carves the remainder from internal pools of geometrically growing raw
//! arrays. Nothing is ever handed back to the operating system before the
//! allocator itself is dropped, so every span stays at a stable address for
//! the allocator's whole lifetime - callers are free to retain pointers into
//! them across later allocations.
//!
//! The allocator neither constructs nor destroys elements; spans are raw,
//! uninitialised storage. It is not thread safe.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use crate::contract::{assert_audit, post};

/// A span of raw, possibly uninitialised elements.
pub(crate) struct RawSpan<T> {
    pub ptr: NonNull<T>,
    pub len: usize,
}

impl<T> Clone for RawSpan<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for RawSpan<T> {}

struct Pool<T> {
    data: NonNull<T>,
    cap:  usize,
    used: usize,
}

pub(crate) struct ScatterAllocator<T> {
    /// Pools in creation order; the most recent pool is last.
    pools:      Vec<Pool<T>>,
    /// LIFO stack of deallocated spans, drained from their fronts.
    free:       Vec<RawSpan<T>>,
    start_size: usize,
    _ph:        PhantomData<T>,
}

const DEFAULT_STARTING_SIZE: usize = 16;

/// The smallest power of two strictly greater than `count`.
fn next_pool_size(count: usize) -> usize {
    1usize << (usize::BITS - count.leading_zeros())
}

impl<T> ScatterAllocator<T> {
    pub fn new() -> Self { Self::with_starting_size(DEFAULT_STARTING_SIZE) }

    pub fn with_starting_size(start_size: usize) -> Self {
        Self { pools: Vec::new(), free: Vec::new(), start_size, _ph: PhantomData }
    }

    /// Allocates storage for `count` elements,
    /// yielding each satisfied sub-request through `callback`.
    pub fn allocate_with(&mut self, count: usize, mut callback: impl FnMut(RawSpan<T>)) {
        if count == 0 {
            return;
        }
        if mem::size_of::<T>() == 0 {
            callback(RawSpan { ptr: NonNull::dangling(), len: count });
            return;
        }

        let mut remaining = count;

        // Phase 1: drain the free-list. Reusing old holes first keeps
        // fragmentation bounded by allocation cadence, not time.
        while remaining > 0 {
            let Some(block) = self.free.last_mut() else { break };
            let taken = remaining.min(block.len);
            callback(RawSpan { ptr: block.ptr, len: taken });
            remaining -= taken;
            if taken == block.len {
                self.free.pop();
            } else {
                // Safety: `taken < block.len`, so the result is in bounds.
                block.ptr = unsafe { NonNull::new_unchecked(block.ptr.as_ptr().add(taken)) };
                block.len -= taken;
            }
        }

        // Phase 2: carve from the most recent pool, growing as needed.
        while remaining > 0 {
            let exhausted = self.pools.last().map_or(true, |pool| pool.used >= pool.cap);
            if exhausted {
                let size = match self.pools.last() {
                    Some(pool) => pool.cap << 1,
                    None => next_pool_size(remaining).max(self.start_size),
                };
                self.add_pool(size);
            }
            let pool = self.pools.last_mut().expect("a pool with free space exists");

            let taken = remaining.min(pool.cap - pool.used);
            // Safety: `used + taken <= cap`, within the pool allocation.
            let ptr = unsafe { NonNull::new_unchecked(pool.data.as_ptr().add(pool.used)) };
            callback(RawSpan { ptr, len: taken });
            pool.used += taken;
            remaining -= taken;
        }
    }

    /// Allocates storage for a single element.
    pub fn allocate_one(&mut self) -> NonNull<T> {
        let mut out = None;
        self.allocate_with(1, |span| {
            assert_audit!(out.is_none() && span.len == 1, "a single-element request was split");
            out = Some(span.ptr);
        });
        out.expect("allocation did not produce a span")
    }

    /// Returns a span to the allocator.
    ///
    /// The span is pushed onto the free-list head; it is never merged with
    /// neighbouring free blocks and never returned to the operating system
    /// before the allocator is dropped.
    pub fn deallocate(&mut self, span: RawSpan<T>) {
        if mem::size_of::<T>() == 0 || span.len == 0 {
            return;
        }
        #[cfg(debug_assertions)]
        assert_audit!(self.owns(span), "span passed to deallocate is not owned by this allocator");

        // Poison the freed storage in audit builds.
        #[cfg(debug_assertions)]
        // Safety: the span is owned by a live pool, checked above.
        unsafe {
            std::ptr::write_bytes(
                span.ptr.as_ptr().cast::<u8>(),
                0xee,
                span.len * mem::size_of::<T>(),
            );
        }

        self.free.push(span);
    }

    fn add_pool(&mut self, cap: usize) {
        let layout = Layout::array::<T>(cap).expect("pool size overflows the address space");
        // Safety: `cap > 0` and `T` is not zero-sized in this path.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(data) = NonNull::new(raw.cast::<T>()) else {
            alloc::handle_alloc_error(layout);
        };
        self.pools.push(Pool { data, cap, used: 0 });
        post!(!self.pools.is_empty(), "pool list empty after growth");
    }

    #[cfg(debug_assertions)]
    fn owns(&self, span: RawSpan<T>) -> bool {
        self.pools.iter().any(|pool| {
            let base = pool.data.as_ptr() as usize;
            let addr = span.ptr.as_ptr() as usize;
            let size = mem::size_of::<T>();
            addr >= base && addr + span.len * size <= base + pool.cap * size
        })
    }
}

impl<T> Default for ScatterAllocator<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Drop for ScatterAllocator<T> {
    fn drop(&mut self) {
        if mem::size_of::<T>() == 0 {
            return;
        }
        for pool in &self.pools {
            let layout = Layout::array::<T>(pool.cap).expect("layout was valid at allocation");
            // Safety: allocated with the same layout in `add_pool`.
            unsafe { alloc::dealloc(pool.data.as_ptr().cast(), layout) };
        }
    }
}

// Safety: the allocator owns its pools exclusively; `T` itself is never
// read or dropped by the allocator, only raw storage is managed.
unsafe impl<T: Send> Send for ScatterAllocator<T> {}

#[cfg(test)]
mod tests {
    use super::{RawSpan, ScatterAllocator};

    #[test]
    fn allocates_the_requested_count() {
        let mut alloc = ScatterAllocator::<i32>::new();
        let mut total = 0;
        alloc.allocate_with(123, |span| total += span.len);
        assert_eq!(total, 123);
    }

    #[test]
    fn frees_subspans() {
        let mut alloc = ScatterAllocator::<i32>::new();
        let mut spans = Vec::new();
        alloc.allocate_with(10, |span| spans.push(span));
        assert_eq!(spans.len(), 1);

        // Safety: within the span just allocated.
        let sub = unsafe {
            RawSpan { ptr: std::ptr::NonNull::new_unchecked(spans[0].ptr.as_ptr().add(3)), len: 4 }
        };
        alloc.deallocate(sub);
    }

    #[test]
    fn scatters_over_holes_before_growing() {
        let mut alloc = ScatterAllocator::<i32>::with_starting_size(16);
        let mut spans = Vec::new();
        alloc.allocate_with(10, |span| spans.push(span));
        assert_eq!(spans.len(), 1);

        let base = spans[0].ptr.as_ptr();
        // Safety: both holes are within the first allocation.
        unsafe {
            alloc.deallocate(RawSpan {
                ptr: std::ptr::NonNull::new_unchecked(base.add(2)),
                len: 2,
            });
            alloc.deallocate(RawSpan {
                ptr: std::ptr::NonNull::new_unchecked(base.add(4)),
                len: 2,
            });
        }

        // Fills the two holes (2+2), the rest of the first pool (6),
        // and the remainder from a new second pool (10).
        let mut sizes = Vec::new();
        alloc.allocate_with(20, |span| sizes.push(span.len));
        assert_eq!(sizes, vec![2, 2, 6, 10]);
    }

    #[test]
    fn works_with_construction_and_destruction() {
        let mut alloc = ScatterAllocator::<String>::new();
        let mut spans = Vec::new();
        alloc.allocate_with(12, |span| spans.push(span));

        for span in &spans {
            for i in 0..span.len {
                // Safety: raw uninitialised storage owned by the allocator.
                unsafe {
                    let slot = span.ptr.as_ptr().add(i);
                    std::ptr::write(slot, format!("value {i}"));
                    assert_eq!(*slot, format!("value {i}"));
                    std::ptr::drop_in_place(slot);
                }
            }
        }
        for span in spans {
            alloc.deallocate(span);
        }
    }

    #[test]
    fn single_allocations_reuse_freed_nodes() {
        let mut alloc = ScatterAllocator::<u64>::new();
        let a = alloc.allocate_one();
        let b = alloc.allocate_one();
        alloc.deallocate(RawSpan { ptr: a, len: 1 });
        let c = alloc.allocate_one();
        assert_eq!(a.as_ptr(), c.as_ptr());
        assert_ne!(b.as_ptr(), c.as_ptr());
    }

    #[test]
    fn zero_sized_elements() {
        let mut alloc = ScatterAllocator::<()>::new();
        let mut total = 0;
        alloc.allocate_with(1000, |span| total += span.len);
        assert_eq!(total, 1000);
    }
}
