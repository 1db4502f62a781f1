//! Per-type component storage.
//!
//! A pool stores all components of one type as a power-list of chunks, where
//! each chunk is a contiguous run of entity ids backed by one array of
//! values. Public mutation never touches the chunks directly: `add*` and
//! `remove` enqueue into per-thread buffers, and
//! [`process_changes`](ComponentPool::process_changes) is the single
//! serialisation point that drains them, first removes, then adds. This
//! yields one linearisable history per pool and makes multi-threaded
//! producers trivially safe.
//!
//! Removing the middle of a chunk splits it into two chunks that share the
//! original allocation; value pointers on either side stay stable. The
//! allocation is released only once no surviving chunk references it.

use std::alloc::{self, Layout};
use std::any::{type_name, Any};
use std::cmp::Ordering;
use std::mem;
use std::ptr::{self, NonNull};

use crate::comp::{is_global, Component};
use crate::contract::{assert_audit, pre};
use crate::list::PowerList;
use crate::range::{EntityId, EntityRange};
use crate::tls::PerThread;

/// A contiguous run of entity ids and the array holding their values.
///
/// `data` points at the value of `range.first()`. For tagged components the
/// pointer is dangling and no allocation exists. `owned` carries the
/// allocation base and length on exactly one of the chunks sharing an
/// allocation (the leftmost).
pub(crate) struct Chunk<T> {
    pub(crate) range: EntityRange,
    pub(crate) data:  NonNull<T>,
    owned:            Option<(NonNull<T>, usize)>,
}

impl<T> Clone for Chunk<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for Chunk<T> {}

impl<T> PartialEq for Chunk<T> {
    fn eq(&self, other: &Self) -> bool { self.range == other.range }
}

impl<T> Eq for Chunk<T> {}

impl<T> PartialOrd for Chunk<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for Chunk<T> {
    fn cmp(&self, other: &Self) -> Ordering { self.range.cmp(&other.range) }
}

/// Orders a chunk against a single id: `Equal` means the chunk covers it.
fn cmp_chunk<T>(chunk: &Chunk<T>, id: EntityId) -> Ordering {
    if chunk.range.last() < id {
        Ordering::Less
    } else if chunk.range.first() > id {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Writes `count` clones of `value` into `base`.
///
/// Safety: `base` addresses `count` uninitialised slots.
unsafe fn fill_cloned<T: Clone>(value: &T, base: NonNull<T>, count: usize) {
    for index in 0..count {
        ptr::write(base.as_ptr().add(index), value.clone());
    }
}

fn dup_cloned<T: Clone>(value: &T) -> T { value.clone() }

struct ValueAdd<T> {
    seq:   u64,
    range: EntityRange,
    value: T,
    /// Monomorphised at the `add` call site, where `T: Clone` is provable.
    fill:  unsafe fn(&T, NonNull<T>, usize),
    dup:   fn(&T) -> T,
}

type Generator<T> = Box<dyn FnMut(EntityId) -> T + Send>;

/// The per-thread deferred queues of one pool.
///
/// `seq` orders a thread's operations so that a variant cut cancels exactly
/// the adds enqueued before it, in program order.
struct LocalQueues<T> {
    seq:            u64,
    adds:           Vec<ValueAdd<T>>,
    add_spans:      Vec<(u64, EntityRange, Vec<T>)>,
    add_generators: Vec<(u64, EntityRange, Generator<T>)>,
    removes:        Vec<EntityRange>,
    variant_cuts:   Vec<(u64, EntityRange)>,
}

impl<T> Default for LocalQueues<T> {
    fn default() -> Self {
        Self {
            seq:            0,
            adds:           Vec::new(),
            add_spans:      Vec::new(),
            add_generators: Vec::new(),
            removes:        Vec::new(),
            variant_cuts:   Vec::new(),
        }
    }
}

/// Per-thread memo of the chunk that served the last lookup, plus its
/// successor. Linear id access patterns hit the memo and skip the list
/// search entirely. Stale entries are detected by the pool generation.
struct FindCache<T> {
    generation: u64,
    chunk:      Option<Chunk<T>>,
    next:       Option<Chunk<T>>,
}

impl<T> Default for FindCache<T> {
    fn default() -> Self { Self { generation: 0, chunk: None, next: None } }
}

// Safety: the cached chunk pointers are only dereferenced while the pool
// generation matches, i.e. before any commit could have freed them, and the
// pointed-to values are T: Send.
unsafe impl<T: Send> Send for FindCache<T> {}

struct PendingAdd<T> {
    range: EntityRange,
    src:   AddSrc<T>,
}

enum AddSrc<T> {
    Fill { value: T, fill: unsafe fn(&T, NonNull<T>, usize) },
    Values(Vec<T>),
}

/// The storage for all components of type `T`.
pub struct ComponentPool<T: Component> {
    chunks:        PowerList<Chunk<T>>,
    /// Chunk ranges refreshed at every commit; this is what the
    /// intersection engine consumes.
    cached_ranges: Vec<EntityRange>,
    /// The one shared value of a global component.
    shared:        Option<NonNull<T>>,
    local:         PerThread<LocalQueues<T>>,
    find_cache:    PerThread<FindCache<T>>,
    /// Bumped at every commit; invalidates the per-thread find caches.
    generation:    u64,
    added:         bool,
    removed:       bool,
    modified:      bool,
}

// Safety: shared methods either enqueue through the per-thread buffers or
// read committed chunks, which are only mutated under `&mut self` at commit.
unsafe impl<T: Component> Send for ComponentPool<T> {}
unsafe impl<T: Component> Sync for ComponentPool<T> {}

impl<T: Component> ComponentPool<T> {
    pub(crate) fn new() -> Self {
        if is_global::<T>() {
            pre!(
                !T::TAGGED && !T::TRANSIENT,
                "global component {} cannot be tagged or transient",
                type_name::<T>()
            );
        }
        pre!(
            !T::TAGGED || mem::size_of::<T>() == 0,
            "tagged component {} must be zero-sized",
            type_name::<T>()
        );

        let shared = T::GLOBAL_INIT.map(|init| {
            // Globals hold exactly one value-sized allocation from
            // construction onwards and never change shape.
            let slot = unsafe { Self::alloc_array(1) };
            unsafe { ptr::write(slot.as_ptr(), init()) };
            slot
        });

        Self {
            chunks: PowerList::new(),
            cached_ranges: Vec::new(),
            shared,
            local: PerThread::new(),
            find_cache: PerThread::new(),
            generation: 1,
            added: false,
            removed: false,
            modified: false,
        }
    }

    /// Queues `value` to be added for every entity in `range`.
    ///
    /// No entity in the range may already have this component when the next
    /// commit runs; that precondition is checked at commit in audit builds.
    pub fn add(&self, range: impl Into<EntityRange>, value: T)
    where
        T: Clone,
    {
        pre!(!is_global::<T>(), "cannot add global component {} to entities", type_name::<T>());
        let range = range.into();
        self.local.with(|queue| {
            queue.seq += 1;
            queue.adds.push(ValueAdd {
                seq: queue.seq,
                range,
                value,
                fill: fill_cloned::<T>,
                dup: dup_cloned::<T>,
            });
        });
    }

    /// Queues one value per entity, copied out of `values`.
    ///
    /// `values` must hold exactly `range.count()` elements.
    pub fn add_span(&self, range: impl Into<EntityRange>, values: &[T])
    where
        T: Clone,
    {
        pre!(!is_global::<T>(), "cannot add global component {} to entities", type_name::<T>());
        let range = range.into();
        pre!(
            range.count() == values.len(),
            "span length {} does not match range {range}",
            values.len()
        );
        self.local.with(|queue| {
            queue.seq += 1;
            queue.add_spans.push((queue.seq, range, values.to_vec()));
        });
    }

    /// Queues a generator invoked once per id during commit.
    pub fn add_generator(
        &self,
        range: impl Into<EntityRange>,
        generator: impl FnMut(EntityId) -> T + Send + 'static,
    ) {
        pre!(!is_global::<T>(), "cannot add global component {} to entities", type_name::<T>());
        let range = range.into();
        self.local.with(|queue| {
            queue.seq += 1;
            queue.add_generators.push((queue.seq, range, Box::new(generator)));
        });
    }

    /// Queues the component to be removed from every entity in `range`.
    pub fn remove(&self, range: impl Into<EntityRange>) {
        pre!(!is_global::<T>(), "cannot remove global component {}", type_name::<T>());
        let range = range.into();
        self.local.with(|queue| {
            queue.seq += 1;
            queue.removes.push(range);
        });
    }

    /// Called by sibling pools of a variant group: removes the range and
    /// cancels this pool's earlier queued adds overlapping it.
    pub(crate) fn remove_variant(&self, range: EntityRange) {
        self.local.with(|queue| {
            queue.seq += 1;
            queue.variant_cuts.push((queue.seq, range));
        });
    }

    /// Returns the committed component of `id`, if present.
    ///
    /// Always `None` on global pools; use [`get_shared`](Self::get_shared).
    pub fn find(&self, id: impl Into<EntityId>) -> Option<&T> {
        let id = id.into();
        if is_global::<T>() {
            return None;
        }
        if T::TAGGED {
            // Safety: dangling references to zero-sized values are valid.
            return self.has_entity(id).then(|| unsafe { NonNull::<T>::dangling().as_ref() });
        }

        let ptr = self.find_ptr(id)?;
        // Safety: commits require `&mut self`, so the value outlives `&self`.
        Some(unsafe { &*ptr })
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, id: impl Into<EntityId>) -> Option<&mut T> {
        let id = id.into();
        if is_global::<T>() || T::TAGGED {
            return None;
        }
        let ptr = self.find_ptr(id)? as *mut T;
        // Safety: exclusive borrow of the pool.
        Some(unsafe { &mut *ptr })
    }

    fn find_ptr(&self, id: EntityId) -> Option<*const T> {
        self.find_cache.with(|cache| {
            if cache.generation != self.generation {
                cache.generation = self.generation;
                cache.chunk = None;
                cache.next = None;
            }

            if let Some(chunk) = cache.chunk {
                if chunk.range.contains(id) {
                    // Safety: offset is within the chunk array.
                    return Some(unsafe {
                        chunk.data.as_ptr().add(chunk.range.offset(id)) as *const T
                    });
                }
            }
            // Linear walks are cheap: try the successor before searching.
            if let Some(next) = cache.next {
                if next.range.contains(id) {
                    cache.chunk = Some(next);
                    cache.next = None;
                    // Safety: offset is within the chunk array.
                    return Some(unsafe {
                        next.data.as_ptr().add(next.range.offset(id)) as *const T
                    });
                }
            }

            let (chunk, next) = self.chunks.find_with_next_by(|chunk| cmp_chunk(chunk, id))?;
            let (chunk, next) = (*chunk, next.copied());
            cache.chunk = Some(chunk);
            cache.next = next;
            // Safety: offset is within the chunk array.
            Some(unsafe { chunk.data.as_ptr().add(chunk.range.offset(id)) as *const T })
        })
    }

    /// Returns whether `id` has a committed component in this pool.
    /// Globals are accessible from every entity.
    pub fn has_entity(&self, id: impl Into<EntityId>) -> bool {
        if is_global::<T>() {
            return true;
        }
        let id = id.into();
        self.chunks.find_by(|chunk| cmp_chunk(chunk, id)).is_some()
    }

    /// Returns whether every id in `range` has a committed component,
    /// walking forward and subtracting matched pieces until the range is
    /// covered or a gap appears.
    pub fn has_entity_range(&self, range: EntityRange) -> bool {
        if is_global::<T>() {
            return true;
        }
        let mut rest = range;
        loop {
            let Some(chunk) = self.chunks.find_by(|chunk| cmp_chunk(chunk, rest.first())) else {
                return false;
            };
            if chunk.range.last() >= rest.last() {
                return true;
            }
            rest = EntityRange::new(chunk.range.last().0 + 1, rest.last().0);
        }
    }

    /// Returns the values of `range` as one contiguous slice.
    ///
    /// `None` if any entity in the range is missing, or if the range spans
    /// more than one chunk (split chunks share storage but have holes).
    /// The slice is invalidated by the next commit.
    pub fn get_components(&self, range: EntityRange) -> Option<&[T]> {
        if is_global::<T>() || T::TAGGED {
            return None;
        }
        let chunk = self.chunks.find_by(|chunk| cmp_chunk(chunk, range.first()))?;
        if !chunk.range.contains_range(range) {
            return None;
        }
        // Safety: the range lies within the chunk array; commits require
        // `&mut self`.
        Some(unsafe {
            std::slice::from_raw_parts(
                chunk.data.as_ptr().add(chunk.range.offset(range.first())),
                range.count(),
            )
        })
    }

    /// Returns the shared value of a global component.
    pub fn get_shared(&self) -> &T {
        let shared = self.shared.unwrap_or_else(|| {
            panic!("component {} is not global", type_name::<T>())
        });
        // Safety: the slot lives as long as the pool.
        unsafe { &*shared.as_ptr() }
    }

    /// Mutable variant of [`get_shared`](Self::get_shared).
    pub fn get_shared_mut(&mut self) -> &mut T {
        let shared = self.shared.unwrap_or_else(|| {
            panic!("component {} is not global", type_name::<T>())
        });
        // Safety: exclusive borrow of the pool.
        unsafe { &mut *shared.as_ptr() }
    }

    pub(crate) fn shared_ptr(&self) -> NonNull<T> {
        self.shared.unwrap_or_else(|| panic!("component {} is not global", type_name::<T>()))
    }

    /// The base pointer for `id`'s value within its chunk.
    pub(crate) fn data_at(&self, id: EntityId) -> Option<NonNull<T>> {
        if T::TAGGED {
            return Some(NonNull::dangling());
        }
        let chunk = self.chunks.find_by(|chunk| cmp_chunk(chunk, id))?;
        // Safety: offset is within the chunk array.
        Some(unsafe { NonNull::new_unchecked(chunk.data.as_ptr().add(chunk.range.offset(id))) })
    }

    /// The number of entities with a committed component.
    pub fn num_entities(&self) -> usize {
        self.cached_ranges.iter().map(EntityRange::count).sum()
    }

    /// The number of committed components; a global pool always holds one.
    pub fn num_components(&self) -> usize {
        if is_global::<T>() {
            1
        } else {
            self.num_entities()
        }
    }

    /// The number of committed chunks.
    pub fn num_chunks(&self) -> usize { self.chunks.len() }

    /// The committed chunk ranges in ascending order.
    pub fn ranges(&self) -> &[EntityRange] { &self.cached_ranges }

    pub(crate) fn has_additions(&self) -> bool { self.added }

    pub(crate) fn has_removals(&self) -> bool { self.removed }

    pub(crate) fn has_changes(&self) -> bool { self.added || self.removed || self.modified }

    /// Flags the committed values as externally mutated so that dependent
    /// system caches rebuild on the next run.
    pub fn notify_modified(&mut self) { self.modified = true; }

    pub(crate) fn clear_flags(&mut self) {
        self.added = false;
        self.removed = false;
        self.modified = false;
    }

    /// Drops all committed chunks and pending queues.
    pub fn clear(&mut self) {
        let had_components = !self.chunks.is_empty();
        self.drop_all_chunks();
        self.local.clear();
        self.find_cache.clear();
        self.cached_ranges.clear();
        self.clear_flags();
        self.removed = had_components;
        self.generation += 1;
    }

    /// Drains all per-thread queues into the chunk list: removes first,
    /// then adds.
    pub(crate) fn process_changes(&mut self) {
        if is_global::<T>() {
            return;
        }

        if T::TRANSIENT && !self.chunks.is_empty() {
            // transient components are removed each cycle
            self.drop_all_chunks();
            self.removed = true;
        }

        // Gather the queues. Cuts cancel same-thread adds that precede them
        // and act as plain removes against committed chunks.
        let mut removes: Vec<EntityRange> = Vec::new();
        let mut pending: Vec<PendingAdd<T>> = Vec::new();

        self.local.for_each(|queue| {
            let cuts = mem::take(&mut queue.variant_cuts);
            removes.extend(cuts.iter().map(|&(_, range)| range));
            removes.append(&mut queue.removes);

            for add in queue.adds.drain(..) {
                let pieces = cut_ranges(add.seq, add.range, &cuts);
                if pieces.len() == 1 && pieces[0] == add.range {
                    pending.push(PendingAdd {
                        range: add.range,
                        src:   AddSrc::Fill { value: add.value, fill: add.fill },
                    });
                } else {
                    for piece in pieces {
                        let value = (add.dup)(&add.value);
                        pending.push(PendingAdd {
                            range: piece,
                            src:   AddSrc::Fill { value, fill: add.fill },
                        });
                    }
                }
            }

            for (seq, range, values) in queue.add_spans.drain(..) {
                split_values(seq, range, values, &cuts, &mut pending);
            }

            for (seq, range, mut generator) in queue.add_generators.drain(..) {
                for piece in cut_ranges(seq, range, &cuts) {
                    let values: Vec<T> = piece.iter().map(&mut generator).collect();
                    pending.push(PendingAdd { range: piece, src: AddSrc::Values(values) });
                }
            }

            queue.seq = 0;
        });

        if !removes.is_empty() && !self.chunks.is_empty() {
            removes.sort_by_key(|range| range.first());
            coalesce(&mut removes);
            if self.apply_removes(&removes) {
                self.removed = true;
            }
        }

        if !pending.is_empty() {
            pending.sort_by_key(|add| add.range.first());
            assert_audit!(
                pending.windows(2).all(|pair| !pair[0].range.overlaps(pair[1].range)),
                "an entity was queued the same component twice ({})",
                type_name::<T>()
            );
            let combined = combine(pending);

            for add in combined {
                #[cfg(debug_assertions)]
                assert_audit!(
                    !self.overlaps_chunks(add.range),
                    "an entity in {} already has component {}",
                    add.range,
                    type_name::<T>()
                );
                let chunk = self.materialize(add);
                self.chunks.insert(chunk);
                self.added = true;
            }
        }

        self.update_cached_ranges();
        self.generation += 1;
    }

    /// Walks chunks and sorted disjoint removes in lock-step, dropping,
    /// truncating or splitting chunks. Returns whether anything was removed.
    fn apply_removes(&mut self, removes: &[EntityRange]) -> bool {
        let mut any = false;
        // Allocations whose owner chunk died; resolved after the walk since
        // a sharing chunk may sit beyond unrelated fresh chunks.
        let mut orphans: Vec<(NonNull<T>, usize)> = Vec::new();

        let mut index = 0;
        let mut cursor = self.chunks.cursor_mut();
        while index < removes.len() {
            let Some(&chunk) = cursor.peek() else { break };
            let rem = removes[index];

            if chunk.range.last() < rem.first() {
                cursor.advance();
                continue;
            }
            if rem.last() < chunk.range.first() {
                index += 1;
                continue;
            }

            any = true;
            match EntityRange::subtract(chunk.range, rem) {
                (None, Some(_)) => unreachable!("subtract normalizes (None, Some) into (Some, None)"),
                (None, None) => {
                    // Safety: the chunk values are live and dropped once.
                    unsafe { Self::drop_values(chunk.data, chunk.range.count()) };
                    cursor.remove_current();
                    if let Some(owned) = chunk.owned {
                        orphans.push(owned);
                    }
                    // rem may extend into the following chunks
                }
                (Some(left), Some(right)) => {
                    // interior removal: split around it, sharing the array
                    let cut_start = left.count();
                    // Safety: the cut region is live and dropped once.
                    unsafe {
                        Self::drop_values(
                            NonNull::new_unchecked(chunk.data.as_ptr().add(cut_start)),
                            rem.count(),
                        );
                    }
                    let current = cursor.current_mut().expect("cursor is on a chunk");
                    current.range = left;
                    let right_chunk = Chunk {
                        range: right,
                        // Safety: offset is within the original chunk array.
                        data:  unsafe {
                            NonNull::new_unchecked(
                                chunk.data.as_ptr().add(chunk.range.offset(right.first())),
                            )
                        },
                        owned: None,
                    };
                    cursor.insert_after(right_chunk);
                    cursor.advance();
                    index += 1;
                }
                (Some(left), None) => {
                    let cut = if left.first() == chunk.range.first() {
                        EntityRange::new(left.last().0 + 1, chunk.range.last().0)
                    } else {
                        EntityRange::new(chunk.range.first().0, left.first().0 - 1)
                    };
                    // Safety: the cut region is live and dropped once.
                    unsafe {
                        Self::drop_values(
                            NonNull::new_unchecked(
                                chunk.data.as_ptr().add(chunk.range.offset(cut.first())),
                            ),
                            cut.count(),
                        );
                    }
                    let current = cursor.current_mut().expect("cursor is on a chunk");
                    current.range = left;
                    if left.first() != chunk.range.first() {
                        // prefix removed: advance the data pointer; the
                        // allocation base stays with `owned` for the free
                        // Safety: offset is within the original chunk array.
                        current.data = unsafe {
                            NonNull::new_unchecked(
                                chunk.data.as_ptr().add(chunk.range.offset(left.first())),
                            )
                        };
                    }
                    if rem.last() > chunk.range.last() {
                        cursor.advance();
                    } else {
                        index += 1;
                    }
                }
            }
        }
        drop(cursor);

        for (base, len) in orphans {
            self.release_allocation(base, len);
        }
        any
    }

    /// Hands an orphaned allocation to the first surviving chunk still
    /// pointing into it, or frees it if none does.
    fn release_allocation(&mut self, base: NonNull<T>, len: usize) {
        let base_addr = base.as_ptr() as usize;
        let end_addr = base_addr + len * mem::size_of::<T>();

        let sharer = self
            .chunks
            .iter()
            .find(|chunk| {
                let addr = chunk.data.as_ptr() as usize;
                addr >= base_addr && addr < end_addr
            })
            .map(|chunk| chunk.range);

        match sharer {
            Some(range) => {
                let chunk = self
                    .chunks
                    .find_mut_by(|chunk| chunk.range.cmp(&range))
                    .expect("sharer chunk was just found");
                chunk.owned = Some((base, len));
            }
            // Safety: no chunk references the allocation any more.
            None => unsafe { Self::dealloc_array(base, len) },
        }
    }

    fn materialize(&mut self, add: PendingAdd<T>) -> Chunk<T> {
        let count = add.range.count();
        if T::TAGGED {
            return Chunk { range: add.range, data: NonNull::dangling(), owned: None };
        }

        // Safety: fresh storage for exactly `count` values, fully
        // initialised below.
        let base = unsafe { Self::alloc_array(count) };
        match add.src {
            AddSrc::Fill { value, fill } => unsafe { fill(&value, base, count) },
            AddSrc::Values(values) => {
                assert_audit!(
                    values.len() == count,
                    "value count {} does not match range {}",
                    values.len(),
                    add.range
                );
                for (index, value) in values.into_iter().enumerate() {
                    // Safety: `index < count`.
                    unsafe { ptr::write(base.as_ptr().add(index), value) };
                }
            }
        }
        Chunk { range: add.range, data: base, owned: Some((base, count)) }
    }

    /// Rebuilds the chunk-range cache with one balancing traversal, so the
    /// walk also pays for any pending power-list rebalance.
    fn update_cached_ranges(&mut self) {
        self.cached_ranges.clear();
        let Self { chunks, cached_ranges, .. } = self;
        for chunk in chunks.iter_balancing() {
            cached_ranges.push(chunk.range);
        }
        assert_audit!(
            cached_ranges.windows(2).all(|pair| pair[0].last() < pair[1].first()),
            "chunk list of {} is not strictly ordered",
            type_name::<T>()
        );
    }

    fn drop_all_chunks(&mut self) {
        let mut cursor = self.chunks.cursor_mut();
        while cursor.peek().is_some() {
            let chunk = cursor.remove_current();
            // Safety: each chunk's values and allocation are released once.
            unsafe {
                Self::drop_values(chunk.data, if T::TAGGED { 0 } else { chunk.range.count() });
                if let Some((base, len)) = chunk.owned {
                    Self::dealloc_array(base, len);
                }
            }
        }
    }

    #[cfg(debug_assertions)]
    fn overlaps_chunks(&self, range: EntityRange) -> bool {
        self.chunks
            .lower_bound_by(|chunk| {
                if chunk.range.last() < range.first() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            })
            .is_some_and(|chunk| chunk.range.first() <= range.last())
    }

    /// Safety: returns storage for `count` values; the caller initialises it.
    unsafe fn alloc_array(count: usize) -> NonNull<T> {
        if mem::size_of::<T>() == 0 || count == 0 {
            return NonNull::dangling();
        }
        let layout = Layout::array::<T>(count).expect("chunk size overflows the address space");
        let raw = alloc::alloc(layout);
        match NonNull::new(raw.cast::<T>()) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        }
    }

    /// Safety: `base` was returned by `alloc_array(len)` and all its values
    /// are already dropped.
    unsafe fn dealloc_array(base: NonNull<T>, len: usize) {
        if mem::size_of::<T>() == 0 || len == 0 {
            return;
        }
        let layout = Layout::array::<T>(len).expect("layout was valid at allocation");
        alloc::dealloc(base.as_ptr().cast(), layout);
    }

    /// Safety: `base` addresses `count` live values, dropped exactly once.
    unsafe fn drop_values(base: NonNull<T>, count: usize) {
        if mem::needs_drop::<T>() {
            for index in 0..count {
                ptr::drop_in_place(base.as_ptr().add(index));
            }
        }
    }
}

impl<T: Component> Drop for ComponentPool<T> {
    fn drop(&mut self) {
        self.drop_all_chunks();
        if let Some(shared) = self.shared {
            // Safety: the slot was allocated in `new` and holds a live value.
            unsafe {
                ptr::drop_in_place(shared.as_ptr());
                Self::dealloc_array(shared, 1);
            }
        }
    }
}

/// Splits `range` by every cut that was enqueued after `seq` on the same
/// thread.
fn cut_ranges(seq: u64, range: EntityRange, cuts: &[(u64, EntityRange)]) -> Vec<EntityRange> {
    let mut pieces = vec![range];
    for &(cut_seq, cut) in cuts {
        if cut_seq <= seq {
            continue;
        }
        let mut next = Vec::with_capacity(pieces.len() + 1);
        for piece in pieces {
            if !piece.overlaps(cut) {
                next.push(piece);
                continue;
            }
            let (left, right) = EntityRange::subtract(piece, cut);
            next.extend(left);
            next.extend(right);
        }
        pieces = next;
    }
    pieces
}

/// Applies cuts to a per-entity value sequence, splitting the vector so each
/// surviving piece owns exactly its values.
fn split_values<T>(
    seq: u64,
    range: EntityRange,
    values: Vec<T>,
    cuts: &[(u64, EntityRange)],
    pending: &mut Vec<PendingAdd<T>>,
) {
    let pieces = cut_ranges(seq, range, cuts);
    if pieces.len() == 1 && pieces[0] == range {
        pending.push(PendingAdd { range, src: AddSrc::Values(values) });
        return;
    }

    let mut rest = values;
    for piece in pieces.iter().rev() {
        let offset = range.offset(piece.first());
        let mut segment = rest.split_off(offset);
        segment.truncate(piece.count());
        pending.push(PendingAdd { range: *piece, src: AddSrc::Values(segment) });
    }
}

/// Merges overlapping or adjacent sorted ranges in place.
fn coalesce(ranges: &mut Vec<EntityRange>) {
    let mut merged: Vec<EntityRange> = Vec::with_capacity(ranges.len());
    for &range in ranges.iter() {
        match merged.last_mut() {
            Some(last) if last.adjacent(range) => *last = EntityRange::merge(*last, range),
            _ => merged.push(range),
        }
    }
    *ranges = merged;
}

/// Combines sorted adds that are adjacent and hold interchangeable values:
/// tagged adds always merge, uniform-value adds merge under
/// [`Component::merge_eq`].
fn combine<T: Component>(pending: Vec<PendingAdd<T>>) -> Vec<PendingAdd<T>> {
    let mut combined: Vec<PendingAdd<T>> = Vec::with_capacity(pending.len());
    for add in pending {
        let merged = match combined.last_mut() {
            Some(last) if last.range.adjacent(add.range) => {
                if T::TAGGED {
                    last.range = EntityRange::merge(last.range, add.range);
                    true
                } else if let (
                    AddSrc::Fill { value: left, .. },
                    AddSrc::Fill { value: right, .. },
                ) = (&last.src, &add.src)
                {
                    if T::merge_eq(left, right) {
                        last.range = EntityRange::merge(last.range, add.range);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            _ => false,
        };
        if !merged {
            combined.push(add);
        }
    }
    combined
}

/// The type-erased face of a pool, as stored in the registry.
pub(crate) trait AnyPool: Send + Sync {
    fn process_changes(&mut self);
    fn clear_flags(&mut self);
    fn has_changes(&self) -> bool;
    fn remove_variant_any(&self, range: EntityRange);
    fn chunk_ranges(&self) -> &[EntityRange];
    fn covers(&self, id: EntityId) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn process_changes(&mut self) { ComponentPool::process_changes(self) }

    fn clear_flags(&mut self) { ComponentPool::clear_flags(self) }

    fn has_changes(&self) -> bool { ComponentPool::has_changes(self) }

    fn remove_variant_any(&self, range: EntityRange) { self.remove_variant(range) }

    fn chunk_ranges(&self) -> &[EntityRange] { self.ranges() }

    fn covers(&self, id: EntityId) -> bool { self.has_entity(id) }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
