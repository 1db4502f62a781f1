//! Per-thread instance collections.
//!
//! Component pools buffer their mutations in per-thread queues so that
//! producers on any thread stay lock-free with respect to each other. The
//! collection here is a small registry keyed by thread identity: looking up
//! the calling thread's slot takes a shared read lock, and the write lock is
//! only held while a thread appears for the first time.
//!
//! Every collection owns its instances outright, so two pools of the same
//! component type in different worlds never share state.

use std::cell::UnsafeCell;
use std::thread::{self, ThreadId};

use parking_lot::RwLock;

pub(crate) struct PerThread<T> {
    slots: RwLock<Vec<(ThreadId, Box<UnsafeCell<T>>)>>,
}

impl<T: Default + Send> PerThread<T> {
    pub fn new() -> Self { Self { slots: RwLock::new(Vec::new()) } }

    /// Runs `f` on the calling thread's instance, creating it on demand.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let id = thread::current().id();

        let ptr = {
            let slots = self.slots.read();
            slots.iter().find(|(slot_id, _)| *slot_id == id).map(|(_, cell)| cell.get())
        };
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => {
                let mut slots = self.slots.write();
                slots.push((id, Box::new(UnsafeCell::new(T::default()))));
                slots.last().expect("slot was just pushed").1.get()
            }
        };

        // Safety: each boxed instance is only ever dereferenced by the
        // thread that created it (slots are keyed by thread id and never
        // removed while shared), so the mutable access cannot alias. The
        // box keeps the address stable across registry growth.
        f(unsafe { &mut *ptr })
    }

    /// Visits every live per-thread instance.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut T)) {
        for (_, cell) in self.slots.get_mut().iter_mut() {
            f(cell.get_mut());
        }
    }

    /// Drops all per-thread instances.
    pub fn clear(&mut self) { self.slots.get_mut().clear() }
}

impl<T: Default + Send> Default for PerThread<T> {
    fn default() -> Self { Self::new() }
}

// Safety: instances are only accessed mutably by their owning thread (via
// `with`) or under exclusive access to the whole collection (`for_each`,
// `clear`), so sharing the collection across threads is sound for T: Send.
unsafe impl<T: Send> Sync for PerThread<T> {}

#[cfg(test)]
mod tests {
    use super::PerThread;

    #[test]
    fn local_instances_accumulate() {
        let mut collection = PerThread::<Vec<i32>>::new();
        collection.with(|local| local.push(1));
        collection.with(|local| local.push(2));

        let mut all = Vec::new();
        collection.for_each(|local| all.append(local));
        assert_eq!(all, vec![1, 2]);
    }

    #[test]
    fn one_instance_per_thread() {
        let collection = PerThread::<Vec<i32>>::new();

        std::thread::scope(|scope| {
            for value in 0..4 {
                let collection = &collection;
                scope.spawn(move || {
                    collection.with(|local| local.push(value));
                });
            }
        });
        let mut collection = collection;

        let mut counts = Vec::new();
        let mut all = Vec::new();
        collection.for_each(|local| {
            counts.push(local.len());
            all.append(local);
        });
        assert_eq!(counts, vec![1; 4]);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn clear_drops_instances() {
        let mut collection = PerThread::<Vec<i32>>::new();
        collection.with(|local| local.push(7));
        collection.clear();

        let mut all = Vec::new();
        collection.for_each(|local| all.append(local));
        assert!(all.is_empty());
    }
}
