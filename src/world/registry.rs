//! The heterogeneous pool registry.
//!
//! Pools are keyed by component type identity. Iteration order is insertion
//! order, which makes the commit order deterministic. Variant groups are
//! wired here rather than inside the pools: the registry knows every
//! sibling of a type and fans buffered adds out as variant removes.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::comp::Component;
use crate::pool::{AnyPool, ComponentPool};
use crate::range::EntityRange;
use crate::util::DbgTypeId;

/// Owns every component pool of a [`World`](crate::World).
pub struct Registry {
    pools:    IndexMap<DbgTypeId, Box<dyn AnyPool>>,
    variants: HashMap<DbgTypeId, Vec<DbgTypeId>>,
}

impl Registry {
    pub(crate) fn new() -> Self { Self { pools: IndexMap::new(), variants: HashMap::new() } }

    /// Creates the pool for `T` if it does not exist yet.
    pub(crate) fn register<T: Component>(&mut self) {
        self.pools
            .entry(DbgTypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentPool::<T>::new()));
    }

    /// Returns the pool for `T`.
    ///
    /// Panics if the component type was never registered.
    pub(crate) fn get<T: Component>(&self) -> &ComponentPool<T> {
        let token = DbgTypeId::of::<T>();
        let pool = self
            .pools
            .get(&token)
            .unwrap_or_else(|| panic!("component type {token} is not registered"));
        pool.as_any().downcast_ref().expect("pool is keyed under a mismatching type token")
    }

    pub(crate) fn get_mut<T: Component>(&mut self) -> &mut ComponentPool<T> {
        let token = DbgTypeId::of::<T>();
        let pool = self
            .pools
            .get_mut(&token)
            .unwrap_or_else(|| panic!("component type {token} is not registered"));
        pool.as_any_mut().downcast_mut().expect("pool is keyed under a mismatching type token")
    }

    pub(crate) fn try_get<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let pool = self.pools.get(&DbgTypeId::of::<T>())?;
        Some(pool.as_any().downcast_ref().expect("pool is keyed under a mismatching type token"))
    }

    /// Returns the type-erased pool for `token`.
    pub(crate) fn any(&self, token: DbgTypeId) -> &dyn AnyPool {
        self.pools
            .get(&token)
            .unwrap_or_else(|| panic!("component type {token} is not registered"))
            .as_ref()
    }

    /// Links `A` and `B` into one variant group: an entity may carry at
    /// most one of them; the later add wins.
    pub(crate) fn register_variant<A: Component, B: Component>(&mut self) {
        self.register::<A>();
        self.register::<B>();
        let (a, b) = (DbgTypeId::of::<A>(), DbgTypeId::of::<B>());
        let forward = self.variants.entry(a).or_default();
        if !forward.contains(&b) {
            forward.push(b);
        }
        let backward = self.variants.entry(b).or_default();
        if !backward.contains(&a) {
            backward.push(a);
        }
    }

    /// Enqueues variant removes on every sibling of `token` for `range`.
    pub(crate) fn cut_variants(&self, token: DbgTypeId, range: EntityRange) {
        if let Some(siblings) = self.variants.get(&token) {
            for &sibling in siblings {
                self.any(sibling).remove_variant_any(range);
            }
        }
    }

    /// Whether the pool behind `token` changed since the last flag clear.
    pub(crate) fn has_changed(&self, token: DbgTypeId) -> bool {
        self.pools.get(&token).is_some_and(|pool| pool.has_changes())
    }

    pub(crate) fn pools_mut(
        &mut self,
    ) -> impl Iterator<Item = (DbgTypeId, &mut Box<dyn AnyPool>)> {
        self.pools.iter_mut().map(|(token, pool)| (*token, pool))
    }
}
