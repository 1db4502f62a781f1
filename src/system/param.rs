//! System parameter markers.
//!
//! A system's parameter list is a tuple of marker types describing what the
//! user function receives per entity: component reads and writes, filters,
//! the entity id itself, or the entity's parent. The markers decompose at
//! system-build time into the read/write sets the scheduler analyses and
//! the shapes the intersection engine consumes.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::comp::{is_global, Component, ParentId};
use crate::contract::pre;
use crate::pool::ComponentPool;
use crate::range::{EntityId, EntityRange};
use crate::util::DbgTypeId;
use crate::world::Registry;

/// Requests shared access to `T`. For global `T` every invocation receives
/// the same shared value.
pub struct Read<T>(PhantomData<T>);

/// Requests exclusive access to `T`. Exclusivity is enforced by the
/// scheduler, not by locks.
pub struct Write<T>(PhantomData<T>);

/// A filter: entities carrying `T` are excluded from the system.
pub struct Not<T>(PhantomData<T>);

/// Pulls the entity's [`ParentId`] and the parent's components named by the
/// subtype tuple `S` ([`Read`] requirements and [`Not`] filters).
pub struct Parent<S = ()>(PhantomData<S>);

/// The argument produced by a [`Parent`] parameter.
pub struct ParentArg<A> {
    /// The id of the parent entity.
    pub id:    EntityId,
    /// The parent's components requested by the subtype tuple.
    pub comps: A,
}

/// One read/write request of a system, as seen by the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct Access {
    pub(crate) ty:      DbgTypeId,
    pub(crate) mutable: bool,
    pub(crate) global:  bool,
}

/// The shape of one parameter position, consumed by the intersection
/// engine.
pub enum ParamShape {
    /// The entity must carry the component.
    Required(DbgTypeId),
    /// The entity must not carry the component.
    Filter(DbgTypeId),
    /// A global component; no entity binding.
    Global(DbgTypeId),
    /// The entity id itself.
    EntityId,
    /// A parent parameter with its subtype predicates.
    Parent(Vec<SubShape>),
}

/// One parent-subtype predicate.
#[derive(Clone, Copy)]
pub struct SubShape {
    pub(crate) ty:     DbgTypeId,
    pub(crate) filter: bool,
}

/// A raw value pointer captured in an argument cache.
pub struct Ptr<T>(pub(crate) NonNull<T>);

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for Ptr<T> {}

// Safety: the pointee is pool chunk storage, which stays stable until the
// next commit; the scheduler serialises conflicting access to it.
unsafe impl<T: Send> Send for Ptr<T> {}
unsafe impl<T: Sync> Sync for Ptr<T> {}

/// A raw pool pointer captured in an argument cache, used for the random
/// accesses a parent parameter performs at run time.
pub struct PoolRef<T: Component>(pub(crate) NonNull<ComponentPool<T>>);

impl<T: Component> Clone for PoolRef<T> {
    fn clone(&self) -> Self { *self }
}

impl<T: Component> Copy for PoolRef<T> {}

// Safety: the pool is owned by the registry, which outlives every argument
// cache; shared pool reads are thread-safe.
unsafe impl<T: Component> Send for PoolRef<T> {}
unsafe impl<T: Component> Sync for PoolRef<T> {}

/// A single system parameter.
pub trait Param: 'static {
    /// Per-range fetch state captured while building the argument cache.
    type Source: Copy + Send + Sync + 'static;

    /// What the user function receives.
    type Arg<'a>;

    /// Creates the pools this parameter touches.
    fn register(registry: &mut Registry);

    /// Reports read/write requests for dependency analysis.
    fn collect_access(out: &mut Vec<Access>);

    /// Reports the shape for the intersection engine.
    fn shape(out: &mut Vec<ParamShape>);

    /// Captures fetch state for `range`, which lies within one chunk of
    /// every required pool.
    fn source(registry: &Registry, range: EntityRange) -> Self::Source;

    /// Rebases the fetch state `offset` entities into its range.
    fn shift(source: Self::Source, offset: usize) -> Self::Source;

    /// Produces the argument for the entity at `base + offset`.
    ///
    /// # Safety
    /// `offset` must be within the range the source was captured for, and
    /// the scheduler must have granted this system the accesses reported by
    /// `collect_access` (in particular exclusivity for writes).
    unsafe fn arg<'a>(source: Self::Source, base: EntityId, offset: usize) -> Self::Arg<'a>;
}

impl Param for EntityId {
    type Source = ();
    type Arg<'a> = EntityId;

    fn register(_registry: &mut Registry) {}

    fn collect_access(_out: &mut Vec<Access>) {}

    fn shape(out: &mut Vec<ParamShape>) { out.push(ParamShape::EntityId) }

    fn source(_registry: &Registry, _range: EntityRange) -> Self::Source {}

    fn shift(_source: Self::Source, _offset: usize) -> Self::Source {}

    unsafe fn arg<'a>(_source: Self::Source, base: EntityId, offset: usize) -> Self::Arg<'a> {
        EntityId(base.0 + offset as i32)
    }
}

impl<T: Component> Param for Read<T> {
    type Source = Ptr<T>;
    type Arg<'a> = &'a T;

    fn register(registry: &mut Registry) { registry.register::<T>() }

    fn collect_access(out: &mut Vec<Access>) {
        out.push(Access { ty: DbgTypeId::of::<T>(), mutable: false, global: is_global::<T>() });
    }

    fn shape(out: &mut Vec<ParamShape>) {
        out.push(if is_global::<T>() {
            ParamShape::Global(DbgTypeId::of::<T>())
        } else {
            ParamShape::Required(DbgTypeId::of::<T>())
        });
    }

    fn source(registry: &Registry, range: EntityRange) -> Self::Source {
        let pool = registry.get::<T>();
        if is_global::<T>() {
            Ptr(pool.shared_ptr())
        } else {
            Ptr(pool.data_at(range.first()).expect("intersection guarantees coverage"))
        }
    }

    fn shift(source: Self::Source, offset: usize) -> Self::Source {
        if is_global::<T>() {
            source
        } else {
            // Safety: the caller keeps the offset within the source range.
            Ptr(unsafe { NonNull::new_unchecked(source.0.as_ptr().add(offset)) })
        }
    }

    unsafe fn arg<'a>(source: Self::Source, _base: EntityId, offset: usize) -> &'a T {
        if is_global::<T>() {
            &*source.0.as_ptr()
        } else {
            &*source.0.as_ptr().add(offset)
        }
    }
}

impl<T: Component> Param for Write<T> {
    type Source = Ptr<T>;
    type Arg<'a> = &'a mut T;

    fn register(registry: &mut Registry) {
        pre!(
            !T::IMMUTABLE,
            "component {} is immutable and cannot be written by systems",
            std::any::type_name::<T>()
        );
        registry.register::<T>();
    }

    fn collect_access(out: &mut Vec<Access>) {
        out.push(Access { ty: DbgTypeId::of::<T>(), mutable: true, global: is_global::<T>() });
    }

    fn shape(out: &mut Vec<ParamShape>) {
        out.push(if is_global::<T>() {
            ParamShape::Global(DbgTypeId::of::<T>())
        } else {
            ParamShape::Required(DbgTypeId::of::<T>())
        });
    }

    fn source(registry: &Registry, range: EntityRange) -> Self::Source {
        let pool = registry.get::<T>();
        if is_global::<T>() {
            Ptr(pool.shared_ptr())
        } else {
            Ptr(pool.data_at(range.first()).expect("intersection guarantees coverage"))
        }
    }

    fn shift(source: Self::Source, offset: usize) -> Self::Source {
        if is_global::<T>() {
            source
        } else {
            // Safety: the caller keeps the offset within the source range.
            Ptr(unsafe { NonNull::new_unchecked(source.0.as_ptr().add(offset)) })
        }
    }

    unsafe fn arg<'a>(source: Self::Source, _base: EntityId, offset: usize) -> &'a mut T {
        if is_global::<T>() {
            &mut *source.0.as_ptr()
        } else {
            &mut *source.0.as_ptr().add(offset)
        }
    }
}

impl<T: Component> Param for Not<T> {
    type Source = ();
    type Arg<'a> = ();

    fn register(registry: &mut Registry) { registry.register::<T>() }

    fn collect_access(out: &mut Vec<Access>) {
        // absence is still observed, which is a read dependency
        out.push(Access { ty: DbgTypeId::of::<T>(), mutable: false, global: false });
    }

    fn shape(out: &mut Vec<ParamShape>) { out.push(ParamShape::Filter(DbgTypeId::of::<T>())) }

    fn source(_registry: &Registry, _range: EntityRange) -> Self::Source {}

    fn shift(_source: Self::Source, _offset: usize) -> Self::Source {}

    unsafe fn arg<'a>(_source: Self::Source, _base: EntityId, _offset: usize) -> Self::Arg<'a> {}
}

/// One entry of a [`Parent`] subtype tuple.
pub trait ParentSub: 'static {
    type Pool: Copy + Send + Sync + 'static;
    type Arg<'a>;

    fn register(registry: &mut Registry);
    fn collect_access(out: &mut Vec<Access>);
    fn sub_shape() -> SubShape;
    fn pool(registry: &Registry) -> Self::Pool;

    /// Produces the argument for the parent entity `pid`.
    ///
    /// # Safety
    /// The build phase verified that `pid` satisfies this subtype's
    /// predicate, and the registry outlives the argument cache.
    unsafe fn arg<'a>(pool: &Self::Pool, pid: EntityId) -> Self::Arg<'a>;
}

impl<T: Component> ParentSub for Read<T> {
    type Pool = PoolRef<T>;
    type Arg<'a> = &'a T;

    fn register(registry: &mut Registry) { registry.register::<T>() }

    fn collect_access(out: &mut Vec<Access>) {
        out.push(Access { ty: DbgTypeId::of::<T>(), mutable: false, global: false });
    }

    fn sub_shape() -> SubShape { SubShape { ty: DbgTypeId::of::<T>(), filter: false } }

    fn pool(registry: &Registry) -> Self::Pool { PoolRef(NonNull::from(registry.get::<T>())) }

    unsafe fn arg<'a>(pool: &Self::Pool, pid: EntityId) -> &'a T {
        let pool = &*pool.0.as_ptr();
        match pool.find(pid) {
            Some(value) => &*(value as *const T),
            None => panic!("parent {pid} lost its component between build and run"),
        }
    }
}

impl<T: Component> ParentSub for Not<T> {
    type Pool = PoolRef<T>;
    type Arg<'a> = ();

    fn register(registry: &mut Registry) { registry.register::<T>() }

    fn collect_access(out: &mut Vec<Access>) {
        out.push(Access { ty: DbgTypeId::of::<T>(), mutable: false, global: false });
    }

    fn sub_shape() -> SubShape { SubShape { ty: DbgTypeId::of::<T>(), filter: true } }

    fn pool(registry: &Registry) -> Self::Pool { PoolRef(NonNull::from(registry.get::<T>())) }

    unsafe fn arg<'a>(_pool: &Self::Pool, _pid: EntityId) -> Self::Arg<'a> {}
}

/// The subtype tuple of a [`Parent`] parameter.
pub trait ParentSubs: 'static {
    type Pools: Copy + Send + Sync + 'static;
    type Args<'a>;

    fn register(registry: &mut Registry);
    fn collect_access(out: &mut Vec<Access>);
    fn sub_shapes() -> Vec<SubShape>;
    fn pools(registry: &Registry) -> Self::Pools;

    /// # Safety
    /// See [`ParentSub::arg`].
    unsafe fn args<'a>(pools: &Self::Pools, pid: EntityId) -> Self::Args<'a>;
}

impl ParentSubs for () {
    type Pools = ();
    type Args<'a> = ();

    fn register(_registry: &mut Registry) {}

    fn collect_access(_out: &mut Vec<Access>) {}

    fn sub_shapes() -> Vec<SubShape> { Vec::new() }

    fn pools(_registry: &Registry) -> Self::Pools {}

    unsafe fn args<'a>(_pools: &Self::Pools, _pid: EntityId) -> Self::Args<'a> {}
}

macro_rules! impl_parent_subs {
    ($(($S:ident, $idx:tt)),+) => {
        impl<$($S: ParentSub),+> ParentSubs for ($($S,)+) {
            type Pools = ($($S::Pool,)+);
            type Args<'a> = ($($S::Arg<'a>,)+);

            fn register(registry: &mut Registry) { $($S::register(registry);)+ }

            fn collect_access(out: &mut Vec<Access>) { $($S::collect_access(out);)+ }

            fn sub_shapes() -> Vec<SubShape> { vec![$($S::sub_shape()),+] }

            fn pools(registry: &Registry) -> Self::Pools { ($($S::pool(registry),)+) }

            unsafe fn args<'a>(pools: &Self::Pools, pid: EntityId) -> Self::Args<'a> {
                ($($S::arg(&pools.$idx, pid),)+)
            }
        }
    };
}

impl_parent_subs!((S0, 0));
impl_parent_subs!((S0, 0), (S1, 1));
impl_parent_subs!((S0, 0), (S1, 1), (S2, 2));
impl_parent_subs!((S0, 0), (S1, 1), (S2, 2), (S3, 3));

impl<S: ParentSubs> Param for Parent<S> {
    type Source = (Ptr<ParentId>, S::Pools);
    type Arg<'a> = ParentArg<S::Args<'a>>;

    fn register(registry: &mut Registry) {
        registry.register::<ParentId>();
        S::register(registry);
    }

    fn collect_access(out: &mut Vec<Access>) {
        out.push(Access { ty: DbgTypeId::of::<ParentId>(), mutable: false, global: false });
        S::collect_access(out);
    }

    fn shape(out: &mut Vec<ParamShape>) { out.push(ParamShape::Parent(S::sub_shapes())) }

    fn source(registry: &Registry, range: EntityRange) -> Self::Source {
        let parent_ids = registry
            .get::<ParentId>()
            .data_at(range.first())
            .expect("intersection guarantees parent id coverage");
        (Ptr(parent_ids), S::pools(registry))
    }

    fn shift(source: Self::Source, offset: usize) -> Self::Source {
        // Safety: the caller keeps the offset within the source range.
        (Ptr(unsafe { NonNull::new_unchecked(source.0 .0.as_ptr().add(offset)) }), source.1)
    }

    unsafe fn arg<'a>(source: Self::Source, _base: EntityId, offset: usize) -> Self::Arg<'a> {
        let ParentId(pid) = *source.0 .0.as_ptr().add(offset);
        ParentArg { id: pid, comps: S::args(&source.1, pid) }
    }
}

/// The full parameter tuple of a system.
pub trait Params: 'static {
    type Sources: Copy + Send + Sync + 'static;
    type Args<'a>;

    fn register(registry: &mut Registry);
    fn collect_access(out: &mut Vec<Access>);
    fn shapes() -> Vec<ParamShape>;
    fn sources(registry: &Registry, range: EntityRange) -> Self::Sources;
    fn shift(sources: Self::Sources, offset: usize) -> Self::Sources;

    /// # Safety
    /// See [`Param::arg`].
    unsafe fn args<'a>(sources: Self::Sources, base: EntityId, offset: usize) -> Self::Args<'a>;
}

macro_rules! impl_params {
    ($(($P:ident, $idx:tt)),+) => {
        impl<$($P: Param),+> Params for ($($P,)+) {
            type Sources = ($($P::Source,)+);
            type Args<'a> = ($($P::Arg<'a>,)+);

            fn register(registry: &mut Registry) { $($P::register(registry);)+ }

            fn collect_access(out: &mut Vec<Access>) { $($P::collect_access(out);)+ }

            fn shapes() -> Vec<ParamShape> {
                let mut out = Vec::new();
                $($P::shape(&mut out);)+
                out
            }

            fn sources(registry: &Registry, range: EntityRange) -> Self::Sources {
                ($($P::source(registry, range),)+)
            }

            fn shift(sources: Self::Sources, offset: usize) -> Self::Sources {
                ($($P::shift(sources.$idx, offset),)+)
            }

            unsafe fn args<'a>(sources: Self::Sources, base: EntityId, offset: usize) -> Self::Args<'a> {
                ($($P::arg(sources.$idx, base, offset),)+)
            }
        }
    };
}

impl_params!((P0, 0));
impl_params!((P0, 0), (P1, 1));
impl_params!((P0, 0), (P1, 1), (P2, 2));
impl_params!((P0, 0), (P1, 1), (P2, 2), (P3, 3));
impl_params!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4));
impl_params!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4), (P5, 5));
impl_params!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4), (P5, 5), (P6, 6));
impl_params!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4), (P5, 5), (P6, 6), (P7, 7));
