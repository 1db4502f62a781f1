use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::comp::Component;
use crate::pool::ComponentPool;
use crate::range::{EntityId, EntityRange};
use crate::system::{Read, Write};
use crate::world::World;

#[derive(Clone, Debug, PartialEq)]
struct Num(i64);

impl Component for Num {
    fn merge_eq(left: &Self, right: &Self) -> bool { left == right }
}

#[derive(Clone, Debug, PartialEq)]
struct Left(i32);

impl Component for Left {}

#[derive(Clone, Debug, PartialEq)]
struct Right(i32);

impl Component for Right {}

#[derive(Clone)]
struct Spark;

impl Component for Spark {
    const TRANSIENT: bool = true;
    const TAGGED: bool = true;
}

assert_impl_all!(World: Send, Sync);
assert_impl_all!(ComponentPool<Num>: Send, Sync);

fn r(first: i32, last: i32) -> EntityRange { EntityRange::new(first, last) }

#[test]
fn range_add_then_partial_remove() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(0, 10), Num(7));
    world.commit_changes();

    world.remove_component::<Num>(r(4, 5));
    world.commit_changes();

    assert_eq!(world.get_component::<Num>(3), Some(&Num(7)));
    assert_eq!(world.get_component::<Num>(6), Some(&Num(7)));
    assert_eq!(world.get_component::<Num>(4), None);
    assert_eq!(world.get_entity_count::<Num>(), 9);
}

#[test]
fn multi_chunk_presence() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(0, 9), Num(0));
    world.commit_changes();
    world.add_component(r(11, 20), Num(0));
    world.commit_changes();
    world.add_component(r(21, 30), Num(0));
    world.commit_changes();

    // gap at 10
    assert!(!world.has_component::<Num>(r(5, 15)));
    assert!(world.has_component::<Num>(r(11, 30)));
}

#[test]
fn round_trip_add_and_read_back() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(10, 19), Num(42));
    world.commit_changes();

    let slice = world.get_components::<Num>(r(10, 19)).unwrap();
    assert_eq!(slice.len(), 10);
    assert!(slice.iter().all(|value| value == &Num(42)));
}

#[test]
fn round_trip_remove() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(0, 5), Num(1));
    world.commit_changes();
    world.remove_component::<Num>(r(0, 5));
    world.commit_changes();

    for id in 0..=5 {
        assert!(!world.has_component::<Num>(id));
    }
}

#[test]
fn transient_components_disappear() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Spark>();

    world.add_component(r(0, 3), Spark);
    world.commit_changes();
    assert!(world.has_component::<Spark>(r(0, 3)));

    world.commit_changes();
    assert!(!world.has_component::<Spark>(0));
}

#[test]
fn negative_ids_through_the_world_api() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(-20, -11), Num(9));
    world.commit_changes();

    assert_eq!(world.get_entity_count::<Num>(), 10);
    assert_eq!(world.get_component::<Num>(-15), Some(&Num(9)));
    assert!(!world.has_component::<Num>(-10));
}

#[test]
fn variant_groups_keep_the_later_add() {
    let mut world = World::builder().concurrency(0).build();
    world.register_variant::<Left, Right>();

    world.add_component(r(0, 5), Left(1));
    world.add_component(r(3, 7), Right(2));
    world.commit_changes();

    assert!(world.has_component::<Left>(r(0, 2)));
    assert_eq!(world.get_component::<Left>(3), None);
    assert_eq!(world.get_entity_count::<Left>(), 3);
    assert!(world.has_component::<Right>(r(3, 7)));
    assert_eq!(world.get_entity_count::<Right>(), 5);

    for id in 0..=7 {
        let both = world.has_component::<Left>(id) && world.has_component::<Right>(id);
        assert!(!both, "entity {id} holds both variants");
    }
}

#[test]
fn variant_groups_replace_committed_components() {
    let mut world = World::builder().concurrency(0).build();
    world.register_variant::<Left, Right>();

    world.add_component(r(0, 9), Left(1));
    world.commit_changes();

    world.add_component(r(4, 6), Right(2));
    world.commit_changes();

    assert!(world.has_component::<Left>(r(0, 3)));
    assert!(world.has_component::<Left>(r(7, 9)));
    assert!(!world.has_component::<Left>(5));
    assert!(world.has_component::<Right>(r(4, 6)));
}

#[test]
fn writer_runs_before_reader_in_one_pipeline() {
    let mut world = World::builder().concurrency(4).build();
    world.register_component::<Num>();

    world.add_component_generator(r(0, 999), |id| Num(i64::from(id.0)));

    // A writes, B reads: the scheduler serialises them in declaration
    // order, so B must observe every write of A
    world.make_system::<(EntityId, Write<Num>), _>(|(id, num): (EntityId, &mut Num)| {
        num.0 = i64::from(id.0) * 2;
    });

    let checked = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&checked);
    world.make_system::<(EntityId, Read<Num>), _>(move |(id, num): (EntityId, &Num)| {
        assert_eq!(num.0, i64::from(id.0) * 2);
        sink.fetch_add(1, Ordering::Relaxed);
    });

    world.update_systems();
    assert_eq!(checked.load(Ordering::Relaxed), 1000);
}

#[test]
fn concurrent_producers_are_drained_deterministically() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    std::thread::scope(|scope| {
        let world = &world;
        for worker in 0..4 {
            scope.spawn(move || {
                let base = worker * 100;
                world.add_component(r(base, base + 24), Num(i64::from(worker)));
                world.add_component(r(base + 25, base + 49), Num(i64::from(worker)));
            });
        }
    });
    world.commit_changes();

    assert_eq!(world.get_entity_count::<Num>(), 200);
    for worker in 0..4 {
        assert_eq!(world.get_component::<Num>(worker * 100 + 30), Some(&Num(i64::from(worker))));
    }
}

#[test]
fn update_systems_commits_then_runs() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    world.make_system::<(Read<Num>,), _>(move |(_,): (&Num,)| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    // the add buffered here must be visible to the very same cycle
    world.add_component(r(0, 9), Num(1));
    world.update_systems();
    assert_eq!(seen.load(Ordering::Relaxed), 10);
}

#[test]
fn component_counts() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    assert_eq!(world.get_component_count::<Num>(), 0);
    assert_eq!(world.get_component_count::<Left>(), 0);

    world.add_component(r(0, 4), Num(1));
    world.commit_changes();
    assert_eq!(world.get_component_count::<Num>(), 5);
    assert_eq!(world.get_entity_count::<Num>(), 5);
}

#[test]
fn mutation_through_the_world_is_visible() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Num>();

    world.add_component(r(0, 0), Num(1));
    world.commit_changes();

    world.get_component_mut::<Num>(0).unwrap().0 = 5;
    assert_eq!(world.get_component::<Num>(0), Some(&Num(5)));
}

#[test]
#[should_panic = "not registered"]
fn buffered_writes_require_registration() {
    let world = World::builder().concurrency(0).build();
    world.add_component(r(0, 4), Num(1));
}
