use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::comp::{Component, ParentId};
use crate::range::{EntityId, EntityRange};
use crate::system::{Not, Parent, ParentArg, Read, SystemOptions, Write};
use crate::world::World;

#[derive(Clone, Debug, PartialEq)]
struct Pos(i64);

impl Component for Pos {}

#[derive(Clone, Debug, PartialEq)]
struct Vel(i64);

impl Component for Vel {}

#[derive(Clone)]
struct Frozen;

impl Component for Frozen {
    const TAGGED: bool = true;
}

#[derive(Clone, Debug, PartialEq)]
struct Short(i16);

impl Component for Short {}

#[derive(Clone, Debug, PartialEq)]
struct Key(i64);

impl Component for Key {}

#[derive(Default)]
struct FrameCount(i64);

impl Component for FrameCount {
    const GLOBAL_INIT: Option<fn() -> Self> = Some(FrameCount::default);
}

fn r(first: i32, last: i32) -> EntityRange { EntityRange::new(first, last) }

#[test]
fn ranged_system_updates_components() {
    let mut world = World::builder().concurrency(2).build();
    world.register_component::<Pos>();
    world.register_component::<Vel>();

    world.add_component_generator(r(0, 99), |id| Pos(i64::from(id.0)));
    world.add_component(r(0, 99), Vel(3));

    world.make_system::<(EntityId, Write<Pos>, Read<Vel>), _>(
        |(_, pos, vel): (EntityId, &mut Pos, &Vel)| {
            pos.0 += vel.0;
        },
    );
    world.update_systems();

    for id in 0..100 {
        assert_eq!(world.get_component::<Pos>(id), Some(&Pos(i64::from(id) + 3)));
    }
}

#[test]
fn filters_exclude_entities() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Pos>();
    world.register_component::<Frozen>();

    world.add_component(r(0, 9), Pos(0));
    world.add_component(r(3, 5), Frozen);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.make_system::<(EntityId, Read<Pos>, Not<Frozen>), _>(
        move |(id, _, _): (EntityId, &Pos, ())| {
            sink.lock().unwrap().push(id.0);
        },
    );
    world.update_systems();

    let mut ids = seen.lock().unwrap().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 6, 7, 8, 9]);
}

#[test]
fn tagged_components_as_parameters() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Frozen>();

    world.add_component(r(5, 9), Frozen);

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    world.make_system::<(Read<Frozen>,), _>(move |(_,): (&Frozen,)| {
        sink.fetch_add(1, Ordering::Relaxed);
    });
    world.update_systems();

    assert_eq!(count.load(Ordering::Relaxed), 5);
}

#[test]
fn global_systems_run_once_per_cycle() {
    let mut world = World::builder().concurrency(2).build();

    world.make_system::<(Write<FrameCount>,), _>(|(frames,): (&mut FrameCount,)| {
        frames.0 += 1;
    });

    world.update_systems();
    world.update_systems();
    assert_eq!(world.get_shared::<FrameCount>().0, 2);
}

#[test]
fn global_parameters_mix_with_ranged_iteration() {
    let mut world = World::builder().concurrency(2).build();
    world.register_component::<Pos>();
    world.get_shared_mut::<FrameCount>().0 = 7;

    world.add_component(r(0, 9), Pos(0));
    world.make_system::<(Write<Pos>, Read<FrameCount>), _>(
        |(pos, frames): (&mut Pos, &FrameCount)| {
            pos.0 = frames.0;
        },
    );
    world.update_systems();

    assert_eq!(world.get_component::<Pos>(4), Some(&Pos(7)));
}

/// Builds the hierarchy used by the ordering tests:
/// roots {1, 100}; children of 1: {2, 3, 4}; grandchildren 5..=13
/// (5,6,7 under 2; 8,9,10 under 3; 11,12,13 under 4); great-grandchildren
/// {14, 15, 16} under 5, 6, 7; child of 100: 101. Entity 2 carries `Short`.
fn hierarchy_world() -> World {
    let mut world = World::builder().concurrency(2).build();
    world.register_component::<ParentId>();
    world.register_component::<Short>();

    world.add_component(r(2, 4), ParentId(EntityId(1)));
    world.add_component(r(101, 101), ParentId(EntityId(100)));
    world.add_component(r(5, 7), ParentId(EntityId(2)));
    world.add_component(r(8, 10), ParentId(EntityId(3)));
    world.add_component(r(11, 13), ParentId(EntityId(4)));
    world.add_component(r(14, 14), ParentId(EntityId(5)));
    world.add_component(r(15, 15), ParentId(EntityId(6)));
    world.add_component(r(16, 16), ParentId(EntityId(7)));
    world.add_component(r(2, 2), Short(1));
    world
}

#[test]
fn hierarchy_emits_children_after_parents() {
    let mut world = hierarchy_world();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.make_system::<(EntityId, Parent<()>), _>(
        move |(id, parent): (EntityId, ParentArg<()>)| {
            sink.lock().unwrap().push((id.0, parent.id.0));
        },
    );
    world.update_systems();

    let order = seen.lock().unwrap().clone();
    let mut ids: Vec<i32> = order.iter().map(|&(id, _)| id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (2..=16).chain(std::iter::once(101)).collect::<Vec<i32>>());

    // every child is emitted after its parent
    for (index, &(_, parent)) in order.iter().enumerate() {
        if let Some(parent_pos) = order.iter().position(|&(id, _)| id == parent) {
            assert!(parent_pos < index, "{order:?}");
        }
    }
}

#[test]
fn parent_subtype_requirements_filter_entities() {
    let mut world = hierarchy_world();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.make_system::<(EntityId, Parent<(Read<Short>,)>), _>(
        move |(id, parent): (EntityId, ParentArg<(&Short,)>)| {
            assert_eq!(parent.comps.0, &Short(1));
            sink.lock().unwrap().push(id.0);
        },
    );
    world.update_systems();

    let mut ids = seen.lock().unwrap().clone();
    ids.sort_unstable();
    // only the children of entity 2, the sole Short carrier
    assert_eq!(ids, vec![5, 6, 7]);
}

#[test]
fn parent_subtype_filters_exclude_entities() {
    let mut world = hierarchy_world();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.make_system::<(EntityId, Parent<(Not<Short>,)>), _>(
        move |(id, _): (EntityId, ParentArg<((),)>)| {
            sink.lock().unwrap().push(id.0);
        },
    );
    world.update_systems();

    let mut ids = seen.lock().unwrap().clone();
    ids.sort_unstable();
    // everyone except the children of the Short carrier
    assert_eq!(
        ids,
        vec![2, 3, 4, 8, 9, 10, 11, 12, 13, 14, 15, 16, 101]
    );
}

#[test]
fn sorted_systems_follow_the_predicate() {
    let mut world = World::builder().concurrency(2).build();
    world.register_component::<Key>();

    world.add_component_generator(r(0, 9), |id| Key(-i64::from(id.0)));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.make_sorted_system::<(EntityId, Read<Key>), Key, _, _>(
        move |(id, _): (EntityId, &Key)| {
            sink.lock().unwrap().push(id.0);
        },
        |left, right| left.0.cmp(&right.0),
        SystemOptions::new(),
    );
    world.update_systems();

    // ascending key order is descending id order
    assert_eq!(seen.lock().unwrap().clone(), (0..=9).rev().collect::<Vec<i32>>());
}

#[test]
fn interval_gates_reruns() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Pos>();
    world.add_component(r(0, 0), Pos(0));

    let runs = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&runs);
    world.make_system_with::<(Read<Pos>,), _>(
        move |(_,): (&Pos,)| {
            sink.fetch_add(1, Ordering::Relaxed);
        },
        SystemOptions::new().interval(Duration::from_secs(3600)),
    );

    world.update_systems();
    world.run_systems();
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn caches_rebuild_after_commits() {
    let mut world = World::builder().concurrency(2).build();
    world.register_component::<Pos>();

    world.add_component(r(0, 4), Pos(0));
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    world.make_system::<(Write<Pos>,), _>(move |(pos,): (&mut Pos,)| {
        pos.0 += 1;
        sink.fetch_add(1, Ordering::Relaxed);
    });

    world.update_systems();
    assert_eq!(count.load(Ordering::Relaxed), 5);

    world.add_component(r(10, 14), Pos(0));
    world.update_systems();
    assert_eq!(count.load(Ordering::Relaxed), 15);
    assert_eq!(world.get_component::<Pos>(0), Some(&Pos(2)));
    assert_eq!(world.get_component::<Pos>(12), Some(&Pos(1)));
}

#[test]
fn disabled_systems_are_skipped() {
    let mut world = World::builder().concurrency(0).build();
    world.register_component::<Pos>();
    world.add_component(r(0, 0), Pos(0));

    let id = world.make_system::<(Write<Pos>,), _>(|(pos,): (&mut Pos,)| {
        pos.0 += 1;
    });

    world.update_systems();
    world.enable_system(id, false);
    world.run_systems();
    assert_eq!(world.get_component::<Pos>(0), Some(&Pos(1)));

    // explicit single-system runs ignore the flag
    world.run_system(id);
    assert_eq!(world.get_component::<Pos>(0), Some(&Pos(2)));
}
