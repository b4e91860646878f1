use city_core::{EconomyConfig, World};

const STEP_MS: f64 = 250.0;

fn busy_world(seed: u64) -> World {
    let mut world = World::with_seed(EconomyConfig::default(), seed);
    for building in [
        "farm", "lumber_mill", "quarry", "mine", "sawmill", "bakery", "smelter", "well",
        "cottage", "essence_extractor",
    ] {
        world.construct(building).unwrap();
    }
    world
}

fn assert_world_invariants(world: &World) {
    for resource in world.pool().iter() {
        assert!(
            resource.value >= 0.0 && resource.value <= resource.cap,
            "{} out of bounds: {} (cap {})",
            resource.id,
            resource.value,
            resource.cap
        );
    }

    let labor = world.labor();
    for prof in labor.professions() {
        assert!(
            prof.assigned <= prof.count,
            "{} over-assigned: {} of {}",
            prof.id(),
            prof.assigned,
            prof.count
        );
        assert_eq!(
            labor.allocated_total(prof.id()),
            prof.assigned,
            "{} allocations disagree with assigned count",
            prof.id()
        );
    }

    let snapshot = world.snapshot();
    for class in &snapshot.classes {
        assert!((0.0..=100.0).contains(&class.happiness), "{:?} happiness {}", class.class, class.happiness);
    }
    assert!((0.0..=100.0).contains(&snapshot.overall_happiness));

    for good in &snapshot.goods {
        assert!(good.price >= 1.0, "{} priced below floor: {}", good.id, good.price);
    }
    for service in &snapshot.services {
        assert!(service.price >= 1.0, "{} priced below floor: {}", service.id, service.price);
    }

    for (_, building) in world.buildings() {
        let fraction = building.progress_fraction();
        assert!((0.0..=1.0).contains(&fraction));
    }
}

#[test]
fn invariant_bounds_hold_over_long_run() {
    for seed in [1, 7, 42] {
        let mut world = busy_world(seed);
        // Ten simulated minutes
        for step in 0..2_400 {
            world.tick(STEP_MS);
            if step % 40 == 0 {
                assert_world_invariants(&world);
            }
        }
        assert_world_invariants(&world);
    }
}

#[test]
fn invariant_bounds_hold_under_large_steps() {
    let mut world = busy_world(3);
    world.set_time_scale(20.0);
    for _ in 0..60 {
        world.tick(1_000.0);
        assert_world_invariants(&world);
    }
}

#[test]
fn invariant_zero_delta_is_a_no_op() {
    let mut world = busy_world(5);
    for _ in 0..100 {
        world.tick(STEP_MS);
    }
    world.drain_events();

    let before = world.snapshot();
    world.tick(0.0);
    world.set_paused(true);
    world.tick(5_000.0);
    world.set_paused(false);
    world.set_time_scale(0.0);
    world.tick(5_000.0);
    world.set_time_scale(1.0);

    assert_eq!(world.snapshot(), before);
    assert!(world.drain_events().is_empty());
}

#[test]
fn invariant_same_seed_same_history() {
    let run = |seed| {
        let mut world = busy_world(seed);
        for _ in 0..800 {
            world.tick(STEP_MS);
        }
        (world.snapshot(), world.drain_events())
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn invariant_removal_returns_every_worker() {
    let mut world = busy_world(9);
    for _ in 0..200 {
        world.tick(STEP_MS);
    }
    let ids: Vec<_> = world.buildings().map(|(id, _)| id).collect();
    for id in ids {
        world.remove(id).unwrap();
    }

    for prof in world.labor().professions() {
        assert_eq!(prof.assigned, 0, "{} still assigned", prof.id());
    }
    assert_eq!(world.buildings().count(), 0);
}
