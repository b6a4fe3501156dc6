//! # Randomized Churn Test
//!
//! Drives a registry with a seeded stream of creates, destroys, emplaces and
//! removes while several groups are live, then checks every pool and group
//! against a brute-force recomputation.

use std::collections::BTreeSet;

use ember_core::{Component, EntityId, GroupHandle, Registry, RegistryConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(u32);
impl Component for A {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct B(u32);
impl Component for B {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct C(u32);
impl Component for C {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct D;
impl Component for D {}

const STEPS: usize = 20_000;

struct Groups {
    owns_a: GroupHandle,
    owns_ab: GroupHandle,
    owns_ab_get_c: GroupHandle,
    owns_c_exclude_d: GroupHandle,
    tracks_bc: GroupHandle,
}

fn build_groups(registry: &mut Registry) -> Groups {
    Groups {
        owns_ab: registry.group::<(A, B), (), ()>().unwrap(),
        owns_a: registry.group::<(A,), (), ()>().unwrap(),
        owns_ab_get_c: registry.group::<(A, B), (C,), ()>().unwrap(),
        owns_c_exclude_d: registry.group::<(C,), (), (D,)>().unwrap(),
        tracks_bc: registry.group::<(), (B, C), ()>().unwrap(),
    }
}

fn step(registry: &mut Registry, rng: &mut ChaCha8Rng, alive: &mut Vec<EntityId>) {
    if alive.is_empty() || rng.gen_range(0..10) == 0 {
        alive.push(registry.create());
        return;
    }

    let slot = rng.gen_range(0..alive.len());
    let entity = alive[slot];
    let value = rng.gen::<u32>();
    match rng.gen_range(0..9) {
        0 => {
            registry.destroy(entity).unwrap();
            alive.swap_remove(slot);
        }
        1 => {
            registry.emplace_or_replace(entity, A(value)).unwrap();
        }
        2 => {
            registry.emplace_or_replace(entity, B(value)).unwrap();
        }
        3 => {
            registry.emplace_or_replace(entity, C(value)).unwrap();
        }
        4 => {
            registry.emplace_or_replace(entity, D).unwrap();
        }
        5 => {
            let _ = registry.remove::<A>(entity);
        }
        6 => {
            let _ = registry.remove::<B>(entity);
        }
        7 => {
            let _ = registry.remove::<C>(entity);
        }
        _ => {
            let _ = registry.remove::<D>(entity);
        }
    }
}

fn assert_pool_consistent<T: Component>(registry: &Registry) {
    let Some(storage) = registry.storage::<T>() else {
        return;
    };
    assert_eq!(storage.entities().len(), storage.components().len());
    for (position, &entity) in storage.entities().iter().enumerate() {
        assert_eq!(storage.index(entity), Some(position));
        assert!(registry.is_valid(entity));
    }
}

fn assert_group_matches(
    registry: &Registry,
    handle: GroupHandle,
    alive: &[EntityId],
    predicate: impl Fn(EntityId) -> bool,
) {
    let expected: BTreeSet<EntityId> = alive.iter().copied().filter(|&e| predicate(e)).collect();
    let actual: BTreeSet<EntityId> = registry.group_entities(handle).iter().copied().collect();
    assert_eq!(actual, expected);
    assert_eq!(registry.group_len(handle), expected.len());
    for &entity in alive {
        assert_eq!(registry.group_contains(handle, entity), expected.contains(&entity));
    }
}

/// Owned pools must agree on the members' order.
fn assert_prefix_aligned<T: Component, U: Component>(registry: &Registry, handle: GroupHandle) {
    let len = registry.group_len(handle);
    let first = registry.storage::<T>().unwrap().entities();
    let second = registry.storage::<U>().unwrap().entities();
    assert_eq!(&first[..len], &second[..len]);
    assert_eq!(&first[..len], registry.group_entities(handle));
}

fn check(registry: &Registry, groups: &Groups, alive: &[EntityId]) {
    assert_pool_consistent::<A>(registry);
    assert_pool_consistent::<B>(registry);
    assert_pool_consistent::<C>(registry);
    assert_pool_consistent::<D>(registry);
    assert_eq!(registry.alive(), alive.len());

    let has_a = |e| registry.has::<(A,)>(e);
    let has_b = |e| registry.has::<(B,)>(e);
    let has_c = |e| registry.has::<(C,)>(e);
    let has_d = |e| registry.has::<(D,)>(e);

    assert_group_matches(registry, groups.owns_a, alive, has_a);
    assert_group_matches(registry, groups.owns_ab, alive, |e| has_a(e) && has_b(e));
    assert_group_matches(registry, groups.owns_ab_get_c, alive, |e| {
        has_a(e) && has_b(e) && has_c(e)
    });
    assert_group_matches(registry, groups.owns_c_exclude_d, alive, |e| {
        has_c(e) && !has_d(e)
    });
    assert_group_matches(registry, groups.tracks_bc, alive, |e| has_b(e) && has_c(e));

    assert_prefix_aligned::<A, B>(registry, groups.owns_ab);
    assert_prefix_aligned::<A, B>(registry, groups.owns_ab_get_c);

    // Nested prefixes stay inside the prefixes that contain them.
    let ab = registry.group_entities(groups.owns_ab);
    let abc = registry.group_entities(groups.owns_ab_get_c);
    assert_eq!(&ab[..abc.len()], abc);
    let a = registry.group_entities(groups.owns_a);
    assert_eq!(&a[..ab.len()], ab);
}

fn churn(seed: u64, config: RegistryConfig, groups_first: bool) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut registry = Registry::with_config(config).unwrap();
    let mut alive = Vec::new();

    let mut groups = groups_first.then(|| build_groups(&mut registry));
    for n in 0..STEPS {
        step(&mut registry, &mut rng, &mut alive);

        if groups.is_none() && n == STEPS / 2 {
            groups = Some(build_groups(&mut registry));
        }
        if let Some(groups) = &groups {
            if n % 97 == 0 {
                check(&registry, groups, &alive);
            }
        }
    }

    let groups = groups.unwrap();
    check(&registry, &groups, &alive);

    registry.clear().unwrap();
    check(&registry, &groups, &[]);
}

#[test]
fn test_churn_with_groups_built_up_front() {
    churn(0x5EED_0001, RegistryConfig::default(), true);
}

#[test]
fn test_churn_with_groups_built_mid_run() {
    churn(0x5EED_0002, RegistryConfig::compact(), false);
}

#[test]
fn test_churn_small_pages() {
    let config = RegistryConfig {
        page_size: 8,
        entity_capacity: 64,
    };
    churn(0xC0FFEE, config, true);
}
