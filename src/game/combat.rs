//! Combat system - idle units fight whatever hostile objects share their location

use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use super::world::{GameObject, UnitStatus};

/// Let every idle unit strike one random hostile object at its location.
///
/// Objects dropping to 0 hp or below are returned as kill indices; they stay
/// in the collection until the cleanup pass so indices remain stable.
pub fn resolve_idle_combat<R: Rng>(objects: &mut [GameObject], rng: &mut R) -> HashSet<usize> {
    let mut killed = HashSet::new();

    for attacker in 0..objects.len() {
        let (owner, location, damage) = match objects[attacker].as_unit() {
            Some(u) if u.status == UnitStatus::Idle => (
                objects[attacker].owner.clone(),
                objects[attacker].location,
                u.damage_per_tick,
            ),
            _ => continue,
        };

        let targets: Vec<usize> = objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.owner != owner && o.location == location)
            .map(|(i, _)| i)
            .collect();
        if targets.is_empty() {
            continue;
        }

        let target = targets[rng.gen_range(0..targets.len())];
        objects[target].hp = apply_damage(objects[target].hp, damage);

        if objects[target].hp <= 0 && killed.insert(target) {
            debug!(
                attacker,
                target,
                owner = %objects[target].owner,
                "Object destroyed"
            );
        }
    }

    killed
}

/// Subtract damage; the result may drop below zero until cleanup removes the object
pub fn apply_damage(hp: i32, damage: i32) -> i32 {
    hp.saturating_sub(damage)
}
