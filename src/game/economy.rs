//! Economy system - mining income, construction progress and unit production

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use super::world::{GameObject, Player, PlayerId, Task, UnitStatus, TASK_COMPLETE};

/// Credit every mining unit's yield to its owner
pub fn collect_mining(objects: &[GameObject], players: &mut BTreeMap<PlayerId, Player>) {
    for object in objects {
        let Some(unit) = object.as_unit() else {
            continue;
        };
        if unit.status != UnitStatus::Mining {
            continue;
        }
        if let Some(player) = players.get_mut(&object.owner) {
            player.minerals = player.minerals.saturating_add(unit.yield_per_tick);
        }
    }
}

/// Let each builder work on the first unclaimed construction site it owns
/// at its location. A site takes progress from one builder per tick.
/// Builders without a site go back to idle. Returns completed structures.
pub fn advance_construction(objects: &mut [GameObject], elapsed_ms: u64) -> usize {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut completed = 0;

    for builder in 0..objects.len() {
        let is_builder = objects[builder]
            .as_unit()
            .is_some_and(|u| u.status == UnitStatus::Building);
        if !is_builder {
            continue;
        }

        let owner = &objects[builder].owner;
        let location = objects[builder].location;
        let site = objects.iter().enumerate().position(|(i, o)| {
            !claimed.contains(&i)
                && o.owner == *owner
                && o.location == location
                && o.is_under_construction()
        });

        let Some(site) = site else {
            if let Some(u) = objects[builder].as_unit_mut() {
                u.status = UnitStatus::Idle;
            }
            continue;
        };

        claimed.insert(site);
        if objects[site].advance_construction(elapsed_ms) {
            completed += 1;
            if let Some(u) = objects[builder].as_unit_mut() {
                u.status = UnitStatus::Idle;
            }
            if let Some(b) = objects[site].as_building() {
                info!(owner = %objects[site].owner, building = %b.kind, "Construction finished");
            }
        }
    }

    completed
}

/// Progress production tasks, spawning finished units next to their building.
/// Progress beyond completion is dropped, not carried into the next task.
pub fn advance_production(objects: &mut Vec<GameObject>) -> usize {
    let mut spawned = Vec::new();

    for object in objects.iter_mut() {
        let owner = object.owner.clone();
        let location = object.location;
        let Some(building) = object.as_building_mut() else {
            continue;
        };
        if building.task.is_empty() {
            continue;
        }

        building.task.progress += building.task_speed;
        if building.task.progress < TASK_COMPLETE {
            continue;
        }

        if let Some(kind) = building.task.output() {
            debug!(owner = %owner, unit = %kind, %location, "Unit produced");
            spawned.push(GameObject::unit(kind, owner, location));
        }
        building.task = Task::default();
    }

    let count = spawned.len();
    objects.extend(spawned);
    count
}
