//! Fixed bot policy - decides commands from the bot's own view of the match

use std::collections::HashSet;

use crate::game::world::{BuildingKind, UnitKind, UnitStatus};
use crate::game::{Command, LocationId, MatchView, PlayerId};

/// Commands the bot issues this round.
///
/// Where enemies stand next to the bot's objects, miners are pulled back to
/// idle so they fight; elsewhere idle workers go mining. A worker is queued
/// when affordable and the command center is free.
pub fn decide(view: &MatchView, bot: &PlayerId) -> Vec<Command> {
    let Some(me) = view.players.get(bot) else {
        return Vec::new();
    };

    let occupied = view.occupied_by(bot);
    let contested: HashSet<LocationId> = view
        .objects
        .iter()
        .filter(|o| o.owner != *bot && occupied.contains(&o.location))
        .map(|o| o.location)
        .collect();

    let mut commands = Vec::new();
    for object in view.objects.iter().filter(|o| o.owner == *bot) {
        let Some(unit) = object.as_unit() else {
            continue;
        };
        let location = object.location;
        match unit.status {
            UnitStatus::Mining if contested.contains(&location) => {
                commands.push(Command::Idle { location });
            }
            UnitStatus::Idle if !contested.contains(&location) => {
                commands.push(Command::Mine { location });
            }
            _ => {}
        }
    }

    if me.minerals >= UnitKind::Scv.stats().cost {
        let free_hq = view.objects.iter().find(|o| {
            o.owner == *bot
                && o.as_building()
                    .is_some_and(|b| b.kind == BuildingKind::CommandCenter && b.task.is_empty())
        });
        if let Some(hq) = free_hq {
            commands.push(Command::TrainUnit {
                location: hq.location,
            });
        }
    }

    commands
}
