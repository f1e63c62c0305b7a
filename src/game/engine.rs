//! Match engine - advances one running match by a single simulation step

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

use tracing::info;

use super::combat::resolve_idle_combat;
use super::economy::{advance_construction, advance_production, collect_mining};
use super::r#match::{GameMatch, MatchStatus};
use super::world::{Outcome, PlayerId};

/// Steps shorter than this are skipped entirely
pub const MIN_STEP: Duration = Duration::from_millis(1);

/// What happened during one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// False when the call was a no-op
    pub simulated: bool,
    pub elapsed: Duration,
    pub killed: usize,
    pub produced: usize,
    pub constructed: usize,
    pub eliminated: Vec<PlayerId>,
    pub finished: bool,
}

/// Advance `game` to `now`.
///
/// Does nothing unless the match is running and at least [`MIN_STEP`] has
/// passed since the previous step. Never fails.
pub fn advance(game: &mut GameMatch, now: Instant) -> TickReport {
    let mut report = TickReport::default();
    if game.status != MatchStatus::Running {
        return report;
    }

    let elapsed = now.saturating_duration_since(game.last_simulated);
    if elapsed < MIN_STEP {
        return report;
    }
    game.last_simulated = now;
    report.simulated = true;
    report.elapsed = elapsed;

    collect_mining(&game.objects, &mut game.players);
    let killed = resolve_idle_combat(&mut game.objects, &mut game.rng);
    report.constructed = advance_construction(&mut game.objects, elapsed.as_millis() as u64);
    report.produced = advance_production(&mut game.objects);

    report.killed = killed.len();
    remove_killed(game, &killed);
    settle_outcomes(game, &mut report);

    report
}

/// Rebuild the object list without the destroyed objects
fn remove_killed(game: &mut GameMatch, killed: &HashSet<usize>) {
    if killed.is_empty() {
        return;
    }
    game.objects = std::mem::take(&mut game.objects)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !killed.contains(i))
        .map(|(_, o)| o)
        .collect();
}

/// Eliminate players without a standing building and crown the last one left
fn settle_outcomes(game: &mut GameMatch, report: &mut TickReport) {
    let standing: HashSet<PlayerId> = game
        .objects
        .iter()
        .filter(|o| o.is_standing_building())
        .map(|o| o.owner.clone())
        .collect();

    for (id, player) in game.players.iter_mut() {
        if !standing.contains(id) && player.settle(Outcome::Eliminated) {
            info!(match_name = %game.name, player = %id, "Player eliminated");
            report.eliminated.push(id.clone());
        }
    }

    // Players already settled cannot win, even if they rebuilt.
    let contenders: BTreeSet<PlayerId> = game
        .players
        .iter()
        .filter(|(id, p)| p.outcome.is_none() && standing.contains(*id))
        .map(|(id, _)| id.clone())
        .collect();

    match contenders.len() {
        // Everyone fell in the same tick: a draw
        0 if !game.players.is_empty() => {
            game.finish(None);
            report.finished = true;
        }
        1 => {
            let winner = contenders.into_iter().next();
            if let Some(winner) = winner {
                if let Some(p) = game.players.get_mut(&winner) {
                    p.settle(Outcome::Victory);
                }
                game.finish(Some(&winner));
                report.finished = true;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::command::Command;
    use crate::game::r#match::tests::running_match;
    use crate::game::world::{
        BuildingKind, GameObject, LocationId, Player, UnitKind, UnitStatus,
    };

    const TICK: Duration = Duration::from_millis(3_000);

    /// Two players, one command center each, nothing else
    fn duel() -> GameMatch {
        let mut game = GameMatch::new("test", 42);
        game.status = MatchStatus::Running;
        for id in ["0", "1"] {
            game.players.insert(id.into(), Player { minerals: 50, ..Player::default() });
        }
        for (i, id) in ["0", "1"].into_iter().enumerate() {
            game.locations.push(crate::game::world::Location { id: LocationId(i) });
            game.objects.push(GameObject::building(
                BuildingKind::CommandCenter,
                id.into(),
                LocationId(i),
            ));
        }
        game
    }

    fn step(game: &mut GameMatch) -> TickReport {
        let now = game.last_simulated + TICK;
        advance(game, now)
    }

    #[test]
    fn sub_millisecond_step_is_a_no_op() {
        let mut game = running_match();
        game.apply(&"0".into(), Command::Mine { location: LocationId(0) })
            .unwrap();
        let before_time = game.last_simulated;
        let before_objects = game.objects.clone();
        let before_players = game.players.clone();

        let report = advance(&mut game, before_time + Duration::from_micros(900));
        assert!(!report.simulated);
        assert_eq!(game.last_simulated, before_time);
        assert_eq!(game.objects, before_objects);
        assert_eq!(game.players, before_players);
    }

    #[test]
    fn pending_match_is_not_simulated() {
        let mut game = GameMatch::new("test", 1);
        let now = game.last_simulated + TICK;
        assert!(!advance(&mut game, now).simulated);
    }

    #[test]
    fn attack_decreases_hp_by_damage_per_tick() {
        let mut game = duel();
        game.objects
            .push(GameObject::unit(UnitKind::Scv, "0".into(), LocationId(1)));

        step(&mut game);
        assert_eq!(game.objects[1].hp, 1500 - 8);
        step(&mut game);
        assert_eq!(game.objects[1].hp, 1500 - 16);
        assert_eq!(game.status, MatchStatus::Running);
    }

    #[test]
    fn destroying_last_building_ends_the_match() {
        let mut game = duel();
        game.objects
            .push(GameObject::unit(UnitKind::Scv, "0".into(), LocationId(1)));
        game.objects[1].hp = 1;

        let report = step(&mut game);
        assert!(report.finished);
        assert_eq!(report.killed, 1);
        assert_eq!(game.status, MatchStatus::Finished);
        assert_eq!(game.players[&PlayerId::from("0")].outcome, Some(Outcome::Victory));
        assert_eq!(game.players[&PlayerId::from("1")].outcome, Some(Outcome::Eliminated));
        assert!(game.objects.iter().all(|o| o.hp > 0));
    }

    #[test]
    fn sustained_siege_wins_after_enough_ticks() {
        let mut game = duel();
        game.objects
            .push(GameObject::unit(UnitKind::Scv, "0".into(), LocationId(1)));

        let mut ticks = 0;
        while game.status == MatchStatus::Running {
            step(&mut game);
            ticks += 1;
            assert!(ticks <= 200, "siege never finished");
            // Exported state never shows negative health.
            assert!(game.objects.iter().all(|o| o.hp > 0));
        }

        // 1500 hp at 8 damage per tick
        assert_eq!(ticks, 188);
        assert_eq!(game.players[&PlayerId::from("0")].outcome, Some(Outcome::Victory));
        assert_eq!(game.players[&PlayerId::from("1")].outcome, Some(Outcome::Eliminated));

        // Finished matches are no longer advanced.
        let frozen = game.objects.clone();
        assert!(!step(&mut game).simulated);
        assert_eq!(game.objects, frozen);
    }

    #[test]
    fn mining_and_production_over_ticks() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        game.apply(&me, Command::TrainUnit { location: LocationId(0) })
            .unwrap();
        game.apply(&me, Command::Mine { location: LocationId(0) })
            .unwrap();

        for _ in 0..5 {
            step(&mut game);
        }
        assert_eq!(game.players[&me].minerals, 5);
        let workers = game
            .objects
            .iter()
            .filter(|o| o.owner == me && o.as_unit().is_some())
            .count();
        assert_eq!(workers, 5);
        assert!(game
            .apply(&me, Command::TrainUnit { location: LocationId(0) })
            .is_err());
    }

    #[test]
    fn construction_converges_and_releases_the_builder() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        game.players.get_mut(&me).unwrap().minerals = 150;
        game.apply(
            &me,
            Command::Construct {
                location: LocationId(0),
                building: BuildingKind::Barracks,
            },
        )
        .unwrap();
        assert_eq!(game.players[&me].minerals, 0);

        let site = game.objects.len() - 1;
        let mut last_hp = game.objects[site].hp;
        for _ in 0..20 {
            step(&mut game);
            assert!(game.objects[site].hp >= last_hp);
            last_hp = game.objects[site].hp;
            if !game.objects[site].is_under_construction() {
                break;
            }
        }

        let barracks = &game.objects[site];
        assert!(barracks.is_standing_building());
        assert_eq!(barracks.hp, barracks.hp_max);
        assert_eq!(barracks.as_building().unwrap().remaining_build_ms, 0);
        assert!(game
            .objects
            .iter()
            .filter(|o| o.owner == me)
            .filter_map(|o| o.as_unit())
            .all(|u| u.status == UnitStatus::Idle));
    }

    #[test]
    fn mutual_destruction_finishes_without_a_winner() {
        let mut game = duel();
        game.objects
            .push(GameObject::unit(UnitKind::Scv, "0".into(), LocationId(1)));
        game.objects
            .push(GameObject::unit(UnitKind::Scv, "1".into(), LocationId(0)));
        game.objects[0].hp = 1;
        game.objects[1].hp = 1;

        let report = step(&mut game);
        assert_eq!(report.killed, 2);
        assert_eq!(report.eliminated.len(), 2);
        assert_eq!(game.status, MatchStatus::Finished);
        assert!(game
            .players
            .values()
            .all(|p| p.outcome != Some(Outcome::Victory)));
    }
}
