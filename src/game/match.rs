//! Match state and lifecycle: joining, readiness, start, quit and commands

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::command::Command;
use super::error::MatchError;
use super::world::{
    BuildingKind, GameObject, Location, LocationId, Player, PlayerId, Task, UnitKind, UnitStatus,
    STARTING_MINERALS, STARTING_WORKERS,
};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Accepting joins, players declare ready
    Pending,
    /// Advanced by the lobby scheduler
    Running,
    /// Terminal, kept until every player quits
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Running => "running",
            MatchStatus::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Result of a ready declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Still waiting on other players
    Waiting,
    /// The match started; these bots need their first trigger
    Started { bots: Vec<PlayerId> },
}

/// Authoritative state of one match. Always accessed under its lock.
pub struct GameMatch {
    pub name: String,
    pub status: MatchStatus,
    pub players: BTreeMap<PlayerId, Player>,
    pub locations: Vec<Location>,
    pub objects: Vec<GameObject>,
    pub last_simulated: Instant,
    pub rng: ChaCha8Rng,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set under this match's lock once the lobby drops the match; a closed
    /// match accepts nobody and is ignored by the schedulers.
    pub closed: bool,
}

impl GameMatch {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            status: MatchStatus::Pending,
            players: BTreeMap::new(),
            locations: Vec::new(),
            objects: Vec::new(),
            last_simulated: Instant::now(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            closed: false,
        }
    }

    fn require_status(&self, action: &'static str, status: MatchStatus) -> Result<(), MatchError> {
        if self.status != status {
            return Err(MatchError::WrongStatus {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_player(&self, player: &PlayerId) -> Result<&Player, MatchError> {
        self.players
            .get(player)
            .ok_or_else(|| MatchError::UnknownPlayer(player.clone()))
    }

    fn require_location(&self, location: LocationId) -> Result<(), MatchError> {
        if location.0 >= self.locations.len() {
            return Err(MatchError::UnknownLocation(location));
        }
        Ok(())
    }

    /// Add a human player to a pending match
    pub fn join(&mut self, player: PlayerId) -> Result<(), MatchError> {
        self.require_status("join", MatchStatus::Pending)?;
        if self.players.contains_key(&player) {
            return Err(MatchError::AlreadyJoined(player));
        }

        info!(
            match_name = %self.name,
            player = %player,
            player_count = self.players.len() + 1,
            "Player joined match"
        );
        self.players.insert(player, Player::human());
        Ok(())
    }

    /// Add an autonomous player with a generated id
    pub fn add_bot(&mut self) -> Result<PlayerId, MatchError> {
        self.require_status("add a bot", MatchStatus::Pending)?;

        let bot = loop {
            let candidate = PlayerId::new(format!("bot-{}", &Uuid::new_v4().simple().to_string()[..8]));
            if !self.players.contains_key(&candidate) {
                break candidate;
            }
        };

        info!(match_name = %self.name, bot = %bot, "Bot joined match");
        self.players.insert(bot.clone(), Player::autonomous());
        Ok(bot)
    }

    /// Declare a player ready, starting the match once everyone is
    pub fn set_ready(&mut self, player: &PlayerId, now: Instant) -> Result<ReadyOutcome, MatchError> {
        self.require_status("get ready", MatchStatus::Pending)?;
        self.require_player(player)?;

        if let Some(p) = self.players.get_mut(player) {
            p.ready = true;
        }

        if !self.can_start() {
            return Ok(ReadyOutcome::Waiting);
        }
        let bots = self.start(now);
        Ok(ReadyOutcome::Started { bots })
    }

    /// Everyone is ready and there is someone to fight
    pub fn can_start(&self) -> bool {
        self.players.len() >= 2 && self.players.values().all(|p| p.ready)
    }

    /// Lay out the map and starting forces, returning the bots to schedule
    fn start(&mut self, now: Instant) -> Vec<PlayerId> {
        self.status = MatchStatus::Running;
        self.locations.clear();
        self.objects.clear();

        let mut bots = Vec::new();
        for (index, (id, player)) in self.players.iter_mut().enumerate() {
            let location = LocationId(index);
            self.locations.push(Location { id: location });
            player.minerals = STARTING_MINERALS;

            for _ in 0..STARTING_WORKERS {
                self.objects
                    .push(GameObject::unit(UnitKind::Scv, id.clone(), location));
            }
            self.objects.push(GameObject::building(
                BuildingKind::CommandCenter,
                id.clone(),
                location,
            ));

            if player.autonomous {
                bots.push(id.clone());
            }
        }

        self.last_simulated = now;
        self.started_at = Some(Utc::now());

        info!(
            match_name = %self.name,
            players = self.players.len(),
            bots = bots.len(),
            "Match started"
        );
        bots
    }

    /// Mark the match finished
    pub fn finish(&mut self, winner: Option<&PlayerId>) {
        self.status = MatchStatus::Finished;
        self.finished_at = Some(Utc::now());
        match winner {
            Some(winner) => info!(match_name = %self.name, winner = %winner, "Match finished"),
            None => info!(match_name = %self.name, "Match finished without a winner"),
        }
    }

    /// Remove a player and, outside the pending phase, everything they own.
    /// Elimination is not re-evaluated here; the next tick does that.
    pub fn remove_player(&mut self, player: &PlayerId) -> Result<(), MatchError> {
        self.require_player(player)?;
        self.players.remove(player);

        if self.status != MatchStatus::Pending {
            self.objects.retain(|o| o.owner != *player);
        }

        info!(
            match_name = %self.name,
            player = %player,
            remaining = self.players.len(),
            "Player left match"
        );
        Ok(())
    }

    /// Whether any non-bot player is still present
    pub fn has_humans(&self) -> bool {
        self.players.values().any(|p| !p.autonomous)
    }

    /// Ids of all autonomous players
    pub fn bots(&self) -> impl Iterator<Item = &PlayerId> {
        self.players
            .iter()
            .filter(|(_, p)| p.autonomous)
            .map(|(id, _)| id)
    }

    /// Validate and apply one command for `player`
    pub fn apply(&mut self, player: &PlayerId, command: Command) -> Result<(), MatchError> {
        self.require_status(command.name(), MatchStatus::Running)?;
        self.require_player(player)?;

        let result = match command {
            Command::TrainUnit { location } => self.handle_train(player, location),
            Command::Construct { location, building } => {
                self.handle_construct(player, location, building)
            }
            Command::Mine { location } => {
                self.handle_unit_status(player, location, UnitStatus::Idle, UnitStatus::Mining)
            }
            Command::Idle { location } => {
                self.handle_unit_status(player, location, UnitStatus::Mining, UnitStatus::Idle)
            }
            Command::Move {
                location,
                destination,
            } => self.handle_move(player, location, destination),
        };

        if let Err(e) = &result {
            debug!(
                match_name = %self.name,
                player = %player,
                command = command.name(),
                error = %e,
                "Command rejected"
            );
        }
        result
    }

    /// Queue a worker at the caller's command center
    fn handle_train(&mut self, player: &PlayerId, location: LocationId) -> Result<(), MatchError> {
        self.require_location(location)?;

        let cc = self
            .objects
            .iter()
            .position(|o| {
                o.owner == *player
                    && o.location == location
                    && o.as_building()
                        .is_some_and(|b| b.kind == BuildingKind::CommandCenter)
            })
            .ok_or(MatchError::NoCommandCenter(location))?;

        let busy = self.objects[cc]
            .as_building()
            .is_some_and(|b| !b.task.is_empty());
        if busy {
            return Err(MatchError::Busy);
        }

        let cost = UnitKind::Scv.stats().cost;
        let have = self.require_player(player)?.minerals;
        if have < cost {
            return Err(MatchError::InsufficientMinerals { need: cost, have });
        }

        if let Some(p) = self.players.get_mut(player) {
            p.minerals -= cost;
        }
        if let Some(b) = self.objects[cc].as_building_mut() {
            b.task = Task::train(UnitKind::Scv);
        }

        info!(match_name = %self.name, player = %player, %location, "Training a worker");
        Ok(())
    }

    /// Put an idle worker on a new construction site
    fn handle_construct(
        &mut self,
        player: &PlayerId,
        location: LocationId,
        building: BuildingKind,
    ) -> Result<(), MatchError> {
        self.require_location(location)?;
        if !building.constructible() {
            return Err(MatchError::NotConstructible(building));
        }

        let cost = building.stats().cost;
        let have = self.require_player(player)?.minerals;
        if have < cost {
            return Err(MatchError::InsufficientMinerals { need: cost, have });
        }

        let worker = self
            .objects
            .iter()
            .position(|o| o.is_unit_of(player, location, UnitStatus::Idle))
            .ok_or(MatchError::NoUnit {
                status: UnitStatus::Idle,
                location,
            })?;

        if let Some(u) = self.objects[worker].as_unit_mut() {
            u.status = UnitStatus::Building;
        }
        if let Some(p) = self.players.get_mut(player) {
            p.minerals -= cost;
        }
        self.objects
            .push(GameObject::construction_site(building, player.clone(), location));

        info!(
            match_name = %self.name,
            player = %player,
            %location,
            %building,
            "Construction started"
        );
        Ok(())
    }

    /// Flip the first matching worker from one status to another
    fn handle_unit_status(
        &mut self,
        player: &PlayerId,
        location: LocationId,
        from: UnitStatus,
        to: UnitStatus,
    ) -> Result<(), MatchError> {
        self.require_location(location)?;

        let unit = self
            .objects
            .iter_mut()
            .filter(|o| o.is_unit_of(player, location, from))
            .find_map(|o| o.as_unit_mut())
            .ok_or(MatchError::NoUnit {
                status: from,
                location,
            })?;
        unit.status = to;
        Ok(())
    }

    /// Relocate the first idle worker
    fn handle_move(
        &mut self,
        player: &PlayerId,
        location: LocationId,
        destination: LocationId,
    ) -> Result<(), MatchError> {
        self.require_location(location)?;
        self.require_location(destination)?;

        let unit = self
            .objects
            .iter_mut()
            .find(|o| o.is_unit_of(player, location, UnitStatus::Idle))
            .ok_or(MatchError::NoUnit {
                status: UnitStatus::Idle,
                location,
            })?;
        unit.location = destination;

        debug!(
            match_name = %self.name,
            player = %player,
            from = %location,
            to = %destination,
            "Worker moved"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::world::{BuildingStatus, ObjectBody};

    /// Two-player running match with the default starting layout
    pub(crate) fn running_match() -> GameMatch {
        let mut game = GameMatch::new("test", 7);
        game.join("0".into()).unwrap();
        game.join("1".into()).unwrap();
        game.set_ready(&"0".into(), Instant::now()).unwrap();
        game.set_ready(&"1".into(), Instant::now()).unwrap();
        game
    }

    fn count(game: &GameMatch, owner: &str, pred: impl Fn(&GameObject) -> bool) -> usize {
        let owner = PlayerId::from(owner);
        game.objects
            .iter()
            .filter(|o| o.owner == owner && pred(o))
            .count()
    }

    #[test]
    fn match_starts_once_two_players_are_ready() {
        let mut game = GameMatch::new("test", 1);
        game.join("0".into()).unwrap();
        assert_eq!(
            game.set_ready(&"0".into(), Instant::now()).unwrap(),
            ReadyOutcome::Waiting
        );
        assert_eq!(game.status, MatchStatus::Pending);

        game.join("1".into()).unwrap();
        let outcome = game.set_ready(&"1".into(), Instant::now()).unwrap();
        assert_eq!(outcome, ReadyOutcome::Started { bots: vec![] });
        assert_eq!(game.status, MatchStatus::Running);
        assert_eq!(game.locations.len(), 2);

        for (id, player) in &game.players {
            assert_eq!(player.minerals, STARTING_MINERALS);
            assert_eq!(player.outcome, None);
            let workers = count(&game, id.as_str(), |o| o.as_unit().is_some());
            let hqs = count(&game, id.as_str(), |o| o.is_standing_building());
            assert_eq!(workers, STARTING_WORKERS);
            assert_eq!(hqs, 1);
        }
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut game = running_match();
        assert_eq!(
            game.join("2".into()),
            Err(MatchError::WrongStatus {
                action: "join",
                status: MatchStatus::Running,
            })
        );
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut game = GameMatch::new("test", 1);
        game.join("0".into()).unwrap();
        assert_eq!(
            game.join("0".into()),
            Err(MatchError::AlreadyJoined("0".into()))
        );
    }

    #[test]
    fn bots_are_ready_and_reported_at_start() {
        let mut game = GameMatch::new("test", 1);
        game.join("0".into()).unwrap();
        let bot = game.add_bot().unwrap();
        assert!(bot.as_str().starts_with("bot-"));
        assert!(game.players[&bot].ready);
        assert!(game.players[&bot].autonomous);

        let outcome = game.set_ready(&"0".into(), Instant::now()).unwrap();
        assert_eq!(outcome, ReadyOutcome::Started { bots: vec![bot] });
    }

    #[test]
    fn commands_require_a_running_match() {
        let mut game = GameMatch::new("test", 1);
        game.join("0".into()).unwrap();
        let err = game
            .apply(&"0".into(), Command::Mine { location: LocationId(0) })
            .unwrap_err();
        assert!(matches!(err, MatchError::WrongStatus { .. }));
    }

    #[test]
    fn train_with_exact_cost_then_busy() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        assert_eq!(game.players[&me].minerals, UnitKind::Scv.stats().cost);

        game.apply(&me, Command::TrainUnit { location: LocationId(0) })
            .unwrap();
        assert_eq!(game.players[&me].minerals, 0);
        let queued = game
            .objects
            .iter()
            .filter_map(|o| o.as_building())
            .any(|b| !b.task.is_empty());
        assert!(queued);

        game.players.get_mut(&me).unwrap().minerals = 500;
        assert_eq!(
            game.apply(&me, Command::TrainUnit { location: LocationId(0) }),
            Err(MatchError::Busy)
        );
        assert_eq!(game.players[&me].minerals, 500);
    }

    #[test]
    fn train_without_minerals_changes_nothing() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        game.players.get_mut(&me).unwrap().minerals = 10;
        let before = game.objects.clone();

        assert_eq!(
            game.apply(&me, Command::TrainUnit { location: LocationId(0) }),
            Err(MatchError::InsufficientMinerals { need: 50, have: 10 })
        );
        assert_eq!(game.objects, before);
    }

    #[test]
    fn train_needs_own_command_center() {
        let mut game = running_match();
        assert_eq!(
            game.apply(&"0".into(), Command::TrainUnit { location: LocationId(1) }),
            Err(MatchError::NoCommandCenter(LocationId(1)))
        );
        assert_eq!(
            game.apply(&"0".into(), Command::TrainUnit { location: LocationId(9) }),
            Err(MatchError::UnknownLocation(LocationId(9)))
        );
    }

    #[test]
    fn construct_debits_and_places_site() {
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
        assert_eq!(
            count(&game, "0", |o| o.is_unit_of(&me, LocationId(0), UnitStatus::Building)),
            1
        );
        let site = game.objects.last().unwrap();
        match &site.body {
            ObjectBody::Building(b) => {
                assert_eq!(b.kind, BuildingKind::Barracks);
                assert_eq!(b.status, BuildingStatus::UnderConstruction);
                assert_eq!(b.remaining_build_ms, b.total_build_ms);
            }
            ObjectBody::Unit(_) => panic!("expected a construction site"),
        }
    }

    #[test]
    fn construct_fails_without_funds_or_workers() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        let barracks = Command::Construct {
            location: LocationId(0),
            building: BuildingKind::Barracks,
        };
        assert_eq!(
            game.apply(&me, barracks),
            Err(MatchError::InsufficientMinerals { need: 150, have: 50 })
        );

        game.players.get_mut(&me).unwrap().minerals = 1000;
        for _ in 0..STARTING_WORKERS {
            game.apply(&me, Command::Mine { location: LocationId(0) })
                .unwrap();
        }
        assert_eq!(
            game.apply(&me, barracks),
            Err(MatchError::NoUnit {
                status: UnitStatus::Idle,
                location: LocationId(0),
            })
        );
        assert_eq!(
            game.apply(
                &me,
                Command::Construct {
                    location: LocationId(0),
                    building: BuildingKind::CommandCenter,
                }
            ),
            Err(MatchError::NotConstructible(BuildingKind::CommandCenter))
        );
    }

    #[test]
    fn mine_and_idle_flip_one_worker_each() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        let here = LocationId(0);

        game.apply(&me, Command::Mine { location: here }).unwrap();
        assert_eq!(count(&game, "0", |o| o.is_unit_of(&me, here, UnitStatus::Mining)), 1);

        game.apply(&me, Command::Idle { location: here }).unwrap();
        assert_eq!(count(&game, "0", |o| o.is_unit_of(&me, here, UnitStatus::Mining)), 0);

        assert_eq!(
            game.apply(&me, Command::Idle { location: here }),
            Err(MatchError::NoUnit {
                status: UnitStatus::Mining,
                location: here,
            })
        );
    }

    #[test]
    fn move_relocates_an_idle_worker() {
        let mut game = running_match();
        let me = PlayerId::from("0");
        game.apply(
            &me,
            Command::Move {
                location: LocationId(0),
                destination: LocationId(1),
            },
        )
        .unwrap();
        assert_eq!(count(&game, "0", |o| o.location == LocationId(1)), 1);

        assert_eq!(
            game.apply(
                &me,
                Command::Move {
                    location: LocationId(1),
                    destination: LocationId(5),
                }
            ),
            Err(MatchError::UnknownLocation(LocationId(5)))
        );
    }

    #[test]
    fn quitting_pending_match_removes_only_that_player() {
        let mut game = GameMatch::new("test", 1);
        game.join("0".into()).unwrap();
        game.join("2".into()).unwrap();
        game.remove_player(&"0".into()).unwrap();

        assert_eq!(game.players.len(), 1);
        assert_eq!(game.players[&PlayerId::from("2")], Player::human());
        assert_eq!(game.status, MatchStatus::Pending);
    }

    #[test]
    fn quitting_running_match_removes_objects_but_defers_elimination() {
        let mut game = running_match();
        game.remove_player(&"1".into()).unwrap();

        assert_eq!(count(&game, "1", |_| true), 0);
        // Current behavior: the survivor is not declared the winner until
        // the next tick runs the elimination pass.
        assert_eq!(game.status, MatchStatus::Running);
        assert_eq!(game.players[&PlayerId::from("0")].outcome, None);
        assert_eq!(game.locations.len(), 2);
    }
}
