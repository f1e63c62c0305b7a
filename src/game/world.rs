//! World model - players, locations, game objects and production tasks

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minerals every player holds when a match starts
pub const STARTING_MINERALS: u32 = 50;
/// Workers spawned next to each starting command center
pub const STARTING_WORKERS: usize = 4;
/// Progress value at which a production task completes
pub const TASK_COMPLETE: u32 = 100;
/// Hit points of a freshly placed construction site
pub const CONSTRUCTION_SITE_HP: i32 = 100;

/// Opaque player identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Final result for a player, never changed once set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Eliminated,
    Victory,
}

/// Per-match player record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub minerals: u32,
    pub outcome: Option<Outcome>,
    /// Only meaningful while the match is pending
    pub ready: bool,
    pub autonomous: bool,
}

impl Player {
    pub fn human() -> Self {
        Self::default()
    }

    /// Bots never hold up the start of a match
    pub fn autonomous() -> Self {
        Self {
            ready: true,
            autonomous: true,
            ..Self::default()
        }
    }

    /// Record an outcome unless one is already set
    pub fn settle(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}

/// Index of a location within its match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub usize);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A site objects can stand on. Carries no state besides its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Scv,
}

/// Stats per unit kind
#[derive(Debug, Clone, Copy)]
pub struct UnitStats {
    pub hp_max: i32,
    /// Damage dealt each tick while idle next to enemies
    pub damage_per_tick: i32,
    /// Minerals credited each tick while mining
    pub yield_per_tick: u32,
    pub cost: u32,
}

impl UnitKind {
    pub fn stats(self) -> UnitStats {
        match self {
            UnitKind::Scv => UnitStats {
                hp_max: 60,
                damage_per_tick: 8,
                yield_per_tick: 1,
                cost: 50,
            },
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Scv => f.write_str("scv"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Idle,
    Mining,
    Building,
    Moving,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitStatus::Idle => "idle",
            UnitStatus::Mining => "mining",
            UnitStatus::Building => "building",
            UnitStatus::Moving => "moving",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Headquarters, the only building that trains workers
    CommandCenter,
    Barracks,
}

/// Stats per building kind
#[derive(Debug, Clone, Copy)]
pub struct BuildingStats {
    pub hp_max: i32,
    pub build_time_ms: u64,
    /// Production progress added per tick
    pub task_speed: u32,
    pub cost: u32,
}

impl BuildingKind {
    pub fn stats(self) -> BuildingStats {
        match self {
            BuildingKind::CommandCenter => BuildingStats {
                hp_max: 1500,
                build_time_ms: 0,
                task_speed: 20,
                cost: 400,
            },
            BuildingKind::Barracks => BuildingStats {
                hp_max: 1000,
                build_time_ms: 50_000,
                task_speed: 20,
                cost: 150,
            },
        }
    }

    /// Whether workers may place this building on the map
    pub fn constructible(self) -> bool {
        matches!(self, BuildingKind::Barracks)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildingKind::CommandCenter => f.write_str("command center"),
            BuildingKind::Barracks => f.write_str("barracks"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStatus {
    #[default]
    Idle,
    UnderConstruction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    None,
    TrainScv,
}

/// Production order. `Task::default()` is the empty queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub progress: u32,
}

impl Task {
    pub fn train(unit: UnitKind) -> Self {
        match unit {
            UnitKind::Scv => Self {
                kind: TaskKind::TrainScv,
                progress: 0,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Task::default()
    }

    /// Unit produced when this task completes
    pub fn output(&self) -> Option<UnitKind> {
        match self.kind {
            TaskKind::None => None,
            TaskKind::TrainScv => Some(UnitKind::Scv),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub kind: UnitKind,
    pub damage_per_tick: i32,
    pub yield_per_tick: u32,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub remaining_build_ms: u64,
    pub total_build_ms: u64,
    pub task: Task,
    pub task_speed: u32,
    pub status: BuildingStatus,
}

/// Variant payload of a game object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectBody {
    Unit(Unit),
    Building(Building),
}

/// Anything that stands on a location and can be attacked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    pub owner: PlayerId,
    pub location: LocationId,
    pub hp: i32,
    pub hp_max: i32,
    pub body: ObjectBody,
}

impl GameObject {
    /// Spawn a unit at full health
    pub fn unit(kind: UnitKind, owner: PlayerId, location: LocationId) -> Self {
        let stats = kind.stats();
        Self {
            owner,
            location,
            hp: stats.hp_max,
            hp_max: stats.hp_max,
            body: ObjectBody::Unit(Unit {
                kind,
                damage_per_tick: stats.damage_per_tick,
                yield_per_tick: stats.yield_per_tick,
                status: UnitStatus::Idle,
            }),
        }
    }

    /// Spawn a completed building at full health
    pub fn building(kind: BuildingKind, owner: PlayerId, location: LocationId) -> Self {
        let stats = kind.stats();
        Self {
            owner,
            location,
            hp: stats.hp_max,
            hp_max: stats.hp_max,
            body: ObjectBody::Building(Building {
                kind,
                remaining_build_ms: 0,
                total_build_ms: stats.build_time_ms,
                task: Task::default(),
                task_speed: stats.task_speed,
                status: BuildingStatus::Idle,
            }),
        }
    }

    /// Place a construction site that still needs its full build time
    pub fn construction_site(kind: BuildingKind, owner: PlayerId, location: LocationId) -> Self {
        let mut site = Self::building(kind, owner, location);
        site.hp = CONSTRUCTION_SITE_HP.min(site.hp_max);
        if let ObjectBody::Building(b) = &mut site.body {
            b.remaining_build_ms = b.total_build_ms;
            b.status = BuildingStatus::UnderConstruction;
        }
        site
    }

    pub fn as_unit(&self) -> Option<&Unit> {
        match &self.body {
            ObjectBody::Unit(u) => Some(u),
            ObjectBody::Building(_) => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.body {
            ObjectBody::Unit(u) => Some(u),
            ObjectBody::Building(_) => None,
        }
    }

    pub fn as_building(&self) -> Option<&Building> {
        match &self.body {
            ObjectBody::Building(b) => Some(b),
            ObjectBody::Unit(_) => None,
        }
    }

    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.body {
            ObjectBody::Building(b) => Some(b),
            ObjectBody::Unit(_) => None,
        }
    }

    /// Unit owned by `owner` at `location` currently in `status`
    pub fn is_unit_of(&self, owner: &PlayerId, location: LocationId, status: UnitStatus) -> bool {
        self.owner == *owner
            && self.location == location
            && self.as_unit().is_some_and(|u| u.status == status)
    }

    pub fn is_under_construction(&self) -> bool {
        self.as_building()
            .is_some_and(|b| b.status == BuildingStatus::UnderConstruction)
    }

    /// A completed building keeps its owner in the match
    pub fn is_standing_building(&self) -> bool {
        self.as_building()
            .is_some_and(|b| b.status != BuildingStatus::UnderConstruction)
    }

    /// Advance construction by `elapsed_ms`, raising hp so it lands on
    /// `hp_max` exactly when the remaining time reaches zero.
    /// Returns true when this call completed the building.
    pub fn advance_construction(&mut self, elapsed_ms: u64) -> bool {
        let GameObject { hp, hp_max, body, .. } = self;
        let ObjectBody::Building(b) = body else {
            return false;
        };
        if b.status != BuildingStatus::UnderConstruction {
            return false;
        }

        let step = elapsed_ms.min(b.remaining_build_ms);
        let done_before = b.total_build_ms - b.remaining_build_ms;
        b.remaining_build_ms -= step;
        let done_after = done_before + step;

        let span = (*hp_max - CONSTRUCTION_SITE_HP).max(0) as u64;
        let healed_at = |done: u64| {
            if b.total_build_ms == 0 {
                span
            } else {
                span * done / b.total_build_ms
            }
        };
        let gain = healed_at(done_after) - healed_at(done_before);
        *hp = (*hp + gain as i32).min(*hp_max);

        if b.remaining_build_ms == 0 {
            b.status = BuildingStatus::Idle;
            return true;
        }
        false
    }
}
