//! Commands a player (or bot) can issue into a running match

use serde::{Deserialize, Serialize};

use super::world::{BuildingKind, LocationId};

fn default_structure() -> BuildingKind {
    BuildingKind::Barracks
}

/// One player action, addressed by location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Queue a worker at the command center on `location`
    TrainUnit { location: LocationId },

    /// Put an idle worker on `location` to work on a new structure
    Construct {
        location: LocationId,
        #[serde(default = "default_structure")]
        building: BuildingKind,
    },

    /// Send one idle worker on `location` mining
    Mine { location: LocationId },

    /// Pull one mining worker on `location` back to idle
    Idle { location: LocationId },

    /// Relocate one idle worker
    Move {
        location: LocationId,
        destination: LocationId,
    },
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::TrainUnit { .. } => "train_unit",
            Command::Construct { .. } => "construct",
            Command::Mine { .. } => "mine",
            Command::Idle { .. } => "idle",
            Command::Move { .. } => "move",
        }
    }
}
