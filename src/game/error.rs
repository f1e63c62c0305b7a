//! Validation errors raised by match lifecycle operations and commands

use super::r#match::MatchStatus;
use super::world::{BuildingKind, LocationId, PlayerId, UnitStatus};

/// A rejected request. Raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no such player {0}")]
    UnknownPlayer(PlayerId),

    #[error("no such location {0}")]
    UnknownLocation(LocationId),

    #[error("cannot {action} while the match is {status}")]
    WrongStatus {
        action: &'static str,
        status: MatchStatus,
    },

    #[error("player {0} already joined this match")]
    AlreadyJoined(PlayerId),

    #[error("not enough minerals, need {need}, have {have}")]
    InsufficientMinerals { need: u32, have: u32 },

    #[error("no command center at location {0}")]
    NoCommandCenter(LocationId),

    #[error("the command center is busy")]
    Busy,

    #[error("couldn't find any {status} units at location {location}")]
    NoUnit {
        status: UnitStatus,
        location: LocationId,
    },

    #[error("{0} cannot be constructed")]
    NotConstructible(BuildingKind),
}
