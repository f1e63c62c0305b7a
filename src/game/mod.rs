//! Game simulation modules

pub mod combat;
pub mod command;
pub mod economy;
pub mod engine;
pub mod error;
pub mod r#match;
pub mod snapshot;
pub mod world;

pub use command::Command;
pub use engine::{advance, TickReport};
pub use error::MatchError;
pub use r#match::{GameMatch, MatchStatus, ReadyOutcome};
pub use snapshot::MatchView;
pub use world::{LocationId, PlayerId};
