//! Autonomous players: trigger queue, decision policy and the consumer loop

pub mod policy;
pub mod queue;
pub mod scheduler;

pub use queue::{BotTrigger, TriggerQueue};
pub use scheduler::BotScheduler;
