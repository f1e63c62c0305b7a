//! Bot scheduler - single consumer that runs bot decisions when they fall due

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::game::MatchStatus;
use crate::lobby::Lobby;

use super::policy::decide;
use super::queue::{BotTrigger, TriggerQueue};

/// What happened to a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The bot acted and was rescheduled
    Acted { issued: usize, rejected: usize },
    /// The match has not started yet; rescheduled
    Waiting,
    /// The bot or its match is gone, or the match is over; not rescheduled
    Retired,
}

/// Runs bot decisions against the lobby's matches
pub struct BotScheduler {
    lobby: Arc<Lobby>,
    queue: Arc<TriggerQueue>,
    update_delay: Duration,
}

impl BotScheduler {
    pub fn new(lobby: Arc<Lobby>, queue: Arc<TriggerQueue>, update_delay: Duration) -> Self {
        Self {
            lobby,
            queue,
            update_delay,
        }
    }

    /// Consume triggers forever. Only one consumer may run per queue.
    pub async fn run(&self) {
        info!(
            update_delay_ms = self.update_delay.as_millis() as u64,
            "Bot scheduler started"
        );
        loop {
            let trigger = self.queue.next().await;
            self.execute(&trigger);
        }
    }

    /// Run one bot decision and reschedule the bot unless it retired.
    /// Rejected bot commands are logged and wait for the next trigger.
    pub fn execute(&self, trigger: &BotTrigger) -> TriggerOutcome {
        let outcome = self.act(trigger);

        match outcome {
            TriggerOutcome::Retired => {
                debug!(
                    match_name = %trigger.match_name,
                    bot = %trigger.bot,
                    "Bot retired"
                );
            }
            _ => self
                .queue
                .schedule_in(&trigger.match_name, trigger.bot.clone(), self.update_delay),
        }
        outcome
    }

    fn act(&self, trigger: &BotTrigger) -> TriggerOutcome {
        let Some(game) = self.lobby.get_match(&trigger.match_name) else {
            return TriggerOutcome::Retired;
        };
        let mut game = game.lock();
        if game.closed {
            return TriggerOutcome::Retired;
        }

        let is_bot = game
            .players
            .get(&trigger.bot)
            .is_some_and(|p| p.autonomous);
        if !is_bot {
            return TriggerOutcome::Retired;
        }

        match game.status {
            MatchStatus::Pending => TriggerOutcome::Waiting,
            MatchStatus::Finished => TriggerOutcome::Retired,
            MatchStatus::Running => {
                let view = game.export_for(&trigger.bot);
                let mut issued = 0;
                let mut rejected = 0;
                for command in decide(&view, &trigger.bot) {
                    match game.apply(&trigger.bot, command) {
                        Ok(()) => issued += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(
                                match_name = %trigger.match_name,
                                bot = %trigger.bot,
                                command = command.name(),
                                error = %e,
                                "Bot command failed"
                            );
                        }
                    }
                }
                debug!(
                    match_name = %trigger.match_name,
                    bot = %trigger.bot,
                    issued,
                    rejected,
                    "Bot acted"
                );
                TriggerOutcome::Acted { issued, rejected }
            }
        }
    }
}
