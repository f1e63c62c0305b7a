//! Application state shared across routes

use std::sync::Arc;

use crate::bots::{BotScheduler, TriggerQueue};
use crate::config::Config;
use crate::lobby::Lobby;
use crate::util::rate_limit::CommandLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<Lobby>,
    pub bot_queue: Arc<TriggerQueue>,
    pub limiter: CommandLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One queue for every bot, consumed by a single scheduler
        let bot_queue = Arc::new(TriggerQueue::new());
        let lobby = Arc::new(Lobby::new(bot_queue.clone(), config.bot_initial_delay));
        let limiter = CommandLimiter::new(config.command_rate_limit);

        Self {
            config,
            lobby,
            bot_queue,
            limiter,
        }
    }

    /// The bot consumer for this state's queue
    pub fn bot_scheduler(&self) -> BotScheduler {
        BotScheduler::new(
            self.lobby.clone(),
            self.bot_queue.clone(),
            self.config.bot_update_delay,
        )
    }
}
