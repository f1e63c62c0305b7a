//! Per-player command rate limiting

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};

use crate::game::PlayerId;

/// Rate limiter keyed by player
pub type KeyedLimiter = RateLimiter<PlayerId, DefaultKeyedStateStore<PlayerId>, DefaultClock>;

/// Default command rate limit
pub const COMMAND_RATE_LIMIT: u32 = 10; // Max 10 commands per second per player

/// Limits how fast each player may issue commands
#[derive(Clone)]
pub struct CommandLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl CommandLimiter {
    /// Allow `per_second` commands per player, with a burst of the same size
    pub fn new(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Check if a command from `player` is allowed (returns true if allowed)
    pub fn check(&self, player: &PlayerId) -> bool {
        self.limiter.check_key(player).is_ok()
    }

    /// Drop state of players that have been idle long enough to be full again
    pub fn shrink(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

impl Default for CommandLimiter {
    fn default() -> Self {
        Self::new(COMMAND_RATE_LIMIT)
    }
}
