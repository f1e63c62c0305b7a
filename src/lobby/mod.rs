//! Lobby - owns every match and the player -> match index
//!
//! The lobby lock guards the shape of the collection only and is never held
//! while a match lock is taken. Membership changes lock the match on its own
//! and settle the index afterwards; a match leaving the lobby is first marked
//! closed under its own lock so late arrivals can tell. The bot queue is
//! touched only after both locks are released.

pub mod scheduler;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::bots::TriggerQueue;
use crate::game::{Command, GameMatch, MatchError, MatchStatus, MatchView, PlayerId, ReadyOutcome};

/// A match behind its own lock
pub type SharedMatch = Arc<Mutex<GameMatch>>;

/// Lobby-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("player {0} is not in any match")]
    NotInMatch(PlayerId),

    #[error("player {0} is already in match {1}")]
    AlreadyInMatch(PlayerId, String),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Result of a quit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitOutcome {
    /// The match had no humans left and was removed
    pub match_deleted: bool,
}

/// Counts for health reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LobbyStats {
    pub pending: usize,
    pub running: usize,
    pub finished: usize,
    pub players: usize,
}

#[derive(Default)]
struct LobbyState {
    matches: HashMap<String, SharedMatch>,
    player_matches: HashMap<PlayerId, String>,
}

/// Registry of all matches
pub struct Lobby {
    state: RwLock<LobbyState>,
    bots: Arc<TriggerQueue>,
    bot_initial_delay: Duration,
}

impl Lobby {
    pub fn new(bots: Arc<TriggerQueue>, bot_initial_delay: Duration) -> Self {
        Self {
            state: RwLock::new(LobbyState::default()),
            bots,
            bot_initial_delay,
        }
    }

    pub fn get_match(&self, name: &str) -> Option<SharedMatch> {
        self.state.read().matches.get(name).cloned()
    }

    /// Locate a player's match. The lobby lock is released on return.
    pub fn player_match(&self, player: &PlayerId) -> Option<(String, SharedMatch)> {
        let state = self.state.read();
        let name = state.player_matches.get(player)?;
        let game = state.matches.get(name)?;
        Some((name.clone(), game.clone()))
    }

    fn require_match(&self, player: &PlayerId) -> Result<(String, SharedMatch), LobbyError> {
        self.player_match(player)
            .ok_or_else(|| LobbyError::NotInMatch(player.clone()))
    }

    /// Snapshot of every match handle
    pub fn matches(&self) -> Vec<SharedMatch> {
        self.state.read().matches.values().cloned().collect()
    }

    /// Join `match_name`, creating it as a pending match if it does not exist.
    ///
    /// The player is reserved in the index under the lobby lock, the match is
    /// joined under its own lock, and the reservation is released again if
    /// that fails. A match closed in between is dropped and joining restarts.
    pub fn join(&self, player: PlayerId, match_name: &str) -> Result<MatchView, LobbyError> {
        loop {
            let (game, created) = {
                let mut state = self.state.write();
                if let Some(current) = state.player_matches.get(&player) {
                    return Err(LobbyError::AlreadyInMatch(player, current.clone()));
                }
                state
                    .player_matches
                    .insert(player.clone(), match_name.to_string());

                match state.matches.get(match_name) {
                    Some(game) => (game.clone(), false),
                    None => {
                        let game = Arc::new(Mutex::new(GameMatch::new(
                            match_name,
                            rand::random::<u64>(),
                        )));
                        state.matches.insert(match_name.to_string(), game.clone());
                        (game, true)
                    }
                }
            };

            let joined = {
                let mut game = game.lock();
                if game.closed {
                    None
                } else {
                    let result = game.join(player.clone()).map(|()| game.export_for(&player));
                    if result.is_err() && game.players.is_empty() {
                        game.closed = true;
                    }
                    Some((result, game.closed))
                }
            };

            match joined {
                Some((Ok(view), _)) => {
                    if created {
                        info!(match_name = %match_name, "Created new match");
                    }
                    return Ok(view);
                }
                Some((Err(e), closed)) => {
                    self.release(&player, match_name, closed.then_some(&game));
                    return Err(e.into());
                }
                None => self.release(&player, match_name, Some(&game)),
            }
        }
    }

    /// Drop a join reservation and, if given, a closed match handle
    fn release(&self, player: &PlayerId, match_name: &str, closed: Option<&SharedMatch>) {
        let mut state = self.state.write();
        if state.player_matches.get(player).map(String::as_str) == Some(match_name) {
            state.player_matches.remove(player);
        }
        if let Some(closed) = closed {
            Self::unregister(&mut state, match_name, closed);
        }
    }

    /// Remove `game` from the map unless the name now belongs to another match
    fn unregister(state: &mut LobbyState, match_name: &str, game: &SharedMatch) {
        let registered = state
            .matches
            .get(match_name)
            .is_some_and(|current| Arc::ptr_eq(current, game));
        if registered {
            state.matches.remove(match_name);
        }
    }

    /// Add a bot to the caller's pending match and schedule its first trigger
    pub fn add_bot(&self, player: &PlayerId) -> Result<PlayerId, LobbyError> {
        let (name, game) = self.require_match(player)?;

        let bot = {
            let mut game = game.lock();
            if game.closed {
                return Err(LobbyError::NotInMatch(player.clone()));
            }
            game.add_bot()?
        };

        {
            let mut state = self.state.write();
            let registered = state
                .matches
                .get(&name)
                .is_some_and(|current| Arc::ptr_eq(current, &game));
            // The match was dropped after the bot joined it
            if !registered {
                return Err(LobbyError::NotInMatch(player.clone()));
            }
            state.player_matches.insert(bot.clone(), name.clone());
        }

        self.bots
            .schedule_in(&name, bot.clone(), self.bot_initial_delay);
        Ok(bot)
    }

    /// Declare the caller ready; starting the match schedules every bot
    pub fn set_ready(&self, player: &PlayerId, now: Instant) -> Result<ReadyOutcome, LobbyError> {
        let (name, game) = self.require_match(player)?;
        let outcome = {
            let mut game = game.lock();
            if game.closed {
                return Err(LobbyError::NotInMatch(player.clone()));
            }
            game.set_ready(player, now)?
        };

        if let ReadyOutcome::Started { bots } = &outcome {
            for bot in bots {
                self.bots
                    .schedule_in(&name, bot.clone(), self.bot_initial_delay);
            }
        }
        Ok(outcome)
    }

    /// Apply one command and return the caller's updated view
    pub fn command(&self, player: &PlayerId, command: Command) -> Result<MatchView, LobbyError> {
        let (_, game) = self.require_match(player)?;
        let mut game = game.lock();
        if game.closed {
            return Err(LobbyError::NotInMatch(player.clone()));
        }
        game.apply(player, command)?;
        Ok(game.export_for(player))
    }

    /// The caller's view of their match
    pub fn view_for(&self, player: &PlayerId) -> Result<MatchView, LobbyError> {
        let (_, game) = self.require_match(player)?;
        let game = game.lock();
        if game.closed {
            return Err(LobbyError::NotInMatch(player.clone()));
        }
        Ok(game.export_for(player))
    }

    /// Leave the current match. A match without humans is closed and removed
    /// along with its bots.
    pub fn quit(&self, player: &PlayerId) -> Result<QuitOutcome, LobbyError> {
        let Some((name, game)) = self.player_match(player) else {
            let mut state = self.state.write();
            state.player_matches.remove(player);
            return Err(LobbyError::NotInMatch(player.clone()));
        };

        let leftover_bots = {
            let mut game = game.lock();
            game.remove_player(player)?;
            if game.has_humans() {
                None
            } else {
                game.closed = true;
                Some(game.bots().cloned().collect::<Vec<_>>())
            }
        };

        let mut state = self.state.write();
        if state.player_matches.get(player) == Some(&name) {
            state.player_matches.remove(player);
        }

        let Some(bots) = leftover_bots else {
            return Ok(QuitOutcome {
                match_deleted: false,
            });
        };

        Self::unregister(&mut state, &name, &game);
        for bot in &bots {
            state.player_matches.remove(bot);
        }
        drop(state);

        for bot in &bots {
            self.bots.cancel(&name, bot);
        }
        info!(match_name = %name, bots = bots.len(), "Match removed from lobby");
        Ok(QuitOutcome {
            match_deleted: true,
        })
    }

    /// Full views of all pending matches, keyed by name
    pub fn pending_matches(&self) -> BTreeMap<String, MatchView> {
        let handles: Vec<(String, SharedMatch)> = {
            let state = self.state.read();
            state
                .matches
                .iter()
                .map(|(name, game)| (name.clone(), game.clone()))
                .collect()
        };

        handles
            .into_iter()
            .filter_map(|(name, game)| {
                let game = game.lock();
                (game.status == MatchStatus::Pending && !game.closed)
                    .then(|| (name, game.export_all()))
            })
            .collect()
    }

    pub fn stats(&self) -> LobbyStats {
        let mut stats = LobbyStats::default();
        for game in self.matches() {
            let game = game.lock();
            stats.players += game.players.len();
            match game.status {
                MatchStatus::Pending => stats.pending += 1,
                MatchStatus::Running => stats.running += 1,
                MatchStatus::Finished => stats.finished += 1,
            }
        }
        stats
    }
}
