//! Lobby scheduler - periodically advances every running match

use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::game::{advance, MatchStatus};
use crate::util::time::Timer;

use super::Lobby;

/// Drive the lobby forever, waking every `poll_interval`
pub async fn run(lobby: &Lobby, tick_period: Duration, poll_interval: Duration) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_period_ms = tick_period.as_millis() as u64,
        poll_interval_ms = poll_interval.as_millis() as u64,
        "Lobby scheduler started"
    );

    loop {
        interval.tick().await;
        advance_due(lobby, Instant::now(), tick_period);
    }
}

/// Advance every running match whose last step is at least `tick_period`
/// old. Returns how many matches were simulated.
///
/// The lobby lock is only held while the match handles are copied out; each
/// match is then locked on its own.
pub fn advance_due(lobby: &Lobby, now: Instant, tick_period: Duration) -> usize {
    let mut simulated = 0;

    for game in lobby.matches() {
        let mut game = game.lock();
        if game.closed || game.status != MatchStatus::Running {
            continue;
        }

        let behind = now.saturating_duration_since(game.last_simulated);
        if behind < tick_period {
            continue;
        }
        if behind > tick_period * 2 {
            warn!(
                match_name = %game.name,
                behind_ms = behind.as_millis() as u64,
                "Match simulation is falling behind"
            );
        }

        let timer = Timer::new();
        let report = advance(&mut game, now);
        if !report.simulated {
            continue;
        }
        simulated += 1;

        debug!(
            match_name = %game.name,
            elapsed_ms = report.elapsed.as_millis() as u64,
            killed = report.killed,
            produced = report.produced,
            constructed = report.constructed,
            eliminated = report.eliminated.len(),
            tick_micros = timer.elapsed_micros(),
            "Match advanced"
        );
    }

    simulated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::TriggerQueue;
    use crate::game::PlayerId;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    const TICK: Duration = Duration::from_secs(3);

    fn running_lobby(start: Instant) -> Lobby {
        let lobby = Lobby::new(Arc::new(TriggerQueue::new()), Duration::ZERO);
        assert_ok!(lobby.join("0".into(), "test"));
        assert_ok!(lobby.join("1".into(), "test"));
        assert_ok!(lobby.set_ready(&"0".into(), start));
        assert_ok!(lobby.set_ready(&"1".into(), start));
        lobby
    }

    #[test]
    fn matches_are_only_advanced_once_a_period_has_passed() {
        let start = Instant::now();
        let lobby = running_lobby(start);

        assert_eq!(advance_due(&lobby, start + Duration::from_secs(1), TICK), 0);
        assert_eq!(advance_due(&lobby, start + TICK, TICK), 1);
        // Just simulated: nothing to do until another period passes.
        assert_eq!(advance_due(&lobby, start + TICK, TICK), 0);

        let game = lobby.get_match("test").unwrap();
        assert_eq!(game.lock().last_simulated, start + TICK);
    }

    #[test]
    fn late_match_is_advanced_by_the_full_elapsed_time() {
        let start = Instant::now();
        let lobby = running_lobby(start);
        assert_ok!(lobby.command(
            &"0".into(),
            crate::game::Command::Mine {
                location: crate::game::LocationId(0)
            }
        ));

        assert_eq!(advance_due(&lobby, start + TICK * 5, TICK), 1);
        let game = lobby.get_match("test").unwrap();
        let game = game.lock();
        assert_eq!(game.last_simulated, start + TICK * 5);
        // One step regardless of the delay: one mineral from the lone miner.
        assert_eq!(game.players[&PlayerId::from("0")].minerals, 51);
    }

    #[test]
    fn pending_and_finished_matches_are_skipped() {
        let start = Instant::now();
        let lobby = running_lobby(start);
        assert_ok!(lobby.join("2".into(), "waiting"));

        lobby.get_match("test").unwrap().lock().finish(None);
        assert_eq!(advance_due(&lobby, start + TICK * 2, TICK), 0);
        assert_eq!(
            lobby.get_match("waiting").unwrap().lock().status,
            MatchStatus::Pending
        );
    }

    #[tokio::test]
    async fn run_loop_drives_matches() {
        let lobby = Arc::new(running_lobby(Instant::now()));
        let game = lobby.get_match("test").unwrap();
        let before = game.lock().last_simulated;

        let task = {
            let lobby = lobby.clone();
            tokio::spawn(async move {
                run(&lobby, Duration::from_millis(20), Duration::from_millis(5)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        assert!(game.lock().last_simulated > before);
    }
}
