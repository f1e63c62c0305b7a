//! Bot trigger queue - pending bot decisions ordered by due time

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::game::PlayerId;

/// One scheduled bot decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotTrigger {
    pub due: Instant,
    pub match_name: String,
    pub bot: PlayerId,
}

impl BotTrigger {
    pub fn new(due: Instant, match_name: impl Into<String>, bot: PlayerId) -> Self {
        Self {
            due,
            match_name: match_name.into(),
            bot,
        }
    }

    fn key(&self) -> BotKey {
        (self.match_name.clone(), self.bot.clone())
    }
}

type BotKey = (String, PlayerId);

/// Heap entry; ordered by due time, then insertion order
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due: Instant,
    generation: u64,
    key: BotKey,
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<Reverse<Scheduled>>,
    /// Live generation per bot; heap entries with another generation are stale
    live: HashMap<BotKey, u64>,
    next_generation: u64,
}

impl QueueInner {
    /// Drop stale entries sitting at the head
    fn prune(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            if self.live.get(&head.key) == Some(&head.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// Result of polling the queue
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    Due(BotTrigger),
    /// Nothing due; the earliest trigger fires at this instant
    NotBefore(Instant),
    Empty,
}

/// Shared queue of bot triggers with a single consumer.
///
/// Each bot has at most one pending trigger: scheduling it again replaces
/// the earlier one.
pub struct TriggerQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
        }
    }

    /// Add or replace the pending trigger of a bot
    pub fn schedule(&self, trigger: BotTrigger) {
        {
            let mut inner = self.inner.lock();
            let generation = inner.next_generation;
            inner.next_generation += 1;

            let key = trigger.key();
            inner.live.insert(key.clone(), generation);
            inner.heap.push(Reverse(Scheduled {
                due: trigger.due,
                generation,
                key,
            }));
        }
        self.notify.notify_one();
    }

    /// Schedule a bot `delay` from now
    pub fn schedule_in(&self, match_name: &str, bot: PlayerId, delay: Duration) {
        self.schedule(BotTrigger::new(Instant::now() + delay, match_name, bot));
    }

    /// Forget a bot's pending trigger, if any
    pub fn cancel(&self, match_name: &str, bot: &PlayerId) {
        let mut inner = self.inner.lock();
        inner.live.remove(&(match_name.to_string(), bot.clone()));
        inner.prune();
    }

    /// Take the earliest trigger if it is due at `now`
    pub fn poll(&self, now: Instant) -> Poll {
        let mut inner = self.inner.lock();
        inner.prune();

        let Some(Reverse(head)) = inner.heap.peek() else {
            return Poll::Empty;
        };
        if head.due > now {
            return Poll::NotBefore(head.due);
        }

        let Some(Reverse(head)) = inner.heap.pop() else {
            return Poll::Empty;
        };
        inner.live.remove(&head.key);
        let (match_name, bot) = head.key;
        Poll::Due(BotTrigger {
            due: head.due,
            match_name,
            bot,
        })
    }

    /// Wait until a trigger is due and take it.
    /// Sleeps until the head's due time or until something new is scheduled.
    pub async fn next(&self) -> BotTrigger {
        loop {
            match self.poll(Instant::now()) {
                Poll::Due(trigger) => return trigger,
                Poll::NotBefore(due) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(due)) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                Poll::Empty => self.notify.notified().await,
            }
        }
    }

    /// Number of live pending triggers
    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TriggerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn trigger(due: Instant, bot: &str) -> BotTrigger {
        BotTrigger::new(due, "test", bot.into())
    }

    #[test]
    fn triggers_come_out_in_due_order() {
        let queue = TriggerQueue::new();
        let now = Instant::now();
        queue.schedule(trigger(now + Duration::from_millis(30), "late"));
        queue.schedule(trigger(now + Duration::from_millis(10), "early"));
        queue.schedule(trigger(now + Duration::from_millis(20), "middle"));

        let later = now + Duration::from_secs(1);
        let order: Vec<String> = std::iter::from_fn(|| match queue.poll(later) {
            Poll::Due(t) => Some(t.bot.to_string()),
            _ => None,
        })
        .collect();
        assert_eq!(order, ["early", "middle", "late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn not_yet_due_trigger_stays_queued() {
        let queue = TriggerQueue::new();
        let now = Instant::now();
        let due = now + Duration::from_secs(5);
        queue.schedule(trigger(due, "bot"));

        assert_eq!(queue.poll(now), Poll::NotBefore(due));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll(due), Poll::Due(trigger(due, "bot")));
        assert_eq!(queue.poll(due), Poll::Empty);
    }

    #[test]
    fn rescheduling_replaces_pending_trigger() {
        let queue = TriggerQueue::new();
        let now = Instant::now();
        queue.schedule(trigger(now, "bot"));
        queue.schedule(trigger(now + Duration::from_secs(5), "bot"));

        assert_eq!(queue.len(), 1);
        assert!(matches!(queue.poll(now), Poll::NotBefore(_)));
    }

    #[test]
    fn cancelled_trigger_never_fires() {
        let queue = TriggerQueue::new();
        let now = Instant::now();
        queue.schedule(trigger(now, "a"));
        queue.schedule(trigger(now, "b"));
        queue.cancel("test", &"a".into());

        assert_eq!(queue.poll(now), Poll::Due(trigger(now, "b")));
        assert_eq!(queue.poll(now), Poll::Empty);
    }

    #[tokio::test]
    async fn next_wakes_when_a_trigger_is_due() {
        let queue = Arc::new(TriggerQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.schedule_in("test", "bot".into(), Duration::from_millis(20));

        let fired = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .expect("consumer never woke")
            .expect("consumer panicked");
        assert_eq!(fired.bot, PlayerId::from("bot"));
        assert!(fired.due <= Instant::now());
    }
}
