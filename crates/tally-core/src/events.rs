use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{registry::UserRegistry, util::title_case};

/// Slot occupied by the single active poll.
pub const POLL_SLOT: &str = "current_poll";
/// Slot occupied by the single active broadcast.
pub const BROADCAST_SLOT: &str = "current_broadcast";

/// Outcome of advancing one event by one sweep tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
    /// Nothing happened this tick.
    Continue,
    /// The event fired and stays in the table; emit this line.
    Fired(String),
    /// The event reached its terminal state; emit the final line if any and
    /// remove it from the table.
    Terminal(Option<String>),
}

/// Result of a vote attempt against a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    Counted,
    NotAChoice,
    NoPoll,
}

/// A timed poll. Choices keep declaration order; tallies start at zero and
/// votes match on the exact choice string.
#[derive(Clone, Debug)]
pub struct Poll {
    pub title: String,
    choices: Vec<(String, u32)>,
    timeout_secs: f64,
    spawned_at: f64,
}

impl Poll {
    pub fn new(title: impl Into<String>, choices: Vec<String>, timeout_secs: f64, now: f64) -> Self {
        Self {
            title: title.into(),
            choices: choices.into_iter().map(|c| (c, 0)).collect(),
            timeout_secs,
            spawned_at: now,
        }
    }

    /// Count a vote for `choice`. Returns false (and changes nothing) when the
    /// choice was never declared.
    pub fn vote(&mut self, choice: &str) -> bool {
        match self.choices.iter_mut().find(|(c, _)| c == choice) {
            Some((_, tally)) => {
                *tally += 1;
                true
            }
            None => false,
        }
    }

    pub fn tally(&self, choice: &str) -> Option<u32> {
        self.choices
            .iter()
            .find(|(c, _)| c == choice)
            .map(|(_, tally)| *tally)
    }

    pub fn spawned_at(&self) -> f64 {
        self.spawned_at
    }

    /// Live status line: `Title: Choice:count Choice:count ...`
    pub fn status_line(&self) -> String {
        let tallies = self
            .choices
            .iter()
            .map(|(choice, tally)| format!("{}:{tally}", title_case(choice)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: {tallies}", self.title)
    }

    fn timed_out(&self, now: f64) -> bool {
        // A zero timeout closes on the very next sweep tick.
        self.timeout_secs == 0.0 || now - self.spawned_at >= self.timeout_secs
    }

    /// Highest tally wins; a tie goes to whichever choice was declared first.
    fn winner(&self) -> (&str, u32) {
        let mut best: Option<(&str, u32)> = None;
        for (choice, tally) in &self.choices {
            match best {
                Some((_, top)) if *tally <= top => {}
                _ => best = Some((choice, *tally)),
            }
        }
        best.unwrap_or(("", 0))
    }
}

/// A repeating timed announcement. Fires every `timeout_secs` until the
/// repeat count is exhausted, or exactly once when one-shot.
#[derive(Clone, Debug)]
pub struct Broadcast {
    pub message: String,
    timeout_secs: f64,
    spawned_at: f64,
    one_shot: bool,
    repeat_count: u32,
    iterations_done: u32,
}

impl Broadcast {
    pub fn new(
        message: impl Into<String>,
        timeout_secs: f64,
        repeat_count: u32,
        one_shot: bool,
        now: f64,
    ) -> Self {
        Self {
            message: message.into(),
            timeout_secs,
            spawned_at: now,
            one_shot,
            repeat_count,
            iterations_done: 0,
        }
    }

    pub fn iterations_done(&self) -> u32 {
        self.iterations_done
    }
}

/// Closed set of event kinds the table can hold.
#[derive(Clone, Debug)]
pub enum BotEvent {
    Poll(Poll),
    Broadcast(Broadcast),
}

impl BotEvent {
    /// Advance this event by one sweep tick at time `now`.
    pub fn advance(&mut self, now: f64) -> Advance {
        match self {
            BotEvent::Poll(poll) => {
                if !poll.timed_out(now) {
                    return Advance::Continue;
                }
                let (choice, votes) = poll.winner();
                Advance::Terminal(Some(format!(
                    "{} - {} has won with {votes} votes!",
                    poll.title,
                    title_case(choice)
                )))
            }
            BotEvent::Broadcast(broadcast) => {
                if now - broadcast.spawned_at < broadcast.timeout_secs {
                    return Advance::Continue;
                }
                broadcast.iterations_done += 1;
                if broadcast.one_shot || broadcast.iterations_done >= broadcast.repeat_count {
                    return Advance::Terminal(Some(broadcast.message.clone()));
                }
                broadcast.spawned_at = now;
                Advance::Fired(broadcast.message.clone())
            }
        }
    }
}

/// Owner of all currently active events, at most one per slot.
///
/// All mutation serializes on one mutex, distinct from the registry's. A
/// poll's terminal transition touches the registry while the event lock is
/// held; that event-lock-then-registry-lock order is the only nesting allowed
/// between the two.
#[derive(Default)]
pub struct EventTable {
    inner: Mutex<HashMap<String, BotEvent>>,
}

impl EventTable {
    /// Insert `event` into `slot`. Returns false and performs no mutation when
    /// the slot is already occupied.
    pub async fn add(&self, slot: &str, event: BotEvent) -> bool {
        let mut map = self.inner.lock().await;
        if map.contains_key(slot) {
            debug!(slot, "event slot already occupied");
            return false;
        }
        info!(slot, "event added");
        map.insert(slot.to_string(), event);
        true
    }

    /// Count a vote against the poll in `slot`, if there is one.
    pub async fn vote_for(&self, slot: &str, choice: &str) -> VoteOutcome {
        let mut map = self.inner.lock().await;
        match map.get_mut(slot) {
            Some(BotEvent::Poll(poll)) => {
                if poll.vote(choice) {
                    VoteOutcome::Counted
                } else {
                    VoteOutcome::NotAChoice
                }
            }
            _ => VoteOutcome::NoPoll,
        }
    }

    /// Snapshot of the poll status line in `slot`, if a poll is active there.
    pub async fn status_line(&self, slot: &str) -> Option<String> {
        let map = self.inner.lock().await;
        match map.get(slot) {
            Some(BotEvent::Poll(poll)) => Some(poll.status_line()),
            _ => None,
        }
    }

    pub async fn contains(&self, slot: &str) -> bool {
        self.inner.lock().await.contains_key(slot)
    }

    /// Advance every event one tick and drop the ones that finished. Returns
    /// the lines to announce, in slot-independent order; the caller sends them
    /// after this lock is released.
    pub async fn sweep(&self, now: f64, registry: &UserRegistry) -> Vec<String> {
        let mut map = self.inner.lock().await;
        let mut outbound = Vec::new();
        let mut finished = Vec::new();
        let mut poll_closed = false;

        for (slot, event) in map.iter_mut() {
            match event.advance(now) {
                Advance::Continue => {}
                Advance::Fired(line) => outbound.push(line),
                Advance::Terminal(line) => {
                    outbound.extend(line);
                    poll_closed |= matches!(event, BotEvent::Poll(_));
                    finished.push(slot.clone());
                }
            }
        }

        for slot in finished {
            info!(slot, "event finished");
            map.remove(&slot);
        }

        // Poll completion resets every user's vote stamp, system-wide.
        if poll_closed {
            registry.reset_vote_stamps().await;
        }

        outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(timeout: f64) -> Poll {
        Poll::new(
            "Best Pet",
            vec!["cat".to_string(), "dog".to_string(), "bird".to_string()],
            timeout,
            100.0,
        )
    }

    #[test]
    fn vote_increments_exactly_one_choice() {
        let mut p = poll(60.0);
        assert!(p.vote("dog"));
        assert_eq!(p.tally("dog"), Some(1));
        assert_eq!(p.tally("cat"), Some(0));
        assert_eq!(p.tally("bird"), Some(0));
    }

    #[test]
    fn vote_for_undeclared_choice_changes_nothing() {
        let mut p = poll(60.0);
        assert!(!p.vote("fish"));
        assert_eq!(p.tally("cat"), Some(0));
        assert_eq!(p.tally("dog"), Some(0));
    }

    #[test]
    fn tie_resolves_to_first_declared_choice() {
        let mut p = poll(60.0);
        p.vote("cat");
        p.vote("dog");
        // cat and dog tied at 1; cat was declared first.
        assert_eq!(p.winner(), ("cat", 1));

        // A zero-vote poll resolves to the first declared choice too.
        let empty = poll(60.0);
        assert_eq!(empty.winner(), ("cat", 0));
    }

    #[test]
    fn poll_with_zero_timeout_closes_on_next_tick() {
        let mut event = BotEvent::Poll(poll(0.0));
        assert!(matches!(event.advance(100.5), Advance::Terminal(_)));
    }

    #[test]
    fn poll_stays_open_until_timeout() {
        let mut event = BotEvent::Poll(poll(60.0));
        assert_eq!(event.advance(120.0), Advance::Continue);
        match event.advance(160.0) {
            Advance::Terminal(Some(line)) => {
                assert_eq!(line, "Best Pet - Cat has won with 0 votes!");
            }
            other => panic!("expected terminal, got {other:?}"),
        }
    }

    #[test]
    fn broadcast_fires_until_repeat_count_exhausted() {
        let mut event = BotEvent::Broadcast(Broadcast::new("hydrate!", 10.0, 3, false, 0.0));

        assert_eq!(event.advance(5.0), Advance::Continue);
        assert_eq!(event.advance(10.0), Advance::Fired("hydrate!".to_string()));
        assert_eq!(event.advance(20.0), Advance::Fired("hydrate!".to_string()));
        assert_eq!(
            event.advance(30.0),
            Advance::Terminal(Some("hydrate!".to_string()))
        );

        let BotEvent::Broadcast(broadcast) = &event else {
            panic!("expected broadcast");
        };
        assert_eq!(broadcast.iterations_done(), 3, "one increment per firing");
    }

    #[test]
    fn one_shot_broadcast_fires_exactly_once() {
        let mut event = BotEvent::Broadcast(Broadcast::new("once", 5.0, 99, true, 0.0));
        assert_eq!(
            event.advance(5.0),
            Advance::Terminal(Some("once".to_string()))
        );
    }

    #[tokio::test]
    async fn add_on_occupied_slot_fails_and_preserves_state() {
        let table = EventTable::default();
        assert!(table.add(POLL_SLOT, BotEvent::Poll(poll(60.0))).await);
        assert_eq!(table.vote_for(POLL_SLOT, "dog").await, VoteOutcome::Counted);

        // Second insert must fail and leave the first poll's tallies alone.
        assert!(!table.add(POLL_SLOT, BotEvent::Poll(poll(60.0))).await);
        let map = table.inner.lock().await;
        let BotEvent::Poll(existing) = map.get(POLL_SLOT).unwrap() else {
            panic!("expected poll in slot");
        };
        assert_eq!(existing.tally("dog"), Some(1));
        assert_eq!(existing.spawned_at(), 100.0);
    }

    #[tokio::test]
    async fn vote_against_empty_slot_reports_no_poll() {
        let table = EventTable::default();
        assert_eq!(table.vote_for(POLL_SLOT, "cat").await, VoteOutcome::NoPoll);
    }

    #[tokio::test]
    async fn sweep_removes_finished_poll_and_resets_vote_stamps() {
        let registry = UserRegistry::default();
        registry.ensure("alice").await;
        registry.update("alice", |r| r.last_vote = 999.0).await;

        let table = EventTable::default();
        table.add(POLL_SLOT, BotEvent::Poll(poll(60.0))).await;

        // Before the timeout nothing happens.
        assert!(table.sweep(120.0, &registry).await.is_empty());
        assert!(table.contains(POLL_SLOT).await);

        let lines = table.sweep(160.0, &registry).await;
        assert_eq!(lines, vec!["Best Pet - Cat has won with 0 votes!"]);
        assert!(!table.contains(POLL_SLOT).await);
        assert_eq!(registry.get("alice").await.unwrap().last_vote, 0.0);
    }

    #[tokio::test]
    async fn sweep_leaves_vote_stamps_alone_for_broadcasts() {
        let registry = UserRegistry::default();
        registry.ensure("bob").await;
        registry.update("bob", |r| r.last_vote = 42.0).await;

        let table = EventTable::default();
        table
            .add(
                BROADCAST_SLOT,
                BotEvent::Broadcast(Broadcast::new("hi", 0.0, 1, false, 0.0)),
            )
            .await;

        let lines = table.sweep(1.0, &registry).await;
        assert_eq!(lines, vec!["hi"]);
        assert_eq!(registry.get("bob").await.unwrap().last_vote, 42.0);
    }
}
