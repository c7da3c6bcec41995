//! Round lifecycle state machine
//!
//! The controller cycles through three phases:
//!
//! - `Idle`: nobody is playing. A join arms a short grace timer so that
//!   players arriving together land in the same round; a `start` request
//!   begins a round immediately.
//! - `Running`: a countdown ticks once per second. Every tick broadcasts the
//!   current scores. When the countdown hits zero the round ends and the
//!   winners are announced.
//! - `Break`: a pause between rounds. When it expires a new round starts if
//!   anyone is still connected, otherwise the controller falls back to `Idle`.
//!
//! The controller never reads the clock itself. Callers pass `now` in and ask
//! for `next_deadline()`, which keeps the state machine deterministic under
//! test. At most one timer is armed at a time and arming a new one replaces
//! the old one, so a superseded countdown can never fire.

use crate::broadcast::{self, Outbox};
use crate::registry::PlayerRegistry;
use log::{debug, info};
use shared::{
    PlayerId, ServerMessage, Winner, DEFAULT_BREAK_SECS, DEFAULT_ROUND_SECS, JOIN_GRACE_MS,
};
use std::collections::BTreeMap;
use tokio::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);

/// Durations that shape a round, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSettings {
    /// Countdown length in whole seconds
    pub round_duration: u32,
    pub break_duration: Duration,
    /// Delay between the first join while idle and the round start
    pub join_grace: Duration,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            round_duration: DEFAULT_ROUND_SECS,
            break_duration: Duration::from_secs(DEFAULT_BREAK_SECS as u64),
            join_grace: Duration::from_millis(JOIN_GRACE_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundState {
    pub phase: Phase,
    /// Seconds left in the countdown. Only meaningful while `Running`.
    pub time_left: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Grace,
    Tick,
    BreakOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    kind: TimerKind,
    deadline: Instant,
}

/// Final standings of a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner: Winner,
    pub scores: BTreeMap<String, u32>,
}

impl RoundResult {
    /// Picks everyone holding the top score. With an empty registry nobody wins.
    pub fn tally(registry: &PlayerRegistry) -> Self {
        let winner = match registry.iter().map(|p| p.score).max() {
            Some(best) => Winner::from_names(
                registry
                    .iter()
                    .filter(|p| p.score == best)
                    .map(|p| p.name.clone())
                    .collect(),
            ),
            None => Winner::none(),
        };

        let scores = registry
            .iter()
            .map(|p| (p.name.clone(), p.score))
            .collect();

        Self { winner, scores }
    }

    pub fn into_message(self) -> ServerMessage {
        ServerMessage::GameOver {
            winner: self.winner,
            scores: self.scores,
        }
    }
}

/// Owns the registry and the round state, and is the only thing that mutates them
pub struct RoundController {
    registry: PlayerRegistry,
    state: RoundState,
    settings: RoundSettings,
    timer: Option<Timer>,
    rounds_played: u64,
}

impl RoundController {
    pub fn new(settings: RoundSettings) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            state: RoundState {
                phase: Phase::Idle,
                time_left: 0,
            },
            settings,
            timer: None,
            rounds_played: 0,
        }
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn settings(&self) -> &RoundSettings {
        &self.settings
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    /// When the armed timer is due, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline)
    }

    pub fn armed_timer(&self) -> Option<TimerKind> {
        self.timer.map(|t| t.kind)
    }

    /// Registers a new connection and greets it.
    ///
    /// The joiner gets `assign_id` before the `state` broadcast that lists
    /// them. Joining while idle arms the grace timer unless one is pending.
    pub fn join(&mut self, name_hint: Option<&str>, outbox: Outbox, now: Instant) -> PlayerId {
        let player = self.registry.register(name_hint, outbox);
        let id = player.id;
        let greeting = ServerMessage::AssignId {
            id: id.to_string(),
            name: player.name.clone(),
        };
        broadcast::unicast(&player.outbox, &greeting);
        self.broadcast_state();

        if self.state.phase == Phase::Idle && self.timer.is_none() {
            debug!("Arming join grace timer ({:?})", self.settings.join_grace);
            self.arm(TimerKind::Grace, now + self.settings.join_grace);
        }

        id
    }

    /// Removes a connection's player and tells everybody else.
    pub fn leave(&mut self, id: PlayerId) -> bool {
        if !self.registry.unregister(id) {
            return false;
        }
        self.broadcast_state();
        true
    }

    /// Counts a click. Scores only move while a round is running, but the
    /// sender always gets a fresh state back.
    pub fn click(&mut self, id: PlayerId) -> bool {
        if self.registry.get(id).is_none() {
            return false;
        }
        if self.state.phase == Phase::Running {
            self.registry.add_point(id);
        }
        self.broadcast_state();
        true
    }

    pub fn set_name(&mut self, id: PlayerId, name: &str) -> bool {
        if !self.registry.set_name(id, name) {
            return false;
        }
        self.broadcast_state();
        true
    }

    /// Starts a round on request. Only has an effect while idle with players present.
    pub fn request_start(&mut self, now: Instant) -> bool {
        if self.state.phase != Phase::Idle {
            debug!("Ignoring start request during {:?}", self.state.phase);
            return false;
        }
        if self.registry.is_empty() {
            return false;
        }
        self.start_round(now);
        true
    }

    /// Fires the armed timer if its deadline has passed.
    ///
    /// Returns the kind of timer that fired.
    pub fn fire_due(&mut self, now: Instant) -> Option<TimerKind> {
        let timer = self.timer.filter(|t| t.deadline <= now)?;
        self.timer = None;

        match timer.kind {
            TimerKind::Grace => {
                if self.state.phase == Phase::Idle && !self.registry.is_empty() {
                    self.start_round(now);
                }
            }
            TimerKind::Tick => self.tick(timer.deadline),
            TimerKind::BreakOver => {
                if self.registry.is_empty() {
                    info!("Break over with no players, going idle");
                    self.state.phase = Phase::Idle;
                } else {
                    self.start_round(now);
                }
            }
        }

        Some(timer.kind)
    }

    fn start_round(&mut self, now: Instant) {
        self.cancel_timer();

        self.registry.reset_all_scores();
        self.state = RoundState {
            phase: Phase::Running,
            time_left: self.settings.round_duration,
        };
        info!(
            "Round {} started with {} players ({}s)",
            self.rounds_played + 1,
            self.registry.len(),
            self.state.time_left
        );

        broadcast::broadcast(
            &self.registry,
            &ServerMessage::RoundStart {
                time_left: self.state.time_left,
            },
        );
        self.arm(TimerKind::Tick, now + TICK);
    }

    fn tick(&mut self, deadline: Instant) {
        self.state.time_left = self.state.time_left.saturating_sub(1);
        debug!("Tick: {}s left", self.state.time_left);
        self.broadcast_state();

        if self.state.time_left == 0 {
            self.end_round(deadline);
        } else {
            // Schedule from the previous deadline so late wakeups do not drift
            self.arm(TimerKind::Tick, deadline + TICK);
        }
    }

    fn end_round(&mut self, now: Instant) {
        self.cancel_timer();
        self.rounds_played += 1;

        let result = RoundResult::tally(&self.registry);
        info!(
            "Round {} over, winner: {:?}",
            self.rounds_played, result.winner
        );
        broadcast::broadcast(&self.registry, &result.into_message());

        self.state.phase = Phase::Break;
        self.arm(TimerKind::BreakOver, now + self.settings.break_duration);
    }

    fn broadcast_state(&self) {
        broadcast::broadcast(
            &self.registry,
            &ServerMessage::State {
                players: self.registry.snapshot(),
                time_left: self.state.time_left,
            },
        );
    }

    fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        self.timer = Some(Timer { kind, deadline });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!("Cancelled pending {:?} timer", timer.kind);
        }
    }
}
