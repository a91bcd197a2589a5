//! Event lifecycle: `Idle -> Running -> Idle`.

use attendance_protocol::Tick;
use serde::Serialize;
use std::fmt;

use crate::error::{AttendanceError, Result, Transition};
use crate::ledger::AttendanceLedger;

/// Ticks between a re-scan request and the tick that performs it.
/// The scan runs on the tick after next, once the host's view has settled.
pub const RESCAN_DELAY_TICKS: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Countdown to the next full re-scan of visible actors, plus an optional
/// fixed cadence.
#[derive(Debug, Default, Clone)]
pub struct RescanSchedule {
    countdown: Option<u32>,
    interval_ticks: u32,
    since_last_scan: u32,
}

impl RescanSchedule {
    pub fn schedule(&mut self) {
        self.countdown = Some(RESCAN_DELAY_TICKS);
    }

    pub fn set_interval(&mut self, interval_ticks: u32) {
        self.interval_ticks = interval_ticks;
    }

    pub fn is_pending(&self) -> bool {
        self.countdown.is_some()
    }

    /// Advances one tick and reports whether a scan is due on it.
    pub fn advance(&mut self) -> bool {
        let mut due = self.countdown == Some(0);
        self.countdown = self.countdown.and_then(|remaining| remaining.checked_sub(1));

        if !due && self.interval_ticks > 0 {
            self.since_last_scan += 1;
            due = self.since_last_scan >= self.interval_ticks;
        }
        if due {
            self.since_last_scan = 0;
        }
        due
    }
}

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    start_tick: Tick,
    stop_tick: Tick,
    last_autosave_tick: Tick,
    rescan: RescanSchedule,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    pub fn stop_tick(&self) -> Tick {
        self.stop_tick
    }

    pub fn last_autosave_tick(&self) -> Tick {
        self.last_autosave_tick
    }

    pub fn rescan_pending(&self) -> bool {
        self.rescan.is_pending()
    }

    pub fn rescan(&mut self) -> &mut RescanSchedule {
        &mut self.rescan
    }

    /// Clears the ledger and begins a new event at `tick`.
    pub fn start(&mut self, ledger: &mut AttendanceLedger, tick: Tick) -> Result<()> {
        if self.is_running() {
            return Err(AttendanceError::InvalidTransition {
                state: self.state,
                attempted: Transition::Start,
            });
        }

        ledger.clear();
        self.start_tick = tick;
        self.state = SessionState::Running;
        self.rescan.schedule();
        self.last_autosave_tick = tick;
        Ok(())
    }

    /// Folds every open segment and freezes the ledger at `tick`.
    pub fn stop(&mut self, ledger: &mut AttendanceLedger, tick: Tick) -> Result<()> {
        if !self.is_running() {
            return Err(AttendanceError::InvalidTransition {
                state: self.state,
                attempted: Transition::Stop,
            });
        }

        ledger.fold_all(tick);
        self.stop_tick = tick;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Event length so far: up to `current_tick` while running, else up to
    /// the stop tick.
    pub fn duration_ticks(&self, current_tick: Tick) -> Tick {
        let end = if self.is_running() {
            current_tick
        } else {
            self.stop_tick
        };
        end.saturating_sub(self.start_tick)
    }

    pub fn mark_autosaved(&mut self, tick: Tick) {
        self.last_autosave_tick = tick;
    }
}
