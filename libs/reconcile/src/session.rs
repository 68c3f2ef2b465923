//! Scheduler-wide reconciliation attempt tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{add_delay, ConfigError, DEFAULT_RECONCILE_DELAY, DEFAULT_RECONCILE_MAX_TRIES};

/// Outcome of polling a reconcile session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    /// No reconciliation in progress.
    Idle,

    /// Too early for the next attempt.
    Waiting,

    /// Time for another attempt; `tries` is its 1-based number.
    Retry { tries: u32 },

    /// The attempt budget is spent. The session is idle again.
    Exhausted,
}

/// Attempt counter for one reconciliation round.
///
/// A round starts on every (re)subscribe. Each poll after `delay` has passed
/// uses up one attempt; polling once `max_tries` attempts have been made
/// ends the round with [`ReconcileStep::Exhausted`].
///
/// Session state is not persisted: a restarted scheduler
/// always begins a fresh round on subscribe.
#[derive(Debug, Clone)]
pub struct ReconcileSession {
    delay: Duration,
    max_tries: u32,
    tries: u32,
    last_try: Option<DateTime<Utc>>,
}

impl Default for ReconcileSession {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONCILE_DELAY,
            max_tries: DEFAULT_RECONCILE_MAX_TRIES,
            tries: 0,
            last_try: None,
        }
    }
}

impl ReconcileSession {
    pub fn new(delay: Duration, max_tries: u32) -> Result<Self, ConfigError> {
        if max_tries == 0 {
            return Err(ConfigError::ZeroMaxTries);
        }

        Ok(Self {
            delay,
            max_tries,
            tries: 0,
            last_try: None,
        })
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn last_try(&self) -> Option<DateTime<Utc>> {
        self.last_try
    }

    pub fn is_started(&self) -> bool {
        self.last_try.is_some()
    }

    /// Begins a new round; the first attempt is made by the caller right away.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.tries = 1;
        self.last_try = Some(now);
    }

    pub fn poll(&mut self, now: DateTime<Utc>) -> ReconcileStep {
        let Some(last_try) = self.last_try else {
            return ReconcileStep::Idle;
        };

        if now < add_delay(last_try, self.delay) {
            return ReconcileStep::Waiting;
        }

        self.tries += 1;
        self.last_try = Some(now);

        if self.tries > self.max_tries {
            self.tries = 0;
            self.last_try = None;
            return ReconcileStep::Exhausted;
        }

        ReconcileStep::Retry { tries: self.tries }
    }

    /// Ends the round early, e.g. once nothing is left to reconcile.
    pub fn finish(&mut self) {
        self.tries = 0;
        self.last_try = None;
    }
}
