//! Per-node restart backoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{add_delay, serde_secs, ConfigError, DEFAULT_FAILOVER_DELAY, DEFAULT_FAILOVER_MAX_DELAY};

/// How the restart delay grows with consecutive failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffCurve {
    /// Same delay after every failure.
    Fixed {
        #[serde(with = "serde_secs")]
        delay: Duration,
    },

    /// `initial + increment * (failures - 1)`, capped at `max`.
    Linear {
        #[serde(with = "serde_secs")]
        initial: Duration,
        #[serde(with = "serde_secs")]
        increment: Duration,
        #[serde(with = "serde_secs")]
        max: Duration,
    },

    /// `initial * 2^(failures - 1)`, capped at `max`.
    Exponential {
        #[serde(with = "serde_secs")]
        initial: Duration,
        #[serde(with = "serde_secs")]
        max: Duration,
    },
}

impl Default for BackoffCurve {
    fn default() -> Self {
        Self::Exponential {
            initial: DEFAULT_FAILOVER_DELAY,
            max: DEFAULT_FAILOVER_MAX_DELAY,
        }
    }
}

impl BackoffCurve {
    /// Delay to wait after the given number of consecutive failures.
    ///
    /// Zero failures means no delay.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let step = failures - 1;

        match self {
            Self::Fixed { delay } => *delay,
            Self::Linear {
                initial,
                increment,
                max,
            } => increment
                .checked_mul(step)
                .and_then(|extra| initial.checked_add(extra))
                .unwrap_or(*max)
                .min(*max),
            Self::Exponential { initial, max } => {
                let factor = 1u32 << step.min(31);
                initial.checked_mul(factor).unwrap_or(*max).min(*max)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Fixed { .. } => Ok(()),
            Self::Linear { initial, max, .. } | Self::Exponential { initial, max } => {
                if initial > max {
                    Err(ConfigError::InitialAboveMax {
                        initial: *initial,
                        max: *max,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl std::fmt::Display for BackoffCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed { delay } => write!(f, "fixed {}s", delay.as_secs()),
            Self::Linear {
                initial,
                increment,
                max,
            } => write!(
                f,
                "linear {}s+{}s..{}s",
                initial.as_secs(),
                increment.as_secs(),
                max.as_secs()
            ),
            Self::Exponential { initial, max } => {
                write!(f, "exponential {}s..{}s", initial.as_secs(), max.as_secs())
            }
        }
    }
}

/// Restart pacing state of a single node.
///
/// Failures are counted since the last confirmed start. The node is held
/// back from placement until the backoff for the current count has passed,
/// and is given up on once the count goes past `max_tries`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Failover {
    #[serde(default)]
    pub backoff: BackoffCurve,

    /// `None` retries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,

    #[serde(default)]
    pub failures: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

impl Failover {
    pub fn new(backoff: BackoffCurve, max_tries: Option<u32>) -> Self {
        Self {
            backoff,
            max_tries,
            failures: 0,
            last_failure: None,
        }
    }

    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.backoff.delay_for(self.failures)
    }

    /// When the current backoff ends; `None` if nothing has failed yet.
    #[must_use]
    pub fn delay_expires(&self) -> Option<DateTime<Utc>> {
        self.last_failure
            .map(|at| add_delay(at, self.current_delay()))
    }

    #[must_use]
    pub fn is_waiting_delay(&self, now: DateTime<Utc>) -> bool {
        self.delay_expires().is_some_and(|expires| now < expires)
    }

    #[must_use]
    pub fn is_max_tries_exceeded(&self) -> bool {
        self.max_tries.is_some_and(|max| self.failures > max)
    }

    pub fn register_failure(&mut self, now: DateTime<Utc>) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);
    }

    pub fn reset_failures(&mut self) {
        self.failures = 0;
        self.last_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_exponential_curve() {
        let curve = BackoffCurve::Exponential {
            initial: secs(60),
            max: secs(600),
        };

        assert_eq!(curve.delay_for(0), Duration::ZERO);
        assert_eq!(curve.delay_for(1), secs(60));
        assert_eq!(curve.delay_for(2), secs(120));
        assert_eq!(curve.delay_for(4), secs(480));
        assert_eq!(curve.delay_for(5), secs(600));
        assert_eq!(curve.delay_for(u32::MAX), secs(600));
    }

    #[test]
    fn test_linear_curve() {
        let curve = BackoffCurve::Linear {
            initial: secs(10),
            increment: secs(5),
            max: secs(30),
        };

        assert_eq!(curve.delay_for(1), secs(10));
        assert_eq!(curve.delay_for(3), secs(20));
        assert_eq!(curve.delay_for(100), secs(30));
    }

    #[test]
    fn test_curve_validation() {
        let curve = BackoffCurve::Exponential {
            initial: secs(60),
            max: secs(30),
        };
        assert!(matches!(
            curve.validate(),
            Err(ConfigError::InitialAboveMax { .. })
        ));
        assert!(BackoffCurve::default().validate().is_ok());
    }

    #[test]
    fn test_failover_waiting_delay() {
        let mut failover = Failover::new(BackoffCurve::Fixed { delay: secs(60) }, None);
        assert!(!failover.is_waiting_delay(at(10, 0, 0)));
        assert_eq!(failover.delay_expires(), None);

        failover.register_failure(at(10, 0, 0));
        assert_eq!(failover.failures, 1);
        assert_eq!(failover.delay_expires(), Some(at(10, 1, 0)));
        assert!(failover.is_waiting_delay(at(10, 0, 59)));
        assert!(!failover.is_waiting_delay(at(10, 1, 0)));
    }

    #[test]
    fn test_failover_max_tries() {
        let mut failover = Failover::new(BackoffCurve::default(), Some(2));
        failover.register_failure(at(10, 0, 0));
        failover.register_failure(at(10, 1, 0));
        assert!(!failover.is_max_tries_exceeded());

        failover.register_failure(at(10, 2, 0));
        assert!(failover.is_max_tries_exceeded());

        failover.reset_failures();
        assert!(!failover.is_max_tries_exceeded());
        assert_eq!(failover.last_failure, None);
    }

    #[test]
    fn test_unlimited_tries_never_exceeded() {
        let mut failover = Failover::default();
        for minute in 0..50 {
            failover.register_failure(at(10, minute, 0));
        }
        assert!(!failover.is_max_tries_exceeded());
    }

    #[test]
    fn test_failover_serde_defaults() {
        let failover: Failover = serde_json::from_str("{}").unwrap();
        assert_eq!(failover, Failover::default());

        let json = serde_json::to_value(Failover::new(
            BackoffCurve::Fixed { delay: secs(5) },
            Some(3),
        ))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "backoff": {"type": "fixed", "delay": 5},
                "max_tries": 3,
                "failures": 0
            })
        );
    }

    fn curves() -> impl proptest::strategy::Strategy<Value = BackoffCurve> {
        use proptest::prelude::*;

        prop_oneof![
            (0u64..1_000).prop_map(|d| BackoffCurve::Fixed { delay: secs(d) }),
            (0u64..100, 0u64..100, 100u64..10_000).prop_map(|(i, inc, m)| BackoffCurve::Linear {
                initial: secs(i),
                increment: secs(inc),
                max: secs(m),
            }),
            (0u64..100, 100u64..10_000).prop_map(|(i, m)| BackoffCurve::Exponential {
                initial: secs(i),
                max: secs(m),
            }),
        ]
    }

    proptest::proptest! {
        #[test]
        fn prop_delay_non_decreasing(curve in curves(), failures in 0u32..200) {
            proptest::prop_assert!(curve.delay_for(failures) <= curve.delay_for(failures + 1));
        }

        #[test]
        fn prop_delay_deterministic(curve in curves(), failures in 0u32..200) {
            proptest::prop_assert_eq!(curve.delay_for(failures), curve.clone().delay_for(failures));
        }
    }
}
