//! Poll loop: runs the cycles on a cadence and never gives up.

use std::{cmp::max, time::Duration};

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tokio::time::sleep;

use crate::{
    api::{heartbeat, new_relic},
    core::snapshot::Assembler,
    error::Error as CycleError,
    prelude::*,
};

/// Shortest pause after being rate-limited.
pub const MIN_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Escalate the logging every this many failures in a row.
const FAILURE_STREAK_ESCALATION: u32 = 10;

#[allow(async_fn_in_trait)]
pub trait Cycle {
    async fn run(&mut self, now: DateTime<Utc>) -> Result;
}

/// Assemble the batch, publish it, and ping the heartbeat.
pub struct Publishing {
    pub assembler: Assembler,
    pub publisher: new_relic::Api,
    pub heartbeat: heartbeat::Client,
}

impl Cycle for Publishing {
    async fn run(&mut self, now: DateTime<Utc>) -> Result {
        let batch = self.assembler.assemble(now).await?;
        self.publisher.publish(&batch).await?;
        self.heartbeat.send().await;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Succeeded,
    Failed,
    RateLimited,
}

/// Source of the wall-clock time the cycles get scheduled by.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Copy, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct PollLoop<C, K = SystemClock> {
    cycle: C,
    clock: K,
    interval: Duration,
    align_to_minute: bool,
    n_consecutive_failures: u32,
}

impl<C: Cycle> PollLoop<C> {
    pub fn new(cycle: C, interval: Duration) -> Self {
        Self::with_clock(cycle, interval, SystemClock)
    }
}

impl<C: Cycle, K: Clock> PollLoop<C, K> {
    pub fn with_clock(cycle: C, interval: Duration, clock: K) -> Self {
        let align_to_minute = !interval.is_zero()
            && interval.subsec_nanos() == 0
            && interval.as_secs().is_multiple_of(60);
        Self { cycle, clock, interval, align_to_minute, n_consecutive_failures: 0 }
    }

    /// Run until the process gets killed.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, align_to_minute = self.align_to_minute, "starting the loop…");
        if self.align_to_minute {
            sleep(until_next_minute(self.clock.now())).await;
        }
        loop {
            let (outcome, pause) = self.step().await;
            debug!(?outcome, ?pause, "sleeping…");
            sleep(pause).await;
            if outcome == Outcome::RateLimited && self.align_to_minute {
                sleep(until_next_minute(self.clock.now())).await;
            }
        }
    }

    /// Run a single cycle and return how long to sleep afterwards.
    pub async fn step(&mut self) -> (Outcome, Duration) {
        let started_at = self.clock.now();
        let result = self.cycle.run(started_at).await;
        let elapsed = self.clock.now() - started_at;
        let outcome = self.record(result);
        let pause = match outcome {
            Outcome::RateLimited => remaining(backoff(self.interval), elapsed),
            Outcome::Succeeded | Outcome::Failed => remaining(self.interval, elapsed),
        };
        (outcome, pause)
    }

    fn record(&mut self, result: Result) -> Outcome {
        let error = match result {
            Ok(()) => {
                if self.n_consecutive_failures != 0 {
                    info!(n_failures = self.n_consecutive_failures, "recovered");
                }
                self.n_consecutive_failures = 0;
                info!("cycle succeeded");
                return Outcome::Succeeded;
            }
            Err(error) => error,
        };

        self.n_consecutive_failures += 1;
        let n_failures = self.n_consecutive_failures;
        if n_failures.is_multiple_of(FAILURE_STREAK_ESCALATION) {
            error!(n_failures, "no successful cycle for a while, check the gateway and the APIs");
        }
        if is_rate_limited(&error) {
            warn!(n_failures, backoff = ?backoff(self.interval), "rate-limited: {error:#}");
            Outcome::RateLimited
        } else {
            error!(n_failures, "cycle failed: {error:#}");
            Outcome::Failed
        }
    }
}

/// Pause after being rate-limited, counted from the cycle start.
pub fn backoff(interval: Duration) -> Duration {
    max(MIN_BACKOFF, interval.saturating_mul(3))
}

/// Time left from `target` after `elapsed`, never negative.
///
/// Negative `elapsed` comes from the wall clock going backwards and counts as zero.
pub fn remaining(target: Duration, elapsed: TimeDelta) -> Duration {
    target.saturating_sub(elapsed.to_std().unwrap_or(Duration::ZERO))
}

pub fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    if into_minute.is_zero() { Duration::ZERO } else { Duration::from_secs(60) - into_minute }
}

/// Look for a rate limit anywhere in the error chain, or at least in the message.
pub fn is_rate_limited(error: &Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<CycleError>().is_some_and(CycleError::is_rate_limited)
    }) || format!("{error:#}").to_lowercase().contains("too many requests")
}
