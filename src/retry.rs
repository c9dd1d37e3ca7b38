use std::{ops::RangeInclusive, time::Duration};

use rand::Rng;
use tokio::time::sleep;

use crate::{error::Error, prelude::*};

/// Bounded retry with a uniformly random wait between the attempts.
#[must_use]
#[derive(Clone, Debug)]
pub struct Retry {
    max_attempts: u32,
    wait: RangeInclusive<Duration>,
}

impl Retry {
    pub const fn new(max_attempts: u32, wait: RangeInclusive<Duration>) -> Self {
        Self { max_attempts, wait }
    }

    /// Policy for the gateway and the weather: it is slow to respond and rate-limits early.
    pub const fn patient() -> Self {
        Self::new(7, Duration::from_secs(3)..=Duration::from_secs(7))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && error.is_transient() => {
                    let wait = self.jitter();
                    warn!(attempt, max_attempts = self.max_attempts, ?wait, "{error}, retrying…");
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn jitter(&self) -> Duration {
        rand::rng().random_range(self.wait.clone())
    }
}
