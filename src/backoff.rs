//! Delays between the reconnect attempts of a gateway client.
//!
//! Every delay is picked at random below a ceiling. The ceiling starts at
//! [`ReconnectConfig::base_ms`] and doubles with each failed attempt until it reaches
//! [`ReconnectConfig::max_ms`].

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

pub(crate) struct Backoff {
    base: Duration,
    max: Duration,

    /// Failed attempts since a session was last established.
    failures: u32,
}

impl Backoff {
    pub(crate) fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            max: Duration::from_millis(config.max_ms),
            failures: 0,
        }
    }

    fn ceiling(&self) -> Duration {
        let factor = 1u32.checked_shl(self.failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |ceiling| ceiling.min(self.max))
    }

    /// Picks the delay before the next attempt & counts the attempt as failed.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = rand::thread_rng().gen_range(Duration::ZERO..=self.ceiling());
        self.failures = self.failures.saturating_add(1);
        delay
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.failures
    }

    /// Called on READY & RESUMED.
    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }
}
