use std::time::Duration;

use backon::BackoffBuilder;
use rand::Rng;

/// Capped exponential backoff with subtractive jitter
///
/// Every delay is drawn from `[base * (1 - jitter), base]`, where `base` starts at
/// `min_delay` and is multiplied by `factor` after each attempt until it reaches
/// `max_delay`. As long as `jitter < 1 - 1 / factor` consecutive delays below the cap
/// strictly increase. The sequence never ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultBackoff {
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: f64,
}

impl Default for DefaultBackoff {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: 0.25,
        }
    }
}

impl DefaultBackoff {
    /// Delay before the first retry
    #[must_use]
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Upper bound of every delay
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Growth factor between attempts, at least 1
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor.max(1.0);
        self
    }

    /// Fraction of each delay that may be cut off at random, within `[0, 1)`
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.99);
        self
    }

    /// The configured cap
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl BackoffBuilder for DefaultBackoff {
    type Backoff = JitteredBackoff;

    fn build(self) -> Self::Backoff {
        JitteredBackoff {
            config: self,
            base: None,
        }
    }
}

/// The delay sequence produced by [`DefaultBackoff`]
#[derive(Debug)]
pub struct JitteredBackoff {
    config: DefaultBackoff,
    base: Option<Duration>,
}

impl Iterator for JitteredBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let DefaultBackoff {
            min_delay,
            max_delay,
            factor,
            jitter,
        } = self.config;
        let base = match self.base {
            None => min_delay.min(max_delay),
            Some(prev) => prev.mul_f64(factor).min(max_delay),
        };
        self.base = Some(base);
        if jitter <= 0.0 {
            return Some(base);
        }
        let cut = rand::rng().random_range(0.0..jitter);
        Some(base.mul_f64(1.0 - cut))
    }
}

/// A [`Backoff`](backon::Backoff) that starts over from the first delay after [`reset`](Self::reset)
#[derive(Debug)]
pub struct ResettableBackoff<B: BackoffBuilder> {
    builder: B,
    current: Option<B::Backoff>,
}

impl<B: BackoffBuilder> ResettableBackoff<B> {
    /// Wrap a backoff builder
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            current: None,
        }
    }
}

impl<B: BackoffBuilder + Clone> ResettableBackoff<B> {
    /// Forget every attempt made so far
    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl<B: BackoffBuilder + Clone> Iterator for ResettableBackoff<B> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.current
            .get_or_insert_with(|| self.builder.clone().build())
            .next()
    }
}
