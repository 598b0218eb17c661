// Delays inserted before paced announcements so the review reveal reads like
// a reveal instead of a wall of text.

use std::time::Duration;

use rand::Rng;

pub trait Pacer: Send {
    fn delay(&mut self) -> Duration;
}

/// No delay at all. Used in deterministic mode and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn delay(&mut self) -> Duration {
        Duration::ZERO
    }
}

/// Uniformly random delay in `[0, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomPacing {
    max: Duration,
}

impl RandomPacing {
    pub fn new(max: Duration) -> Self {
        RandomPacing { max }
    }
}

impl Pacer for RandomPacing {
    fn delay(&mut self) -> Duration {
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// Pick the pacing strategy for the configured mode.
pub fn from_config(deterministic: bool, max_ms: u64) -> Box<dyn Pacer> {
    if deterministic {
        Box::new(NoPacing)
    } else {
        Box::new(RandomPacing::new(Duration::from_millis(max_ms)))
    }
}
