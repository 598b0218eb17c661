// Presentation-order strategies applied once every song is in.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::game::Participant;

pub trait Shuffler {
    fn shuffle(&mut self, participants: &mut [Participant]);
}

/// Keeps arrival order. Used in deterministic mode and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepOrder;

impl Shuffler for KeepOrder {
    fn shuffle(&mut self, _participants: &mut [Participant]) {}
}

/// Uniform random permutation driven by the wrapped RNG.
#[derive(Debug, Clone)]
pub struct RandomOrder<R> {
    rng: R,
}

impl<R: Rng> RandomOrder<R> {
    pub fn new(rng: R) -> Self {
        RandomOrder { rng }
    }
}

impl RandomOrder<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Shuffler for RandomOrder<R> {
    fn shuffle(&mut self, participants: &mut [Participant]) {
        participants.shuffle(&mut self.rng);
    }
}
