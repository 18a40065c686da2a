use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Source of randomness for identities and renewal jitter.
pub trait RandomSource: Send + Sync + std::fmt::Debug {
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Uniform value in `0..bound`. `bound` must be non-zero.
    fn below(&self, bound: u64) -> u64;
}

/// Thread-local generator seeded by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }

    fn below(&self, bound: u64) -> u64 {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Deterministic generator, so tests can replay identities and jitter.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }

    fn below(&self, bound: u64) -> u64 {
        self.rng.lock().gen_range(0..bound)
    }
}
