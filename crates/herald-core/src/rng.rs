//! Seeded pseudo-random stream with a replayable draw log.
//!
//! Generative sources draw from the engine's generator rather than from a
//! process-global one, so a run can be reproduced by reseeding with the
//! logged seed and replaying the same polls. The generator is a 32-bit
//! linear congruential generator:
//!
//! ```text
//! state = (1664525 * state + 1013904223) mod 2^32
//! draw  = state / 2^32
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use herald_types::RngLog;

/// LCG multiplier.
const LCG_MULTIPLIER: u32 = 1_664_525;

/// LCG increment.
const LCG_INCREMENT: u32 = 1_013_904_223;

/// `2^32`, the modulus used to normalize draws into `[0, 1)`.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// A seeded LCG that records every draw it hands out.
#[derive(Debug, Clone, PartialEq)]
pub struct SeededRng {
    /// Seed the generator was last started from.
    seed: u32,
    /// Current state register.
    state: u32,
    /// Every draw since the last reseed.
    draws: Vec<f64>,
}

impl SeededRng {
    /// Create a generator starting from `seed` with an empty log.
    pub const fn new(seed: u32) -> Self {
        Self {
            seed,
            state: seed,
            draws: Vec::new(),
        }
    }

    /// Restart from `seed` and clear the draw log.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.state = seed;
        self.draws.clear();
    }

    /// Advance the generator and return the next draw in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        let draw = f64::from(self.state) / TWO_POW_32;
        self.draws.push(draw);
        draw
    }

    /// Seed and draws taken so far.
    pub fn log(&self) -> RngLog {
        RngLog {
            seed: self.seed,
            draws: self.draws.clone(),
        }
    }

    /// The current seed.
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of draws since the last reseed.
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }
}

/// Shared handle to the engine's generator.
///
/// The engine owns the generator; sources receive a clone of this handle in
/// their poll context so their draws land in the same log.
#[derive(Debug, Clone)]
pub struct RngHandle {
    inner: Arc<Mutex<SeededRng>>,
}

impl RngHandle {
    /// Wrap a fresh generator starting from `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SeededRng::new(seed))),
        }
    }

    /// Draw the next value in `[0, 1)`.
    pub fn random(&self) -> f64 {
        self.with(SeededRng::random)
    }

    /// Reseed and clear the draw log.
    pub fn set_seed(&self, seed: u32) {
        self.with(|rng| rng.set_seed(seed));
    }

    /// Snapshot the seed and draw log.
    pub fn log(&self) -> RngLog {
        self.with(|rng| rng.log())
    }

    /// The current seed.
    pub fn seed(&self) -> u32 {
        self.with(|rng| rng.seed())
    }

    /// Number of draws since the last reseed.
    pub fn draw_count(&self) -> usize {
        self.with(|rng| rng.draw_count())
    }

    /// Draw an index in `0..len`, or `None` when `len` is zero.
    ///
    /// Convenience for generative sources picking from a table.
    pub fn pick_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let draw = self.random();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let idx = (draw * len as f64) as usize;
        Some(idx.min(len.saturating_sub(1)))
    }

    fn with<T>(&self, f: impl FnOnce(&mut SeededRng) -> T) -> T {
        // A panic while holding the lock cannot leave the LCG half-updated,
        // so a poisoned guard is still usable.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
