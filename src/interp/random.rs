//! Random number source shared by every evaluator
//!
//! All draws go through one `StdRng` behind a mutex, so a seeded source yields
//! a reproducible sequence no matter how many interpreters share it.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::value::Value;
use crate::diagnostics::{EvalError, Result};

static SHARED: OnceLock<Arc<RandomSource>> = OnceLock::new();

/// Seedable uniform random source
#[derive(Debug)]
pub struct RandomSource {
    rng: Mutex<StdRng>,
}

impl RandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The process-wide source, created from entropy on first use
    pub fn shared() -> Arc<RandomSource> {
        SHARED
            .get_or_init(|| Arc::new(RandomSource::from_entropy()))
            .clone()
    }

    /// Install a seeded process-wide source. Has no effect once `shared` has
    /// been called; returns whether the seed took.
    pub fn init_shared(seed: u64) -> bool {
        SHARED.set(Arc::new(RandomSource::seeded(seed))).is_ok()
    }

    /// Restart the sequence from `seed`
    pub fn reseed(&self, seed: u64) {
        tracing::debug!(seed, "reseed random source");
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }

    /// Uniform integer in `low...high`
    pub fn int_inclusive(&self, low: i64, high: i64) -> Result<i64> {
        if low > high {
            return Err(EvalError::range(format!("{}...{}", low, high)));
        }
        Ok(self.rng.lock().gen_range(low..=high))
    }

    /// Uniform integer in `low..<high`
    pub fn int_half_open(&self, low: i64, high: i64) -> Result<i64> {
        if low >= high {
            return Err(EvalError::range(format!("{}..<{}", low, high)));
        }
        Ok(self.rng.lock().gen_range(low..high))
    }

    /// Uniform float in `low..<high`; `high` itself is never produced
    pub fn float_half_open(&self, low: f64, high: f64) -> Result<f64> {
        check_float_bounds(low, high, "..<")?;
        if low >= high {
            return Err(EvalError::range(format!("{:?}..<{:?}", low, high)));
        }
        Ok(self.rng.lock().gen_range(low..high))
    }

    /// Uniform float in `low...high`
    pub fn float_closed(&self, low: f64, high: f64) -> Result<f64> {
        check_float_bounds(low, high, "...")?;
        if low > high {
            return Err(EvalError::range(format!("{:?}...{:?}", low, high)));
        }
        Ok(self.rng.lock().gen_range(low..=high))
    }

    /// Uniform element of `items`, or `None` when empty
    pub fn choose(&self, items: &[Value]) -> Option<Value> {
        items.choose(&mut *self.rng.lock()).cloned()
    }

    /// Permute `items` in place
    pub fn shuffle(&self, items: &mut [Value]) {
        items.shuffle(&mut *self.rng.lock());
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

fn check_float_bounds(low: f64, high: f64, op: &str) -> Result<()> {
    if !low.is_finite() || !high.is_finite() || !(high - low).is_finite() {
        return Err(EvalError::range(format!("{:?}{}{:?}", low, op, high)));
    }
    Ok(())
}
