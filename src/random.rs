//! Injectable randomness for fallback replies and typing delays.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use rand::Rng;

/// Source of uniform draws. Shared across reply tasks, hence `&self`.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. Callers never pass `len == 0`.
    fn index(&self, len: usize) -> usize;
    /// Uniform fraction in `[0.0, 1.0)`.
    fn fraction(&self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len.max(1))
    }

    fn fraction(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Scripted source: replays queued indices and fractions, then falls back to
/// `0` / `0.0` once a queue runs dry. Indices are reduced modulo `len`.
#[derive(Debug, Default)]
pub struct SequenceRandom {
    indices: Mutex<VecDeque<usize>>,
    fractions: Mutex<VecDeque<f64>>,
}

impl SequenceRandom {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: Mutex::new(indices.into_iter().collect()),
            fractions: Mutex::new(VecDeque::new()),
        }
    }

    /// Builder: queue fractions used for delay draws.
    pub fn with_fractions(self, fractions: impl IntoIterator<Item = f64>) -> Self {
        self.fractions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(fractions);
        self
    }
}

impl RandomSource for SequenceRandom {
    fn index(&self, len: usize) -> usize {
        let next = self
            .indices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0);
        next % len.max(1)
    }

    fn fraction(&self) -> f64 {
        self.fractions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }
}
