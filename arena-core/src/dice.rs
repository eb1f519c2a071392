//! Random sources for combat.
//!
//! Every engine owns its own [`Dice`]. Production code wraps a `rand` RNG in
//! [`RngDice`]; tests either seed one or script exact rolls with
//! [`ScriptedDice`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Source of the two kinds of randomness combat needs.
pub trait Dice {
    /// A uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// A uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize;

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// A uniform value in `[low, high)`.
    fn between(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.unit()
    }
}

impl<D: Dice + ?Sized> Dice for &mut D {
    fn unit(&mut self) -> f64 {
        (**self).unit()
    }

    fn index(&mut self, len: usize) -> usize {
        (**self).index(len)
    }
}

impl<D: Dice + ?Sized> Dice for Box<D> {
    fn unit(&mut self) -> f64 {
        (**self).unit()
    }

    fn index(&mut self, len: usize) -> usize {
        (**self).index(len)
    }
}

// ============================================================================
// RNG-backed dice
// ============================================================================

/// Dice backed by any `rand` RNG.
#[derive(Debug, Clone)]
pub struct RngDice<R = StdRng> {
    rng: R,
}

impl<R: Rng> RngDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngDice<StdRng> {
    /// Deterministic dice for reproducible matches and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl Default for RngDice<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl<R: Rng> Dice for RngDice<R> {
    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

// ============================================================================
// Scripted dice
// ============================================================================

/// Dice that replay queued values.
///
/// Once a queue runs dry the dice fall back to `0.5` for units and `0` for
/// indices. A unit of `0.5` never dodges or crits at normal stats and gives a
/// damage variance factor of exactly `1.0`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    units: VecDeque<f64>,
    indices: VecDeque<usize>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.extend(units);
        self
    }

    pub fn with_indices(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.indices.extend(indices);
        self
    }

    pub fn push_unit(&mut self, unit: f64) {
        self.units.push_back(unit);
    }

    pub fn push_index(&mut self, index: usize) {
        self.indices.push_back(index);
    }
}

impl Dice for ScriptedDice {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(0.5)
    }

    fn index(&mut self, len: usize) -> usize {
        self.indices.pop_front().unwrap_or(0) % len.max(1)
    }
}
