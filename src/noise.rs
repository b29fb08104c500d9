//! Noise Source Module
//!
//! White and pink noise generation for the voice mixer. White noise is a
//! uniform draw in [-1, 1]; pink noise runs the white samples through
//! Kellett's bank of one-pole accumulators for a -3 dB/octave slope, which
//! sits much more comfortably under pads and ambient textures.
//!
//! Every source owns a seeded [`SmallRng`] so that a render driven by the
//! same command sequence is bit-identical across runs.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Noise spectrum selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoiseColor {
    /// Equal energy per Hz
    #[default]
    White,

    /// Equal energy per octave (-3 dB/octave)
    Pink,
}

/// Seeded noise generator with selectable color.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    /// Current spectrum
    color: NoiseColor,

    /// Deterministic generator; seeded at construction
    rng: SmallRng,

    /// Kellett filter accumulators
    b0: f32,
    b1: f32,
    b2: f32,
    b3: f32,
    b4: f32,
    b5: f32,
    b6: f32,
}

impl NoiseSource {
    /// Creates a new noise source with the given color and seed.
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            rng: SmallRng::seed_from_u64(seed),
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            b3: 0.0,
            b4: 0.0,
            b5: 0.0,
            b6: 0.0,
        }
    }

    /// Sets the noise color.
    pub fn set_color(&mut self, color: NoiseColor) {
        self.color = color;
    }

    /// Generates the next noise sample.
    pub fn process(&mut self) -> f32 {
        let white = self.rng.gen::<f32>() * 2.0 - 1.0;

        match self.color {
            NoiseColor::White => white,

            NoiseColor::Pink => {
                // Kellett's refined pink filter: six leaky accumulators plus
                // a one-sample tap, summed and gain-compensated.
                self.b0 = 0.99886 * self.b0 + white * 0.0555179;
                self.b1 = 0.99332 * self.b1 + white * 0.0750759;
                self.b2 = 0.96900 * self.b2 + white * 0.1538520;
                self.b3 = 0.86650 * self.b3 + white * 0.3104856;
                self.b4 = 0.55000 * self.b4 + white * 0.5329522;
                self.b5 = -0.7616 * self.b5 - white * 0.0168980;
                let pink = self.b0
                    + self.b1
                    + self.b2
                    + self.b3
                    + self.b4
                    + self.b5
                    + self.b6
                    + white * 0.5362;
                self.b6 = white * 0.115926;
                pink * 0.11
            }
        }
    }

    /// Zeros the pink filter state. The generator sequence is untouched.
    pub fn reset(&mut self) {
        self.b0 = 0.0;
        self.b1 = 0.0;
        self.b2 = 0.0;
        self.b3 = 0.0;
        self.b4 = 0.0;
        self.b5 = 0.0;
        self.b6 = 0.0;
    }
}
