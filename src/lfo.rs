//! LFO (Low-Frequency Oscillator) Module
//!
//! Control-rate modulation sources for the voice. Two LFOs feed the
//! modulation matrix, where their bipolar output can be routed to pitch,
//! filter cutoff, pulse width and the other fixed destinations.
//!
//! # Waveforms
//!
//! - **Sine**: smooth vibrato and drift
//! - **Triangle**: linear back-and-forth sweep
//! - **Saw**: ramp with a reset, for rhythmic falls
//! - **Square**: hard alternation between two values
//! - **SampleHold**: a fresh random value each cycle, the classic burbling
//!   sample-and-hold texture

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Enumeration of LFO waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LfoWaveform {
    /// Smooth sinusoid (cosine phase)
    #[default]
    Sine,

    /// Linear up-down ramp
    Triangle,

    /// Rising ramp with reset
    Saw,

    /// Two-level alternation
    Square,

    /// Random level held for one cycle
    SampleHold,
}

/// Configuration for an LFO instance.
#[derive(Debug, Clone, Copy)]
pub struct LfoConfig {
    /// Waveform shape
    pub waveform: LfoWaveform,

    /// Rate in Hz
    pub rate: f32,

    /// Sample rate of the audio system
    pub sample_rate: f32,
}

impl Default for LfoConfig {
    fn default() -> Self {
        Self {
            waveform: LfoWaveform::Sine,
            rate: 2.0,
            sample_rate: 48000.0,
        }
    }
}

/// Low-frequency oscillator with bipolar output in [-1, 1].
///
/// Phase is unipolar in [0, 1), stepped by `rate / sample_rate` per sample.
/// The sample-and-hold waveform draws from a seeded generator so renders
/// stay deterministic.
#[derive(Debug, Clone)]
pub struct Lfo {
    /// Current phase (0.0 to 1.0)
    phase: f64,

    /// Phase increment per sample
    increment: f64,

    /// Current waveform
    waveform: LfoWaveform,

    /// Held value for the sample-and-hold waveform
    held: f32,

    /// Most recent output
    current: f32,

    /// Generator for sample-and-hold draws
    rng: SmallRng,

    /// Sample rate for increment derivation
    sample_rate: f64,
}

impl Lfo {
    /// Creates a new LFO with the given configuration and seed.
    pub fn with_config(config: LfoConfig, seed: u64) -> Self {
        let mut lfo = Self {
            phase: 0.0,
            increment: 0.0,
            waveform: config.waveform,
            held: 0.0,
            current: 0.0,
            rng: SmallRng::seed_from_u64(seed),
            sample_rate: config.sample_rate as f64,
        };
        lfo.set_rate(config.rate);
        lfo
    }

    /// Sets the LFO rate in Hz.
    pub fn set_rate(&mut self, rate: f32) {
        self.increment = (rate.max(0.0) as f64 / self.sample_rate).min(0.5);
    }

    /// Sets the waveform shape.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Advances the LFO one sample and returns the new bipolar value.
    pub fn process(&mut self) -> f32 {
        let p = self.phase;

        self.current = match self.waveform {
            LfoWaveform::Sine => (p * TAU).cos() as f32,

            LfoWaveform::Triangle => {
                if p < 0.5 {
                    (4.0 * p - 1.0) as f32
                } else {
                    (-4.0 * p + 3.0) as f32
                }
            }

            LfoWaveform::Saw => (2.0 * p - 1.0) as f32,

            LfoWaveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }

            LfoWaveform::SampleHold => {
                // A cycle start is the one sample where phase sits inside
                // the first increment; draw a fresh value there.
                if p < self.increment {
                    self.held = self.rng.gen::<f32>() * 2.0 - 1.0;
                }
                self.held
            }
        };

        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        self.current
    }

    /// Gets the most recent output without advancing.
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Resets phase and held state.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.held = 0.0;
        self.current = 0.0;
    }
}
