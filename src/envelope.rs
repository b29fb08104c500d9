//! Envelope Module
//!
//! Exponential ADSR envelope generator. Each stage runs a one-pole approach
//! toward its target (attack toward 1, decay toward the sustain level,
//! release toward 0), which gives the curved, analog-style contour that a
//! linear ramp cannot.

use serde::{Deserialize, Serialize};

/// Attack level at which the envelope hands over to decay.
const ATTACK_DONE: f32 = 0.999;

/// Closeness threshold for the decay-to-sustain transition.
const DECAY_DONE: f32 = 1e-3;

/// Floor below which a releasing envelope snaps to zero and goes idle.
const RELEASE_FLOOR: f32 = 1e-3;

/// Stage times at or below this are treated as instant.
const INSTANT_TIME: f32 = 1e-4;

/// Enumeration of envelope stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// At zero, producing no output
    Idle,

    /// Rising toward peak
    Attack,

    /// Falling toward the sustain level
    Decay,

    /// Holding at the sustain level
    Sustain,

    /// Falling back to zero
    Release,
}

/// Timing and level configuration for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Attack time in seconds
    pub attack: f32,

    /// Decay time in seconds
    pub decay: f32,

    /// Sustain level (0.0 to 1.0)
    pub sustain: f32,

    /// Release time in seconds
    pub release: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

/// Exponential ADSR envelope generator.
///
/// Each stage's one-pole coefficient is `1 - exp(-5 / (T * sample_rate))`
/// for stage time `T`, so the level covers ~99% of the distance to its
/// target within the nominal stage time. A stage time at or below 0.1 ms is
/// treated as instant.
///
/// `note_on` forces the attack stage from any state without resetting the
/// level, which is what makes retriggering click-free: the attack pole
/// simply continues from wherever the level currently sits. `note_off`
/// likewise switches straight to release without re-anchoring.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    /// Current stage
    stage: EnvelopeStage,

    /// Current output level (0.0 to 1.0)
    level: f32,

    /// Sustain target level
    sustain: f32,

    /// Per-stage one-pole coefficients
    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,

    /// Sample rate for coefficient derivation
    sample_rate: f32,
}

impl AdsrEnvelope {
    /// Creates a new envelope in the idle state.
    pub fn new(config: EnvelopeConfig, sample_rate: f32) -> Self {
        let mut env = Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            sustain: 0.0,
            attack_coeff: 1.0,
            decay_coeff: 1.0,
            release_coeff: 1.0,
            sample_rate,
        };
        env.set_config(config);
        env
    }

    /// Applies new timing without touching the level or stage.
    ///
    /// Safe to call on a sounding envelope; only coefficients change.
    pub fn set_config(&mut self, config: EnvelopeConfig) {
        self.sustain = config.sustain.clamp(0.0, 1.0);
        self.attack_coeff = stage_coefficient(config.attack, self.sample_rate);
        self.decay_coeff = stage_coefficient(config.decay, self.sample_rate);
        self.release_coeff = stage_coefficient(config.release, self.sample_rate);
    }

    /// Forces the attack stage. Retriggers from the current level.
    pub fn note_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Forces the release stage from any non-idle state.
    pub fn note_off(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Advances the envelope one sample and returns the new level.
    pub fn process(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                self.level += self.attack_coeff * (1.0 - self.level);
                if self.level >= ATTACK_DONE {
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                self.level += self.decay_coeff * (self.sustain - self.level);
                if (self.level - self.sustain).abs() < DECAY_DONE {
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                // Track the sustain target so a hot-swapped sustain level
                // ramps instead of stepping.
                self.level += self.decay_coeff * (self.sustain - self.level);
            }

            EnvelopeStage::Release => {
                self.level += self.release_coeff * (0.0 - self.level);
                if self.level < RELEASE_FLOOR {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }

    /// Gets the current level without advancing.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Gets the current stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// True while the envelope produces output.
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    /// True while the envelope is releasing.
    pub fn is_in_release(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    /// Returns the envelope to idle at zero level.
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }
}

/// One-pole coefficient for a stage of time `t` seconds.
fn stage_coefficient(t: f32, sample_rate: f32) -> f32 {
    if t <= INSTANT_TIME {
        1.0
    } else {
        1.0 - (-5.0 / (t * sample_rate)).exp()
    }
}
