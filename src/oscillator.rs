//! Oscillator Module
//!
//! This module provides the band-limited oscillator used as the tonal core of
//! every synthesis voice. Each voice owns two of these plus a noise source;
//! their mixed output feeds the state-variable filter.
//!
//! # Waveforms
//!
//! Four classic shapes are supported:
//! - **Sine**: pure tone, no correction needed
//! - **Saw**: all harmonics, the brightest of the set
//! - **Square**: odd harmonics, with a variable pulse width
//! - **Triangle**: odd harmonics with steep rolloff, soft character
//!
//! # Anti-aliasing
//!
//! Saw and square are generated naively and then corrected with a PolyBLEP
//! residual at each discontinuity, which attenuates the aliasing that a naive
//! waveform sprays across the spectrum at higher pitches. Triangle is derived
//! by leaky integration of the band-limited square, so it inherits the
//! correction. Phase runs in double precision so that long renders at low
//! frequencies do not accumulate drift.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Enumeration of supported oscillator waveforms.
///
/// The waveform is a plain tag consumed inside [`Oscillator::process`]; the
/// hot loop stays monomorphic and free of indirect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    /// Pure sine wave (cosine phase), fundamental only
    #[default]
    Sine,

    /// Sawtooth wave, ramping from -1 to +1 once per cycle
    Saw,

    /// Square wave with variable pulse width
    Square,

    /// Triangle wave, integrated from the band-limited square
    Triangle,
}

/// Configuration for an oscillator instance.
#[derive(Debug, Clone, Copy)]
pub struct OscillatorConfig {
    /// Waveform shape to generate
    pub waveform: Waveform,

    /// Fundamental frequency in Hz
    pub frequency: f32,

    /// Pulse width for the square waveform (0.05 to 0.95)
    pub pulse_width: f32,

    /// Sample rate of the audio system
    pub sample_rate: f32,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 440.0,
            pulse_width: 0.5,
            sample_rate: 48000.0,
        }
    }
}

/// Band-limited oscillator with PolyBLEP correction.
///
/// Internal state is a double-precision phase in [0, 1) and the per-sample
/// increment `frequency / sample_rate`. Frequency is clamped to Nyquist
/// before the increment is recomputed, so the increment never exceeds 0.5.
///
/// # Example
///
/// ```rust
/// use halcyon::oscillator::{Oscillator, OscillatorConfig, Waveform};
///
/// let mut osc = Oscillator::with_config(OscillatorConfig {
///     waveform: Waveform::Saw,
///     frequency: 220.0,
///     sample_rate: 48000.0,
///     ..Default::default()
/// });
/// let sample = osc.process();
/// assert!(sample >= -1.0 && sample <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Current phase position within the cycle (0.0 to 1.0)
    phase: f64,

    /// Phase increment per sample (frequency / sample_rate)
    increment: f64,

    /// Current waveform type
    waveform: Waveform,

    /// Pulse width for the square waveform
    pulse_width: f64,

    /// Leaky-integrator state for the triangle waveform
    tri_state: f64,

    /// Sample rate for increment calculations
    sample_rate: f64,
}

impl Oscillator {
    /// Creates a new oscillator with the given configuration.
    pub fn with_config(config: OscillatorConfig) -> Self {
        let mut osc = Self {
            phase: 0.0,
            increment: 0.0,
            waveform: config.waveform,
            pulse_width: 0.5,
            tri_state: 0.0,
            sample_rate: config.sample_rate as f64,
        };
        osc.set_pulse_width(config.pulse_width);
        osc.set_frequency(config.frequency);
        osc
    }

    /// Creates a new oscillator with default configuration (440 Hz sine).
    pub fn new(sample_rate: f32) -> Self {
        Self::with_config(OscillatorConfig {
            sample_rate,
            ..Default::default()
        })
    }

    /// Sets the oscillator frequency.
    ///
    /// The frequency is clamped to Nyquist before the phase increment is
    /// recomputed, so a runaway pitch modulation cannot fold the waveform.
    ///
    /// # Arguments
    ///
    /// * `frequency` - New frequency in Hz
    pub fn set_frequency(&mut self, frequency: f32) {
        let nyquist = self.sample_rate * 0.5;
        let clamped = (frequency as f64).clamp(0.0, nyquist);
        self.increment = clamped / self.sample_rate;
    }

    /// Sets the oscillator waveform type.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Sets the square pulse width, clamped to [0.05, 0.95].
    pub fn set_pulse_width(&mut self, pulse_width: f32) {
        self.pulse_width = (pulse_width as f64).clamp(0.05, 0.95);
    }

    /// Gets the current pulse width.
    pub fn pulse_width(&self) -> f32 {
        self.pulse_width as f32
    }

    /// Resets phase and integrator state to the starting position.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.tri_state = 0.0;
    }

    /// Generates the next sample and advances the phase.
    ///
    /// # Returns
    ///
    /// The next sample value in [-1, 1]
    pub fn process(&mut self) -> f32 {
        let t = self.phase;
        let dt = self.increment;

        let sample = match self.waveform {
            Waveform::Sine => (t * TAU).cos(),

            Waveform::Saw => {
                let naive = 2.0 * t - 1.0;
                naive - poly_blep(t, dt)
            }

            Waveform::Square => self.blep_square(t, dt),

            Waveform::Triangle => {
                // Leaky integration of the band-limited square. The 4*dt gain
                // normalizes amplitude across pitches; (1 - dt) damping keeps
                // the integrator from collecting DC.
                let square = self.blep_square(t, dt);
                self.tri_state = 4.0 * dt * square + (1.0 - dt) * self.tri_state;
                self.tri_state
            }
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample as f32
    }

    /// Band-limited square: one BLEP at the rising edge, one at the falling
    /// edge placed by the pulse width.
    fn blep_square(&self, t: f64, dt: f64) -> f64 {
        let naive = if t < self.pulse_width { 1.0 } else { -1.0 };
        let fall = wrap_unit(t + 1.0 - self.pulse_width);
        naive + poly_blep(t, dt) - poly_blep(fall, dt)
    }
}

/// PolyBLEP residual for a unit step discontinuity at phase 0.
///
/// Returns the two-sample polynomial correction when `t` falls inside one
/// increment of the wrap point, zero elsewhere.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// Wraps a phase value into [0, 1).
fn wrap_unit(t: f64) -> f64 {
    if t >= 1.0 {
        t - 1.0
    } else {
        t
    }
}

/// Converts a MIDI-style note number to frequency.
///
/// Note 69 (concert A) corresponds to 440 Hz.
///
/// # Example
///
/// ```rust
/// use halcyon::oscillator::note_to_frequency;
///
/// assert!((note_to_frequency(69) - 440.0).abs() < 0.001);
/// assert!((note_to_frequency(60) - 261.63).abs() < 0.1);
/// ```
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

/// Converts a semitone offset (fractional allowed) to a frequency ratio.
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0f32.powf(semitones / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(osc: &mut Oscillator, n: usize) -> Vec<f32> {
        (0..n).map(|_| osc.process()).collect()
    }

    #[test]
    fn test_note_to_frequency() {
        assert!((note_to_frequency(69) - 440.0).abs() < 0.001);
        assert!((note_to_frequency(57) - 220.0).abs() < 0.001);
        assert!((note_to_frequency(72) - 523.25).abs() < 0.1);
    }

    #[test]
    fn test_semitones_to_ratio() {
        assert!((semitones_to_ratio(12.0) - 2.0).abs() < 1e-6);
        assert!((semitones_to_ratio(0.0) - 1.0).abs() < 1e-6);
        assert!((semitones_to_ratio(-12.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sine_starts_at_peak() {
        // Cosine phase: first sample of a fresh oscillator is +1
        let mut osc = Oscillator::new(48000.0);
        let first = osc.process();
        assert!((first - 1.0).abs() < 1e-6, "Expected cos(0)=1, got {}", first);
    }

    #[test]
    fn test_all_waveforms_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            let mut osc = Oscillator::with_config(OscillatorConfig {
                waveform,
                frequency: 2000.0,
                sample_rate: 48000.0,
                ..Default::default()
            });
            for (i, s) in render(&mut osc, 48000).iter().enumerate() {
                assert!(
                    s.abs() <= 1.2,
                    "{:?} sample {} out of bounds: {}",
                    waveform,
                    i,
                    s
                );
            }
        }
    }

    #[test]
    fn test_saw_cycle_count() {
        let sample_rate = 48000.0;
        let freq = 100.0;
        let mut osc = Oscillator::with_config(OscillatorConfig {
            waveform: Waveform::Saw,
            frequency: freq,
            sample_rate,
            ..Default::default()
        });

        // Count wrap points (large downward jumps) over one second
        let samples = render(&mut osc, sample_rate as usize);
        let wraps = samples.windows(2).filter(|w| w[1] - w[0] < -1.0).count();
        assert!(
            (wraps as i32 - freq as i32).abs() <= 1,
            "Expected ~{} saw cycles, counted {}",
            freq,
            wraps
        );
    }

    #[test]
    fn test_frequency_clamped_to_nyquist() {
        let mut osc = Oscillator::new(48000.0);
        osc.set_frequency(96000.0);
        for _ in 0..1000 {
            let s = osc.process();
            assert!(s.is_finite());
        }
        assert!(osc.increment <= 0.5);
    }

    #[test]
    fn test_pulse_width_clamping() {
        let mut osc = Oscillator::new(48000.0);
        osc.set_pulse_width(0.0);
        assert!((osc.pulse_width() - 0.05).abs() < 1e-6);
        osc.set_pulse_width(1.0);
        assert!((osc.pulse_width() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_pulse_width_shifts_duty_cycle() {
        let sample_rate = 48000.0;
        let make = |pw: f32| {
            let mut osc = Oscillator::with_config(OscillatorConfig {
                waveform: Waveform::Square,
                frequency: 100.0,
                pulse_width: pw,
                sample_rate,
                ..Default::default()
            });
            let samples = render(&mut osc, 4800);
            samples.iter().filter(|&&s| s > 0.0).count() as f32 / 4800.0
        };

        let narrow = make(0.25);
        let wide = make(0.75);
        assert!(
            (narrow - 0.25).abs() < 0.05,
            "Narrow pulse duty should be ~0.25, got {}",
            narrow
        );
        assert!(
            (wide - 0.75).abs() < 0.05,
            "Wide pulse duty should be ~0.75, got {}",
            wide
        );
    }

    #[test]
    fn test_triangle_no_dc_drift() {
        let sample_rate = 48000.0;
        let mut osc = Oscillator::with_config(OscillatorConfig {
            waveform: Waveform::Triangle,
            frequency: 440.0,
            sample_rate,
            ..Default::default()
        });

        // Skip the integrator settling, then check the mean of one second
        render(&mut osc, 4800);
        let samples = render(&mut osc, sample_rate as usize);
        let mean: f32 = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(
            mean.abs() < 0.05,
            "Triangle should be DC-free, mean = {}",
            mean
        );
    }

    #[test]
    fn test_reset_restarts_cycle() {
        let mut osc = Oscillator::with_config(OscillatorConfig {
            waveform: Waveform::Saw,
            frequency: 440.0,
            sample_rate: 48000.0,
            ..Default::default()
        });

        let first_run = render(&mut osc, 64);
        osc.reset();
        let second_run = render(&mut osc, 64);
        for (i, (a, b)) in first_run.iter().zip(second_run.iter()).enumerate() {
            assert!(
                (a - b).abs() < 1e-9,
                "Reset should restart the cycle, sample {}: {} vs {}",
                i,
                a,
                b
            );
        }
    }

    #[test]
    fn test_polyblep_residual_regions() {
        // Inside one increment of the wrap, the residual is non-zero
        assert!(poly_blep(0.001, 0.01) != 0.0);
        assert!(poly_blep(0.995, 0.01) != 0.0);
        // Far from the wrap it vanishes
        assert_eq!(poly_blep(0.5, 0.01), 0.0);
    }
}
