//! Voice Module
//!
//! A voice is one monophonic signal chain: two band-limited oscillators and
//! a noise source mixed into the state-variable filter, shaped by an
//! amplitude envelope, with a second envelope and two LFOs feeding the
//! modulation matrix. Voices are created once at engine init and reused for
//! the lifetime of the pool; a voice is "born" on note-on and "dies" when
//! its amplitude envelope decays to idle.
//!
//! # Rates
//!
//! Envelopes and LFOs advance every sample, but the expensive recomputation
//! (matrix evaluation, oscillator increments, filter targets) runs once per
//! [`CONTROL_RATE_INTERVAL`] samples. The cutoff and resonance smoothers
//! bridge the gap so the filter never steps audibly.

use crate::envelope::AdsrEnvelope;
use crate::filter::StateVariableFilter;
use crate::lfo::{Lfo, LfoConfig};
use crate::modulation::{ModDestination, ModMatrix, ModSource};
use crate::noise::NoiseSource;
use crate::oscillator::{
    note_to_frequency, semitones_to_ratio, Oscillator, OscillatorConfig,
};
use crate::preset::Preset;
use crate::smoothed::SmoothedParam;
use std::f32::consts::FRAC_PI_2;

/// Samples between control-rate updates.
pub const CONTROL_RATE_INTERVAL: u32 = 32;

/// Smoothing time for the filter parameter trackers, in milliseconds.
const FILTER_SMOOTHING_MS: f32 = 2.0;

/// One playing (or idle, reusable) note.
#[derive(Debug, Clone)]
pub struct Voice {
    osc1: Oscillator,
    osc2: Oscillator,
    noise: NoiseSource,
    filter: StateVariableFilter,
    amp_env: AdsrEnvelope,
    filter_env: AdsrEnvelope,
    lfo1: Lfo,
    lfo2: Lfo,
    matrix: ModMatrix,
    cutoff_smoother: SmoothedParam,
    resonance_smoother: SmoothedParam,

    // Values copied from the triggering preset
    osc1_level: f32,
    osc2_level: f32,
    noise_level: f32,
    osc2_semitones: i32,
    osc2_detune: f32,
    base_pulse_width: f32,
    base_cutoff: f32,
    base_resonance: f32,
    filter_env_amount: f32,
    lfo1_to_filter: f32,
    velocity_to_filter: f32,
    priority: u8,

    // Per-note state
    note: u8,
    base_frequency: f32,
    velocity: f32,
    gain: f32,
    pan: f32,
    active: bool,
    note_on_stamp: u32,
    pitch_bend: f32,

    // Control-rate bookkeeping
    control_counter: u32,
    amp_mod: f32,
    current_level: f32,
    sample_rate: f32,
}

impl Voice {
    /// Creates an idle voice.
    ///
    /// The seed decorrelates this voice's noise and sample-and-hold draws
    /// from its pool siblings while keeping every render deterministic.
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        let preset = Preset::default();
        let osc = |waveform| {
            Oscillator::with_config(OscillatorConfig {
                waveform,
                frequency: 440.0,
                pulse_width: preset.pulse_width,
                sample_rate,
            })
        };

        let mut voice = Self {
            osc1: osc(preset.osc1_waveform),
            osc2: osc(preset.osc2_waveform),
            noise: NoiseSource::new(preset.noise_color, seed),
            filter: StateVariableFilter::new(preset.filter_mode, sample_rate),
            amp_env: AdsrEnvelope::new(preset.amp_env, sample_rate),
            filter_env: AdsrEnvelope::new(preset.filter_env, sample_rate),
            lfo1: Lfo::with_config(
                LfoConfig {
                    waveform: preset.lfo1_waveform,
                    rate: preset.lfo1_rate,
                    sample_rate,
                },
                seed.wrapping_mul(0x9e37_79b9).wrapping_add(1),
            ),
            lfo2: Lfo::with_config(
                LfoConfig {
                    waveform: preset.lfo2_waveform,
                    rate: preset.lfo2_rate,
                    sample_rate,
                },
                seed.wrapping_mul(0x9e37_79b9).wrapping_add(2),
            ),
            matrix: ModMatrix::new(),
            cutoff_smoother: SmoothedParam::new(preset.cutoff, FILTER_SMOOTHING_MS, sample_rate),
            resonance_smoother: SmoothedParam::new(
                preset.resonance,
                FILTER_SMOOTHING_MS,
                sample_rate,
            ),
            osc1_level: 0.0,
            osc2_level: 0.0,
            noise_level: 0.0,
            osc2_semitones: 0,
            osc2_detune: 0.0,
            base_pulse_width: 0.5,
            base_cutoff: preset.cutoff,
            base_resonance: preset.resonance,
            filter_env_amount: 0.0,
            lfo1_to_filter: 0.0,
            velocity_to_filter: 0.0,
            priority: 0,
            note: 0,
            base_frequency: 440.0,
            velocity: 0.0,
            gain: 1.0,
            pan: 0.5,
            active: false,
            note_on_stamp: 0,
            pitch_bend: 0.0,
            control_counter: 0,
            amp_mod: 1.0,
            current_level: 0.0,
            sample_rate,
        };
        voice.configure(&preset);
        voice
    }

    /// Applies a preset to this voice.
    ///
    /// When the voice is inactive, DSP history (filter integrators,
    /// oscillator phases, smoothers) is reset so the new note starts clean.
    /// When it is still sounding, only values are touched, never state:
    /// coefficients and targets change, histories survive, and the note
    /// keeps playing without a click.
    pub fn configure(&mut self, preset: &Preset) {
        if !self.active {
            self.filter.reset();
            self.osc1.reset();
            self.osc2.reset();
            self.noise.reset();
            self.cutoff_smoother.set_immediate(preset.cutoff);
            self.resonance_smoother.set_immediate(preset.resonance);
        }

        self.osc1.set_waveform(preset.osc1_waveform);
        self.osc2.set_waveform(preset.osc2_waveform);
        self.base_pulse_width = preset.pulse_width;
        self.osc1.set_pulse_width(preset.pulse_width);
        self.osc2.set_pulse_width(preset.pulse_width);
        self.noise.set_color(preset.noise_color);
        self.filter.set_mode(preset.filter_mode);

        self.osc1_level = preset.osc1_level;
        self.osc2_level = preset.osc2_level;
        self.noise_level = preset.noise_level;
        self.osc2_semitones = preset.osc2_semitones;
        self.osc2_detune = preset.osc2_detune;
        self.base_cutoff = preset.cutoff;
        self.base_resonance = preset.resonance;
        self.filter_env_amount = preset.filter_env_amount;
        self.lfo1_to_filter = preset.lfo1_to_filter;
        self.velocity_to_filter = preset.velocity_to_filter;
        self.priority = preset.priority.min(10);

        self.amp_env.set_config(preset.amp_env);
        self.filter_env.set_config(preset.filter_env);
        self.lfo1.set_rate(preset.lfo1_rate);
        self.lfo1.set_waveform(preset.lfo1_waveform);
        self.lfo2.set_rate(preset.lfo2_rate);
        self.lfo2.set_waveform(preset.lfo2_waveform);
    }

    /// Starts a note on this voice.
    ///
    /// # Arguments
    ///
    /// * `pitch` - Note number; 69 is A at 440 Hz
    /// * `velocity` - Strike strength (0.0 to 1.0)
    /// * `gain` - Spatial gain from the dispatcher (0.0 to 1.0)
    /// * `pan` - Stereo position, 0 left to 1 right
    /// * `stamp` - Monotonic age stamp from the pool
    pub fn note_on(&mut self, pitch: u8, velocity: f32, gain: f32, pan: f32, stamp: u32) {
        self.note = pitch;
        self.base_frequency = note_to_frequency(pitch);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.gain = gain.clamp(0.0, 1.0);
        self.pan = pan.clamp(0.0, 1.0);
        self.note_on_stamp = stamp;

        // Phase reset gives every note the same attack transient
        self.osc1.reset();
        self.osc2.reset();
        self.osc1.set_frequency(self.base_frequency);
        self.osc2.set_frequency(self.base_frequency * self.osc2_ratio(0.0));

        self.amp_env.note_on();
        self.filter_env.note_on();
        self.matrix.set_source(ModSource::Velocity, self.velocity);

        self.control_counter = 0;
        self.amp_mod = 1.0;
        self.active = true;
    }

    /// Releases the note. Safe to call repeatedly.
    pub fn note_off(&mut self) {
        self.amp_env.note_off();
        self.filter_env.note_off();
    }

    /// Sets the global pitch bend in semitones, applied at control rate.
    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.pitch_bend = semitones;
    }

    /// Renders one mono sample.
    pub fn process(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }

        // Audio-rate modulation generation
        let lfo1_value = self.lfo1.process();
        let lfo2_value = self.lfo2.process();
        let filter_env_level = self.filter_env.process();
        let amp_env_level = self.amp_env.process();

        self.matrix.set_source(ModSource::Lfo1, lfo1_value);
        self.matrix.set_source(ModSource::Lfo2, lfo2_value);
        self.matrix.set_source(ModSource::FilterEnv, filter_env_level);
        self.matrix.set_source(ModSource::AmpEnv, amp_env_level);

        if self.control_counter == 0 {
            self.control_block(filter_env_level);
        }
        self.control_counter = (self.control_counter + 1) % CONTROL_RATE_INTERVAL;

        // Audio-rate synthesis
        let mix = self.osc1.process() * self.osc1_level
            + self.osc2.process() * self.osc2_level
            + self.noise.process() * self.noise_level;
        let filtered = self.filter.process(
            mix,
            self.cutoff_smoother.process(),
            self.resonance_smoother.process(),
        );
        let output = filtered * amp_env_level * self.velocity * self.gain * self.amp_mod;

        self.current_level = output.abs();
        if !self.amp_env.is_active() {
            self.active = false;
        }

        output
    }

    /// Renders one stereo frame with constant-power panning.
    pub fn process_stereo(&mut self) -> (f32, f32) {
        let mono = self.process();
        let angle = self.pan * FRAC_PI_2;
        (mono * angle.cos(), mono * angle.sin())
    }

    /// Control-rate recomputation: matrix, increments, filter targets.
    fn control_block(&mut self, filter_env_level: f32) {
        self.matrix.run();

        let pitch_mod = self.matrix.destination(ModDestination::Pitch) + self.pitch_bend;
        self.osc1
            .set_frequency(self.base_frequency * semitones_to_ratio(pitch_mod));
        self.osc2
            .set_frequency(self.base_frequency * self.osc2_ratio(pitch_mod));

        let cutoff = self.base_cutoff
            + filter_env_level * self.filter_env_amount
            + self.matrix.destination(ModDestination::FilterCutoff) * self.lfo1_to_filter
            + self.velocity * self.velocity_to_filter;
        self.cutoff_smoother
            .set_target(cutoff.clamp(20.0, 0.45 * self.sample_rate));

        let resonance = self.base_resonance + self.matrix.destination(ModDestination::FilterRes);
        self.resonance_smoother.set_target(resonance.clamp(0.0, 1.0));

        let pwm = self.matrix.destination(ModDestination::Pwm);
        self.osc1.set_pulse_width(self.base_pulse_width + pwm * 0.5);

        let amp = 1.0 + self.matrix.destination(ModDestination::Amplitude);
        self.amp_mod = amp.clamp(0.0, 2.0);
    }

    /// Oscillator 2 frequency ratio: coarse semitones plus fractional
    /// detune plus any pitch modulation, summed before the power.
    fn osc2_ratio(&self, pitch_mod: f32) -> f32 {
        let osc2_mod = self.matrix.destination(ModDestination::Osc2Pitch);
        semitones_to_ratio(self.osc2_semitones as f32 + self.osc2_detune + pitch_mod + osc2_mod)
    }

    /// True while the amplitude envelope is sounding.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True while the amplitude envelope is in its release stage.
    pub fn is_in_release(&self) -> bool {
        self.amp_env.is_in_release()
    }

    /// Most recent absolute output level, used by the stealer.
    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    /// Age stamp recorded at the last note-on.
    pub fn note_on_time(&self) -> u32 {
        self.note_on_stamp
    }

    /// Steal priority copied from the triggering preset.
    pub fn current_priority(&self) -> u8 {
        self.priority
    }

    /// Note number of the current (or last) note.
    pub fn note_number(&self) -> u8 {
        self.note
    }
}
