//! Preset Module
//!
//! Immutable parameter bundles consumed at trigger time, and the name-keyed
//! library that holds them. The library is built once before playback and
//! never mutated afterwards; triggers reference presets by stable name on
//! the control thread and by index everywhere else.
//!
//! Bundles derive `serde` traits so a host can keep its catalog in JSON,
//! but no file I/O lives here — the engine is initialized from in-memory
//! bundles only.

use crate::envelope::EnvelopeConfig;
use crate::filter::SvfMode;
use crate::lfo::LfoWaveform;
use crate::noise::NoiseColor;
use crate::oscillator::Waveform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable voice parameter bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Stable name used by triggers
    pub name: String,

    /// Oscillator 1 waveform
    pub osc1_waveform: Waveform,

    /// Oscillator 2 waveform
    pub osc2_waveform: Waveform,

    /// Oscillator 1 level (0.0 to 1.0)
    pub osc1_level: f32,

    /// Oscillator 2 level (0.0 to 1.0)
    pub osc2_level: f32,

    /// Noise level (0.0 to 1.0)
    pub noise_level: f32,

    /// Noise spectrum
    pub noise_color: NoiseColor,

    /// Oscillator 2 coarse offset in semitones
    pub osc2_semitones: i32,

    /// Oscillator 2 fine offset in fractional semitones.
    ///
    /// One unit is one semitone; a host thinking in cents divides by 100
    /// before building the bundle.
    pub osc2_detune: f32,

    /// Base square pulse width (0.05 to 0.95)
    pub pulse_width: f32,

    /// Filter response
    pub filter_mode: SvfMode,

    /// Base filter cutoff in Hz
    pub cutoff: f32,

    /// Base filter resonance (0.0 to 1.0)
    pub resonance: f32,

    /// Filter envelope to cutoff amount in Hz, signed
    pub filter_env_amount: f32,

    /// LFO1 to cutoff scale in Hz
    pub lfo1_to_filter: f32,

    /// Velocity to cutoff scale in Hz
    pub velocity_to_filter: f32,

    /// Amplitude envelope
    pub amp_env: EnvelopeConfig,

    /// Filter envelope
    pub filter_env: EnvelopeConfig,

    /// LFO1 rate in Hz
    pub lfo1_rate: f32,

    /// LFO1 waveform
    pub lfo1_waveform: LfoWaveform,

    /// LFO2 rate in Hz
    pub lfo2_rate: f32,

    /// LFO2 waveform
    pub lfo2_waveform: LfoWaveform,

    /// Steal priority, 0 to 10; higher is harder to steal
    pub priority: u8,

    /// Pitch used when a trigger omits one
    pub default_note: u8,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: "Init".to_string(),
            osc1_waveform: Waveform::Saw,
            osc2_waveform: Waveform::Saw,
            osc1_level: 0.8,
            osc2_level: 0.0,
            noise_level: 0.0,
            noise_color: NoiseColor::White,
            osc2_semitones: 0,
            osc2_detune: 0.0,
            pulse_width: 0.5,
            filter_mode: SvfMode::LowPass,
            cutoff: 2000.0,
            resonance: 0.2,
            filter_env_amount: 0.0,
            lfo1_to_filter: 0.0,
            velocity_to_filter: 0.0,
            amp_env: EnvelopeConfig::default(),
            filter_env: EnvelopeConfig::default(),
            lfo1_rate: 2.0,
            lfo1_waveform: LfoWaveform::Sine,
            lfo2_rate: 0.5,
            lfo2_waveform: LfoWaveform::Triangle,
            priority: 5,
            default_note: 60,
        }
    }
}

impl Preset {
    /// Checks that every numeric field is finite and in a usable range.
    pub fn is_valid(&self) -> bool {
        let finite = [
            self.osc1_level,
            self.osc2_level,
            self.noise_level,
            self.osc2_detune,
            self.pulse_width,
            self.cutoff,
            self.resonance,
            self.filter_env_amount,
            self.lfo1_to_filter,
            self.velocity_to_filter,
            self.lfo1_rate,
            self.lfo2_rate,
            self.amp_env.attack,
            self.amp_env.decay,
            self.amp_env.sustain,
            self.amp_env.release,
            self.filter_env.attack,
            self.filter_env.decay,
            self.filter_env.sustain,
            self.filter_env.release,
        ]
        .iter()
        .all(|v| v.is_finite());

        finite && self.cutoff > 0.0 && self.priority <= 10 && self.default_note <= 127
    }
}

/// Name-keyed catalog of presets, immutable during playback.
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    /// Bundles in load order; commands carry indices into this
    presets: Vec<Preset>,

    /// Name to index lookup for the control thread
    by_name: HashMap<String, usize>,
}

impl PresetLibrary {
    /// Builds a library from in-memory bundles.
    ///
    /// Invalid bundles (non-finite fields, out-of-range priority or note)
    /// are skipped with a warning. A repeated name replaces the earlier
    /// entry in the lookup, matching last-write-wins catalog semantics.
    pub fn new(presets: Vec<Preset>) -> Self {
        let mut kept = Vec::with_capacity(presets.len());
        let mut by_name = HashMap::with_capacity(presets.len());

        for preset in presets {
            if !preset.is_valid() {
                log::warn!("discarding invalid preset {:?}", preset.name);
                continue;
            }
            by_name.insert(preset.name.clone(), kept.len());
            kept.push(preset);
        }

        Self {
            presets: kept,
            by_name,
        }
    }

    /// Looks up a preset index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Gets a preset by index.
    pub fn get(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Gets a preset by name.
    pub fn get_by_name(&self, name: &str) -> Option<&Preset> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Number of presets held.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// True when the library holds no presets.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
