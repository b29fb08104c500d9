//! HALCYON - Polyphonic Soundscape Synthesis Engine
//!
//! This crate provides the real-time synthesis core for a soundscape
//! application: a pool of subtractive voices, a lock-free trigger path from
//! the control thread, and a block renderer suitable for a pull-mode audio
//! callback.
//!
//! # Architecture
//!
//! - **Oscillator / Noise**: band-limited waveform and noise generation
//! - **Filter**: zero-delay-feedback state-variable filter
//! - **Envelope / LFO / Modulation**: per-voice shaping and routing
//! - **Voice / VoicePool**: the signal chain and the stealing policy
//! - **Dispatch**: trigger-to-voice routing, sustain and auto-off tables
//! - **Engine**: the audio-side renderer and the control-side handle
//!
//! # Example
//!
//! ```rust
//! use halcyon::{EngineConfig, Preset, PresetLibrary, SynthEngine, Trigger};
//!
//! let library = PresetLibrary::new(vec![Preset {
//!     name: "pad".to_string(),
//!     ..Default::default()
//! }]);
//! let (mut engine, mut handle) =
//!     SynthEngine::new(EngineConfig::default(), library).unwrap();
//!
//! handle.fire(&Trigger { preset: "pad", pitch: Some(60), ..Default::default() }).unwrap();
//!
//! // Inside the audio callback:
//! let mut block = [0.0f32; 512 * 2];
//! engine.render(2, &mut block);
//! ```

pub mod command;
pub mod dispatch;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod modulation;
pub mod noise;
pub mod oscillator;
pub mod preset;
pub mod smoothed;
pub mod voice;
pub mod voice_pool;

pub use command::{Diagnostics, Spatial, SubmitError};
pub use engine::{EngineConfig, EngineError, EngineHandle, SynthEngine, Trigger};
pub use envelope::{AdsrEnvelope, EnvelopeConfig, EnvelopeStage};
pub use filter::{StateVariableFilter, SvfMode};
pub use lfo::{Lfo, LfoConfig, LfoWaveform};
pub use modulation::{ModDestination, ModMatrix, ModSource};
pub use noise::{NoiseColor, NoiseSource};
pub use oscillator::{note_to_frequency, Oscillator, OscillatorConfig, Waveform};
pub use preset::{Preset, PresetLibrary};
pub use smoothed::SmoothedParam;
pub use voice::Voice;
pub use voice_pool::VoicePool;
