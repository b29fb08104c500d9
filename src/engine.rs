//! Engine Module
//!
//! The top of the crate: a [`SynthEngine`] owned by whoever owns the audio
//! callback, and an [`EngineHandle`] for the control thread. Construction
//! splits an SPSC command ring between the two; afterwards the engine side
//! never blocks, allocates, logs, or locks.
//!
//! # Block procedure
//!
//! Each [`SynthEngine::render`] call:
//!
//! 1. Loads the shared scalars (master volume, headroom, pitch bend) once.
//! 2. Drains the command queue into the dispatcher, in submission order.
//! 3. Fires any auto note-offs scheduled inside this block.
//! 4. Rebuilds the active-voice cache if membership changed since the last
//!    block, or every [`ACTIVE_VOICE_REBUILD_INTERVAL`] samples.
//! 5. Sums the cached voices per frame, scales by
//!    `master_volume / sqrt(pool_size)`, soft-clips, and writes
//!    interleaved samples.
//!
//! The `1/sqrt(N)` energy scaling keeps perceived level roughly constant as
//! polyphony changes: N uncorrelated voices sum to an RMS that grows with
//! the square root of N.

use crate::command::{
    Command, Diagnostics, NoteEvent, QueuedCommand, SharedParams, Spatial, SubmitError,
};
use crate::dispatch::Dispatcher;
use crate::preset::PresetLibrary;
use crate::voice_pool::VoicePool;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;
use thiserror::Error;

/// Samples between periodic active-voice cache rebuilds.
pub const ACTIVE_VOICE_REBUILD_INTERVAL: u32 = 1024;

/// Largest supported voice pool.
pub const MAX_POOL_SIZE: usize = 128;

/// Construction-time configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Sample rate in Hz, fixed for the engine's lifetime
    pub sample_rate: f32,

    /// Number of voices in the pool (1 to 128)
    pub pool_size: usize,

    /// Command ring capacity; size at 2x the worst expected
    /// control-to-audio latency in commands
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            pool_size: 32,
            queue_capacity: 256,
        }
    }
}

/// Errors refusing engine construction. Once running, nothing is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EngineError {
    /// Sample rate was zero, negative, or non-finite
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    /// Pool size was zero or above [`MAX_POOL_SIZE`]
    #[error("pool size must be 1..={MAX_POOL_SIZE}, got {0}")]
    InvalidPoolSize(usize),

    /// Queue capacity was zero
    #[error("command queue capacity must be non-zero")]
    InvalidQueueCapacity,
}

/// A note trigger authored on the control thread.
#[derive(Debug, Clone, Copy)]
pub struct Trigger<'a> {
    /// Preset name in the library
    pub preset: &'a str,

    /// Note number; `None` uses the preset's default note
    pub pitch: Option<u8>,

    /// Strike strength (0.0 to 1.0)
    pub velocity: f32,

    /// Pre-computed gain/pan or a listener-local position
    pub spatial: Spatial,

    /// Auto note-off after this many seconds
    pub duration: Option<f32>,
}

impl Default for Trigger<'_> {
    fn default() -> Self {
        Self {
            preset: "",
            pitch: None,
            velocity: 1.0,
            spatial: Spatial::default(),
            duration: None,
        }
    }
}

/// Audio-side engine: owns the pool, dispatcher, and queue consumer.
pub struct SynthEngine {
    pool: VoicePool,
    dispatcher: Dispatcher,
    consumer: ringbuf::HeapCons<QueuedCommand>,
    library: Arc<PresetLibrary>,
    shared: Arc<SharedParams>,

    /// Indices of active voices, rebuilt per the block procedure
    active_cache: Vec<usize>,

    /// Membership changed since the cache was last rebuilt
    cache_dirty: bool,

    /// Samples rendered since the last rebuild
    samples_since_rebuild: u32,

    /// Absolute sample index of the next frame to render
    sample_clock: u64,

    /// Precomputed 1 / sqrt(pool size)
    energy_norm: f32,
}

/// Control-side handle: submission, shared scalars, diagnostics.
pub struct EngineHandle {
    producer: ringbuf::HeapProd<QueuedCommand>,
    library: Arc<PresetLibrary>,
    shared: Arc<SharedParams>,

    /// Sequence of the most recent submission
    last_seq: u64,
}

impl SynthEngine {
    /// Creates an engine and its control handle.
    ///
    /// The preset library is finalized here; it must not change while
    /// triggers referencing it are in flight.
    pub fn new(
        config: EngineConfig,
        library: PresetLibrary,
    ) -> Result<(SynthEngine, EngineHandle), EngineError> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(config.sample_rate));
        }
        if config.pool_size == 0 || config.pool_size > MAX_POOL_SIZE {
            return Err(EngineError::InvalidPoolSize(config.pool_size));
        }
        if config.queue_capacity == 0 {
            return Err(EngineError::InvalidQueueCapacity);
        }

        log::info!(
            "synth engine: {} Hz, {} voices, {} presets, queue depth {}",
            config.sample_rate,
            config.pool_size,
            library.len(),
            config.queue_capacity
        );

        let library = Arc::new(library);
        let shared = Arc::new(SharedParams::new());
        let (producer, consumer) = HeapRb::<QueuedCommand>::new(config.queue_capacity).split();

        let engine = SynthEngine {
            pool: VoicePool::new(config.pool_size, config.sample_rate),
            dispatcher: Dispatcher::new(config.pool_size, config.sample_rate),
            consumer,
            library: Arc::clone(&library),
            shared: Arc::clone(&shared),
            active_cache: Vec::with_capacity(config.pool_size),
            cache_dirty: false,
            samples_since_rebuild: 0,
            sample_clock: 0,
            energy_norm: 1.0 / (config.pool_size as f32).sqrt(),
        };

        let handle = EngineHandle {
            producer,
            library,
            shared,
            last_seq: 0,
        };

        Ok((engine, handle))
    }

    /// Renders one block of interleaved samples.
    ///
    /// Writes `output.len()` samples; the frame count is
    /// `output.len() / channels`. All samples land in [-1, 1]. Channel
    /// counts other than 1 or 2 write silence.
    pub fn render(&mut self, channels: usize, output: &mut [f32]) {
        if channels != 1 && channels != 2 {
            output.fill(0.0);
            return;
        }
        let frames = output.len() / channels;
        // A trailing partial frame (odd stereo buffer) is silenced
        output[frames * channels..].fill(0.0);

        let master_volume = self.shared.master_volume();
        let headroom = self.shared.headroom();
        let pitch_bend = self.shared.pitch_bend();

        self.drain_commands();
        self.dispatcher
            .process_auto_offs(&mut self.pool, self.sample_clock + frames as u64);

        if self.cache_dirty || self.samples_since_rebuild >= ACTIVE_VOICE_REBUILD_INTERVAL {
            self.rebuild_active_cache();
        }

        for &index in &self.active_cache {
            if let Some(voice) = self.pool.voice_mut(index) {
                voice.set_pitch_bend(pitch_bend);
            }
        }

        let scale = master_volume * self.energy_norm;

        for frame in 0..frames {
            if channels == 2 {
                let mut left = 0.0f32;
                let mut right = 0.0f32;
                for &index in &self.active_cache {
                    if let Some(voice) = self.pool.voice_mut(index) {
                        let (l, r) = voice.process_stereo();
                        left += l;
                        right += r;
                        if !voice.is_active() {
                            self.cache_dirty = true;
                        }
                    }
                }
                output[frame * 2] = soft_clip(left * scale, headroom);
                output[frame * 2 + 1] = soft_clip(right * scale, headroom);
            } else {
                let mut mono = 0.0f32;
                for &index in &self.active_cache {
                    if let Some(voice) = self.pool.voice_mut(index) {
                        mono += voice.process();
                        if !voice.is_active() {
                            self.cache_dirty = true;
                        }
                    }
                }
                output[frame] = soft_clip(mono * scale, headroom);
            }
        }

        self.sample_clock += frames as u64;
        self.samples_since_rebuild = self
            .samples_since_rebuild
            .saturating_add(frames as u32);
    }

    /// Number of currently active voices.
    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Number of voices in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Live sustain table entries.
    pub fn sustain_count(&self) -> usize {
        self.dispatcher.sustain_count()
    }

    /// Pending auto note-offs.
    pub fn timed_count(&self) -> usize {
        self.dispatcher.timed_count()
    }

    /// Absolute sample index of the next frame.
    pub fn sample_clock(&self) -> u64 {
        self.sample_clock
    }

    /// Read access to the pool, for hosts that inspect voice state.
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Drains every queued command, discarding cancelled ones.
    fn drain_commands(&mut self) {
        let cutoff = self.shared.cancel_cutoff();
        while let Some(queued) = self.consumer.try_pop() {
            if queued.seq <= cutoff {
                self.shared.count_dropped_command();
                continue;
            }
            match queued.command {
                Command::Fire(event) => {
                    self.dispatcher.fire(
                        &event,
                        &self.library,
                        &mut self.pool,
                        &self.shared,
                        self.sample_clock,
                    );
                    self.cache_dirty = true;
                }
                Command::SustainStart { key, event } => {
                    self.dispatcher.sustain_start(
                        key,
                        &event,
                        &self.library,
                        &mut self.pool,
                        &self.shared,
                        self.sample_clock,
                    );
                    self.cache_dirty = true;
                }
                Command::SustainRelease { key } => {
                    self.dispatcher.sustain_release(key, &mut self.pool);
                }
                Command::AllOff => {
                    self.dispatcher.all_off(&mut self.pool);
                }
            }
        }
    }

    /// Linear scan of the pool into the contiguous active cache.
    fn rebuild_active_cache(&mut self) {
        self.active_cache.clear();
        for index in 0..self.pool.len() {
            if self.pool.voice(index).map_or(false, |v| v.is_active()) {
                self.active_cache.push(index);
            }
        }
        self.cache_dirty = false;
        self.samples_since_rebuild = 0;
    }
}

impl EngineHandle {
    /// Submits a fire command.
    pub fn fire(&mut self, trigger: &Trigger<'_>) -> Result<(), SubmitError> {
        let event = self.validate(trigger)?;
        self.push(Command::Fire(event))
    }

    /// Submits a sustain-start command under a producer-chosen key.
    pub fn sustain_start(&mut self, key: u64, trigger: &Trigger<'_>) -> Result<(), SubmitError> {
        let event = self.validate(trigger)?;
        self.push(Command::SustainStart { key, event })
    }

    /// Submits a sustain-release command.
    pub fn sustain_release(&mut self, key: u64) -> Result<(), SubmitError> {
        self.push(Command::SustainRelease { key })
    }

    /// Submits an all-off command, the panic route.
    pub fn all_off(&mut self) -> Result<(), SubmitError> {
        self.push(Command::AllOff)
    }

    /// Marks everything submitted so far as inert; the drainer will
    /// discard it.
    pub fn cancel_pending(&self) {
        self.shared.set_cancel_cutoff(self.last_seq);
    }

    /// Sets the master output volume (0.0 to 1.0).
    pub fn set_master_volume(&self, volume: f32) {
        self.shared.set_master_volume(volume);
    }

    /// Sets the soft-clip headroom drive.
    pub fn set_headroom(&self, headroom: f32) {
        self.shared.set_headroom(headroom);
    }

    /// Sets the global pitch bend in semitones.
    pub fn set_pitch_bend(&self, semitones: f32) {
        self.shared.set_pitch_bend(semitones);
    }

    /// Sets the spatialization distance rolloff.
    pub fn set_rolloff(&self, rolloff: f32) {
        self.shared.set_rolloff(rolloff);
    }

    /// Sets the spatialization pan strength.
    pub fn set_pan_strength(&self, strength: f32) {
        self.shared.set_pan_strength(strength);
    }

    /// Snapshots the diagnostic counters.
    pub fn diagnostics(&self) -> Diagnostics {
        self.shared.diagnostics()
    }

    /// The preset library this handle resolves names against.
    pub fn library(&self) -> &PresetLibrary {
        &self.library
    }

    /// Validates trigger fields and resolves the preset name.
    fn validate(&self, trigger: &Trigger<'_>) -> Result<NoteEvent, SubmitError> {
        let Some(preset_index) = self.library.index_of(trigger.preset) else {
            log::warn!("trigger rejected: unknown preset {:?}", trigger.preset);
            return Err(SubmitError::UnknownPreset);
        };

        if !trigger.velocity.is_finite() {
            log::warn!("trigger rejected: non-finite velocity");
            return Err(SubmitError::InvalidParameter);
        }
        if let Some(pitch) = trigger.pitch {
            if pitch > 127 {
                log::warn!("trigger rejected: pitch {} out of range", pitch);
                return Err(SubmitError::InvalidParameter);
            }
        }
        if let Some(duration) = trigger.duration {
            if !duration.is_finite() || duration < 0.0 {
                log::warn!("trigger rejected: bad duration {}", duration);
                return Err(SubmitError::InvalidParameter);
            }
        }
        let spatial_ok = match trigger.spatial {
            Spatial::Direct { gain, pan } => gain.is_finite() && pan.is_finite(),
            Spatial::Position { x, y, z } => {
                x.is_finite() && y.is_finite() && z.is_finite()
            }
        };
        if !spatial_ok {
            log::warn!("trigger rejected: non-finite spatial input");
            return Err(SubmitError::InvalidParameter);
        }

        Ok(NoteEvent {
            preset_index,
            pitch: trigger.pitch,
            velocity: trigger.velocity.clamp(0.0, 1.0),
            spatial: trigger.spatial,
            duration: trigger.duration,
        })
    }

    /// Pushes a command, reporting overflow to the caller.
    fn push(&mut self, command: Command) -> Result<(), SubmitError> {
        let seq = self.last_seq + 1;
        match self.producer.try_push(QueuedCommand { seq, command }) {
            Ok(()) => {
                self.last_seq = seq;
                Ok(())
            }
            Err(_) => {
                self.shared.count_queue_overflow();
                Err(SubmitError::QueueFull)
            }
        }
    }
}

/// Soft clip: rational tanh approximation, clamped to the rails past the
/// region where the approximation holds.
fn soft_clip(sample: f32, headroom: f32) -> f32 {
    let x = sample * headroom;
    if x > 3.0 {
        1.0
    } else if x < -3.0 {
        -1.0
    } else {
        x * (27.0 + x * x) / (27.0 + 9.0 * x * x)
    }
}
