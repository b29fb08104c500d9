//! Command Module
//!
//! The value types that cross the control-to-audio boundary, and the shared
//! scalar block both sides read. Commands travel through a single-producer
//! single-consumer ring; everything else crosses as relaxed atomics.
//!
//! Preset references are library indices resolved on the control thread, so
//! a drained command is plain data: no strings, no reference counts, nothing
//! for the audio thread to drop or dereference.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use thiserror::Error;

/// Stores an f32 in an AtomicU32 by bit pattern.
#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

/// Loads an f32 back out of its bit pattern.
#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

/// Spatialization input carried on a trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spatial {
    /// Pre-computed gain and pan, both 0.0 to 1.0
    Direct { gain: f32, pan: f32 },

    /// Listener-local position; the dispatcher derives gain and pan from
    /// the shared rolloff and pan-strength scalars at drain time
    Position { x: f32, y: f32, z: f32 },
}

impl Default for Spatial {
    fn default() -> Self {
        Self::Direct {
            gain: 1.0,
            pan: 0.5,
        }
    }
}

/// Note start parameters shared by fire and sustain-start commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// Library index of the preset, resolved at submission
    pub preset_index: usize,

    /// Note number; `None` falls back to the preset's default note
    pub pitch: Option<u8>,

    /// Strike strength (0.0 to 1.0)
    pub velocity: f32,

    /// Spatialization input
    pub spatial: Spatial,

    /// Auto note-off after this many seconds, if set
    pub duration: Option<f32>,
}

/// The closed set of commands decoded at the audio boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start a note
    Fire(NoteEvent),

    /// Start a note held under a producer-chosen key
    SustainStart { key: u64, event: NoteEvent },

    /// Release the note held under a key; unknown keys are ignored
    SustainRelease { key: u64 },

    /// Release every active voice and clear the note tables
    AllOff,
}

/// A command with its submission sequence number.
///
/// The sequence orders commands within the ring and carries the
/// cancellation cutoff: the drainer discards any command whose sequence is
/// at or below [`SharedParams::cancel_cutoff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    /// Submission sequence, strictly increasing per handle
    pub seq: u64,

    /// The command payload
    pub command: Command,
}

/// Errors returned by command submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The SPSC queue is full; the caller may retry or drop
    #[error("command queue full")]
    QueueFull,

    /// No preset with the given name exists in the library
    #[error("unknown preset name")]
    UnknownPreset,

    /// A command field was NaN, infinite, or out of range
    #[error("invalid command parameter")]
    InvalidParameter,
}

/// Scalar parameters and counters shared between the two threads.
///
/// Stores are relaxed; the audio thread loads each scalar once per block.
#[derive(Debug)]
pub struct SharedParams {
    /// Master output volume (0.0 to 1.0)
    master_volume: AtomicU32,

    /// Soft-clip drive; values below 1 leave extra margin
    headroom: AtomicU32,

    /// Global pitch bend in semitones
    pitch_bend: AtomicU32,

    /// Distance rolloff for position-based triggers
    rolloff: AtomicU32,

    /// Horizontal pan strength for position-based triggers
    pan_strength: AtomicU32,

    /// Commands at or below this sequence are discarded at drain
    cancel_cutoff: AtomicU64,

    /// Commands dropped at the audio boundary (bad preset index, cancelled)
    dropped_commands: AtomicU32,

    /// Submissions rejected with `QueueFull`
    queue_overflows: AtomicU32,

    /// Sustain or timed table insertions dropped for lack of capacity
    table_overflows: AtomicU32,
}

impl SharedParams {
    /// Creates the shared block with engine defaults.
    pub fn new() -> Self {
        Self {
            master_volume: AtomicU32::new(f32_to_u32(0.7)),
            headroom: AtomicU32::new(f32_to_u32(1.0)),
            pitch_bend: AtomicU32::new(f32_to_u32(0.0)),
            rolloff: AtomicU32::new(f32_to_u32(0.1)),
            pan_strength: AtomicU32::new(f32_to_u32(0.5)),
            cancel_cutoff: AtomicU64::new(0),
            dropped_commands: AtomicU32::new(0),
            queue_overflows: AtomicU32::new(0),
            table_overflows: AtomicU32::new(0),
        }
    }

    pub fn master_volume(&self) -> f32 {
        u32_to_f32(self.master_volume.load(Ordering::Relaxed))
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume
            .store(f32_to_u32(volume.clamp(0.0, 1.0)), Ordering::Relaxed);
    }

    pub fn headroom(&self) -> f32 {
        u32_to_f32(self.headroom.load(Ordering::Relaxed))
    }

    pub fn set_headroom(&self, headroom: f32) {
        self.headroom
            .store(f32_to_u32(headroom.clamp(0.05, 4.0)), Ordering::Relaxed);
    }

    pub fn pitch_bend(&self) -> f32 {
        u32_to_f32(self.pitch_bend.load(Ordering::Relaxed))
    }

    pub fn set_pitch_bend(&self, semitones: f32) {
        self.pitch_bend
            .store(f32_to_u32(semitones.clamp(-24.0, 24.0)), Ordering::Relaxed);
    }

    pub fn rolloff(&self) -> f32 {
        u32_to_f32(self.rolloff.load(Ordering::Relaxed))
    }

    pub fn set_rolloff(&self, rolloff: f32) {
        self.rolloff
            .store(f32_to_u32(rolloff.max(0.0)), Ordering::Relaxed);
    }

    pub fn pan_strength(&self) -> f32 {
        u32_to_f32(self.pan_strength.load(Ordering::Relaxed))
    }

    pub fn set_pan_strength(&self, strength: f32) {
        self.pan_strength
            .store(f32_to_u32(strength.max(0.0)), Ordering::Relaxed);
    }

    pub fn cancel_cutoff(&self) -> u64 {
        self.cancel_cutoff.load(Ordering::Relaxed)
    }

    pub fn set_cancel_cutoff(&self, seq: u64) {
        self.cancel_cutoff.store(seq, Ordering::Relaxed);
    }

    pub fn count_dropped_command(&self) {
        self.dropped_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_queue_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_table_overflow(&self) {
        self.table_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshots the diagnostic counters.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            dropped_commands: self.dropped_commands.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
            table_overflows: self.table_overflows.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Commands dropped at the audio boundary
    pub dropped_commands: u32,

    /// Submissions rejected because the queue was full
    pub queue_overflows: u32,

    /// Table insertions dropped for lack of capacity
    pub table_overflows: u32,
}
