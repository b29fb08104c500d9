//! Trigger Dispatch Module
//!
//! Turns drained commands into voice mutations: preset resolution, the
//! spatialization hook, voice stealing, sustained-note bookkeeping, and
//! auto note-off scheduling. Everything here runs on the audio thread
//! during the pre-block drain, so both note tables are fixed-capacity and
//! allocation-free.
//!
//! Table entries remember the note-on stamp of the voice they point at. A
//! voice that has since been stolen carries a newer stamp, so stale entries
//! are recognized and ignored instead of releasing somebody else's note.

use crate::command::{NoteEvent, SharedParams, Spatial};
use crate::preset::PresetLibrary;
use crate::voice_pool::VoicePool;

/// Slot states for the open-addressed sustain table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Tombstone,
    Occupied,
}

/// One sustain table slot.
#[derive(Debug, Clone, Copy)]
struct SustainSlot {
    state: SlotState,
    key: u64,
    voice: usize,
    stamp: u32,
}

const VACANT_SLOT: SustainSlot = SustainSlot {
    state: SlotState::Empty,
    key: 0,
    voice: 0,
    stamp: 0,
};

/// Open-addressed map from sustain key to voice, fixed capacity.
///
/// Linear probing with tombstone deletion; capacity is a power of two
/// sized at construction, so insertion never allocates. At most one
/// sustained note exists per voice, which bounds the live entry count by
/// the pool size.
#[derive(Debug)]
struct SustainTable {
    slots: Vec<SustainSlot>,

    /// Power-of-two mask for probe indexing
    mask: usize,

    /// Occupied slot count
    len: usize,
}

impl SustainTable {
    fn new(pool_size: usize) -> Self {
        // Twice the pool size keeps the load factor comfortable
        let capacity = (pool_size * 2).next_power_of_two().max(8);
        Self {
            slots: vec![VACANT_SLOT; capacity],
            mask: capacity - 1,
            len: 0,
        }
    }

    fn hash(&self, key: u64) -> usize {
        // Fibonacci multiplicative hash; keys are producer-chosen and may
        // be small sequential integers
        (key.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 40) as usize & self.mask
    }

    fn get(&self, key: u64) -> Option<(usize, u32)> {
        let mut index = self.hash(key);
        for _ in 0..self.slots.len() {
            let slot = &self.slots[index];
            match slot.state {
                SlotState::Empty => return None,
                SlotState::Occupied if slot.key == key => {
                    return Some((slot.voice, slot.stamp))
                }
                _ => index = (index + 1) & self.mask,
            }
        }
        None
    }

    /// Inserts or replaces. Returns false when every slot is occupied.
    fn insert(&mut self, key: u64, voice: usize, stamp: u32) -> bool {
        let mut index = self.hash(key);
        let mut target: Option<usize> = None;
        for _ in 0..self.slots.len() {
            let slot = &self.slots[index];
            match slot.state {
                SlotState::Occupied if slot.key == key => {
                    target = Some(index);
                    break;
                }
                SlotState::Occupied => index = (index + 1) & self.mask,
                SlotState::Empty => {
                    target = Some(target.unwrap_or(index));
                    break;
                }
                SlotState::Tombstone => {
                    // Remember the first reusable slot but keep probing in
                    // case the key already exists further along
                    if target.is_none() {
                        target = Some(index);
                    }
                    index = (index + 1) & self.mask;
                }
            }
        }

        let Some(index) = target else {
            return false;
        };
        if self.slots[index].state != SlotState::Occupied {
            self.len += 1;
        }
        self.slots[index] = SustainSlot {
            state: SlotState::Occupied,
            key,
            voice,
            stamp,
        };
        true
    }

    fn remove(&mut self, key: u64) {
        let mut index = self.hash(key);
        for _ in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            match slot.state {
                SlotState::Empty => return,
                SlotState::Occupied if slot.key == key => {
                    slot.state = SlotState::Tombstone;
                    self.len -= 1;
                    return;
                }
                _ => index = (index + 1) & self.mask,
            }
        }
    }

    fn clear(&mut self) {
        self.slots.fill(VACANT_SLOT);
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// One scheduled auto note-off.
#[derive(Debug, Clone, Copy)]
struct TimedNote {
    /// Voice index to release
    voice: usize,

    /// Ownership stamp recorded at scheduling time
    stamp: u32,

    /// Absolute sample index at which the release fires
    off_at: u64,
}

/// Queue-driven trigger dispatcher.
///
/// Owned by the engine and driven entirely from the audio thread's
/// pre-block drain.
#[derive(Debug)]
pub struct Dispatcher {
    /// Sustain key to voice map
    sustain: SustainTable,

    /// Pending auto note-offs, at most one per voice
    timed: Vec<TimedNote>,

    /// Sample rate for duration-to-samples conversion
    sample_rate: f32,
}

impl Dispatcher {
    /// Creates a dispatcher with tables sized for the pool.
    pub fn new(pool_size: usize, sample_rate: f32) -> Self {
        Self {
            sustain: SustainTable::new(pool_size),
            timed: Vec::with_capacity(pool_size),
            sample_rate,
        }
    }

    /// Handles a fire command. Returns the voice index used, or `None`
    /// when the preset reference was invalid.
    pub fn fire(
        &mut self,
        event: &NoteEvent,
        library: &PresetLibrary,
        pool: &mut VoicePool,
        shared: &SharedParams,
        current_sample: u64,
    ) -> Option<usize> {
        let Some(preset) = library.get(event.preset_index) else {
            shared.count_dropped_command();
            return None;
        };

        let (gain, pan) = self.spatialize(event.spatial, shared);
        let pitch = event.pitch.unwrap_or(preset.default_note);

        let index = pool.steal(preset.priority);
        let stamp = pool.next_stamp();
        if let Some(voice) = pool.voice_mut(index) {
            voice.configure(preset);
            voice.note_on(pitch, event.velocity, gain, pan, stamp);
        }

        if let Some(duration) = event.duration {
            if duration > 0.0 {
                self.schedule_auto_off(index, stamp, current_sample, duration, shared);
            }
        }

        Some(index)
    }

    /// Handles a sustain-start command: a key collision releases the
    /// previous holder before the new note begins.
    pub fn sustain_start(
        &mut self,
        key: u64,
        event: &NoteEvent,
        library: &PresetLibrary,
        pool: &mut VoicePool,
        shared: &SharedParams,
        current_sample: u64,
    ) {
        if let Some((voice_index, stamp)) = self.sustain.get(key) {
            if let Some(voice) = pool.voice_mut(voice_index) {
                if voice.note_on_time() == stamp {
                    voice.note_off();
                }
            }
            self.sustain.remove(key);
        }

        let Some(voice_index) = self.fire(event, library, pool, shared, current_sample) else {
            return;
        };
        let stamp = pool
            .voice(voice_index)
            .map(|v| v.note_on_time())
            .unwrap_or(0);
        if !self.sustain.insert(key, voice_index, stamp) {
            shared.count_table_overflow();
        }
    }

    /// Handles a sustain-release command. Unknown keys are a no-op.
    pub fn sustain_release(&mut self, key: u64, pool: &mut VoicePool) {
        if let Some((voice_index, stamp)) = self.sustain.get(key) {
            if let Some(voice) = pool.voice_mut(voice_index) {
                if voice.note_on_time() == stamp {
                    voice.note_off();
                }
            }
            self.sustain.remove(key);
        }
    }

    /// Handles an all-off command: every voice releases and both tables
    /// empty.
    pub fn all_off(&mut self, pool: &mut VoicePool) {
        pool.release_all();
        self.sustain.clear();
        self.timed.clear();
    }

    /// Fires every auto note-off that falls inside the coming block.
    ///
    /// Runs in the pre-block drain; `block_end` is the absolute sample
    /// index one past the block's last frame.
    pub fn process_auto_offs(&mut self, pool: &mut VoicePool, block_end: u64) {
        let mut i = 0;
        while i < self.timed.len() {
            if self.timed[i].off_at < block_end {
                let entry = self.timed.swap_remove(i);
                if let Some(voice) = pool.voice_mut(entry.voice) {
                    if voice.note_on_time() == entry.stamp {
                        voice.note_off();
                    }
                }
            } else {
                i += 1;
            }
        }
    }

    /// Number of live sustain entries.
    pub fn sustain_count(&self) -> usize {
        self.sustain.len()
    }

    /// Number of pending auto note-offs.
    pub fn timed_count(&self) -> usize {
        self.timed.len()
    }

    fn schedule_auto_off(
        &mut self,
        voice: usize,
        stamp: u32,
        current_sample: u64,
        duration: f32,
        shared: &SharedParams,
    ) {
        if self.timed.len() == self.timed.capacity() {
            shared.count_table_overflow();
            return;
        }
        let off_at = current_sample + (duration * self.sample_rate).round() as u64;
        self.timed.push(TimedNote {
            voice,
            stamp,
            off_at,
        });
    }

    /// Resolves a spatial input into (gain, pan).
    fn spatialize(&self, spatial: Spatial, shared: &SharedParams) -> (f32, f32) {
        match spatial {
            Spatial::Direct { gain, pan } => (gain.clamp(0.0, 1.0), pan.clamp(0.0, 1.0)),
            Spatial::Position { x, y, z } => {
                let distance_sq = x * x + y * y + z * z;
                let gain = 1.0 / (1.0 + distance_sq * shared.rolloff());
                let pan = 0.5 + x * shared.pan_strength();
                (gain.clamp(0.0, 1.0), pan.clamp(0.0, 1.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;

    const SAMPLE_RATE: f32 = 48000.0;

    fn library() -> PresetLibrary {
        PresetLibrary::new(vec![Preset {
            name: "tone".to_string(),
            ..Default::default()
        }])
    }

    fn event() -> NoteEvent {
        NoteEvent {
            preset_index: 0,
            pitch: Some(60),
            velocity: 1.0,
            spatial: Spatial::default(),
            duration: None,
        }
    }

    #[test]
    fn test_fire_activates_a_voice() {
        let library = library();
        let mut pool = VoicePool::new(4, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(4, SAMPLE_RATE);

        let index = dispatcher.fire(&event(), &library, &mut pool, &shared, 0);
        assert!(index.is_some());
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_fire_unknown_preset_drops() {
        let library = library();
        let mut pool = VoicePool::new(4, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(4, SAMPLE_RATE);

        let bad = NoteEvent {
            preset_index: 99,
            ..event()
        };
        assert_eq!(dispatcher.fire(&bad, &library, &mut pool, &shared, 0), None);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(shared.diagnostics().dropped_commands, 1);
    }

    #[test]
    fn test_fire_uses_default_note_when_pitch_omitted() {
        let library = PresetLibrary::new(vec![Preset {
            name: "tone".to_string(),
            default_note: 72,
            ..Default::default()
        }]);
        let mut pool = VoicePool::new(2, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(2, SAMPLE_RATE);

        let no_pitch = NoteEvent {
            pitch: None,
            ..event()
        };
        let index = dispatcher
            .fire(&no_pitch, &library, &mut pool, &shared, 0)
            .unwrap();
        assert_eq!(pool.voice(index).unwrap().note_number(), 72);
    }

    #[test]
    fn test_position_spatialization() {
        let library = library();
        let mut pool = VoicePool::new(2, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(2, SAMPLE_RATE);

        // Distant source to the left: attenuated, panned left
        let far_left = NoteEvent {
            spatial: Spatial::Position {
                x: -1.0,
                y: 0.0,
                z: 3.0,
            },
            ..event()
        };
        let (gain, pan) = dispatcher.spatialize(far_left.spatial, &shared);
        // d^2 = 10, rolloff 0.1 -> gain = 1/(1+1) = 0.5
        assert!((gain - 0.5).abs() < 1e-6, "gain = {}", gain);
        // pan = 0.5 - 1.0 * 0.5 = 0.0
        assert!(pan.abs() < 1e-6, "pan = {}", pan);
    }

    #[test]
    fn test_sustain_release_frees_only_matching_key() {
        let library = library();
        let mut pool = VoicePool::new(4, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(4, SAMPLE_RATE);

        dispatcher.sustain_start(1, &event(), &library, &mut pool, &shared, 0);
        dispatcher.sustain_start(2, &event(), &library, &mut pool, &shared, 0);
        assert_eq!(dispatcher.sustain_count(), 2);

        dispatcher.sustain_release(1, &mut pool);
        assert_eq!(dispatcher.sustain_count(), 1);

        // Releasing an unknown key is a no-op
        dispatcher.sustain_release(42, &mut pool);
        assert_eq!(dispatcher.sustain_count(), 1);
    }

    #[test]
    fn test_sustain_key_collision_releases_previous() {
        let library = library();
        let mut pool = VoicePool::new(4, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(4, SAMPLE_RATE);

        dispatcher.sustain_start(7, &event(), &library, &mut pool, &shared, 0);
        let first = dispatcher.sustain.get(7).unwrap().0;

        let second_event = NoteEvent {
            pitch: Some(64),
            ..event()
        };
        dispatcher.sustain_start(7, &second_event, &library, &mut pool, &shared, 0);
        let second = dispatcher.sustain.get(7).unwrap().0;

        assert_ne!(first, second, "Collision must move to a fresh voice");
        assert!(pool.voice(first).unwrap().is_in_release());
        assert!(!pool.voice(second).unwrap().is_in_release());
        assert_eq!(pool.voice(second).unwrap().note_number(), 64);
        assert_eq!(dispatcher.sustain_count(), 1);
    }

    #[test]
    fn test_stale_sustain_entry_ignores_stolen_voice() {
        let library = library();
        let mut pool = VoicePool::new(1, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(1, SAMPLE_RATE);

        dispatcher.sustain_start(7, &event(), &library, &mut pool, &shared, 0);
        // The only voice gets stolen by a plain fire
        dispatcher.fire(&event(), &library, &mut pool, &shared, 0);

        // The stale key must not release the stolen voice's new note
        dispatcher.sustain_release(7, &mut pool);
        assert!(!pool.voice(0).unwrap().is_in_release());
    }

    #[test]
    fn test_auto_off_fires_at_scheduled_sample() {
        let library = library();
        let mut pool = VoicePool::new(2, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(2, SAMPLE_RATE);

        let timed = NoteEvent {
            duration: Some(0.25),
            ..event()
        };
        let index = dispatcher
            .fire(&timed, &library, &mut pool, &shared, 0)
            .unwrap();
        assert_eq!(dispatcher.timed_count(), 1);

        // Before the deadline nothing happens
        dispatcher.process_auto_offs(&mut pool, 11500);
        assert!(!pool.voice(index).unwrap().is_in_release());

        // The block containing sample 12000 fires the release
        dispatcher.process_auto_offs(&mut pool, 12100);
        assert!(pool.voice(index).unwrap().is_in_release());
        assert_eq!(dispatcher.timed_count(), 0);
    }

    #[test]
    fn test_all_off_clears_tables() {
        let library = library();
        let mut pool = VoicePool::new(4, SAMPLE_RATE);
        let shared = SharedParams::new();
        let mut dispatcher = Dispatcher::new(4, SAMPLE_RATE);

        dispatcher.sustain_start(1, &event(), &library, &mut pool, &shared, 0);
        let timed = NoteEvent {
            duration: Some(1.0),
            ..event()
        };
        dispatcher.fire(&timed, &library, &mut pool, &shared, 0);

        dispatcher.all_off(&mut pool);
        assert_eq!(dispatcher.sustain_count(), 0);
        assert_eq!(dispatcher.timed_count(), 0);
        assert!(pool.iter().filter(|v| v.is_active()).all(|v| v.is_in_release()));
    }

    #[test]
    fn test_sustain_table_probe_and_tombstones() {
        let mut table = SustainTable::new(4);
        // Insert more keys than the pool would, exercising probes
        for key in 0..6u64 {
            assert!(table.insert(key, key as usize, key as u32));
        }
        assert_eq!(table.len(), 6);

        table.remove(3);
        assert_eq!(table.get(3), None);
        // Keys probed past the tombstone remain reachable
        for key in [0u64, 1, 2, 4, 5] {
            assert_eq!(table.get(key), Some((key as usize, key as u32)));
        }

        // The tombstone slot is reusable
        assert!(table.insert(3, 9, 9));
        assert_eq!(table.get(3), Some((9, 9)));
    }
}
