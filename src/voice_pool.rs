//! Voice Pool Module
//!
//! The fixed pool of voices and the stealing policy that decides which one
//! serves an incoming trigger. The pool is sized at construction and never
//! reallocates; voices are reused forever.
//!
//! # Stealing policy
//!
//! [`VoicePool::steal`] evaluates four clauses strictly in order and returns
//! the first match:
//!
//! 1. Any inactive voice.
//! 2. Among releasing voices at or below the requesting priority: the
//!    lowest priority, ties broken by the quietest current level.
//! 3. Among all voices at or below the requesting priority: the oldest.
//! 4. Last resort: the oldest voice overall.
//!
//! Ages are compared modulo 2^32: the age of a voice is the wrapping
//! difference between the pool's stamp counter and the voice's note-on
//! stamp, so ordering survives counter wraparound within a session.

use crate::voice::Voice;

/// Fixed-size pool of reusable voices.
#[derive(Debug)]
pub struct VoicePool {
    /// The voices; length fixed at construction
    voices: Vec<Voice>,

    /// Monotonic (wrapping) stamp source for note-on ages
    stamp_counter: u32,
}

impl VoicePool {
    /// Creates a pool of idle voices.
    ///
    /// Each voice gets its own noise/sample-and-hold seed so siblings
    /// decorrelate while the whole pool stays deterministic.
    pub fn new(size: usize, sample_rate: f32) -> Self {
        let voices = (0..size)
            .map(|i| Voice::new(sample_rate, i as u64 + 1))
            .collect();
        Self {
            voices,
            stamp_counter: 0,
        }
    }

    /// Number of voices in the pool.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// True when the pool holds no voices.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Number of currently active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Advances and returns the next note-on stamp.
    pub fn next_stamp(&mut self) -> u32 {
        self.stamp_counter = self.stamp_counter.wrapping_add(1);
        self.stamp_counter
    }

    /// Gets a voice by index.
    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    /// Gets a mutable voice by index.
    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    /// Iterates the voices.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Iterates the voices mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }

    /// Releases every active voice.
    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            if voice.is_active() {
                voice.note_off();
            }
        }
    }

    /// Age of a voice's note, as a wrapping distance from the counter.
    fn age_of(&self, voice: &Voice) -> u32 {
        self.stamp_counter.wrapping_sub(voice.note_on_time())
    }

    /// Picks the voice to serve a trigger of the given priority.
    ///
    /// Deterministic given the pool state and the stamp counter; always
    /// returns an index (the last-resort clause cannot fail on a non-empty
    /// pool).
    pub fn steal(&self, requesting_priority: u8) -> usize {
        // Clause 1: any inactive voice
        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            return index;
        }

        // Clause 2: quietest of the lowest-priority releasing voices we
        // are allowed to take
        let mut candidate: Option<(usize, u8, f32)> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if !voice.is_in_release() || voice.current_priority() > requesting_priority {
                continue;
            }
            let better = match candidate {
                None => true,
                Some((_, priority, level)) => {
                    voice.current_priority() < priority
                        || (voice.current_priority() == priority
                            && voice.current_level() < level)
                }
            };
            if better {
                candidate = Some((index, voice.current_priority(), voice.current_level()));
            }
        }
        if let Some((index, _, _)) = candidate {
            return index;
        }

        // Clause 3: oldest voice we are allowed to take
        let mut candidate: Option<(usize, u32)> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if voice.current_priority() > requesting_priority {
                continue;
            }
            let age = self.age_of(voice);
            if candidate.map_or(true, |(_, best)| age > best) {
                candidate = Some((index, age));
            }
        }
        if let Some((index, _)) = candidate {
            return index;
        }

        // Clause 4: oldest voice overall
        self.voices
            .iter()
            .enumerate()
            .max_by_key(|(_, voice)| self.age_of(voice))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }
}
