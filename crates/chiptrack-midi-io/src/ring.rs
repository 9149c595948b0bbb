//! Rotating set of output queues between the playback and tick contexts.
//!
//! The playback context owns `play_cursor`: it appends to the current slot
//! and advances once per playback slice. The tick context owns `out_cursor`:
//! each rotation hands that slot's contents to the device and moves on.
//! The two cursors are driven at different rates and are never kept a fixed
//! distance apart.
//!
//! Two locks are involved:
//! - the state lock guards slots and cursors. It is held for a push or a
//!   `Vec` swap, never across device I/O.
//! - the flush lock serializes rotations and owns the spare buffer the
//!   drained slot is swapped into, so slot N reaches the device before
//!   slot N+1 and a rotation never allocates.
//!
//! A rotation whose receiver is busy keeps the drained batch in the spare
//! buffer; the next rotation appends its slot behind it and delivers both.
//!
//! Each playback slice must be matched by a rotation before the play cursor
//! comes round again. When it is not, the lapped slot is cleared, the loss
//! is counted in [`RingStats::overwritten`] and reported once per lap.

use crate::message::MidiMessage;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    /// Messages accepted into a slot.
    pub enqueued: u64,
    /// Messages handed out by rotation.
    pub delivered: u64,
    /// Messages discarded before delivery: lapped slots, reset, or a held
    /// batch that outgrew the per-slot cap.
    pub overwritten: u64,
    /// Messages refused because their slot hit the per-slot cap.
    pub overflowed: u64,
}

struct Slot {
    messages: Vec<MidiMessage>,
    overflow_reported: bool,
}

struct RingState {
    slots: Vec<Slot>,
    play_cursor: usize,
    out_cursor: usize,
    /// Messages sitting in the flush buffer after a declined delivery.
    held: usize,
    lap_reported: bool,
    stats: RingStats,
}

impl RingState {
    /// Returns the number of messages thrown away.
    fn clear_slot(&mut self, index: usize) -> usize {
        let slot = &mut self.slots[index];
        let dropped = slot.messages.len();
        self.stats.overwritten += dropped as u64;
        slot.messages.clear();
        slot.overflow_reported = false;
        dropped
    }
}

pub struct OutputQueueRing {
    state: Mutex<RingState>,
    flush: Mutex<Vec<MidiMessage>>,
    max_per_slot: usize,
}

impl OutputQueueRing {
    /// `buffer_count` slots, each holding at most `max_per_slot` messages.
    pub fn new(buffer_count: usize, max_per_slot: usize) -> Self {
        let buffer_count = buffer_count.max(1);
        let slots = (0..buffer_count)
            .map(|_| Slot {
                messages: Vec::new(),
                overflow_reported: false,
            })
            .collect();
        Self {
            state: Mutex::new(RingState {
                slots,
                play_cursor: 0,
                out_cursor: 0,
                held: 0,
                lap_reported: false,
                stats: RingStats::default(),
            }),
            flush: Mutex::new(Vec::new()),
            max_per_slot: max_per_slot.max(1),
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Append a copy of `message` to the slot at the play cursor.
    ///
    /// Returns `false` if the slot is full and the message was dropped.
    pub fn enqueue(&self, message: MidiMessage) -> bool {
        let first_overflow = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let index = state.play_cursor;
            let slot = &mut state.slots[index];
            if slot.messages.len() < self.max_per_slot {
                slot.messages.push(message);
                state.stats.enqueued += 1;
                return true;
            }
            let first = !slot.overflow_reported;
            slot.overflow_reported = true;
            state.stats.overflowed += 1;
            first.then_some(index)
        };
        if let Some(index) = first_overflow {
            tracing::warn!(
                "MIDI output slot {} full ({} messages), dropping until it is reused",
                index,
                self.max_per_slot
            );
        }
        false
    }

    /// Move the play cursor to the next slot and empty it.
    pub fn advance_play_cursor(&self) {
        let lapped = {
            let mut state = self.state.lock();
            let next = (state.play_cursor + 1) % state.slots.len();
            state.play_cursor = next;
            if next == 0 {
                state.lap_reported = false;
            }
            let dropped = state.clear_slot(next);
            let first = dropped > 0 && !state.lap_reported;
            if first {
                state.lap_reported = true;
            }
            first.then_some((next, dropped))
        };
        if let Some((index, dropped)) = lapped {
            tracing::warn!(
                "MIDI output slot {} reused before it was flushed, {} message(s) lost",
                index,
                dropped
            );
        }
    }

    /// Hand the slot at the out cursor to `deliver`, then move the out
    /// cursor to the next slot.
    ///
    /// `deliver` runs outside the state lock and is skipped for an empty
    /// slot. The drained slot is empty once this returns. Returns the
    /// number of messages handed out.
    pub fn rotate<F>(&self, deliver: F) -> usize
    where
        F: FnOnce(&[MidiMessage]),
    {
        self.try_rotate(|batch| {
            deliver(batch);
            true
        })
    }

    /// Like [`rotate`](Self::rotate), but `deliver` may decline by returning
    /// `false`. A declined batch is held and goes out, ahead of the next
    /// slot, on the following rotation. Returns 0 when declined.
    pub fn try_rotate<F>(&self, deliver: F) -> usize
    where
        F: FnOnce(&[MidiMessage]) -> bool,
    {
        let mut drained = self.flush.lock();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let current = state.out_cursor;
            let slot = &mut state.slots[current];
            if drained.is_empty() {
                std::mem::swap(&mut slot.messages, &mut *drained);
            } else {
                drained.append(&mut slot.messages);
            }
            slot.overflow_reported = false;
            state.out_cursor = (current + 1) % state.slots.len();
            state.held = drained.len();
        }

        let count = drained.len();
        if count == 0 {
            return 0;
        }
        if !deliver(&drained) {
            if count > self.max_per_slot {
                drained.clear();
                let mut state = self.state.lock();
                state.held = 0;
                state.stats.overwritten += count as u64;
                drop(state);
                tracing::warn!(
                    "MIDI output receiver busy, dropped {} held message(s)",
                    count
                );
            }
            return 0;
        }

        drained.clear();
        let mut state = self.state.lock();
        state.held = 0;
        state.stats.delivered += count as u64;
        count
    }

    /// Both cursors back to slot 0, every slot emptied.
    pub fn reset(&self) {
        let mut drained = self.flush.lock();
        let mut state = self.state.lock();
        state.play_cursor = 0;
        state.out_cursor = 0;
        state.lap_reported = false;
        state.stats.overwritten += drained.len() as u64;
        state.held = 0;
        drained.clear();
        for index in 0..state.slots.len() {
            state.clear_slot(index);
        }
    }

    pub fn play_cursor(&self) -> usize {
        self.state.lock().play_cursor
    }

    pub fn out_cursor(&self) -> usize {
        self.state.lock().out_cursor
    }

    /// Number of messages waiting in slot `index`, `None` if out of range.
    pub fn slot_len(&self, index: usize) -> Option<usize> {
        self.state
            .lock()
            .slots
            .get(index)
            .map(|slot| slot.messages.len())
    }

    /// Messages waiting across all slots, plus a held batch.
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.held + state.slots.iter().map(|slot| slot.messages.len()).sum::<usize>()
    }

    pub fn stats(&self) -> RingStats {
        self.state.lock().stats
    }
}
