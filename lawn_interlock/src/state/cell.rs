//! Published interlock state.
//!
//! One `AtomicU8` holding an `InterlockState` discriminant. The engine is the
//! only writer (release); the gate, handles and subscribers read (acquire).
//! A reader always sees one whole state value.

use std::sync::atomic::{AtomicU8, Ordering};

use lawn_common::interlock::state::InterlockState;

/// Injectable holder of the current interlock state.
#[derive(Debug)]
pub struct SafetyStateCell {
    raw: AtomicU8,
}

impl SafetyStateCell {
    pub const fn new() -> Self {
        Self {
            raw: AtomicU8::new(InterlockState::Safe as u8),
        }
    }

    /// Current state.
    #[inline]
    pub fn load(&self) -> InterlockState {
        // Only valid discriminants are ever stored; fall back to the most
        // restrictive state if that ever stops holding.
        InterlockState::from_u8(self.raw.load(Ordering::Acquire)).unwrap_or(InterlockState::Emergency)
    }

    /// Publish a new state. Engine only.
    #[inline]
    pub(crate) fn publish(&self, state: InterlockState) {
        self.raw.store(state as u8, Ordering::Release);
    }
}

impl Default for SafetyStateCell {
    fn default() -> Self {
        Self::new()
    }
}
