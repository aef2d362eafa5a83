//! Shift state tracking.
//!
//! Left and right Shift are coalesced into one logical flag that follows the
//! most recent down/up seen for either variant. A keyup swallowed by another
//! hook earlier in the chain leaves the flag stuck until the next Shift event.

use crate::platform::keycodes::{vkcode_to_keycode, KeyCode};
use crate::platform::RawKeyEvent;

/// Live Shift state, owned by the dispatcher and touched only on the
/// delivery thread.
#[derive(Debug, Default)]
pub struct ModifierStateTracker {
    shift_held: bool,
}

impl ModifierStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the state from one raw event. Non-Shift events are ignored.
    pub fn observe(&mut self, event: &RawKeyEvent) {
        if vkcode_to_keycode(event.vk) != KeyCode::Shift {
            return;
        }
        let held = event.is_down();
        if held != self.shift_held {
            log::trace!("engine: shift {}", if held { "held" } else { "released" });
        }
        self.shift_held = held;
    }

    pub fn is_modifier_held(&self) -> bool {
        self.shift_held
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
