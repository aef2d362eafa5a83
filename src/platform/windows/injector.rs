//! Windows input injection via SendInput.
//!
//! `WindowsInjector` implements `InputInjector`. Injection is synchronous:
//! `SendInput` returns after the event is queued, so the synthesizer's async
//! task can call it directly between its delays.

use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
};

use crate::platform::{InputInjector, KeyState, PlatformError};

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Injects keyboard events via SendInput on Windows.
///
/// Stateless: each `inject()` call builds one `INPUT` record.
pub struct WindowsInjector;

impl WindowsInjector {
    pub fn new() -> Self {
        WindowsInjector
    }
}

/// Builds the `KEYBDINPUT` record for one transition.
fn keyboard_input(vk: u16, state: KeyState) -> INPUT {
    let dw_flags = match state {
        KeyState::Down => 0,
        KeyState::Up => KEYEVENTF_KEYUP,
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: dw_flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

// ---------------------------------------------------------------------------
// InputInjector trait impl
// ---------------------------------------------------------------------------

impl InputInjector for WindowsInjector {
    fn inject(&self, vk: u16, state: KeyState) -> Result<(), PlatformError> {
        let input = keyboard_input(vk, state);
        let sent = unsafe { SendInput(1, &input, std::mem::size_of::<INPUT>() as i32) };

        if sent == 0 {
            return Err(PlatformError::Injection(format!(
                "SendInput rejected {vk:#04x} {state:?}"
            )));
        }

        log::trace!("executor: injected {vk:#04x} {state:?}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::keycodes::VK_LSHIFT;

    #[test]
    fn keyup_sets_keyup_flag() {
        let input = keyboard_input(VK_LSHIFT, KeyState::Up);
        let ki = unsafe { input.Anonymous.ki };
        assert_eq!(input.r#type, INPUT_KEYBOARD);
        assert_eq!(ki.wVk, VK_LSHIFT);
        assert_eq!(ki.dwFlags & KEYEVENTF_KEYUP, KEYEVENTF_KEYUP);
    }

    #[test]
    fn keydown_has_no_flags() {
        let input = keyboard_input(VK_LSHIFT, KeyState::Down);
        let ki = unsafe { input.Anonymous.ki };
        assert_eq!(ki.dwFlags, 0);
    }
}
