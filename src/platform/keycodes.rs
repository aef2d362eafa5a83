//! Windows virtual key codes the remapper cares about.
//!
//! VK codes are from the Windows SDK (winuser.h). `WH_KEYBOARD_LL` reports the
//! sided variants (VK_LSHIFT / VK_RSHIFT, VK_LMENU / VK_RMENU); the generic
//! codes are accepted too because other software may inject them.
//! Injection always uses the left-hand variant.

pub const VK_SHIFT: u16 = 0x10;
pub const VK_MENU: u16 = 0x12;
pub const VK_CAPITAL: u16 = 0x14;
pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LMENU: u16 = 0xA4;
pub const VK_RMENU: u16 = 0xA5;

/// Logical key as seen by the engine. Left/right variants are coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    CapsLock,
    Shift,
    Alt,
    Other(u16),
}

/// Maps a virtual key code to the engine's logical key.
pub fn vkcode_to_keycode(vk: u16) -> KeyCode {
    match vk {
        VK_CAPITAL => KeyCode::CapsLock,
        VK_SHIFT | VK_LSHIFT | VK_RSHIFT => KeyCode::Shift,
        VK_MENU | VK_LMENU | VK_RMENU => KeyCode::Alt,
        other => KeyCode::Other(other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
