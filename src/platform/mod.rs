//! Platform abstraction layer.
//!
//! Defines the `InputCapture` and `InputInjector` traits plus the raw event
//! types that cross them. The only backend is Windows (`WH_KEYBOARD_LL` +
//! `SendInput`); on other targets the factories report `Unavailable` so the
//! engine itself stays buildable and testable everywhere.

pub mod keycodes;

#[cfg(target_os = "windows")]
pub mod windows;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The backend does not exist or cannot run in this session.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    /// The OS refused to register the global keyboard hook.
    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),
    /// The OS rejected a synthesized input event.
    #[error("input injection failed: {0}")]
    Injection(String),
    /// Reading or writing the autostart record failed.
    #[error("registry error: {0}")]
    Registry(String),
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Key transition carried by a raw event or an injected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// Snapshot of one keyboard event as delivered by the OS hook.
///
/// Produced on the delivery thread and consumed exactly once by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Windows virtual key code (see [`keycodes`]).
    pub vk: u16,
    pub state: KeyState,
    /// Delivered as `WM_SYSKEYDOWN` / `WM_SYSKEYUP` (Alt held or F10).
    pub system: bool,
    /// Generated by `SendInput` rather than hardware. Still classified like
    /// hardware input, but never clears the tap-once latch.
    pub injected: bool,
}

impl RawKeyEvent {
    #[cfg(test)]
    pub fn down(vk: u16) -> Self {
        Self {
            vk,
            state: KeyState::Down,
            system: false,
            injected: false,
        }
    }

    #[cfg(test)]
    pub fn up(vk: u16) -> Self {
        Self {
            vk,
            state: KeyState::Up,
            system: false,
            injected: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.state == KeyState::Down
    }
}

/// Answer the hook returns to the OS for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward to the next hook and on to the focused application.
    PassThrough,
    /// Swallow; nothing downstream ever sees the event.
    Suppress,
}

/// Handler run synchronously on the delivery thread for every key event.
pub type KeyHandler = Box<dyn FnMut(&RawKeyEvent) -> Verdict + Send>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Global keyboard interception.
///
/// `start` registers the hook and begins delivering events to `handler`;
/// `stop` deregisters it. `stop` must be safe to call when nothing is
/// installed, and implementations call it from `Drop`.
pub trait InputCapture: Send {
    fn start(&mut self, handler: KeyHandler) -> Result<(), PlatformError>;
    fn stop(&mut self) -> Result<(), PlatformError>;
}

/// Synthesized keyboard input.
pub trait InputInjector: Send + Sync {
    /// Injects one key transition for virtual key `vk`.
    fn inject(&self, vk: u16, state: KeyState) -> Result<(), PlatformError>;
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

#[cfg(target_os = "windows")]
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    windows::create_input_capture()
}

#[cfg(target_os = "windows")]
pub fn create_input_injector() -> Result<std::sync::Arc<dyn InputInjector>, PlatformError> {
    windows::create_input_injector()
}

#[cfg(not(target_os = "windows"))]
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Err(PlatformError::Unavailable(
        "global keyboard hooks are only supported on Windows".into(),
    ))
}

#[cfg(not(target_os = "windows"))]
pub fn create_input_injector() -> Result<std::sync::Arc<dyn InputInjector>, PlatformError> {
    Err(PlatformError::Unavailable(
        "input injection is only supported on Windows".into(),
    ))
}

/// True when another copy of this executable is already running.
#[cfg(target_os = "windows")]
pub fn other_instance_running() -> Result<bool, PlatformError> {
    windows::instance::other_instance_running()
}

#[cfg(not(target_os = "windows"))]
pub fn other_instance_running() -> Result<bool, PlatformError> {
    Ok(false)
}
