//! Windows platform backend: WH_KEYBOARD_LL capture, SendInput injection,
//! plus the autostart registry record and the single-instance check.
//!
//! Factory functions return trait objects backed by `WindowsCapture`
//! (WH_KEYBOARD_LL) and `WindowsInjector` (SendInput).

mod capture;
mod injector;
pub mod instance;
pub mod registry;

use std::sync::Arc;

use capture::WindowsCapture;
use injector::WindowsInjector;

use crate::platform::{InputCapture, InputInjector, PlatformError};

/// Returns a `WindowsCapture` backed by `WH_KEYBOARD_LL`.
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Ok(Box::new(WindowsCapture::new()))
}

/// Returns a `WindowsInjector` backed by `SendInput`.
pub fn create_input_injector() -> Result<Arc<dyn InputInjector>, PlatformError> {
    Ok(Arc::new(WindowsInjector::new()))
}
