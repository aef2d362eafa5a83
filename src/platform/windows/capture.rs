//! Windows keyboard capture via WH_KEYBOARD_LL (low-level keyboard hook).
//!
//! `WindowsCapture` implements `InputCapture`. `start()` spawns a background
//! thread that installs the hook and runs a `GetMessageW` loop (required for
//! low-level hooks to deliver events). That thread is the delivery thread:
//! the OS calls `hook_proc` on it, and the handler runs there synchronously.
//! `stop()` uninstalls the hook and posts `WM_QUIT` to exit the message loop,
//! then joins the thread.
//!
//! No special permissions are required on Windows for WH_KEYBOARD_LL.
//!
//! Handler storage: `WH_KEYBOARD_LL` hook procs receive no `user_info`
//! pointer, and the OS calls them on the installing thread, so the handler
//! lives in a `thread_local!` on the delivery thread. The hook proc never
//! takes a lock another thread could hold.
//!
//! Injected events (`LLKHF_INJECTED`, e.g. our own `SendInput`) are handed to
//! the handler like any other event; the handler only ever suppresses
//! CapsLock, which the injector never sends.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use windows_sys::Win32::Foundation::{GetLastError, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG, PM_NOREMOVE,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
};

use crate::platform::{
    InputCapture, KeyHandler, KeyState, PlatformError, RawKeyEvent, Verdict,
};

// ---------------------------------------------------------------------------
// Delivery-thread handler storage
// ---------------------------------------------------------------------------

thread_local! {
    /// Handler for the hook installed on this thread. Set before the hook is
    /// registered, cleared when the message loop exits.
    static HANDLER: RefCell<Option<KeyHandler>> = const { RefCell::new(None) };
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Windows keyboard capture backend using `WH_KEYBOARD_LL`.
pub struct WindowsCapture {
    /// Handle returned by `SetWindowsHookExW`; used to unhook in `stop()`. Stored as isize for Send.
    hook: Option<isize>,
    /// Thread ID of the background message-loop thread; used for `PostThreadMessageW`.
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl WindowsCapture {
    pub fn new() -> Self {
        Self {
            hook: None,
            thread_id: 0,
            thread: None,
        }
    }
}

// ---------------------------------------------------------------------------
// InputCapture trait impl
// ---------------------------------------------------------------------------

impl InputCapture for WindowsCapture {
    fn start(&mut self, handler: KeyHandler) -> Result<(), PlatformError> {
        if self.thread.is_some() {
            return Err(PlatformError::HookInstall("capture already started".into()));
        }

        // Channel: background thread sends (hook_handle, thread_id) after setup. isize for Send.
        let (info_tx, info_rx) = mpsc::channel::<Result<(isize, u32), PlatformError>>();

        let thread = thread::Builder::new()
            .name("capsswitch-hook".into())
            .spawn(move || {
                HANDLER.with(|slot| *slot.borrow_mut() = Some(handler));

                // Force creation of this thread's message queue so a WM_QUIT
                // posted right after start() returns is not lost.
                unsafe {
                    let mut msg: MSG = std::mem::zeroed();
                    PeekMessageW(&mut msg, ptr::null_mut(), WM_USER, WM_USER, PM_NOREMOVE);
                }

                let hook = unsafe {
                    SetWindowsHookExW(
                        WH_KEYBOARD_LL,
                        Some(hook_proc),
                        GetModuleHandleW(ptr::null()),
                        0,
                    )
                };

                if hook.is_null() {
                    let code = unsafe { GetLastError() };
                    HANDLER.with(|slot| *slot.borrow_mut() = None);
                    let _ = info_tx.send(Err(PlatformError::HookInstall(format!(
                        "SetWindowsHookExW failed (error {code})"
                    ))));
                    return;
                }

                let thread_id = unsafe { GetCurrentThreadId() };
                let _ = info_tx.send(Ok((hook as isize, thread_id)));

                log::info!("capture: WH_KEYBOARD_LL hook active");

                // Message loop: required for WH_KEYBOARD_LL to deliver events.
                // Returns 0 on WM_QUIT, -1 on error; both exit the loop.
                unsafe {
                    let mut msg: MSG = std::mem::zeroed();
                    while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {}
                }

                log::info!("capture: message loop exited");
                HANDLER.with(|slot| *slot.borrow_mut() = None);
            })
            .map_err(|e| PlatformError::HookInstall(format!("cannot spawn hook thread: {e}")))?;

        match info_rx.recv() {
            Ok(Ok((hook, thread_id))) => {
                self.hook = Some(hook);
                self.thread_id = thread_id;
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(PlatformError::Other(
                "capture thread exited before reporting hook status".into(),
            )),
        }
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        let mut result = Ok(());

        // Unhook first so no further callbacks fire after this returns.
        if let Some(hook) = self.hook.take() {
            if unsafe { UnhookWindowsHookEx(hook as HHOOK) } == 0 {
                let code = unsafe { GetLastError() };
                result = Err(PlatformError::Other(format!(
                    "UnhookWindowsHookEx failed (error {code})"
                )));
            }
        }

        // Signal the message loop to exit.
        if self.thread_id != 0 {
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) };
            self.thread_id = 0;
        }

        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }

        result
    }
}

impl Drop for WindowsCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("capture: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Hook procedure
// ---------------------------------------------------------------------------

/// Low-level keyboard hook proc, called on the delivery thread.
///
/// Returns 1 to swallow the event, otherwise forwards via `CallNextHookEx`.
/// A panicking handler must not unwind across this `extern "system"` frame,
/// so it is caught and the event passed through.
unsafe extern "system" fn hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param);
    }

    let kb = &*(l_param as *const KBDLLHOOKSTRUCT);

    let (state, system) = match w_param as u32 {
        WM_KEYDOWN => (KeyState::Down, false),
        WM_SYSKEYDOWN => (KeyState::Down, true),
        WM_KEYUP => (KeyState::Up, false),
        WM_SYSKEYUP => (KeyState::Up, true),
        _ => return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
    };

    let event = RawKeyEvent {
        vk: kb.vkCode as u16,
        state,
        system,
        injected: kb.flags & LLKHF_INJECTED != 0,
    };

    let verdict = HANDLER.with(|slot| {
        // Re-entrant delivery (a handler pumping messages) cannot borrow twice.
        let Ok(mut guard) = slot.try_borrow_mut() else {
            return Verdict::PassThrough;
        };
        let Some(handler) = guard.as_mut() else {
            return Verdict::PassThrough;
        };
        panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).unwrap_or_else(|_| {
            log::error!("capture: handler panicked on {event:?}; passing through");
            Verdict::PassThrough
        })
    });

    match verdict {
        Verdict::Suppress => 1,
        Verdict::PassThrough => CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_produces_idle_state() {
        let capture = WindowsCapture::new();
        assert!(capture.hook.is_none());
        assert_eq!(capture.thread_id, 0);
        assert!(capture.thread.is_none());
    }

    /// Stopping a capture that was never started must return Ok and not panic.
    #[test]
    fn stop_on_unstarted_capture_is_noop() {
        let mut capture = WindowsCapture::new();
        assert!(capture.stop().is_ok());
        assert!(capture.stop().is_ok());
    }
}
