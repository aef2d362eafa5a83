//! Interception engine: hook lifecycle around the CapsLock dispatcher.
//!
//! `install()` hands the dispatcher to the capture backend, which runs it on
//! the OS delivery thread for every key event. `uninstall()` deregisters the
//! hook; it is idempotent and also runs on drop, so every exit path that
//! unwinds through the owner releases the hook.

pub mod dispatcher;
pub mod modifiers;
pub mod synth;

use thiserror::Error;

use crate::config::Config;
use crate::platform::{InputCapture, PlatformError, RawKeyEvent};
use dispatcher::Dispatcher;
use synth::TapSink;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("keyboard hook is already installed")]
    AlreadyInstalled,
    /// `install` was already attempted on this engine; a new engine is needed.
    #[error("engine has already been used")]
    Spent,
    #[error("failed to start synthesizer runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

enum Stage {
    Ready(Dispatcher),
    Installed,
    Spent,
}

pub struct InterceptionEngine {
    capture: Box<dyn InputCapture>,
    stage: Stage,
}

impl InterceptionEngine {
    pub fn new(capture: Box<dyn InputCapture>, taps: Box<dyn TapSink>, config: &Config) -> Self {
        Self {
            capture,
            stage: Stage::Ready(Dispatcher::new(taps, config)),
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self.stage, Stage::Installed)
    }

    /// Registers the global keyboard hook. Callable once per engine.
    pub fn install(&mut self) -> Result<(), EngineError> {
        let mut dispatcher = match std::mem::replace(&mut self.stage, Stage::Spent) {
            Stage::Ready(d) => d,
            Stage::Installed => {
                self.stage = Stage::Installed;
                return Err(EngineError::AlreadyInstalled);
            }
            Stage::Spent => return Err(EngineError::Spent),
        };

        self.capture
            .start(Box::new(move |event: &RawKeyEvent| dispatcher.classify(event)))?;
        self.stage = Stage::Installed;
        log::info!("engine: installed (CapsLock -> Shift+Alt, Shift+CapsLock -> CapsLock)");
        Ok(())
    }

    /// Deregisters the hook. A no-op when nothing is installed; failures are
    /// logged and otherwise ignored.
    pub fn uninstall(&mut self) {
        if !self.is_installed() {
            return;
        }
        self.stage = Stage::Spent;
        match self.capture.stop() {
            Ok(()) => log::info!("engine: uninstalled"),
            Err(e) => log::warn!("engine: uninstall failed: {e}"),
        }
    }
}

impl Drop for InterceptionEngine {
    fn drop(&mut self) {
        self.uninstall();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::keycodes::{VK_CAPITAL, VK_LSHIFT};
    use crate::platform::{KeyHandler, Verdict};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Capture double: keeps the handler so tests can play the OS role.
    #[derive(Clone, Default)]
    struct FakeCapture {
        handler: Arc<Mutex<Option<KeyHandler>>>,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        refuse: bool,
    }

    impl FakeCapture {
        fn deliver(&self, event: RawKeyEvent) -> Verdict {
            let mut guard = self.handler.lock().unwrap();
            let handler = guard.as_mut().expect("hook not installed");
            handler(&event)
        }
    }

    impl InputCapture for FakeCapture {
        fn start(&mut self, handler: KeyHandler) -> Result<(), PlatformError> {
            if self.refuse {
                return Err(PlatformError::HookInstall("access denied".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.handler.lock().unwrap() = Some(handler);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), PlatformError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            *self.handler.lock().unwrap() = None;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSink(Arc<AtomicUsize>);

    impl TapSink for CountingSink {
        fn schedule_tap(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine(capture: &FakeCapture, sink: &CountingSink) -> InterceptionEngine {
        InterceptionEngine::new(
            Box::new(capture.clone()),
            Box::new(sink.clone()),
            &Config::default(),
        )
    }

    #[test]
    fn installed_engine_classifies_delivered_events() {
        let capture = FakeCapture::default();
        let sink = CountingSink::default();
        let mut engine = engine(&capture, &sink);
        engine.install().unwrap();
        assert!(engine.is_installed());

        assert_eq!(capture.deliver(RawKeyEvent::down(VK_CAPITAL)), Verdict::Suppress);
        assert_eq!(capture.deliver(RawKeyEvent::up(VK_CAPITAL)), Verdict::Suppress);
        assert_eq!(capture.deliver(RawKeyEvent::down(VK_LSHIFT)), Verdict::PassThrough);
        assert_eq!(capture.deliver(RawKeyEvent::down(VK_CAPITAL)), Verdict::PassThrough);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_install_is_rejected() {
        let capture = FakeCapture::default();
        let mut engine = engine(&capture, &CountingSink::default());
        engine.install().unwrap();
        assert!(matches!(engine.install(), Err(EngineError::AlreadyInstalled)));
        assert!(engine.is_installed());
        assert_eq!(capture.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn install_failure_propagates() {
        let capture = FakeCapture {
            refuse: true,
            ..Default::default()
        };
        let mut engine = engine(&capture, &CountingSink::default());
        let err = engine.install().unwrap_err();
        assert!(matches!(err, EngineError::Platform(PlatformError::HookInstall(_))));
        assert!(!engine.is_installed());
        assert!(matches!(engine.install(), Err(EngineError::Spent)));
    }

    #[test]
    fn uninstall_is_idempotent() {
        let capture = FakeCapture::default();
        let mut engine = engine(&capture, &CountingSink::default());
        engine.uninstall();
        assert_eq!(capture.stops.load(Ordering::SeqCst), 0);

        engine.install().unwrap();
        engine.uninstall();
        engine.uninstall();
        assert!(!engine.is_installed());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_the_hook() {
        let capture = FakeCapture::default();
        {
            let mut engine = engine(&capture, &CountingSink::default());
            engine.install().unwrap();
        }
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
        assert!(capture.handler.lock().unwrap().is_none());
    }

    #[test]
    fn drop_during_panic_releases_the_hook() {
        let capture = FakeCapture::default();
        let inner = capture.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut engine = engine(&inner, &CountingSink::default());
            engine.install().unwrap();
            panic!("fault while running");
        }));
        assert!(result.is_err());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }
}
