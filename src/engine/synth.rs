//! Synthesized Shift+Alt tap and its off-thread dispatch.
//!
//! `KeySynthesizer` plays the tap through an `InputInjector`. `TapDispatcher`
//! owns a small tokio runtime; the delivery thread only ever holds a
//! `TapHandle`, whose `schedule_tap` spawns or enqueues and returns at once.
//! Nothing reports completion back to the delivery thread; only `shutdown`
//! waits for taps still in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, Notify};

use super::EngineError;
use crate::config::{Config, DispatchMode};
use crate::platform::keycodes::{VK_LMENU, VK_LSHIFT};
use crate::platform::{InputInjector, KeyState};

/// How long `TapDispatcher::shutdown` lets in-flight taps finish. Taps still
/// running afterwards are dropped, which releases their held keys.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthStep {
    Key { vk: u16, state: KeyState },
    Pause(Duration),
}

/// Settle, Shift down, Alt down, hold, Alt up, Shift up.
///
/// Alt is strictly nested inside Shift so the OS sees one Shift+Alt chord.
pub fn shift_alt_sequence(settle: Duration, hold: Duration) -> Vec<SynthStep> {
    vec![
        SynthStep::Pause(settle),
        SynthStep::Key { vk: VK_LSHIFT, state: KeyState::Down },
        SynthStep::Key { vk: VK_LMENU, state: KeyState::Down },
        SynthStep::Pause(hold),
        SynthStep::Key { vk: VK_LMENU, state: KeyState::Up },
        SynthStep::Key { vk: VK_LSHIFT, state: KeyState::Up },
    ]
}

// ---------------------------------------------------------------------------
// KeySynthesizer
// ---------------------------------------------------------------------------

/// Keys a tap has pressed and not yet released. Dropping it with keys still
/// held (tap cancelled mid-hold) injects their key-ups in reverse order.
struct HeldKeys<'a> {
    injector: &'a dyn InputInjector,
    held: Vec<u16>,
}

impl Drop for HeldKeys<'_> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        log::debug!("synth: tap cancelled, releasing {:02x?}", self.held);
        for &vk in self.held.iter().rev() {
            if let Err(e) = self.injector.inject(vk, KeyState::Up) {
                log::debug!("synth: release of {vk:#04x} failed: {e}");
            }
        }
    }
}

pub struct KeySynthesizer {
    injector: Arc<dyn InputInjector>,
    settle: Duration,
    hold: Duration,
}

impl KeySynthesizer {
    pub fn new(injector: Arc<dyn InputInjector>, config: &Config) -> Self {
        Self {
            injector,
            settle: config.settle(),
            hold: config.hold(),
        }
    }

    pub fn sequence(&self) -> Vec<SynthStep> {
        shift_alt_sequence(self.settle, self.hold)
    }

    /// Plays one Shift+Alt tap. Must run off the delivery thread.
    ///
    /// A rejected injection is dropped; the remaining steps still run. If the
    /// future is dropped part-way, keys it pressed are released, so no key is
    /// left logically down either way.
    pub async fn tap_shift_alt(&self) {
        let mut keys = HeldKeys {
            injector: self.injector.as_ref(),
            held: Vec::new(),
        };
        for step in self.sequence() {
            match step {
                SynthStep::Pause(d) if d.is_zero() => {}
                SynthStep::Pause(d) => tokio::time::sleep(d).await,
                SynthStep::Key { vk, state } => {
                    if state == KeyState::Up {
                        keys.held.retain(|&k| k != vk);
                    }
                    match self.injector.inject(vk, state) {
                        Ok(()) if state == KeyState::Down => keys.held.push(vk),
                        Ok(()) => {}
                        Err(e) => log::debug!("synth: dropped {vk:#04x} {state:?}: {e}"),
                    }
                }
            }
        }
        log::debug!("synth: shift+alt tap sent");
    }
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

/// Count of scheduled taps that have not finished or been dropped.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(self: &Arc<Self>) -> Pending {
        self.count.fetch_add(1, Ordering::SeqCst);
        Pending(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// One scheduled tap; finishing or dropping it decrements the count.
struct Pending(Arc<InFlight>);

impl Drop for Pending {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Fire-and-forget tap scheduling, called from the delivery thread.
///
/// Implementations must never block or wait on the tap itself.
pub trait TapSink: Send {
    fn schedule_tap(&self);
}

/// Owns the background runtime that plays taps.
pub struct TapDispatcher {
    runtime: Runtime,
    synth: Arc<KeySynthesizer>,
    queue: Option<mpsc::UnboundedSender<Pending>>,
    in_flight: Arc<InFlight>,
}

impl TapDispatcher {
    pub fn new(synth: KeySynthesizer, mode: DispatchMode) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("capsswitch-synth")
            .enable_time()
            .build()
            .map_err(EngineError::Runtime)?;
        let synth = Arc::new(synth);

        let queue = match mode {
            DispatchMode::Concurrent => None,
            DispatchMode::Serialized => {
                let (tx, mut rx) = mpsc::unbounded_channel::<Pending>();
                let worker = Arc::clone(&synth);
                runtime.spawn(async move {
                    while let Some(pending) = rx.recv().await {
                        worker.tap_shift_alt().await;
                        drop(pending);
                    }
                });
                Some(tx)
            }
        };

        log::debug!("synth: dispatcher ready ({mode:?})");
        Ok(Self {
            runtime,
            synth,
            queue,
            in_flight: Arc::default(),
        })
    }

    /// A cheap, `Send` handle for the delivery thread.
    pub fn handle(&self) -> TapHandle {
        TapHandle {
            runtime: self.runtime.handle().clone(),
            synth: Arc::clone(&self.synth),
            queue: self.queue.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Lets in-flight taps finish for up to `SHUTDOWN_GRACE`, then stops the
    /// runtime. Taps dropped by the stop release whatever they still hold.
    pub fn shutdown(self) {
        let in_flight = Arc::clone(&self.in_flight);
        let finished = self
            .runtime
            .block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, in_flight.wait_idle()).await })
            .is_ok();
        if !finished {
            log::debug!("synth: taps still running at shutdown, cancelling");
        }
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
        log::debug!("synth: dispatcher stopped");
    }
}

#[derive(Clone)]
pub struct TapHandle {
    runtime: Handle,
    synth: Arc<KeySynthesizer>,
    queue: Option<mpsc::UnboundedSender<Pending>>,
    in_flight: Arc<InFlight>,
}

impl TapSink for TapHandle {
    fn schedule_tap(&self) {
        let pending = self.in_flight.begin();
        match &self.queue {
            Some(tx) => {
                if tx.send(pending).is_err() {
                    log::debug!("synth: queue closed, tap dropped");
                }
            }
            None => {
                let synth = Arc::clone(&self.synth);
                // Detached: the JoinHandle is dropped immediately.
                drop(self.runtime.spawn(async move {
                    synth.tap_shift_alt().await;
                    drop(pending);
                }));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
