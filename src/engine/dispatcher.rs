//! The CapsLock classification state machine.
//!
//! | event         | shift held | verdict     | side effect   |
//! |---------------|------------|-------------|---------------|
//! | CapsLock down | yes        | PassThrough |               |
//! | CapsLock down | no         | Suppress    | schedule tap  |
//! | CapsLock up   | yes        | PassThrough |               |
//! | CapsLock up   | no         | Suppress    |               |
//!
//! Every other key, Shift and Alt included, passes through after updating the
//! tracker. Synthesized Shift/Alt therefore re-enter harmlessly.
//!
//! Every keydown, auto-repeats included, is classified from the live Shift
//! state. Under `KeyupPolicy::Symmetric` the keyup reuses the verdict of the
//! most recent keydown instead, so a Shift transition mid-press cannot
//! forward a keyup whose keydown was swallowed, or the reverse.
//!
//! `RepeatPolicy::First` latches after a tapping keydown. The latch clears on
//! a CapsLock keyup or on any other hardware keydown; auto-repeat only
//! repeats the last key pressed, so either means the next CapsLock keydown
//! is a fresh press even when a keyup went missing.

use super::modifiers::ModifierStateTracker;
use super::synth::TapSink;
use crate::config::{Config, KeyupPolicy, RepeatPolicy};
use crate::platform::keycodes::{vkcode_to_keycode, KeyCode};
use crate::platform::{KeyState, RawKeyEvent, Verdict};

pub struct Dispatcher {
    modifiers: ModifierStateTracker,
    taps: Box<dyn TapSink>,
    keyup_policy: KeyupPolicy,
    repeat: RepeatPolicy,
    /// Verdict of the last CapsLock keydown whose keyup has not been seen.
    press: Option<Verdict>,
    /// A tap was scheduled for the CapsLock press currently auto-repeating.
    latched: bool,
}

impl Dispatcher {
    pub fn new(taps: Box<dyn TapSink>, config: &Config) -> Self {
        Self {
            modifiers: ModifierStateTracker::new(),
            taps,
            keyup_policy: config.keyup_policy,
            repeat: config.repeat,
            press: None,
            latched: false,
        }
    }

    pub fn is_modifier_held(&self) -> bool {
        self.modifiers.is_modifier_held()
    }

    /// Classifies one event. Runs on the delivery thread and never blocks.
    pub fn classify(&mut self, event: &RawKeyEvent) -> Verdict {
        self.modifiers.observe(event);

        if vkcode_to_keycode(event.vk) != KeyCode::CapsLock {
            if event.is_down() && !event.injected {
                self.latched = false;
            }
            return Verdict::PassThrough;
        }

        let verdict = match event.state {
            KeyState::Down => self.on_caps_down(),
            KeyState::Up => self.on_caps_up(),
        };
        log::debug!(
            "engine: capslock {:?}{} shift={} -> {:?}",
            event.state,
            if event.injected { " (injected)" } else { "" },
            self.is_modifier_held(),
            verdict
        );
        verdict
    }

    fn live_verdict(&self) -> Verdict {
        if self.modifiers.is_modifier_held() {
            Verdict::PassThrough
        } else {
            Verdict::Suppress
        }
    }

    fn on_caps_down(&mut self) -> Verdict {
        let verdict = self.live_verdict();
        if verdict == Verdict::Suppress {
            if self.repeat == RepeatPolicy::Every || !self.latched {
                self.taps.schedule_tap();
            }
            self.latched = true;
        }
        self.press = Some(verdict);
        verdict
    }

    fn on_caps_up(&mut self) -> Verdict {
        self.latched = false;
        match (self.keyup_policy, self.press.take()) {
            (KeyupPolicy::Symmetric, Some(held)) => held,
            _ => self.live_verdict(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::keycodes::{VK_CAPITAL, VK_LMENU, VK_LSHIFT, VK_RSHIFT};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use Verdict::{PassThrough, Suppress};

    #[derive(Clone, Default)]
    struct CountingSink(Arc<AtomicUsize>);

    impl TapSink for CountingSink {
        fn schedule_tap(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher_with(config: Config) -> (Dispatcher, Arc<AtomicUsize>) {
        let sink = CountingSink::default();
        let count = Arc::clone(&sink.0);
        (Dispatcher::new(Box::new(sink), &config), count)
    }

    fn dispatcher() -> (Dispatcher, Arc<AtomicUsize>) {
        dispatcher_with(Config::default())
    }

    fn run(d: &mut Dispatcher, events: &[RawKeyEvent]) -> Vec<Verdict> {
        events.iter().map(|e| d.classify(e)).collect()
    }

    fn down(vk: u16) -> RawKeyEvent {
        RawKeyEvent::down(vk)
    }

    fn up(vk: u16) -> RawKeyEvent {
        RawKeyEvent::up(vk)
    }

    #[test]
    fn bare_capslock_is_swallowed_and_taps_once() {
        let (mut d, taps) = dispatcher();
        assert_eq!(d.classify(&down(VK_CAPITAL)), Suppress);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
        assert_eq!(d.classify(&up(VK_CAPITAL)), Suppress);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shift_capslock_passes_through() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_LSHIFT), down(VK_CAPITAL), up(VK_CAPITAL), up(VK_LSHIFT)],
        );
        assert_eq!(verdicts, vec![PassThrough; 4]);
        assert_eq!(taps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn right_shift_also_keeps_native_capslock() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(&mut d, &[down(VK_RSHIFT), down(VK_CAPITAL), up(VK_CAPITAL)]);
        assert_eq!(verdicts, vec![PassThrough; 3]);
        assert_eq!(taps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rapid_double_press_yields_two_pairs_and_two_taps() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_CAPITAL), up(VK_CAPITAL), down(VK_CAPITAL), up(VK_CAPITAL)],
        );
        assert_eq!(verdicts, vec![Suppress; 4]);
        assert_eq!(taps.load(Ordering::SeqCst), 2);
    }

    /// Feeding the tap's own Shift/Alt back in never suppresses or re-taps,
    /// and leaves Shift released afterwards.
    #[test]
    fn synthesized_events_do_not_loop() {
        let (mut d, taps) = dispatcher();
        d.classify(&down(VK_CAPITAL));
        let injected = [down(VK_LSHIFT), down(VK_LMENU), up(VK_LMENU), up(VK_LSHIFT)]
            .map(|mut e| {
                e.injected = true;
                e
            });
        assert_eq!(run(&mut d, &injected), vec![PassThrough; 4]);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
        assert!(!d.is_modifier_held());
        assert_eq!(d.classify(&up(VK_CAPITAL)), Suppress);
    }

    #[test]
    fn unrelated_keys_pass_through() {
        let (mut d, taps) = dispatcher();
        for vk in [0x41u16, 0x0D, VK_LMENU] {
            assert_eq!(d.classify(&down(vk)), PassThrough);
            assert_eq!(d.classify(&up(vk)), PassThrough);
        }
        assert_eq!(taps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn system_key_variant_is_classified_the_same() {
        let (mut d, taps) = dispatcher();
        let mut ev = down(VK_CAPITAL);
        ev.system = true;
        assert_eq!(d.classify(&ev), Suppress);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keyup_matches_keydown_without_shift_transition() {
        for shift_first in [false, true] {
            let (mut d, _) = dispatcher();
            if shift_first {
                d.classify(&down(VK_LSHIFT));
            }
            let on_down = d.classify(&down(VK_CAPITAL));
            d.classify(&down(0x41));
            let on_up = d.classify(&up(VK_CAPITAL));
            assert_eq!(on_down, on_up, "shift held: {shift_first}");
        }
    }

    #[test]
    fn symmetric_keyup_survives_shift_release_mid_press() {
        let (mut d, _) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_LSHIFT), down(VK_CAPITAL), up(VK_LSHIFT), up(VK_CAPITAL)],
        );
        assert_eq!(verdicts[1], PassThrough);
        assert_eq!(verdicts[3], PassThrough);
    }

    #[test]
    fn symmetric_keyup_survives_shift_press_mid_press() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_CAPITAL), down(VK_LSHIFT), up(VK_CAPITAL), up(VK_LSHIFT)],
        );
        assert_eq!(verdicts, vec![Suppress, PassThrough, Suppress, PassThrough]);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn independent_keyup_follows_live_shift_state() {
        let (mut d, _) = dispatcher_with(Config {
            keyup_policy: KeyupPolicy::Independent,
            ..Config::default()
        });
        let verdicts = run(
            &mut d,
            &[down(VK_LSHIFT), down(VK_CAPITAL), up(VK_LSHIFT), up(VK_CAPITAL)],
        );
        assert_eq!(verdicts[1], PassThrough);
        assert_eq!(verdicts[3], Suppress);
    }

    #[test]
    fn auto_repeat_taps_every_time_by_default() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_CAPITAL), down(VK_CAPITAL), down(VK_CAPITAL), up(VK_CAPITAL)],
        );
        assert_eq!(verdicts, vec![Suppress; 4]);
        assert_eq!(taps.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn auto_repeat_taps_once_when_latched() {
        let (mut d, taps) = dispatcher_with(Config {
            repeat: RepeatPolicy::First,
            ..Config::default()
        });
        run(
            &mut d,
            &[down(VK_CAPITAL), down(VK_CAPITAL), down(VK_CAPITAL), up(VK_CAPITAL)],
        );
        assert_eq!(taps.load(Ordering::SeqCst), 1);
        d.classify(&down(VK_CAPITAL));
        assert_eq!(taps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stray_keyup_without_press_uses_live_state() {
        let (mut d, _) = dispatcher();
        assert_eq!(d.classify(&up(VK_CAPITAL)), Suppress);
        d.classify(&down(VK_LSHIFT));
        assert_eq!(d.classify(&up(VK_CAPITAL)), PassThrough);
    }

    /// The keyup of a Shift+CapsLock press was lost; the next bare press is
    /// still swallowed and taps.
    #[test]
    fn lost_keyup_does_not_poison_next_press() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_LSHIFT), down(VK_CAPITAL), up(VK_LSHIFT), down(VK_CAPITAL)],
        );
        assert_eq!(verdicts[1], PassThrough);
        assert_eq!(verdicts[3], Suppress);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
        assert_eq!(d.classify(&up(VK_CAPITAL)), Suppress);
    }

    #[test]
    fn shift_pressed_during_repeat_restores_native_capslock() {
        let (mut d, taps) = dispatcher();
        let verdicts = run(
            &mut d,
            &[down(VK_CAPITAL), down(VK_LSHIFT), down(VK_CAPITAL), up(VK_CAPITAL)],
        );
        assert_eq!(verdicts, vec![Suppress, PassThrough, PassThrough, PassThrough]);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latch_clears_when_another_key_is_pressed() {
        let (mut d, taps) = dispatcher_with(Config {
            repeat: RepeatPolicy::First,
            ..Config::default()
        });
        // CapsLock keyup lost between the two presses.
        run(&mut d, &[down(VK_CAPITAL), down(0x41), up(0x41), down(VK_CAPITAL)]);
        assert_eq!(taps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn injected_keys_keep_the_latch() {
        let (mut d, taps) = dispatcher_with(Config {
            repeat: RepeatPolicy::First,
            ..Config::default()
        });
        d.classify(&down(VK_CAPITAL));
        for mut e in [down(VK_LSHIFT), down(VK_LMENU), up(VK_LMENU), up(VK_LSHIFT)] {
            e.injected = true;
            d.classify(&e);
        }
        assert_eq!(d.classify(&down(VK_CAPITAL)), Suppress);
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }
}
