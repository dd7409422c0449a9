//! The key-translation engine.
//!
//! `Engine::process_key` is the single entry point the hook callback drives:
//! it updates modifier tracking, applies per-program policy, classifies the
//! event for the state machine, and interprets the resulting action into a
//! verdict plus zero or more events to inject. All mutable state lives in this
//! one owned value; the hook serializes access through the `ENGINE` mutex, so
//! there is exactly one engine per process and no other thread touches it.

use crate::keys::{is_extended_key, CONFIG_KEY};
use crate::modifiers::{is_modifier_key, ModifierTracker, MODIFIER_MASK, MODIFIER_TABLE};
use crate::options::{Options, MAX_CODES};
use crate::state_machine::{Action, Event, StateMachine};
use crate::types::{InputEvent, KeyAction};
use parking_lot::Mutex;
use tracing::info;

lazy_static::lazy_static! {
    pub static ref ENGINE: Mutex<Engine> = Mutex::new(Engine::default());
}

type Callback = Box<dyn Fn() + Send + Sync>;

pub struct Engine {
    options: Options,
    modifiers: ModifierTracker,
    machine: StateMachine,
    /// At most one key-down parked while its fate is undecided.
    pending: Option<u32>,
    /// Target codes currently down because we translated them, indexed by the
    /// low byte. Forced up when the activation key releases, so nothing sticks.
    held: [bool; MAX_CODES],
    on_open_config: Option<Callback>,
    on_training_mistake: Option<Callback>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Engine {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            modifiers: ModifierTracker::new(),
            machine: StateMachine::default(),
            pending: None,
            held: [false; MAX_CODES],
            on_open_config: None,
            on_training_mistake: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn set_on_open_config(&mut self, cb: impl Fn() + Send + Sync + 'static) {
        self.on_open_config = Some(Box::new(cb));
    }

    pub fn set_on_training_mistake(&mut self, cb: impl Fn() + Send + Sync + 'static) {
        self.on_training_mistake = Some(Box::new(cb));
    }

    /// Replaces the options wholesale and abandons any gesture in progress.
    ///
    /// Held-mapped bookkeeping survives a reload on purpose: stale entries are
    /// force-released by the next activation-key release, so clearing them here
    /// would only lose the key-ups.
    pub fn reload(&mut self, options: Options) {
        self.machine.reset();
        self.pending = None;
        self.options = options;
        info!("options reloaded, translation state reset");
    }

    /// Runs one raw hook event through the full pipeline and returns the
    /// verdict. `up` is the key direction, `injected` marks events carrying our
    /// own injection sentinel, `exe_name` is the foreground process base name
    /// (None when the lookup failed).
    pub fn process_key(
        &mut self,
        vk: u32,
        up: bool,
        injected: bool,
        exe_name: Option<&str>,
    ) -> KeyAction {
        // Modifier state must follow every event, injected ones included,
        // before any filtering.
        self.modifiers.observe(vk, !up);

        if injected {
            return KeyAction::Pass;
        }
        if !self.options.enabled {
            return KeyAction::Pass;
        }

        let exe_name = exe_name.unwrap_or("");
        if !self.options.mapping_enabled_for(exe_name) {
            return KeyAction::Pass;
        }

        if self.options.training_mode
            && !self.options.allowed_in_training(vk, self.modifiers.state())
            && self.options.training_enabled_for(exe_name)
        {
            if !up && self.options.beep_for_mistakes {
                if let Some(cb) = &self.on_training_mistake {
                    cb();
                }
            }
            return KeyAction::Block;
        }

        // Modifier chords are synthesized, never remapped; letting raw
        // modifiers through keeps "activation then ctrl" combinations intact.
        if is_modifier_key(vk) {
            return KeyAction::Pass;
        }

        let event = self.classify(vk, up);
        let action = self.machine.step(event);

        let mut out = Vec::new();
        if self.apply(action, vk, &mut out) {
            if out.is_empty() {
                KeyAction::Block
            } else {
                KeyAction::Inject(out)
            }
        } else {
            KeyAction::Pass
        }
    }

    fn classify(&self, vk: u32, up: bool) -> Event {
        if vk == self.options.activation_key {
            if up {
                Event::ActivationUp
            } else {
                Event::ActivationDown
            }
        } else if vk == CONFIG_KEY && !up {
            Event::ConfigDown
        } else if self.options.key_mapping.target(vk) != 0 {
            if up {
                Event::MappedUp
            } else {
                Event::MappedDown
            }
        } else if up {
            Event::OtherUp
        } else {
            Event::OtherDown
        }
    }

    /// Interprets a transition action. Returns true when the raw event is
    /// handled (swallowed), false to let the OS deliver it.
    fn apply(&mut self, action: Action, vk: u32, out: &mut Vec<InputEvent>) -> bool {
        let activation = self.options.activation_key;
        match action {
            Action::Ignore => return false,
            Action::Discard => {}
            Action::TapActivation => {
                self.key_event(activation, false, out);
                self.key_event(activation, true, out);
            }
            Action::ActivationDownThenKey => {
                self.key_event(activation, false, out);
                self.key_event(vk, false, out);
            }
            Action::DelayKey => {
                debug_assert!(self.pending.is_none(), "second delayed key");
                self.pending = Some(vk);
            }
            Action::EmitActSavedActUp => {
                self.key_event(activation, false, out);
                self.emit_saved(out);
                self.key_event(activation, true, out);
            }
            Action::EmitSavedActUp => {
                self.emit_saved(out);
                self.key_event(activation, true, out);
            }
            Action::MapSavedAndCurrentDown => {
                self.map_saved_down(out);
                self.map_key(vk, false, out);
            }
            Action::MapSavedAndCurrentUp => {
                self.map_saved_down(out);
                self.map_key(vk, true, out);
            }
            Action::EmitActSavedCurrentDown => {
                self.key_event(activation, false, out);
                self.emit_saved(out);
                self.key_event(vk, false, out);
            }
            Action::EmitActSavedCurrentUp => {
                self.key_event(activation, false, out);
                self.emit_saved(out);
                self.key_event(vk, true, out);
            }
            Action::EmitSavedCurrentDown => {
                self.emit_saved(out);
                self.key_event(vk, false, out);
            }
            Action::MapDown => {
                self.map_key(vk, false, out);
            }
            Action::MapUp => {
                self.map_key(vk, true, out);
            }
            Action::ReleaseHeld => self.release_held(out),
            Action::OpenConfig => {
                if let Some(cb) = &self.on_open_config {
                    cb();
                }
            }
        }
        true
    }

    /// Emits `code` as one or more injected events. Chord modifier bits that
    /// are not already physically held are pressed before the base key and
    /// released right after its down event; a key-up emits the base key only.
    fn key_event(&mut self, code: u32, up: bool, out: &mut Vec<InputEvent>) {
        let needed = code & MODIFIER_MASK & !self.modifiers.state();
        if !up {
            for mm in &MODIFIER_TABLE {
                if needed & mm.bit != 0 {
                    push(mm.codes[0], false, out);
                }
            }
        }
        push(code & 0xFF, up, out);
        if !up {
            for mm in &MODIFIER_TABLE {
                if needed & mm.bit != 0 {
                    push(mm.codes[0], true, out);
                }
            }
        }
    }

    fn map_key(&mut self, code: u32, up: bool, out: &mut Vec<InputEvent>) {
        let target = self.options.key_mapping.target(code);
        if target != 0 {
            self.held[(target & 0xFF) as usize] = !up;
            self.key_event(target, up, out);
        }
    }

    fn emit_saved(&mut self, out: &mut Vec<InputEvent>) {
        if let Some(code) = self.pending.take() {
            self.key_event(code, false, out);
        }
    }

    fn map_saved_down(&mut self, out: &mut Vec<InputEvent>) {
        if let Some(code) = self.pending.take() {
            self.map_key(code, false, out);
        }
    }

    // Release order is ascending key-code order.
    fn release_held(&mut self, out: &mut Vec<InputEvent>) {
        for code in 0..MAX_CODES {
            if self.held[code] {
                self.held[code] = false;
                self.key_event(code as u32, true, out);
            }
        }
    }
}

fn push(vk: u32, up: bool, out: &mut Vec<InputEvent>) {
    out.push(InputEvent {
        vk: vk as u16,
        ext: is_extended_key(vk),
        up,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{VK_CONTROL, VK_DELETE, VK_F5, VK_LEFT, VK_SPACE};
    use crate::modifiers::CTRL_FLAG;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DN: bool = false;
    const UP: bool = true;

    const SP: u32 = VK_SPACE;
    const LE: u32 = VK_LEFT;
    const DEL: u32 = VK_DELETE;
    const F5: u32 = VK_F5;
    const CTRL: u32 = VK_CONTROL;
    const J: u32 = b'J' as u32;
    const M: u32 = b'M' as u32;
    const X: u32 = b'X' as u32;
    const C: u32 = b'C' as u32;

    fn ev(vk: u32, up: bool) -> InputEvent {
        InputEvent {
            vk: vk as u16,
            ext: is_extended_key(vk),
            up,
        }
    }

    /// Drives one event and returns what reaches the OS: the raw event itself
    /// on Pass, nothing on Block, the injected sequence on Inject.
    fn run(engine: &mut Engine, vk: u32, up: bool) -> Vec<InputEvent> {
        run_for(engine, vk, up, None)
    }

    fn run_for(engine: &mut Engine, vk: u32, up: bool, exe: Option<&str>) -> Vec<InputEvent> {
        match engine.process_key(vk, up, false, exe) {
            KeyAction::Pass => vec![ev(vk, up)],
            KeyAction::Block => vec![],
            KeyAction::Inject(events) => events,
        }
    }

    #[test]
    fn slow_typing_passes_through() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, UP)]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, DN), ev(SP, UP)]);
        assert_eq!(run(&mut e, X, DN), vec![ev(X, DN)]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(J, DN)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
    }

    #[test]
    fn chord_passthrough_when_other_key_joins() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, UP)]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
    }

    #[test]
    fn autorepeating_activation_key_is_discarded() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, DN), ev(J, DN), ev(SP, UP)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
    }

    #[test]
    fn key_ups_pass_through_while_undecided() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, DN), ev(SP, UP)]);
    }

    #[test]
    fn pending_key_resolves_as_typing_on_other_up() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, X, UP), vec![ev(SP, DN), ev(J, DN), ev(X, UP)]);
        assert_eq!(run(&mut e, X, DN), vec![ev(X, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(J, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, UP)]);
    }

    #[test]
    fn pending_key_resolves_as_typing_on_other_down() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(J, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, UP)]);
    }

    #[test]
    fn layer_commit_translates_without_raw_leak() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        // commit on the mapped key's release: no raw J, no space
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
        assert!(ev(LE, DN).ext);
    }

    #[test]
    fn autorepeat_into_mapping_and_out() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        // repeat commits the layer and replays the delayed down
        assert_eq!(run(&mut e, J, DN), vec![ev(LE, DN), ev(LE, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(LE, DN)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, UP)]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![ev(LE, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(LE, UP)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(J, DN)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
    }

    #[test]
    fn unmapped_keys_pass_during_mapping() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        assert_eq!(run(&mut e, X, DN), vec![ev(X, DN)]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(LE, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(LE, UP)]);
    }

    #[test]
    fn emitted_branch_still_reaches_mapping() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(X, DN)]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        // the space down was already emitted; its release produces nothing
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn emitted_wait_resolves_as_typing() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        // no duplicate space down: it was emitted with the chord already
        assert_eq!(run(&mut e, SP, UP), vec![ev(J, DN), ev(SP, UP)]);
    }

    #[test]
    fn emitted_wait_commits_to_layer() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![ev(LE, DN), ev(LE, DN)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(LE, UP)]);
    }

    #[test]
    fn emitted_wait_other_up_then_commit() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn config_key_fires_callback_in_gesture_states() {
        let mut e = Engine::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        e.set_on_open_config(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // plain F5 in idle passes through untouched
        assert_eq!(run(&mut e, F5, DN), vec![ev(F5, DN)]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, F5, DN), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // F5 release is just another key-up here
        assert_eq!(run(&mut e, F5, UP), vec![ev(F5, UP)]);

        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, F5, DN), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        assert_eq!(run(&mut e, F5, DN), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn config_key_in_emitted_states() {
        let mut e = Engine::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        e.set_on_open_config(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, X, DN), vec![ev(SP, DN), ev(X, DN)]);
        assert_eq!(run(&mut e, F5, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, F5, DN), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(run(&mut e, SP, UP), vec![ev(J, DN), ev(SP, UP)]);
    }

    #[test]
    fn overlapping_mapped_keys() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, M, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![ev(DEL, DN), ev(LE, DN)]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, UP)]);
        assert_eq!(run(&mut e, M, UP), vec![ev(DEL, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn activation_release_frees_held_keys_in_code_order() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, M, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![ev(DEL, DN), ev(LE, DN)]);
        // LEFT (0x25) before DELETE (0x2E)
        assert_eq!(run(&mut e, SP, UP), vec![ev(LE, UP), ev(DEL, UP)]);
    }

    fn ctrl_c_options() -> Options {
        let mut options = Options::default();
        options.key_mapping.set(C, CTRL_FLAG | C);
        options
    }

    #[test]
    fn chorded_target_synthesizes_missing_modifiers() {
        let mut e = Engine::new(ctrl_c_options());
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, C, DN), vec![]);
        assert_eq!(
            run(&mut e, C, UP),
            vec![ev(CTRL, DN), ev(C, DN), ev(CTRL, UP), ev(C, UP)]
        );
        assert_eq!(
            run(&mut e, C, DN),
            vec![ev(CTRL, DN), ev(C, DN), ev(CTRL, UP)]
        );
        assert_eq!(run(&mut e, C, UP), vec![ev(C, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn chorded_target_with_modifier_already_held() {
        let mut e = Engine::new(ctrl_c_options());
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, CTRL, DN), vec![ev(CTRL, DN)]);
        assert_eq!(run(&mut e, C, DN), vec![]);
        // ctrl is physically down; no extra ctrl events
        assert_eq!(run(&mut e, C, UP), vec![ev(C, DN), ev(C, UP)]);
        assert_eq!(run(&mut e, CTRL, UP), vec![ev(CTRL, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn injected_modifier_updates_tracking() {
        let mut e = Engine::new(ctrl_c_options());
        // an injected ctrl-down must still reach the tracker
        assert_eq!(e.process_key(CTRL, DN, true, None), KeyAction::Pass);
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, C, DN), vec![]);
        assert_eq!(run(&mut e, C, UP), vec![ev(C, DN), ev(C, UP)]);
    }

    #[test]
    fn injected_events_skip_the_state_machine() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(e.process_key(J, DN, true, None), KeyAction::Pass);
        // the gesture is still undecided; a real mapped down is delayed
        assert_eq!(run(&mut e, J, DN), vec![]);
        assert_eq!(run(&mut e, J, UP), vec![ev(LE, DN), ev(LE, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![]);
    }

    #[test]
    fn training_mode_blocks_mapped_sources() {
        let mut options = Options::default();
        options.training_mode = true;
        options.beep_for_mistakes = false;
        let mut e = Engine::new(options);

        assert_eq!(run(&mut e, X, DN), vec![ev(X, DN)]);
        assert_eq!(run(&mut e, X, UP), vec![ev(X, UP)]);
        // LEFT is a mapping target: raw use is discarded in both directions
        assert_eq!(run(&mut e, LE, DN), vec![]);
        assert_eq!(run(&mut e, LE, UP), vec![]);
    }

    #[test]
    fn training_mode_with_chorded_target() {
        let mut options = ctrl_c_options();
        options.training_mode = true;
        options.beep_for_mistakes = false;
        let mut e = Engine::new(options);

        // bare C is fine, ctrl+C is the trained-away combination
        assert_eq!(run(&mut e, C, DN), vec![ev(C, DN)]);
        assert_eq!(run(&mut e, C, UP), vec![ev(C, UP)]);
        assert_eq!(run(&mut e, CTRL, DN), vec![ev(CTRL, DN)]);
        assert_eq!(run(&mut e, C, DN), vec![]);
        assert_eq!(run(&mut e, C, UP), vec![]);
        assert_eq!(run(&mut e, CTRL, UP), vec![ev(CTRL, UP)]);
    }

    #[test]
    fn training_mistake_signal_fires_on_down_only() {
        let mut options = Options::default();
        options.training_mode = true;
        let mut e = Engine::new(options);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        e.set_on_training_mistake(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run(&mut e, LE, DN), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(run(&mut e, LE, UP), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn activation_key_always_allowed_in_training() {
        let mut options = Options::default();
        options.training_mode = true;
        options.beep_for_mistakes = false;
        let mut e = Engine::new(options);

        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, DN), ev(SP, UP)]);
    }

    #[test]
    fn policy_deny_list_disables_remapping() {
        let mut options = Options::default();
        options.disable_progs.push("notepad.exe".into());
        let mut e = Engine::new(options);

        let exe = Some("NOTEPAD.EXE");
        assert_eq!(run_for(&mut e, SP, DN, exe), vec![ev(SP, DN)]);
        assert_eq!(run_for(&mut e, J, DN, exe), vec![ev(J, DN)]);
        assert_eq!(run_for(&mut e, J, UP, exe), vec![ev(J, UP)]);
        assert_eq!(run_for(&mut e, SP, UP, exe), vec![ev(SP, UP)]);

        // a different foreground process still gets the layer
        assert_eq!(run_for(&mut e, SP, DN, Some("code.exe")), vec![]);
    }

    #[test]
    fn unknown_process_is_not_in_any_list() {
        let mut options = Options::default();
        options.use_enable_list = true;
        options.enable_progs.push("code.exe".into());
        let mut e = Engine::new(options);

        // lookup failure: allow-list mode means mapping stays off
        assert_eq!(run(&mut e, SP, DN), vec![ev(SP, DN)]);
    }

    #[test]
    fn disabled_engine_passes_everything() {
        let mut options = Options::default();
        options.enabled = false;
        let mut e = Engine::new(options);
        assert_eq!(run(&mut e, SP, DN), vec![ev(SP, DN)]);
        assert_eq!(run(&mut e, J, DN), vec![ev(J, DN)]);
    }

    #[test]
    fn reload_abandons_gesture_in_progress() {
        let mut e = Engine::default();
        assert_eq!(run(&mut e, SP, DN), vec![]);
        assert_eq!(run(&mut e, J, DN), vec![]);
        e.reload(Options::default());
        // delayed key is gone; both releases pass through as ordinary ups
        assert_eq!(run(&mut e, J, UP), vec![ev(J, UP)]);
        assert_eq!(run(&mut e, SP, UP), vec![ev(SP, UP)]);
    }
}
