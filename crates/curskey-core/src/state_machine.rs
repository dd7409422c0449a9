//! Translation state machine.
//!
//! A Mealy machine resolving the central ambiguity: is this activation-key
//! press the start of a plain tap, part of an ordinary chord with another key,
//! or a layer shift? Every transition is final once taken; there is no
//! speculative rollback. The table is static data and actions are a closed
//! enum, so the compiler checks exhaustiveness wherever they are interpreted.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ActivationDown,
    ActivationUp,
    MappedDown,
    MappedUp,
    OtherDown,
    OtherUp,
    ConfigDown,
}

pub const NUM_EVENTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    WaitMappedDown,
    /// Activation key plus a non-mapped key are both down and were passed
    /// through live as an ordinary chord.
    WaitMappedDownEmitted,
    /// Activation key down, a mapped key delayed, tap-vs-layer undecided.
    WaitMappedUp,
    WaitMappedUpEmitted,
    /// Committed: the activation key is a pure layer shift until released.
    Mapping,
}

pub const NUM_STATES: usize = 6;

/// Emission behavior attached to a transition. `Ignore` lets the raw event
/// through; every other action swallows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ignore,
    Discard,
    /// Synthesize the activation key's own down+up pair.
    TapActivation,
    /// Chord pass-through: activation down, then the current key down.
    ActivationDownThenKey,
    /// Park the current key-down until the gesture resolves.
    DelayKey,
    /// Resolve as plain typing: activation down, delayed key down, activation up.
    EmitActSavedActUp,
    /// Same, but the activation down was already emitted earlier.
    EmitSavedActUp,
    /// Commit to the layer: translate the delayed key, then the current one.
    MapSavedAndCurrentDown,
    MapSavedAndCurrentUp,
    /// Plain-typing resolution joined by a third key.
    EmitActSavedCurrentDown,
    EmitActSavedCurrentUp,
    EmitSavedCurrentDown,
    /// Live translation while the layer is held.
    MapDown,
    MapUp,
    /// Layer released: force key-ups for everything still held via the mapping.
    ReleaseHeld,
    OpenConfig,
}

pub struct Transition {
    pub event: Event,
    /// `None` is a self-loop.
    pub next: Option<State>,
    pub action: Action,
}

const fn t(event: Event, next: Option<State>, action: Action) -> Transition {
    Transition {
        event,
        next,
        action,
    }
}

use Action::*;
use Event::*;
use State::*;

#[rustfmt::skip]
pub static TRANSITIONS: [[Transition; NUM_EVENTS]; NUM_STATES] = [
    [   // Idle
        t(ActivationDown, Some(WaitMappedDown), Discard),
        t(ActivationUp,   None,                 Ignore),
        t(MappedDown,     None,                 Ignore),
        t(MappedUp,       None,                 Ignore),
        t(OtherDown,      None,                 Ignore),
        t(OtherUp,        None,                 Ignore),
        t(ConfigDown,     None,                 Ignore),
    ],
    [   // WaitMappedDown
        t(ActivationDown, None,                        Discard),
        t(ActivationUp,   Some(Idle),                  TapActivation),
        t(MappedDown,     Some(WaitMappedUp),          DelayKey),
        t(MappedUp,       None,                        Ignore),
        t(OtherDown,      Some(WaitMappedDownEmitted), ActivationDownThenKey),
        t(OtherUp,        None,                        Ignore),
        t(ConfigDown,     None,                        OpenConfig),
    ],
    [   // WaitMappedDownEmitted
        t(ActivationDown, None,                      Discard),
        t(ActivationUp,   Some(Idle),                Ignore),
        t(MappedDown,     Some(WaitMappedUpEmitted), DelayKey),
        t(MappedUp,       None,                      Ignore),
        t(OtherDown,      None,                      Ignore),
        t(OtherUp,        None,                      Ignore),
        t(ConfigDown,     None,                      OpenConfig),
    ],
    [   // WaitMappedUp (might still emit the activation key)
        t(ActivationDown, None,                      Discard),
        t(ActivationUp,   Some(Idle),                EmitActSavedActUp),
        t(MappedDown,     Some(Mapping),             MapSavedAndCurrentDown),
        t(MappedUp,       Some(Mapping),             MapSavedAndCurrentUp),
        t(OtherDown,      Some(Idle),                EmitActSavedCurrentDown),
        t(OtherUp,        Some(WaitMappedUpEmitted), EmitActSavedCurrentUp),
        t(ConfigDown,     None,                      OpenConfig),
    ],
    [   // WaitMappedUpEmitted
        t(ActivationDown, None,          Discard),
        t(ActivationUp,   Some(Idle),    EmitSavedActUp),
        t(MappedDown,     Some(Mapping), MapSavedAndCurrentDown),
        t(MappedUp,       Some(Mapping), MapSavedAndCurrentUp),
        t(OtherDown,      Some(Idle),    EmitSavedCurrentDown),
        t(OtherUp,        None,          Ignore),
        t(ConfigDown,     None,          OpenConfig),
    ],
    [   // Mapping (the activation key is definitely eaten)
        t(ActivationDown, None,       Discard),
        t(ActivationUp,   Some(Idle), ReleaseHeld),
        t(MappedDown,     None,       MapDown),
        t(MappedUp,       None,       MapUp),
        t(OtherDown,      None,       Ignore),
        t(OtherUp,        None,       Ignore),
        t(ConfigDown,     None,       OpenConfig),
    ],
];

#[derive(Debug)]
pub struct StateMachine {
    state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: Idle }
    }
}

impl StateMachine {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = Idle;
    }

    /// Takes the transition for `event` and returns the action to interpret.
    pub fn step(&mut self, event: Event) -> Action {
        let transition = &TRANSITIONS[self.state as usize][event as usize];
        debug_assert_eq!(transition.event, event);
        if let Some(next) = transition.next {
            self.state = next;
        }
        transition.action
    }
}
