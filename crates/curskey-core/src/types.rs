/// A single key event to be injected.
///
/// `vk` is the bare 8-bit virtual key; chord modifiers have already been
/// expanded into their own events by the time one of these exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub vk: u16,
    pub ext: bool,
    pub up: bool,
}

/// Verdict for one raw hook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Let the OS deliver the original event.
    Pass,
    /// Swallow the original event, inject nothing.
    Block,
    /// Swallow the original event and inject this sequence instead.
    Inject(Vec<InputEvent>),
}
