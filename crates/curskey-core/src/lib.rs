pub mod engine;
pub mod keys;
pub mod modifiers;
pub mod options;
pub mod state_machine;
pub mod types;

#[cfg(windows)]
pub mod foreground;
#[cfg(windows)]
pub mod keyboard_hook;

pub use engine::{Engine, ENGINE};
pub use options::{settings_path, Options};
pub use types::{InputEvent, KeyAction};
