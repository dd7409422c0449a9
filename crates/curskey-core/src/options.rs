//! Options snapshot: key mapping, activation key, per-program policy lists.
//!
//! The engine treats an `Options` value as immutable between reloads; a reload
//! replaces it wholesale so the hook callback never observes a half-updated
//! mapping. Settings persist as JSON; anything malformed or missing falls back
//! to built-in defaults, which are then re-persisted.

use crate::keys::{
    VK_BACK, VK_DELETE, VK_DOWN, VK_END, VK_HOME, VK_INSERT, VK_LEFT, VK_NEXT, VK_PRIOR, VK_RIGHT,
    VK_SPACE, VK_UP,
};
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MAX_CODES: usize = 0x100;

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fixed 256-slot table, source virtual key -> target code.
///
/// A zero slot means "unmapped". Target codes may carry modifier chord bits
/// above the low byte; lookups always mask the source to 8 bits.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping([u32; MAX_CODES]);

impl KeyMapping {
    pub fn empty() -> Self {
        Self([0; MAX_CODES])
    }

    pub fn target(&self, vk: u32) -> u32 {
        self.0[(vk & 0xFF) as usize]
    }

    pub fn set(&mut self, vk: u32, target: u32) {
        self.0[(vk & 0xFF) as usize] = target;
    }

    /// Whether `target` appears anywhere as a mapping target, exactly as given
    /// (chord bits included).
    pub fn contains_target(&self, target: u32) -> bool {
        self.0.contains(&target)
    }
}

impl Default for KeyMapping {
    fn default() -> Self {
        let mut m = Self::empty();
        m.set(b'I' as u32, VK_UP);
        m.set(b'J' as u32, VK_LEFT);
        m.set(b'K' as u32, VK_DOWN);
        m.set(b'L' as u32, VK_RIGHT);
        // other navigation
        m.set(b'U' as u32, VK_HOME);
        m.set(b'O' as u32, VK_END);
        m.set(b'H' as u32, VK_PRIOR);
        m.set(b'N' as u32, VK_NEXT);
        // insert/delete
        m.set(b'Y' as u32, VK_INSERT);
        m.set(b'M' as u32, VK_DELETE);
        m.set(b'P' as u32, VK_BACK);
        m
    }
}

impl std::fmt::Debug for KeyMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (src, &tgt) in self.0.iter().enumerate() {
            if tgt != 0 {
                map.entry(&src, &tgt);
            }
        }
        map.finish()
    }
}

impl Serialize for KeyMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for KeyMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<u32>::deserialize(deserializer)?;
        if values.len() != MAX_CODES {
            return Err(D::Error::invalid_length(values.len(), &"256 mapping slots"));
        }
        let mut table = [0u32; MAX_CODES];
        table.copy_from_slice(&values);
        Ok(Self(table))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub enabled: bool,
    pub training_mode: bool,
    pub beep_for_mistakes: bool,
    pub activation_key: u32,
    pub key_mapping: KeyMapping,

    pub disable_progs: Vec<String>,
    pub enable_progs: Vec<String>,
    pub never_train_progs: Vec<String>,
    pub only_train_progs: Vec<String>,
    pub use_enable_list: bool,
    pub use_only_train_list: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enabled: true,
            training_mode: false,
            beep_for_mistakes: true,
            activation_key: VK_SPACE,
            key_mapping: KeyMapping::default(),
            disable_progs: Vec::new(),
            enable_progs: Vec::new(),
            never_train_progs: Vec::new(),
            only_train_progs: Vec::new(),
            use_enable_list: false,
            use_only_train_list: false,
        }
    }
}

fn prog_in_list(exe_name: &str, list: &[String]) -> bool {
    list.iter().any(|p| p.eq_ignore_ascii_case(exe_name))
}

impl Options {
    /// Whether remapping applies for the foreground executable.
    /// An unidentified process ("" name) is never in either list.
    pub fn mapping_enabled_for(&self, exe_name: &str) -> bool {
        if self.use_enable_list {
            prog_in_list(exe_name, &self.enable_progs)
        } else {
            !prog_in_list(exe_name, &self.disable_progs)
        }
    }

    /// Whether training-mode enforcement applies for the foreground executable.
    pub fn training_enabled_for(&self, exe_name: &str) -> bool {
        if self.use_only_train_list {
            prog_in_list(exe_name, &self.only_train_progs)
        } else {
            !prog_in_list(exe_name, &self.never_train_progs)
        }
    }

    /// Training mode blocks any key that has a layer binding, unmodified or
    /// combined with the modifiers currently held. The activation key is always
    /// allowed, even when it appears as a mapping target.
    pub fn allowed_in_training(&self, vk: u32, modifier_state: u32) -> bool {
        if vk == self.activation_key {
            return true;
        }
        !(self.key_mapping.contains_target(vk)
            || self.key_mapping.contains_target(vk | modifier_state))
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), OptionsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// First run or bad data: fall back to defaults and store them.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(options) => options,
            Err(err) => {
                warn!("settings unreadable ({err}), using defaults");
                let options = Self::default();
                if let Err(err) = options.save(path) {
                    warn!("could not persist default settings: {err}");
                }
                options
            }
        }
    }
}

pub fn settings_path() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("curskey").join("settings.json")
}
