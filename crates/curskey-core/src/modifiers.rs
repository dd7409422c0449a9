//! Physical modifier tracking.
//!
//! Mapping targets carry modifier chord bits above the 8-bit virtual-key range;
//! the tracker mirrors which modifiers are really held so the synthesizer only
//! injects the ones that are missing.

use crate::keys::{
    VK_CONTROL, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_MENU, VK_RCONTROL, VK_RMENU,
    VK_RSHIFT, VK_RWIN, VK_SHIFT,
};

pub const SHIFT_FLAG: u32 = 0x0001_0000;
pub const CTRL_FLAG: u32 = 0x0002_0000;
pub const ALT_FLAG: u32 = 0x0004_0000;
pub const WIN_FLAG: u32 = 0x0008_0000;

pub const MODIFIER_MASK: u32 = SHIFT_FLAG | CTRL_FLAG | ALT_FLAG | WIN_FLAG;

pub struct ModMapping {
    pub bit: u32,
    /// codes[0] is the key synthesized when the chord needs this modifier.
    pub codes: [u32; 3],
}

pub const MODIFIER_TABLE: [ModMapping; 4] = [
    ModMapping {
        bit: SHIFT_FLAG,
        codes: [VK_SHIFT, VK_LSHIFT, VK_RSHIFT],
    },
    ModMapping {
        bit: CTRL_FLAG,
        codes: [VK_CONTROL, VK_LCONTROL, VK_RCONTROL],
    },
    ModMapping {
        bit: ALT_FLAG,
        codes: [VK_MENU, VK_LMENU, VK_RMENU],
    },
    ModMapping {
        bit: WIN_FLAG,
        codes: [VK_LWIN, VK_RWIN, 0],
    },
];

pub fn is_modifier_key(vk: u32) -> bool {
    vk != 0 && MODIFIER_TABLE.iter().any(|mm| mm.codes.contains(&vk))
}

/// Bitmask of the modifiers currently held on the physical keyboard.
///
/// Observes every raw event, before any filtering, so it never drifts from the
/// real key state. Down sets the bit, up clears it, left/right variants fold
/// onto the same flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModifierTracker {
    state: u32,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, vk: u32, down: bool) {
        if vk == 0 {
            return;
        }
        for mm in &MODIFIER_TABLE {
            if mm.codes.contains(&vk) {
                if down {
                    self.state |= mm.bit;
                } else {
                    self.state &= !mm.bit;
                }
            }
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}
