//! Virtual-key constants and key classification tables.
//!
//! Only the codes the engine actually consults are defined here; they are plain
//! constants (not `windows` crate types) so the engine stays portable for tests.

pub const VK_BACK: u32 = 0x08;
pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12;
pub const VK_SPACE: u32 = 0x20;
pub const VK_PRIOR: u32 = 0x21; // page up
pub const VK_NEXT: u32 = 0x22; // page down
pub const VK_END: u32 = 0x23;
pub const VK_HOME: u32 = 0x24;
pub const VK_LEFT: u32 = 0x25;
pub const VK_UP: u32 = 0x26;
pub const VK_RIGHT: u32 = 0x27;
pub const VK_DOWN: u32 = 0x28;
pub const VK_SNAPSHOT: u32 = 0x2C;
pub const VK_INSERT: u32 = 0x2D;
pub const VK_DELETE: u32 = 0x2E;
pub const VK_LWIN: u32 = 0x5B;
pub const VK_RWIN: u32 = 0x5C;
pub const VK_DIVIDE: u32 = 0x6F;
pub const VK_F5: u32 = 0x74;
pub const VK_NUMLOCK: u32 = 0x90;
pub const VK_LSHIFT: u32 = 0xA0;
pub const VK_RSHIFT: u32 = 0xA1;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;

/// Reserved diagnostic key: pressed during a gesture it opens the configuration
/// editor instead of being translated. Independent of the mapping table.
pub const CONFIG_KEY: u32 = VK_F5;

const EXTENDED_KEYS: [u32; 15] = [
    VK_LEFT,
    VK_RIGHT,
    VK_UP,
    VK_DOWN,
    VK_HOME,
    VK_END,
    VK_PRIOR,
    VK_NEXT,
    VK_SNAPSHOT,
    VK_INSERT,
    VK_DELETE,
    VK_DIVIDE,
    VK_NUMLOCK,
    VK_RCONTROL,
    VK_RMENU,
];

/// Navigation/editing-class keys need KEYEVENTF_EXTENDEDKEY when synthesized,
/// or remote desktop and some VM consoles deliver the numpad cousins instead.
pub fn is_extended_key(vk: u32) -> bool {
    EXTENDED_KEYS.contains(&vk)
}
