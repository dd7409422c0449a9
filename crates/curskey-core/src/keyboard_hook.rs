//! Low-level keyboard hook plumbing.
//!
//! Everything here runs on the hook thread: the WH_KEYBOARD_LL callback feeds
//! raw events to the engine and either forwards, swallows, or replaces them
//! with injected input. A watchdog timer re-registers the hook when the
//! keyboard has gone quiet, so another late-installed hook cannot permanently
//! jump ahead of ours in the chain.

use crate::engine::ENGINE;
use crate::types::{InputEvent, KeyAction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::{
    GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_NORMAL, THREAD_PRIORITY_TIME_CRITICAL,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP,
    VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, KillTimer, MessageBeep, PeekMessageW, SetTimer,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT,
    LLKHF_INJECTED, MB_OK, MSG, WH_KEYBOARD_LL, WM_KEYUP, WM_SYSKEYUP,
};

/// Magic number to identify our own injected events.
const INJECTED_EXTRA_INFO: usize = 0xFFCB5C1D;

/// How often the watchdog checks whether the hook should be re-registered.
const REHOOK_INTERVAL_MS: u32 = 500;

static HOOK_HANDLE: Mutex<Option<HHOOK>> = Mutex::new(None);

/// Thread-message timers (NULL hwnd) ignore the caller-chosen id; KillTimer
/// needs the id SetTimer allocated, so it is kept here.
static WATCHDOG_TIMER: Mutex<Option<usize>> = Mutex::new(None);

/// Set by the hook callback, cleared by the watchdog. While the user is
/// typing the hook is demonstrably alive and re-registering would only risk
/// dropping an event mid-gesture.
static KEY_SEEN: AtomicBool = AtomicBool::new(false);

/// Installs the hook and starts the watchdog timer.
/// This must be called from a thread that pumps messages (GetMessage/PeekMessage).
pub fn install_hook() -> anyhow::Result<()> {
    info!("Installing keyboard hook...");

    // A sluggish hook thread means visible latency on every keystroke.
    unsafe {
        if SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL).is_err() {
            warn!("Could not raise hook thread priority");
        }
    }

    // Watchdog first: if registration fails now, it keeps retrying while the
    // message loop runs.
    arm_watchdog();

    register_hook()
}

fn arm_watchdog() {
    let id = unsafe { SetTimer(HWND::default(), 0, REHOOK_INTERVAL_MS, Some(rehook_timer_proc)) };
    if id == 0 {
        warn!("Could not start the re-hook watchdog timer");
        return;
    }
    *WATCHDOG_TIMER.lock().unwrap() = Some(id);
}

fn disarm_watchdog() {
    if let Some(id) = WATCHDOG_TIMER.lock().unwrap().take() {
        unsafe {
            let _ = KillTimer(HWND::default(), id);
        }
    }
}

fn register_hook() -> anyhow::Result<()> {
    // Low-level hooks require hMod to be NULL if threadId is 0.
    let hook_id =
        unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), HINSTANCE::default(), 0) }?;

    if hook_id.is_invalid() {
        return Err(anyhow::anyhow!("Failed to install hook"));
    }

    *HOOK_HANDLE.lock().unwrap() = Some(hook_id);
    info!("Keyboard hook installed. Handle: {:?}", hook_id);
    Ok(())
}

pub fn uninstall_hook() {
    disarm_watchdog();
    unsafe {
        let _ = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_NORMAL);
    }
    let mut handle = HOOK_HANDLE.lock().unwrap();
    if let Some(h) = *handle {
        unsafe {
            let _ = UnhookWindowsHookEx(h);
        };
        info!("Keyboard hook uninstalled.");
    }
    *handle = None;
}

/// Runs a blocking message loop.
/// This is a convenience helper for creating a hook thread.
pub fn run_event_loop() {
    info!("Starting message loop...");
    let mut msg = MSG::default();
    unsafe {
        // Force message queue creation
        let _ = PeekMessageW(
            &mut msg,
            None,
            0,
            0,
            windows::Win32::UI::WindowsAndMessaging::PEEK_MESSAGE_REMOVE_TYPE(0),
        );

        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("Message loop exited.");
}

unsafe extern "system" fn rehook_timer_proc(_hwnd: HWND, _msg: u32, _id: usize, _time: u32) {
    if KEY_SEEN.swap(false, Ordering::Relaxed) {
        return;
    }
    // Quiet keyboard: unhook and re-register to get back to the front of the
    // hook chain in case another application hooked after us.
    let mut handle = HOOK_HANDLE.lock().unwrap();
    if let Some(h) = handle.take() {
        let _ = UnhookWindowsHookEx(h);
    }
    drop(handle);
    if let Err(err) = register_hook() {
        error!("Watchdog failed to re-register hook: {err}");
    }
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
    KEY_SEEN.store(true, Ordering::Relaxed);

    let msg = wparam.0 as u32;
    let up = msg == WM_KEYUP || msg == WM_SYSKEYUP;
    let injected = is_self_injected(kbd);

    // The process query chain is too expensive to pay for our own injected
    // events, which re-enter the hook several times per chord. The engine
    // still sees them for modifier tracking and returns Pass untouched.
    let exe_name = if injected {
        None
    } else {
        crate::foreground::foreground_exe_name()
    };
    let action = {
        let mut engine = ENGINE.lock();
        engine.process_key(kbd.vkCode, up, injected, exe_name.as_deref())
    };

    match action {
        KeyAction::Pass => CallNextHookEx(None, code, wparam, lparam),
        KeyAction::Block => LRESULT(1),
        KeyAction::Inject(events) => {
            for event in events {
                let _ = inject_key(event);
            }
            LRESULT(1) // Block original
        }
    }
}

/// Only events carrying both the OS injected flag and our sentinel are ours;
/// another injector could reuse the same extra-info value by coincidence.
fn is_self_injected(kbd: &KBDLLHOOKSTRUCT) -> bool {
    (kbd.flags.0 & LLKHF_INJECTED.0) != 0 && kbd.dwExtraInfo == INJECTED_EXTRA_INFO
}

/// Injects a single key event carrying the self-identification sentinel.
///
/// One event per SendInput call, each followed by a short sleep. Remote
/// desktop sessions and some VM consoles reorder or drop batched synthetic
/// input, which leaves modifiers stuck down.
pub fn inject_key(event: InputEvent) -> anyhow::Result<()> {
    let mut flags = windows::Win32::UI::Input::KeyboardAndMouse::KEYBD_EVENT_FLAGS(0);
    if event.ext {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    if event.up {
        flags |= KEYEVENTF_KEYUP;
    }

    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(event.vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECTED_EXTRA_INFO,
            },
        },
    };

    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    std::thread::sleep(Duration::from_millis(1));
    if sent == 0 {
        return Err(anyhow::anyhow!(
            "SendInput rejected event vk={:#X}",
            event.vk
        ));
    }
    Ok(())
}

/// Audible feedback for training-mode mistakes.
pub fn beep() {
    unsafe {
        let _ = MessageBeep(MB_OK);
    }
}
