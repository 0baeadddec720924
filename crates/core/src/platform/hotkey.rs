//! Global Esc listener. Drawing takes over the mouse, so the stop key has to
//! work while the paint program has focus, not just the terminal.

use crate::logger;
use crate::types::CancelFlag;

/// Spawn a thread that sets `flag` whenever Esc is pressed. Failing to hook
/// the keyboard is logged and leaves the TUI `x` key as the only stop.
pub fn start_cancel_listener(flag: CancelFlag) {
    std::thread::Builder::new()
        .name("esc-listener".into())
        .spawn(move || listen(flag))
        .map(|_| ())
        .unwrap_or_else(|e| logger::error(&format!("failed to start Esc listener: {}", e)));
}

#[cfg(target_os = "macos")]
fn listen(flag: CancelFlag) {
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
    use core_graphics::event::{
        CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
        EventField,
    };

    const KEYCODE_ESCAPE: i64 = 53;

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _kind, event| {
            if event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) == KEYCODE_ESCAPE {
                flag.set();
            }
            None
        },
    );
    let Ok(tap) = tap else {
        logger::warn(
            "cannot watch the keyboard for Esc, grant Accessibility permission to your terminal",
        );
        return;
    };
    let Ok(source) = tap.mach_port.create_runloop_source(0) else {
        logger::warn("cannot attach the Esc listener to a run loop");
        return;
    };

    let run_loop = CFRunLoop::get_current();
    unsafe { run_loop.add_source(&source, kCFRunLoopCommonModes) };
    tap.enable();
    logger::info("press Esc anywhere to stop drawing");
    CFRunLoop::run_current();
}

#[cfg(target_os = "windows")]
fn listen(flag: CancelFlag) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, MOD_NOREPEAT, VK_ESCAPE};
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    const ESC_HOTKEY: i32 = 0xAD;

    // Thread-bound hotkey: WM_HOTKEY arrives on this thread's queue.
    if let Err(e) = unsafe { RegisterHotKey(HWND::default(), ESC_HOTKEY, MOD_NOREPEAT, VK_ESCAPE.0 as u32) } {
        logger::warn(&format!(
            "cannot register Esc as a global hotkey ({}), another application may own it",
            e
        ));
        return;
    }
    logger::info("press Esc anywhere to stop drawing");

    let mut msg = MSG::default();
    while unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.as_bool() {
        if msg.message == WM_HOTKEY && msg.wParam.0 == ESC_HOTKEY as usize {
            flag.set();
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn listen(_flag: CancelFlag) {
    logger::warn("no global Esc on this platform, use x in the TUI to stop");
}
