// src/keys.rs

//! The constants surface shared with the rendering engine: symbolic key
//! codes, modifier bits, mouse event classes, event kinds, and style bits.
//!
//! All numeric values match the engine's own definitions bit-for-bit; they
//! travel through input events and style words without translation.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Symbolic (non-Unicode) key codes delivered in [`id`](crate::input::InputEvent::id).
///
/// The engine assigns these from a private-use band above the Unicode code
/// space so they can never collide with real text input.
pub mod key {
    /// First code point of the engine's synthesized-key band.
    pub const PRETERUNICODE_BASE: u32 = 1_115_000;

    const fn preterunicode(w: u32) -> u32 {
        PRETERUNICODE_BASE + w
    }

    // ASCII-range keys are reported as themselves.
    pub const TAB: u32 = 0x09;
    pub const ESC: u32 = 0x1b;
    pub const SPACE: u32 = 0x20;

    pub const INVALID: u32 = preterunicode(0);
    /// Generated by the engine on terminal resize, not by the keyboard.
    pub const RESIZE: u32 = preterunicode(1);
    pub const UP: u32 = preterunicode(2);
    pub const RIGHT: u32 = preterunicode(3);
    pub const DOWN: u32 = preterunicode(4);
    pub const LEFT: u32 = preterunicode(5);
    pub const INS: u32 = preterunicode(6);
    pub const DEL: u32 = preterunicode(7);
    pub const BACKSPACE: u32 = preterunicode(8);
    pub const PGDOWN: u32 = preterunicode(9);
    pub const PGUP: u32 = preterunicode(10);
    pub const HOME: u32 = preterunicode(11);
    pub const END: u32 = preterunicode(12);

    pub const F00: u32 = preterunicode(20);
    pub const F01: u32 = preterunicode(21);
    pub const F02: u32 = preterunicode(22);
    pub const F03: u32 = preterunicode(23);
    pub const F04: u32 = preterunicode(24);
    pub const F05: u32 = preterunicode(25);
    pub const F06: u32 = preterunicode(26);
    pub const F07: u32 = preterunicode(27);
    pub const F08: u32 = preterunicode(28);
    pub const F09: u32 = preterunicode(29);
    pub const F10: u32 = preterunicode(30);
    pub const F11: u32 = preterunicode(31);
    pub const F12: u32 = preterunicode(32);
    pub const F13: u32 = preterunicode(33);
    pub const F14: u32 = preterunicode(34);
    pub const F15: u32 = preterunicode(35);
    pub const F16: u32 = preterunicode(36);
    pub const F17: u32 = preterunicode(37);
    pub const F18: u32 = preterunicode(38);
    pub const F19: u32 = preterunicode(39);
    pub const F20: u32 = preterunicode(40);
    pub const F21: u32 = preterunicode(41);
    pub const F22: u32 = preterunicode(42);
    pub const F23: u32 = preterunicode(43);
    pub const F24: u32 = preterunicode(44);

    pub const ENTER: u32 = preterunicode(121);
    /// Alias kept for hosts matching on the traditional name.
    pub const RETURN: u32 = ENTER;
    pub const CLS: u32 = preterunicode(122);
    pub const DLEFT: u32 = preterunicode(123);
    pub const DRIGHT: u32 = preterunicode(124);
    pub const ULEFT: u32 = preterunicode(125);
    pub const URIGHT: u32 = preterunicode(126);
    pub const CENTER: u32 = preterunicode(127);
    pub const BEGIN: u32 = preterunicode(128);
    pub const CANCEL: u32 = preterunicode(129);
    pub const CLOSE: u32 = preterunicode(130);
    pub const COMMAND: u32 = preterunicode(131);
    pub const COPY: u32 = preterunicode(132);
    pub const EXIT: u32 = preterunicode(133);
    pub const PRINT: u32 = preterunicode(134);
    pub const REFRESH: u32 = preterunicode(135);
    pub const SEPARATOR: u32 = preterunicode(136);

    pub const CAPS_LOCK: u32 = preterunicode(150);
    pub const SCROLL_LOCK: u32 = preterunicode(151);
    pub const NUM_LOCK: u32 = preterunicode(152);
    pub const PRINT_SCREEN: u32 = preterunicode(153);
    pub const PAUSE: u32 = preterunicode(154);
    pub const MENU: u32 = preterunicode(155);

    pub const MEDIA_PLAY: u32 = preterunicode(158);
    pub const MEDIA_PAUSE: u32 = preterunicode(159);
    pub const MEDIA_PPAUSE: u32 = preterunicode(160);
    pub const MEDIA_REV: u32 = preterunicode(161);
    pub const MEDIA_STOP: u32 = preterunicode(162);
    pub const MEDIA_FF: u32 = preterunicode(163);
    pub const MEDIA_REWIND: u32 = preterunicode(164);
    pub const MEDIA_NEXT: u32 = preterunicode(165);
    pub const MEDIA_PREV: u32 = preterunicode(166);
    pub const MEDIA_RECORD: u32 = preterunicode(167);
    pub const MEDIA_LVOL: u32 = preterunicode(168);
    pub const MEDIA_RVOL: u32 = preterunicode(169);
    pub const MEDIA_MUTE: u32 = preterunicode(170);

    pub const LSHIFT: u32 = preterunicode(171);
    pub const LCTRL: u32 = preterunicode(172);
    pub const LALT: u32 = preterunicode(173);
    pub const LSUPER: u32 = preterunicode(174);
    pub const LHYPER: u32 = preterunicode(175);
    pub const LMETA: u32 = preterunicode(176);
    pub const RSHIFT: u32 = preterunicode(177);
    pub const RCTRL: u32 = preterunicode(178);
    pub const RALT: u32 = preterunicode(179);
    pub const RSUPER: u32 = preterunicode(180);
    pub const RHYPER: u32 = preterunicode(181);
    pub const RMETA: u32 = preterunicode(182);
    pub const L3SHIFT: u32 = preterunicode(183);
    pub const L5SHIFT: u32 = preterunicode(184);

    pub const MOTION: u32 = preterunicode(200);
    pub const BUTTON1: u32 = preterunicode(201);
    pub const BUTTON2: u32 = preterunicode(202);
    pub const BUTTON3: u32 = preterunicode(203);
    pub const BUTTON4: u32 = preterunicode(204);
    pub const BUTTON5: u32 = preterunicode(205);
    pub const BUTTON6: u32 = preterunicode(206);
    pub const BUTTON7: u32 = preterunicode(207);
    pub const BUTTON8: u32 = preterunicode(208);
    pub const BUTTON9: u32 = preterunicode(209);
    pub const BUTTON10: u32 = preterunicode(210);
    pub const BUTTON11: u32 = preterunicode(211);
    /// Wheel up, as most terminals report it.
    pub const SCROLL_UP: u32 = BUTTON4;
    /// Wheel down.
    pub const SCROLL_DOWN: u32 = BUTTON5;

    pub const SIGNAL: u32 = preterunicode(400);
    pub const EOF: u32 = preterunicode(500);

    /// True for motion and button codes.
    pub fn is_mouse(id: u32) -> bool {
        (MOTION..=BUTTON11).contains(&id)
    }
}

bitflags! {
    /// Modifier state accompanying an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u32 {
        const SHIFT    = 1 << 0;
        const ALT      = 1 << 1;
        const CTRL     = 1 << 2;
        const SUPER    = 1 << 3;
        const HYPER    = 1 << 4;
        const META     = 1 << 5;
        const CAPSLOCK = 1 << 6;
        const NUMLOCK  = 1 << 7;
    }
}

bitflags! {
    /// Mouse event classes that can be enabled with input polling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MiceEvents: u32 {
        const MOVE   = 1 << 0;
        const BUTTON = 1 << 1;
        const DRAG   = 1 << 2;
        const ALL    = Self::MOVE.bits() | Self::BUTTON.bits() | Self::DRAG.bits();
    }
}

bitflags! {
    /// Per-plane text style bits (the low 16 bits of the engine's style word).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Style: u16 {
        const STRUCK    = 0x0001;
        const BOLD      = 0x0002;
        const UNDERCURL = 0x0004;
        const UNDERLINE = 0x0008;
        const ITALIC    = 0x0010;
    }
}

/// Mask covering the engine's full 16-bit style word, including bits this
/// layer does not name.
pub const STYLE_MASK: u32 = 0xffff;

/// What kind of key transition an input event reports.
///
/// Terminals without a keyboard protocol report everything as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum EventKind {
    #[default]
    Unknown = 0,
    Press = 1,
    Repeat = 2,
    Release = 3,
}

impl EventKind {
    /// Decodes the engine's raw event-type word; out-of-range values map
    /// to `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => EventKind::Press,
            2 => EventKind::Repeat,
            3 => EventKind::Release,
            _ => EventKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_band_values() {
        assert_eq!(key::RESIZE, 1_115_001);
        assert_eq!(key::UP, 1_115_002);
        assert_eq!(key::F12, 1_115_032);
        assert_eq!(key::ENTER, 1_115_121);
        assert_eq!(key::BUTTON1, 1_115_201);
        assert_eq!(key::EOF, 1_115_500);
    }

    #[test]
    fn mouse_predicate_covers_motion_and_buttons() {
        assert!(key::is_mouse(key::MOTION));
        assert!(key::is_mouse(key::BUTTON1));
        assert!(key::is_mouse(key::SCROLL_DOWN));
        assert!(key::is_mouse(key::BUTTON11));
        assert!(!key::is_mouse(key::ENTER));
        assert!(!key::is_mouse('q' as u32));
    }

    #[test]
    fn event_kind_decodes_raw_words() {
        assert_eq!(EventKind::from_raw(1), EventKind::Press);
        assert_eq!(EventKind::from_raw(3), EventKind::Release);
        assert_eq!(EventKind::from_raw(99), EventKind::Unknown);
    }
}
