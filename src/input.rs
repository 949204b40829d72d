// src/input.rs

//! The ephemeral input-event record handed to the host callback.
//!
//! One `InputEvent` is built per drained engine record and lives only for
//! the duration of the dispatch call; nothing here is retained.

use crate::engine::RawInput;
use crate::keys::{key, EventKind, Modifiers};

/// A single terminal input event: a keypress, release, repeat, or mouse
/// action.
#[derive(Debug, Clone)]
pub struct InputEvent {
    raw: RawInput,
}

impl InputEvent {
    pub(crate) fn from_raw(raw: RawInput) -> Self {
        InputEvent { raw }
    }

    /// Unicode code point of the key, or a symbolic code from
    /// [`key`](crate::keys::key).
    pub fn id(&self) -> u32 {
        self.raw.id
    }

    /// Press / repeat / release, when the terminal reports transitions.
    pub fn kind(&self) -> EventKind {
        EventKind::from_raw(self.raw.kind)
    }

    /// Cell row of the event, -1 when not applicable.
    pub fn y(&self) -> i32 {
        self.raw.y
    }

    /// Cell column of the event, -1 when not applicable.
    pub fn x(&self) -> i32 {
        self.raw.x
    }

    /// Pixel row within the cell, -1 when not applicable.
    pub fn ypx(&self) -> i32 {
        self.raw.ypx
    }

    /// Pixel column within the cell, -1 when not applicable.
    pub fn xpx(&self) -> i32 {
        self.raw.xpx
    }

    /// UTF-8 representation of the keypress, empty when there is none.
    pub fn utf8(&self) -> &str {
        &self.raw.utf8
    }

    /// Modifier state at the time of the event.
    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_bits_truncate(self.raw.modifiers)
    }

    pub fn shift(&self) -> bool {
        self.modifiers().contains(Modifiers::SHIFT)
    }

    pub fn alt(&self) -> bool {
        self.modifiers().contains(Modifiers::ALT)
    }

    pub fn ctrl(&self) -> bool {
        self.modifiers().contains(Modifiers::CTRL)
    }

    pub fn super_key(&self) -> bool {
        self.modifiers().contains(Modifiers::SUPER)
    }

    pub fn meta(&self) -> bool {
        self.modifiers().contains(Modifiers::META)
    }

    pub fn hyper(&self) -> bool {
        self.modifiers().contains(Modifiers::HYPER)
    }

    pub fn capslock(&self) -> bool {
        self.modifiers().contains(Modifiers::CAPSLOCK)
    }

    pub fn numlock(&self) -> bool {
        self.modifiers().contains(Modifiers::NUMLOCK)
    }

    /// True for mouse motion and button events.
    pub fn is_mouse(&self) -> bool {
        key::is_mouse(self.raw.id)
    }

    /// The effective text of the event: the code points the keypress
    /// produced after keyboard-protocol translation, decoded up to the
    /// first zero.
    pub fn text(&self) -> String {
        self.raw
            .eff_text
            .iter()
            .take_while(|&&cp| cp != 0)
            .filter_map(|&cp| char::from_u32(cp))
            .collect()
    }
}
