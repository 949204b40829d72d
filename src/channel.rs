// src/channel.rs

//! Packed color channels: a 32-bit `Channel` per foreground/background and
//! the 64-bit `Channels` pair combining the two.
//!
//! The bit layout matches the rendering engine's definitions exactly, so a
//! value produced here can be handed to the engine (and vice versa) without
//! translation:
//!
//! ```text
//!  bit 30      "not default": an explicit color/palette has been set
//!  bits 28-29  alpha / blend mode (2 bits)
//!  bit 27      palette-indexed (mutually exclusive with direct RGB)
//!  bits 0-23   RGB triple (r << 16 | g << 8 | b), or
//!  bits 0-7    palette index when bit 27 is set
//! ```
//!
//! Every operation is a total function over the bit patterns; out-of-range
//! RGB input is masked to 24 bits rather than rejected.

use serde::{Deserialize, Serialize};

const RGB_MASK: u32 = 0x00ff_ffff;
const PALINDEX_MASK: u32 = 0x0000_00ff;
const PALETTE_FLAG: u32 = 0x0800_0000;
const ALPHA_MASK: u32 = 0x3000_0000;
const ALPHA_SHIFT: u32 = 28;
const NOT_DEFAULT_FLAG: u32 = 0x4000_0000;

/// Alpha / blend mode of a single channel (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum Alpha {
    /// Fully covers whatever lies below.
    #[default]
    Opaque = 0,
    /// Averaged with the color below.
    Blend = 1,
    /// The color below shows through unchanged.
    Transparent = 2,
    /// Forced to maximum contrast against the other channel.
    HighContrast = 3,
}

impl Alpha {
    fn from_bits(bits: u32) -> Self {
        match (bits & ALPHA_MASK) >> ALPHA_SHIFT {
            0 => Alpha::Opaque,
            1 => Alpha::Blend,
            2 => Alpha::Transparent,
            _ => Alpha::HighContrast,
        }
    }

    fn to_bits(self) -> u32 {
        (self as u32) << ALPHA_SHIFT
    }
}

/// One 32-bit color channel: RGB-direct or palette-indexed, plus alpha and
/// the default-color flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Channel(pub u32);

impl Channel {
    /// The default color of the channel's side (terminal default fg/bg).
    pub const DEFAULT: Channel = Channel(0);

    /// Raw engine bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The 24-bit RGB value. Meaningful only when `is_rgb()` holds.
    pub fn rgb(self) -> u32 {
        self.0 & RGB_MASK
    }

    /// Red component.
    pub fn r(self) -> u8 {
        ((self.0 & RGB_MASK) >> 16) as u8
    }

    /// Green component.
    pub fn g(self) -> u8 {
        ((self.0 & RGB_MASK) >> 8) as u8
    }

    /// Blue component.
    pub fn b(self) -> u8 {
        (self.0 & RGB_MASK) as u8
    }

    /// Installs a direct RGB color. Clears the palette-indexed flag and
    /// marks the channel non-default. Input wider than 24 bits is masked.
    pub fn set_rgb(&mut self, rgb: u32) {
        self.0 = (self.0 & !(RGB_MASK | PALETTE_FLAG)) | NOT_DEFAULT_FLAG | (rgb & RGB_MASK);
    }

    /// The palette index in the low 8 bits. Meaningful only when
    /// `is_indexed()` holds.
    pub fn palindex(self) -> u8 {
        (self.0 & PALINDEX_MASK) as u8
    }

    /// Installs a palette index. Zeroes the RGB field, sets the
    /// palette-indexed flag, and marks the channel non-default. The alpha
    /// bits are preserved.
    pub fn set_palindex(&mut self, index: u8) {
        self.0 = (self.0 & !RGB_MASK) | NOT_DEFAULT_FLAG | PALETTE_FLAG | u32::from(index);
    }

    /// Current alpha / blend mode.
    pub fn alpha(self) -> Alpha {
        Alpha::from_bits(self.0)
    }

    /// Sets the alpha / blend mode. Any mode other than `Opaque` marks the
    /// channel non-default, since blending against a default color is
    /// undefined at the engine boundary.
    pub fn set_alpha(&mut self, alpha: Alpha) {
        self.0 = (self.0 & !ALPHA_MASK) | alpha.to_bits();
        if alpha != Alpha::Opaque {
            self.0 |= NOT_DEFAULT_FLAG;
        }
    }

    /// Reverts the channel to the default color, dropping any palette
    /// selection with it.
    pub fn set_default(&mut self) {
        self.0 &= !(NOT_DEFAULT_FLAG | PALETTE_FLAG);
    }

    /// True while no explicit color or palette index has been installed.
    pub fn is_default(self) -> bool {
        self.0 & NOT_DEFAULT_FLAG == 0
    }

    /// True when the channel carries a palette index.
    pub fn is_indexed(self) -> bool {
        !self.is_default() && self.0 & PALETTE_FLAG != 0
    }

    /// True when the channel carries a direct RGB color.
    pub fn is_rgb(self) -> bool {
        !self.is_default() && self.0 & PALETTE_FLAG == 0
    }
}

/// A foreground/background channel pair packed into 64 bits: the
/// foreground occupies the high word, the background the low word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Channels(pub u64);

impl Channels {
    /// Both sides default.
    pub const DEFAULT: Channels = Channels(0);

    /// Packs two 32-bit channels into a pair.
    pub fn combine(fg: Channel, bg: Channel) -> Self {
        Channels((u64::from(fg.0) << 32) | u64::from(bg.0))
    }

    /// Raw engine bit pattern.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// The foreground channel (high 32 bits).
    pub fn fg(self) -> Channel {
        Channel((self.0 >> 32) as u32)
    }

    /// The background channel (low 32 bits).
    pub fn bg(self) -> Channel {
        Channel(self.0 as u32)
    }

    /// Replaces the foreground channel.
    pub fn set_fg(&mut self, fg: Channel) {
        self.0 = (self.0 & 0x0000_0000_ffff_ffff) | (u64::from(fg.0) << 32);
    }

    /// Replaces the background channel.
    pub fn set_bg(&mut self, bg: Channel) {
        self.0 = (self.0 & 0xffff_ffff_0000_0000) | u64::from(bg.0);
    }

    /// Installs a direct RGB foreground.
    pub fn set_fg_rgb(&mut self, rgb: u32) {
        let mut fg = self.fg();
        fg.set_rgb(rgb);
        self.set_fg(fg);
    }

    /// Installs a direct RGB background.
    pub fn set_bg_rgb(&mut self, rgb: u32) {
        let mut bg = self.bg();
        bg.set_rgb(rgb);
        self.set_bg(bg);
    }

    /// Installs a palette-indexed foreground.
    pub fn set_fg_palindex(&mut self, index: u8) {
        let mut fg = self.fg();
        fg.set_palindex(index);
        self.set_fg(fg);
    }

    /// Installs a palette-indexed background.
    pub fn set_bg_palindex(&mut self, index: u8) {
        let mut bg = self.bg();
        bg.set_palindex(index);
        self.set_bg(bg);
    }

    /// Swaps foreground and background. An involution: applying it twice
    /// yields the original pair for every bit pattern.
    #[must_use]
    pub fn reverse(self) -> Self {
        Channels::combine(self.bg(), self.fg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_roundtrip_masks_to_24_bits() {
        let mut c = Channel::DEFAULT;
        c.set_rgb(0xdead_beef);
        assert_eq!(c.rgb(), 0xad_beef);
        assert_eq!((c.r(), c.g(), c.b()), (0xad, 0xbe, 0xef));
        assert!(c.is_rgb());
        assert!(!c.is_indexed());
        assert!(!c.is_default());
    }

    #[test]
    fn rgb_and_palette_are_mutually_exclusive() {
        let mut c = Channel::DEFAULT;
        c.set_palindex(7);
        assert!(c.is_indexed());
        assert_eq!(c.palindex(), 7);

        c.set_rgb(0x102030);
        assert!(c.is_rgb());
        assert!(!c.is_indexed());

        c.set_palindex(255);
        assert!(c.is_indexed());
        assert!(!c.is_rgb());
        // the RGB field was zeroed, leaving only the index
        assert_eq!(c.rgb(), 255);
    }

    #[test]
    fn explicit_set_clears_defaultness() {
        let mut c = Channel::DEFAULT;
        assert!(c.is_default());
        c.set_rgb(0);
        assert!(!c.is_default());
        c.set_default();
        assert!(c.is_default());
        c.set_palindex(0);
        assert!(!c.is_default());
    }

    #[test]
    fn alpha_preserved_across_palette_set() {
        let mut c = Channel::DEFAULT;
        c.set_alpha(Alpha::Blend);
        c.set_palindex(3);
        assert_eq!(c.alpha(), Alpha::Blend);
    }

    #[test]
    fn non_opaque_alpha_marks_non_default() {
        let mut c = Channel::DEFAULT;
        c.set_alpha(Alpha::Transparent);
        assert!(!c.is_default());
        assert_eq!(c.alpha(), Alpha::Transparent);

        let mut o = Channel::DEFAULT;
        o.set_alpha(Alpha::Opaque);
        assert!(o.is_default());
    }

    #[test]
    fn combine_split_roundtrip() {
        let fg = Channel(0x4abc_def0);
        let bg = Channel(0x4012_3456);
        let pair = Channels::combine(fg, bg);
        assert_eq!(pair.fg(), fg);
        assert_eq!(pair.bg(), bg);
    }

    #[test]
    fn reverse_is_an_involution() {
        for &bits in &[
            0u64,
            0xffff_ffff_ffff_ffff,
            0x4080_0001_700f_f0f0,
            0x1234_5678_9abc_def0,
        ] {
            let pair = Channels(bits);
            assert_eq!(pair.reverse().reverse(), pair);
        }
        let pair = Channels::combine(Channel(1), Channel(2));
        assert_eq!(pair.reverse(), Channels::combine(Channel(2), Channel(1)));
    }

    #[test]
    fn pair_level_color_helpers() {
        let mut pair = Channels::DEFAULT;
        pair.set_fg_rgb(0xff0000);
        pair.set_bg_palindex(4);
        assert!(pair.fg().is_rgb());
        assert_eq!(pair.fg().rgb(), 0xff0000);
        assert!(pair.bg().is_indexed());
        assert_eq!(pair.bg().palindex(), 4);
    }
}
