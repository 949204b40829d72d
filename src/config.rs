// src/config.rs

//! Context initialization options.
//!
//! These map one-to-one onto the rendering engine's context-init call:
//! behavior flags plus the outer margins the engine should leave
//! undrawn. The structs deserialize from a configuration file so hosts can
//! keep terminal setup out of code.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behavior flags for context initialization. Numeric values are the
    /// engine's own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ContextFlags: u64 {
        /// Leave the terminal's SIGWINCH handling alone.
        const NO_WINCH_SIGHANDLER = 0x0004;
        /// Do not install handlers for fatal/quit signals.
        const NO_QUIT_SIGHANDLERS = 0x0008;
        /// Suppress the engine's startup/shutdown diagnostics banner.
        const SUPPRESS_BANNERS    = 0x0020;
        /// Render into the primary screen instead of the alternate screen.
        const NO_ALTERNATE_SCREEN = 0x0040;
        /// Open the standard plane in scrolling mode.
        const SCROLLING           = 0x0200;
    }
}

/// Outer margins (in cells) the engine leaves untouched around the
/// rendered area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margins {
    /// Equal margins on all four sides.
    pub fn uniform(cells: u32) -> Self {
        Margins {
            top: cells,
            right: cells,
            bottom: cells,
            left: cells,
        }
    }
}

/// Options for [`Context::init`](crate::context::Context::init).
///
/// The default is a full-screen session with no margins, banners
/// suppressed, and the engine's signal handlers installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Behavior flags passed through to the engine.
    pub flags: ContextFlags,
    /// Cells to leave undrawn at the edges of the terminal.
    pub margins: Margins,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            flags: ContextFlags::SUPPRESS_BANNERS,
            margins: Margins::default(),
        }
    }
}

impl ContextOptions {
    /// Loads options from a JSON document, e.g. a host config file.
    /// Missing fields take their defaults.
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        let options = serde_json::from_reader(reader)?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_suppress_banners_only() {
        let options = ContextOptions::default();
        assert_eq!(options.flags, ContextFlags::SUPPRESS_BANNERS);
        assert_eq!(options.margins, Margins::default());
    }

    #[test]
    fn flags_match_engine_values() {
        assert_eq!(ContextFlags::NO_WINCH_SIGHANDLER.bits(), 0x0004);
        assert_eq!(ContextFlags::NO_QUIT_SIGHANDLERS.bits(), 0x0008);
        assert_eq!(ContextFlags::SUPPRESS_BANNERS.bits(), 0x0020);
        assert_eq!(ContextFlags::NO_ALTERNATE_SCREEN.bits(), 0x0040);
        assert_eq!(ContextFlags::SCROLLING.bits(), 0x0200);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "margins": { "top": 1, "left": 2 } }"#;
        let options = ContextOptions::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(options.margins.top, 1);
        assert_eq!(options.margins.left, 2);
        assert_eq!(options.margins.right, 0);
        assert_eq!(options.flags, ContextFlags::SUPPRESS_BANNERS);
    }
}
