// src/error.rs

//! Error taxonomy for the bridge layer.
//!
//! Handle and buffer validation happens before any engine call, so the
//! `InvalidHandle`/`InvalidBuffer` variants never originate from native
//! state. Engine-protocol violations that indicate corrupted native state
//! (a blit landing on the wrong plane, a failed destroy) are not errors at
//! all: they panic, since continuing would operate on a broken engine.

use std::fmt;

use thiserror::Error;

use crate::engine::EngineError;

/// The resource class a stale handle referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Plane,
    Visual,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Plane => write!(f, "plane"),
            ResourceKind::Visual => write!(f, "visual"),
        }
    }
}

/// Errors surfaced to the host by context, plane, visual, and input
/// operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation on a destroyed (or never-valid) resource handle. A
    /// programmer error; checked before any native state is touched.
    #[error("operation on a destroyed or invalid {0} handle")]
    InvalidHandle(ResourceKind),

    /// Pixel buffer and geometry disagree on visual creation. No
    /// decoded-image resource is allocated when this is returned.
    #[error("pixel buffer rejected: {0}")]
    InvalidBuffer(String),

    /// The rendering engine reported an internal failure. Generally not
    /// recoverable for the current context.
    #[error("rendering engine failure")]
    Engine(#[from] EngineError),

    /// The engine could not materialize a destination plane for a blit.
    /// Recoverable: retry with different options.
    #[error("engine could not materialize a destination plane for the blit")]
    BlitFailed,

    /// The engine rejected the requested plane geometry (for example zero
    /// dimensions without auto-grow, or margin flags combined with an
    /// explicit size). Recoverable.
    #[error("engine rejected the requested plane geometry")]
    PlaneRejected,

    /// `input_start` while a callback is already registered.
    #[error("input polling is already active for this context")]
    AlreadyPolling,

    /// A host callback failed during event dispatch. Polling is left
    /// disabled; call `input_start` again to resume.
    #[error("host callback aborted event dispatch")]
    CallbackAborted(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
