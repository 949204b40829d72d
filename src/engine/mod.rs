// src/engine/mod.rs

//! The rendering-engine boundary.
//!
//! Everything that actually composites glyphs and talks the terminal
//! protocol lives behind [`RenderEngine`]; this layer only manages the
//! resources and events flowing across it. The crate ships one
//! implementation, [`headless::HeadlessEngine`], an in-memory engine used
//! by the test suite and by render-free hosts.
//!
//! Engine-side objects are referred to by plain numeric ids ([`PlaneId`],
//! [`VisualId`]); the typed, generation-checked handles the host sees are
//! minted above this boundary.

pub mod headless;

use std::os::unix::io::RawFd;

use thiserror::Error;

use crate::channel::Channels;
use crate::config::ContextOptions;
use crate::keys::{MiceEvents, Style};
use crate::plane::{PerimeterKind, PlaneFlags, Rect};
use crate::visual::{Blitter, Scale, VisualFlags};

/// Engine-side surface identifier.
pub type PlaneId = u64;
/// Engine-side decoded-image identifier.
pub type VisualId = u64;

/// Capacity of the synthesized-text field of a raw input record.
pub const EFF_TEXT_CAP: usize = 4;

/// Pixel-graphics protocol the attached terminal supports, as reported by
/// the engine's capability probe. Values are the engine's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PixelSupport {
    #[default]
    None = 0,
    Sixel = 1,
    LinuxFb = 2,
    Iterm2 = 3,
    KittyStatic = 4,
    KittyAnimated = 5,
    KittySelfref = 6,
}

/// One drained input record, exactly as the engine reports it. The bridge
/// wraps it in a fresh [`InputEvent`](crate::input::InputEvent) per
/// dispatch.
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    /// Unicode code point, or a symbolic code from [`keys::key`](crate::keys::key).
    pub id: u32,
    /// Raw event-type word (press/repeat/release/unknown).
    pub kind: u32,
    /// Cell coordinates of the event, -1 when not applicable.
    pub y: i32,
    pub x: i32,
    /// Pixel offsets within the cell, -1 when not applicable.
    pub ypx: i32,
    pub xpx: i32,
    /// UTF-8 representation of the keypress, when there is one.
    pub utf8: String,
    /// Modifier bits, in [`Modifiers`](crate::keys::Modifiers) layout.
    pub modifiers: u32,
    /// Code points of the effective text, zero-terminated.
    pub eff_text: [u32; EFF_TEXT_CAP],
}

/// Geometry and behavior of a plane to be created.
#[derive(Debug, Clone, Default)]
pub struct PlaneSpec {
    /// Position relative to the parent plane.
    pub y: i32,
    pub x: i32,
    pub rows: u32,
    pub cols: u32,
    pub flags: PlaneFlags,
    pub margin_bottom: u32,
    pub margin_right: u32,
    pub name: Option<String>,
    /// Whether the bridge wants resize notifications for this plane.
    pub notify_resize: bool,
    /// Session token parked in the plane's user-data slot and echoed back
    /// through the resize sink.
    pub token: u64,
}

/// Parameters of a blit.
#[derive(Debug, Clone, Default)]
pub struct BlitSpec {
    /// Destination plane, or `None` to have the engine materialize a new
    /// plane sized to the image.
    pub dst: Option<PlaneId>,
    /// Placement within the destination (or of the new plane).
    pub y: i32,
    pub x: i32,
    pub scale: Scale,
    pub blitter: Blitter,
    pub flags: VisualFlags,
    /// Session token for a newly materialized plane; ignored when `dst`
    /// is given.
    pub token: u64,
}

/// What a resize sink tells the engine to do with the rest of a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    Abort,
}

/// Invoked by the engine once per plane whose dimensions changed, in the
/// engine's own traversal order, with the plane's id and session token.
/// Returning [`SinkFlow::Abort`] stops the pending cascade.
pub type ResizeSink<'a> = &'a mut dyn FnMut(PlaneId, u64) -> SinkFlow;

/// Failures reported from behind the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An engine operation failed.
    #[error("{op} failed: {detail}")]
    Operation { op: &'static str, detail: String },

    /// The non-blocking input fetch reported an error; the readiness
    /// descriptor can no longer be trusted.
    #[error("input source broken: {0}")]
    InputBroken(String),

    /// A resize cascade was stopped by the sink.
    #[error("resize cascade aborted by callback")]
    Aborted,
}

impl EngineError {
    pub(crate) fn op(op: &'static str, detail: impl Into<String>) -> Self {
        EngineError::Operation {
            op,
            detail: detail.into(),
        }
    }
}

type EngineResult<T> = std::result::Result<T, EngineError>;

/// The contract this layer consumes from a rendering engine.
///
/// All methods are synchronous and must be called from the host's loop
/// thread. Operations that can change plane dimensions take a
/// [`ResizeSink`] and must report every affected plane through it before
/// returning; when the sink aborts, the engine stops cascading and
/// returns [`EngineError::Aborted`].
pub trait RenderEngine {
    /// Brings the engine up on its terminal. Called exactly once, before
    /// any other method.
    fn init(&mut self, options: &ContextOptions) -> EngineResult<()>;

    /// Tears the engine down, restoring the terminal. Called exactly once.
    fn stop(&mut self) -> EngineResult<()>;

    /// Flushes the current plane pile to the terminal.
    fn render(&mut self) -> EngineResult<()>;

    /// Probes the terminal's pixel-graphics capability.
    fn pixel_support(&self) -> PixelSupport;

    /// The standard plane covering the whole terminal. Valid from `init`
    /// to `stop`.
    fn std_plane(&self) -> PlaneId;

    /// Parks a session token in a plane's user-data slot (used for planes
    /// the engine created itself: the standard plane, blit targets).
    fn set_plane_token(&mut self, plane: PlaneId, token: u64) -> EngineResult<()>;

    // --- input ---

    /// Descriptor that becomes readable when input is queued. Valid
    /// whenever the engine is initialized.
    fn input_ready_fd(&self) -> RawFd;

    /// Enables delivery of the given mouse event classes.
    fn mice_enable(&mut self, classes: MiceEvents) -> EngineResult<()>;

    /// Non-blocking fetch of the next queued input record. `Ok(None)`
    /// means the queue is exhausted; `Err` means the input path is broken.
    fn next_input(&mut self) -> EngineResult<Option<RawInput>>;

    // --- planes ---

    /// Creates a plane bound to `parent`. `Ok(None)` means the engine
    /// rejected the requested geometry.
    fn plane_create(&mut self, parent: PlaneId, spec: &PlaneSpec) -> EngineResult<Option<PlaneId>>;

    /// Destroys one plane, rebinding its children to its parent.
    fn plane_destroy(&mut self, plane: PlaneId) -> EngineResult<()>;

    /// Destroys a plane and its whole subtree.
    fn plane_destroy_family(&mut self, plane: PlaneId) -> EngineResult<()>;

    /// Moves `plane` (with its subtree) under `new_parent`.
    fn plane_reparent_family(
        &mut self,
        plane: PlaneId,
        new_parent: PlaneId,
        sink: ResizeSink,
    ) -> EngineResult<()>;

    fn plane_move(&mut self, plane: PlaneId, y: i32, x: i32) -> EngineResult<()>;

    fn plane_resize(
        &mut self,
        plane: PlaneId,
        rows: u32,
        cols: u32,
        sink: ResizeSink,
    ) -> EngineResult<()>;

    /// Re-evaluates the terminal size and realigns the pile.
    fn refresh(&mut self, sink: ResizeSink) -> EngineResult<()>;

    /// Moves the plane to the top of its siblings' z-order.
    fn plane_raise(&mut self, plane: PlaneId) -> EngineResult<()>;

    /// Moves the plane to the bottom of its siblings' z-order.
    fn plane_lower(&mut self, plane: PlaneId) -> EngineResult<()>;

    fn plane_yx(&self, plane: PlaneId) -> EngineResult<(i32, i32)>;

    fn plane_dims(&self, plane: PlaneId) -> EngineResult<(u32, u32)>;

    fn plane_cursor(&self, plane: PlaneId) -> EngineResult<(u32, u32)>;

    fn plane_cursor_move(&mut self, plane: PlaneId, y: u32, x: u32) -> EngineResult<()>;

    fn plane_styles(&self, plane: PlaneId) -> EngineResult<Style>;

    fn plane_set_styles(&mut self, plane: PlaneId, styles: Style) -> EngineResult<()>;

    fn plane_channels(&self, plane: PlaneId) -> EngineResult<Channels>;

    fn plane_set_channels(&mut self, plane: PlaneId, channels: Channels) -> EngineResult<()>;

    fn plane_name(&self, plane: PlaneId) -> EngineResult<Option<String>>;

    fn plane_set_name(&mut self, plane: PlaneId, name: &str) -> EngineResult<()>;

    /// Clears the plane's cells and homes its cursor.
    fn plane_erase(&mut self, plane: PlaneId) -> EngineResult<()>;

    /// Sets the cell rendered wherever the plane has no content.
    fn plane_set_base(
        &mut self,
        plane: PlaneId,
        glyph: &str,
        styles: Style,
        channels: Channels,
    ) -> EngineResult<()>;

    /// Writes `text` starting at (`y`, `x`), -1 meaning "at the cursor"
    /// for either coordinate. Returns the number of cells written; a
    /// write whose starting position is invalid is an `Operation` error.
    fn plane_put_text(
        &mut self,
        plane: PlaneId,
        y: i32,
        x: i32,
        text: &str,
    ) -> EngineResult<usize>;

    /// UTF-8 text under `rect`, rows separated by newlines, trailing
    /// blanks trimmed.
    fn plane_contents(&self, plane: PlaneId, rect: Rect) -> EngineResult<String>;

    /// Draws `len` cells of `glyph` downward from the cursor. Returns the
    /// number of cells actually drawn.
    fn plane_vline(&mut self, plane: PlaneId, glyph: &str, len: u32) -> EngineResult<usize>;

    /// Merges `src`'s visible cells down onto `dst`.
    fn plane_merge_down(&mut self, src: PlaneId, dst: PlaneId) -> EngineResult<()>;

    /// Draws a border around the plane's edge.
    fn plane_perimeter(
        &mut self,
        plane: PlaneId,
        kind: PerimeterKind,
        styles: Style,
        channels: Channels,
        ctlword: u32,
    ) -> EngineResult<()>;

    // --- visuals ---

    /// Decodes tightly-packed RGBA pixels into an engine image. `rowstride`
    /// is in bytes.
    fn visual_from_rgba(
        &mut self,
        pixels: &[u8],
        rows: u32,
        rowstride: u32,
        cols: u32,
    ) -> EngineResult<VisualId>;

    /// Releases a decoded image.
    fn visual_destroy(&mut self, visual: VisualId) -> EngineResult<()>;

    /// Composites the visual per `spec`. Returns the plane drawn into:
    /// the requested destination, or a newly materialized plane.
    /// `Ok(None)` means no destination plane could be produced.
    fn visual_blit(&mut self, visual: VisualId, spec: &BlitSpec) -> EngineResult<Option<PlaneId>>;
}
