// src/plane.rs

//! Plane-tree operations: creation, cascading destroy/reparent, z-order,
//! geometry, text and decoration, and resize-callback dispatch.
//!
//! Planes are addressed through typed handles; the records behind them
//! track the parent/child structure mirrored from the engine plus the
//! registered resize callback. All operations live on
//! [`Context`](crate::context::Context), which owns both arenas and the
//! engine.

use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Handle};
use crate::channel::Channels;
use crate::context::Context;
use crate::engine::{EngineError, PlaneId, PlaneSpec, ResizeSink, SinkFlow};
use crate::error::{Error, ResourceKind, Result};
use crate::event::ResizeCallback;
use crate::keys::Style;

bitflags! {
    /// Plane creation flags. Numeric values are the engine's own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PlaneFlags: u64 {
        /// `x` is an alignment, not an offset.
        const HORALIGNED   = 0x0001;
        /// `y` is an alignment, not an offset.
        const VERALIGNED   = 0x0002;
        /// Size the plane from its parent minus margins; resizes with it.
        const MARGINALIZED = 0x0004;
        /// Do not move the plane when its parent scrolls.
        const FIXED        = 0x0008;
        /// Grow to the right/bottom as output demands.
        const AUTOGROW     = 0x0010;
        /// Scroll vertically when output reaches the bottom.
        const VSCROLL      = 0x0020;
    }
}

/// Border glyph family for [`Context::plane_perimeter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerimeterKind {
    #[default]
    Rounded,
    Double,
}

/// A rectangular region of a plane, in cells. Zero `rows`/`cols` extend to
/// the plane's edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub y: u32,
    pub x: u32,
    pub rows: u32,
    pub cols: u32,
}

/// Marker type for plane handles.
pub enum Plane {}

/// Handle to a plane owned by a [`Context`].
pub type PlaneHandle = Handle<Plane>;

/// Geometry and behavior of a plane to create.
///
/// `rows`/`cols` of zero are rejected by the engine unless
/// [`PlaneFlags::AUTOGROW`] or [`PlaneFlags::MARGINALIZED`] applies.
#[derive(Default)]
pub struct PlaneOptions {
    /// Position relative to the parent plane.
    pub y: i32,
    pub x: i32,
    pub rows: u32,
    pub cols: u32,
    pub flags: PlaneFlags,
    /// Bottom/right margins, used with [`PlaneFlags::MARGINALIZED`].
    pub margin_bottom: u32,
    pub margin_right: u32,
    /// Debugging name surfaced through the engine.
    pub name: Option<String>,
    /// Invoked whenever the engine changes this plane's dimensions.
    /// Returning an error aborts the pending resize cascade.
    pub on_resize: Option<ResizeCallback>,
}

impl std::fmt::Debug for PlaneOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaneOptions")
            .field("y", &self.y)
            .field("x", &self.x)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("flags", &self.flags)
            .field("name", &self.name)
            .field("on_resize", &self.on_resize.is_some())
            .finish()
    }
}

/// Record behind a [`PlaneHandle`].
pub(crate) struct PlaneRecord {
    pub(crate) engine: PlaneId,
    pub(crate) parent: Option<PlaneHandle>,
    /// Bottom of the z-order first; mirrors the engine's sibling order.
    pub(crate) children: Vec<PlaneHandle>,
    pub(crate) on_resize: Option<ResizeCallback>,
}

/// Runs an engine operation that may cascade resizes, bridging the
/// engine's sink protocol to the per-plane host callbacks.
///
/// The sink recovers each notified record from the session token the
/// engine echoes back, validates it against the arena (a stale token is
/// skipped, not an error), and invokes the registered callback with no
/// arguments. A callback failure aborts the engine-side cascade and
/// surfaces as [`Error::CallbackAborted`].
pub(crate) fn run_with_sink<F>(planes: &mut Arena<Plane, PlaneRecord>, engine_call: F) -> Result<()>
where
    F: FnOnce(ResizeSink) -> std::result::Result<(), EngineError>,
{
    let mut abort: Option<anyhow::Error> = None;
    let outcome = {
        let mut sink = |_plane: PlaneId, token: u64| -> SinkFlow {
            let handle = PlaneHandle::from_token(token);
            let Ok(record) = planes.get_mut(handle) else {
                trace!("resize sink: stale token {:#x}, skipping", token);
                return SinkFlow::Continue;
            };
            let Some(callback) = record.on_resize.as_mut() else {
                return SinkFlow::Continue;
            };
            match callback() {
                Ok(()) => SinkFlow::Continue,
                Err(e) => {
                    abort = Some(e);
                    SinkFlow::Abort
                }
            }
        };
        engine_call(&mut sink)
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(EngineError::Aborted) => Err(Error::CallbackAborted(abort.take().unwrap_or_else(
            || anyhow::anyhow!("resize callback aborted the cascade"),
        ))),
        Err(e) => Err(Error::Engine(e)),
    }
}

impl Context {
    /// Creates a plane bound to `parent`.
    ///
    /// Fails with [`Error::PlaneRejected`] when the engine refuses the
    /// geometry: zero dimensions without auto-grow, or margin flags
    /// combined with an explicit size.
    pub fn plane_create(&mut self, parent: PlaneHandle, options: PlaneOptions) -> Result<PlaneHandle> {
        let parent_engine = self.planes.get(parent)?.engine;
        let handle = self.planes.vacant();
        let spec = PlaneSpec {
            y: options.y,
            x: options.x,
            rows: options.rows,
            cols: options.cols,
            flags: options.flags,
            margin_bottom: options.margin_bottom,
            margin_right: options.margin_right,
            name: options.name,
            notify_resize: options.on_resize.is_some(),
            token: handle.token(),
        };
        match self.engine.plane_create(parent_engine, &spec) {
            Ok(Some(engine_id)) => {
                self.planes.occupy(
                    handle,
                    PlaneRecord {
                        engine: engine_id,
                        parent: Some(parent),
                        children: Vec::new(),
                        on_resize: options.on_resize,
                    },
                );
                self.planes
                    .get_mut(parent)
                    .expect("parent validated above")
                    .children
                    .push(handle);
                Ok(handle)
            }
            Ok(None) => {
                self.planes.release_vacant(handle);
                Err(Error::PlaneRejected)
            }
            Err(e) => {
                self.planes.release_vacant(handle);
                Err(Error::Engine(e))
            }
        }
    }

    /// Destroys one plane. Its children are rebound to its parent, as the
    /// engine does on its side.
    ///
    /// # Panics
    /// Panics if the engine fails the destroy; native state can no
    /// longer be trusted at that point.
    pub fn plane_destroy(&mut self, plane: PlaneHandle) -> Result<()> {
        if plane == self.root {
            return Err(Error::InvalidHandle(ResourceKind::Plane));
        }
        let record = self.planes.remove(plane)?;
        if let Some(parent) = record.parent {
            if let Ok(p) = self.planes.get_mut(parent) {
                p.children.retain(|&c| c != plane);
            }
        }
        for &child in &record.children {
            if let Ok(c) = self.planes.get_mut(child) {
                c.parent = record.parent;
            }
        }
        if let Some(parent) = record.parent {
            if let Ok(p) = self.planes.get_mut(parent) {
                p.children.extend(record.children.iter().copied());
            }
        }
        if let Err(e) = self.engine.plane_destroy(record.engine) {
            panic!("engine failed to destroy plane: {}", e);
        }
        Ok(())
    }

    /// Destroys a plane and its entire subtree. Every descendant handle
    /// is invalidated atomically: by the time this returns, all of them
    /// fail with `InvalidHandle`.
    ///
    /// # Panics
    /// Panics if the engine fails the destroy.
    pub fn plane_destroy_family(&mut self, plane: PlaneHandle) -> Result<()> {
        if plane == self.root {
            return Err(Error::InvalidHandle(ResourceKind::Plane));
        }
        let engine_id = self.planes.get(plane)?.engine;
        let family = self.collect_family(plane)?;
        let parent = self.planes.get(plane)?.parent;
        if let Some(parent) = parent {
            if let Ok(p) = self.planes.get_mut(parent) {
                p.children.retain(|&c| c != plane);
            }
        }
        for &member in &family {
            self.planes
                .remove(member)
                .expect("family collected from live records");
        }
        if let Err(e) = self.engine.plane_destroy_family(engine_id) {
            panic!("engine failed to destroy plane family: {}", e);
        }
        Ok(())
    }

    /// Moves `plane` and its subtree under `new_parent`. Margin-sized
    /// planes may resize in the process; their callbacks fire through the
    /// usual dispatch path.
    pub fn plane_reparent_family(
        &mut self,
        plane: PlaneHandle,
        new_parent: PlaneHandle,
    ) -> Result<()> {
        if plane == self.root {
            return Err(Error::InvalidHandle(ResourceKind::Plane));
        }
        let engine_id = self.planes.get(plane)?.engine;
        let new_parent_engine = self.planes.get(new_parent)?.engine;
        let Context { engine, planes, .. } = self;
        let outcome = run_with_sink(planes, |sink| {
            engine.plane_reparent_family(engine_id, new_parent_engine, sink)
        });
        match outcome {
            // the reparent itself took effect even when a later callback
            // aborted the realignment cascade; keep the records in step
            Ok(()) | Err(Error::CallbackAborted(_)) => {
                let old_parent = self.planes.get(plane)?.parent;
                if let Some(old) = old_parent {
                    if let Ok(p) = self.planes.get_mut(old) {
                        p.children.retain(|&c| c != plane);
                    }
                }
                self.planes.get_mut(plane)?.parent = Some(new_parent);
                self.planes.get_mut(new_parent)?.children.push(plane);
                outcome
            }
            Err(_) => outcome,
        }
    }

    /// Repositions the plane relative to its parent.
    pub fn plane_move_to(&mut self, plane: PlaneHandle, y: i32, x: i32) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_move(engine_id, y, x)?)
    }

    /// Resizes the plane. The plane's own callback (and those of any
    /// descendants the engine realigns) fire before this returns, in the
    /// engine's traversal order.
    pub fn plane_resize(&mut self, plane: PlaneHandle, rows: u32, cols: u32) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        let Context { engine, planes, .. } = self;
        run_with_sink(planes, |sink| engine.plane_resize(engine_id, rows, cols, sink))
    }

    /// Moves the plane to the top of its siblings' z-order.
    pub fn plane_raise(&mut self, plane: PlaneHandle) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        self.engine.plane_raise(engine_id)?;
        if let Some(parent) = self.planes.get(plane)?.parent {
            let p = self.planes.get_mut(parent)?;
            p.children.retain(|&c| c != plane);
            p.children.push(plane);
        }
        Ok(())
    }

    /// Moves the plane to the bottom of its siblings' z-order.
    pub fn plane_lower(&mut self, plane: PlaneHandle) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        self.engine.plane_lower(engine_id)?;
        if let Some(parent) = self.planes.get(plane)?.parent {
            let p = self.planes.get_mut(parent)?;
            p.children.retain(|&c| c != plane);
            p.children.insert(0, plane);
        }
        Ok(())
    }

    /// Position relative to the parent.
    pub fn plane_yx(&self, plane: PlaneHandle) -> Result<(i32, i32)> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_yx(engine_id)?)
    }

    /// Dimensions in cells, (rows, cols).
    pub fn plane_dims(&self, plane: PlaneHandle) -> Result<(u32, u32)> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_dims(engine_id)?)
    }

    /// Cursor position, (y, x).
    pub fn plane_cursor(&self, plane: PlaneHandle) -> Result<(u32, u32)> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_cursor(engine_id)?)
    }

    /// Moves the cursor.
    pub fn plane_cursor_move(&mut self, plane: PlaneHandle, y: u32, x: u32) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_cursor_move(engine_id, y, x)?)
    }

    /// Homes the cursor.
    pub fn plane_home(&mut self, plane: PlaneHandle) -> Result<()> {
        self.plane_cursor_move(plane, 0, 0)
    }

    /// Active style bits.
    pub fn plane_styles(&self, plane: PlaneHandle) -> Result<Style> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_styles(engine_id)?)
    }

    /// Replaces the active style bits.
    pub fn plane_set_styles(&mut self, plane: PlaneHandle, styles: Style) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_set_styles(engine_id, styles)?)
    }

    /// Active channel pair.
    pub fn plane_channels(&self, plane: PlaneHandle) -> Result<Channels> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_channels(engine_id)?)
    }

    /// Replaces the active channel pair.
    pub fn plane_set_channels(&mut self, plane: PlaneHandle, channels: Channels) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_set_channels(engine_id, channels)?)
    }

    /// The plane's debugging name.
    pub fn plane_name(&self, plane: PlaneHandle) -> Result<Option<String>> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_name(engine_id)?)
    }

    /// Renames the plane.
    pub fn plane_set_name(&mut self, plane: PlaneHandle, name: &str) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_set_name(engine_id, name)?)
    }

    /// Clears the plane's content and homes its cursor.
    pub fn plane_erase(&mut self, plane: PlaneHandle) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_erase(engine_id)?)
    }

    /// Sets the cell rendered wherever the plane has no content.
    pub fn plane_set_base(
        &mut self,
        plane: PlaneHandle,
        glyph: &str,
        styles: Style,
        channels: Channels,
    ) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_set_base(engine_id, glyph, styles, channels)?)
    }

    /// Writes `text` at (`y`, `x`); -1 for either coordinate means "at the
    /// cursor". Returns the number of cells written.
    pub fn plane_put_text(
        &mut self,
        plane: PlaneHandle,
        y: i32,
        x: i32,
        text: &str,
    ) -> Result<usize> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_put_text(engine_id, y, x, text)?)
    }

    /// UTF-8 text under `rect`.
    pub fn plane_contents(&self, plane: PlaneHandle, rect: Rect) -> Result<String> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_contents(engine_id, rect)?)
    }

    /// Draws `len` cells of `glyph` downward from the cursor. Returns the
    /// number of cells drawn.
    pub fn plane_vline(&mut self, plane: PlaneHandle, glyph: &str, len: u32) -> Result<usize> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self.engine.plane_vline(engine_id, glyph, len)?)
    }

    /// Merges `src`'s visible cells down onto `dst`.
    pub fn plane_merge_down(&mut self, src: PlaneHandle, dst: PlaneHandle) -> Result<()> {
        let src_engine = self.planes.get(src)?.engine;
        let dst_engine = self.planes.get(dst)?.engine;
        Ok(self.engine.plane_merge_down(src_engine, dst_engine)?)
    }

    /// Draws a border around the plane's edge.
    pub fn plane_perimeter(
        &mut self,
        plane: PlaneHandle,
        kind: PerimeterKind,
        styles: Style,
        channels: Channels,
        ctlword: u32,
    ) -> Result<()> {
        let engine_id = self.planes.get(plane)?.engine;
        Ok(self
            .engine
            .plane_perimeter(engine_id, kind, styles, channels, ctlword)?)
    }

    /// Subtree of `plane` in parent-before-children order, `plane` first.
    fn collect_family(&self, plane: PlaneHandle) -> Result<Vec<PlaneHandle>> {
        let mut order = vec![plane];
        let mut i = 0;
        while i < order.len() {
            let children = self.planes.get(order[i])?.children.clone();
            order.extend(children);
            i += 1;
        }
        Ok(order)
    }
}
