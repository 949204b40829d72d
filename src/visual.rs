// src/visual.rs

//! Visuals: decoded pixel images bound to host-owned buffers.
//!
//! A visual keeps a shared reference to the buffer it was decoded from for
//! its whole lifetime, because the engine may re-read the source pixels
//! when blitting again after a resize. Teardown is ordered: the engine's
//! decoded image goes first, the buffer reference is released only after
//! the engine has confirmed.

use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::arena::Handle;
use crate::context::Context;
use crate::engine::{BlitSpec, VisualId};
use crate::error::{Error, Result};
use crate::plane::{PlaneHandle, PlaneRecord};

/// Host-owned pixel storage, shared with the visuals decoded from it.
/// Must not be mutated while any visual references it (caller contract).
pub type PixelBuffer = Vec<u8>;

bitflags! {
    /// Blit behavior flags. Numeric values are the engine's own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct VisualFlags: u64 {
        /// Fail rather than degrade to an inferior blitter.
        const NODEGRADE     = 0x0001;
        /// Alpha-blend against existing content instead of replacing it.
        const BLEND         = 0x0002;
        /// `x` is an alignment, not an offset.
        const HORALIGNED    = 0x0004;
        /// `y` is an alignment, not an offset.
        const VERALIGNED    = 0x0008;
        /// Treat the source as opaque, synthesizing alpha.
        const ADDALPHA      = 0x0010;
        /// Make the materialized plane a child of the destination.
        const CHILDPLANE    = 0x0020;
        /// Scale by sampling, never interpolation.
        const NOINTERPOLATE = 0x0040;
    }
}

/// Cell-geometry strategy used when compositing. Values are the engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum Blitter {
    /// Let the engine pick for the terminal.
    #[default]
    Default = 0,
    /// One space per pixel.
    Single = 1,
    /// Half blocks, two pixels per cell.
    Halves = 2,
    /// Quadrant blocks.
    Quadrants = 3,
    /// Sextant blocks.
    Sextants = 4,
    /// Octant blocks.
    Octants = 5,
    /// Braille patterns, eight pixels per cell.
    Braille = 6,
    /// True pixel graphics.
    Pixel = 7,
    /// Four vertical levels per cell.
    FourLevels = 8,
    /// Eight vertical levels per cell.
    EightLevels = 9,
}

/// How the image is fitted to the destination. Values are the engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum Scale {
    /// Draw at native size, clipping as needed.
    #[default]
    None = 0,
    /// Scale preserving aspect ratio.
    Scale = 1,
    /// Fill the destination exactly.
    Stretch = 2,
    /// Native size at the blitter's highest resolution.
    NoneHiRes = 3,
    /// Aspect-preserving at the blitter's highest resolution.
    ScaleHiRes = 4,
}

/// Marker type for visual handles.
pub enum Visual {}

/// Handle to a visual owned by a [`Context`].
pub type VisualHandle = Handle<Visual>;

/// Parameters for [`Context::visual_blit`].
#[derive(Debug, Clone, Default)]
pub struct BlitOptions {
    /// Draw into this plane; `None` lets the engine materialize a new
    /// plane sized to the image.
    pub dst: Option<PlaneHandle>,
    /// Placement within the destination (or of the new plane).
    pub y: i32,
    pub x: i32,
    pub scale: Scale,
    pub blitter: Blitter,
    pub flags: VisualFlags,
}

/// Record behind a [`VisualHandle`].
pub(crate) struct VisualRecord {
    pub(crate) engine: VisualId,
    /// Keeps the host buffer alive as long as the decoded image exists.
    pub(crate) buffer: Rc<PixelBuffer>,
    pub(crate) offset: usize,
    pub(crate) len: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Context {
    /// Decodes `buffer[offset .. offset + len]` as `height` rows of
    /// tightly-packed RGBA pixels and binds the result to the buffer.
    ///
    /// Fails with [`Error::InvalidBuffer`], allocating no engine
    /// resource, unless the range lies within the buffer and
    /// `height * width * 4 == len`.
    pub fn visual_create(
        &mut self,
        buffer: Rc<PixelBuffer>,
        offset: usize,
        len: usize,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> Result<VisualHandle> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::InvalidBuffer(String::from("offset + len overflows")))?;
        if end > buffer.len() {
            return Err(Error::InvalidBuffer(format!(
                "range {}..{} exceeds buffer of {} bytes",
                offset,
                end,
                buffer.len()
            )));
        }
        if u64::from(height) * u64::from(width) * 4 != len as u64 {
            return Err(Error::InvalidBuffer(format!(
                "{} bytes cannot hold {}x{} tightly-packed RGBA",
                len, height, width
            )));
        }
        let engine_id = self.engine.visual_from_rgba(
            &buffer[offset..end],
            height,
            width * bytes_per_pixel,
            width,
        )?;
        Ok(self.visuals.insert(VisualRecord {
            engine: engine_id,
            buffer,
            offset,
            len,
            width,
            height,
        }))
    }

    /// Composites the visual.
    ///
    /// With a destination plane, draws into it in place and returns
    /// `Ok(None)`; with no destination, the engine materializes a new
    /// plane sized to the image and its handle is returned. Fails with
    /// [`Error::BlitFailed`] when no destination plane can be produced.
    ///
    /// # Panics
    /// Panics if the engine reports it drew into a plane other than the
    /// requested destination, a broken engine invariant.
    pub fn visual_blit(
        &mut self,
        visual: VisualHandle,
        options: &BlitOptions,
    ) -> Result<Option<PlaneHandle>> {
        let visual_engine = self.visuals.get(visual)?.engine;
        match options.dst {
            Some(dst) => {
                let dst_engine = self.planes.get(dst)?.engine;
                let spec = BlitSpec {
                    dst: Some(dst_engine),
                    y: options.y,
                    x: options.x,
                    scale: options.scale,
                    blitter: options.blitter,
                    flags: options.flags,
                    token: 0,
                };
                match self.engine.visual_blit(visual_engine, &spec)? {
                    Some(drawn) => {
                        assert!(
                            drawn == dst_engine,
                            "engine blitted into plane {} instead of requested {}",
                            drawn,
                            dst_engine
                        );
                        Ok(None)
                    }
                    None => Err(Error::BlitFailed),
                }
            }
            None => {
                let handle = self.planes.vacant();
                let spec = BlitSpec {
                    dst: None,
                    y: options.y,
                    x: options.x,
                    scale: options.scale,
                    blitter: options.blitter,
                    flags: options.flags,
                    token: handle.token(),
                };
                match self.engine.visual_blit(visual_engine, &spec) {
                    Ok(Some(engine_id)) => {
                        let root = self.root;
                        self.planes.occupy(
                            handle,
                            PlaneRecord {
                                engine: engine_id,
                                parent: Some(root),
                                children: Vec::new(),
                                on_resize: None,
                            },
                        );
                        self.planes
                            .get_mut(root)
                            .expect("root outlives the context")
                            .children
                            .push(handle);
                        Ok(Some(handle))
                    }
                    Ok(None) => {
                        self.planes.release_vacant(handle);
                        Err(Error::BlitFailed)
                    }
                    Err(e) => {
                        self.planes.release_vacant(handle);
                        Err(Error::Engine(e))
                    }
                }
            }
        }
    }

    /// Dimensions of the decoded image, (height, width) in pixels.
    pub fn visual_geometry(&self, visual: VisualHandle) -> Result<(u32, u32)> {
        let record = self.visuals.get(visual)?;
        Ok((record.height, record.width))
    }

    /// The byte range of the backing buffer the visual was decoded from,
    /// as (offset, len).
    pub fn visual_source_range(&self, visual: VisualHandle) -> Result<(usize, usize)> {
        let record = self.visuals.get(visual)?;
        Ok((record.offset, record.len))
    }

    /// How many shared references the visual's backing buffer has,
    /// including the host's own.
    pub fn visual_buffer_refs(&self, visual: VisualHandle) -> Result<usize> {
        Ok(Rc::strong_count(&self.visuals.get(visual)?.buffer))
    }

    /// Releases the visual: the engine's decoded image is destroyed
    /// first, and only then is the retaining buffer reference dropped.
    ///
    /// # Panics
    /// Panics if the engine fails the destroy.
    pub fn visual_destroy(&mut self, visual: VisualHandle) -> Result<()> {
        let record = self.visuals.remove(visual)?;
        if let Err(e) = self.engine.visual_destroy(record.engine) {
            panic!("engine failed to destroy visual: {}", e);
        }
        drop(record); // buffer reference released last
        Ok(())
    }
}
