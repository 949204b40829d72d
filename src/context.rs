// src/context.rs

//! The context facade: one rendering session bound to one engine.
//!
//! A `Context` owns the boxed engine, the plane and visual arenas, the
//! root (standard) plane, and the event bridge's registration. Exactly
//! one context exists per engine instance; the box moves in at `init`
//! and never leaves.

use log::{debug, warn};

use crate::arena::Arena;
use crate::config::ContextOptions;
use crate::engine::{PixelSupport, RenderEngine};
use crate::error::{Error, ResourceKind, Result};
use crate::event::{InputBridge, InputCallback, PumpOutcome};
use crate::keys::MiceEvents;
use crate::plane::{run_with_sink, Plane, PlaneHandle, PlaneRecord};
use crate::visual::{Visual, VisualRecord};

/// One rendering session. See the module docs.
pub struct Context {
    pub(crate) engine: Box<dyn RenderEngine>,
    pub(crate) planes: Arena<Plane, PlaneRecord>,
    pub(crate) visuals: Arena<Visual, VisualRecord>,
    pub(crate) root: PlaneHandle,
    pub(crate) bridge: InputBridge,
    stopped: bool,
}

impl Context {
    /// Brings the engine up and wraps it in a session.
    pub fn init(mut engine: Box<dyn RenderEngine>, options: &ContextOptions) -> Result<Self> {
        engine.init(options)?;
        let mut planes = Arena::new(ResourceKind::Plane);
        let std_id = engine.std_plane();
        let root = planes.insert(PlaneRecord {
            engine: std_id,
            parent: None,
            children: Vec::new(),
            on_resize: None,
        });
        engine.set_plane_token(std_id, root.token())?;
        let bridge = InputBridge::new()?;
        debug!("context initialized, standard plane {:?}", root);
        Ok(Context {
            engine,
            planes,
            visuals: Arena::new(ResourceKind::Visual),
            root,
            bridge,
            stopped: false,
        })
    }

    /// The standard plane covering the whole rendering area. It cannot be
    /// destroyed or reparented; it goes down with the context.
    pub fn std_plane(&self) -> PlaneHandle {
        self.root
    }

    /// Flushes the current plane pile to the terminal.
    pub fn render(&mut self) -> Result<()> {
        Ok(self.engine.render()?)
    }

    /// The terminal's pixel-graphics capability.
    pub fn pixel_support(&self) -> PixelSupport {
        self.engine.pixel_support()
    }

    /// Has the engine re-evaluate the terminal size and realign the
    /// pile; resize callbacks fire for every plane whose dimensions
    /// change.
    pub fn refresh(&mut self) -> Result<()> {
        let Context { engine, planes, .. } = self;
        run_with_sink(planes, |sink| engine.refresh(sink))
    }

    /// Registers `callback` for input events and starts polling,
    /// optionally enabling mouse event classes first.
    ///
    /// Fails with [`Error::AlreadyPolling`] if a callback is already
    /// registered, and with [`Error::Engine`] if the terminal refuses the
    /// mouse classes (recoverable: nothing is registered in that case).
    pub fn input_start(&mut self, callback: InputCallback, mice: MiceEvents) -> Result<()> {
        let Context { engine, bridge, .. } = self;
        bridge.start(engine.as_mut(), callback, mice)
    }

    /// Stops polling and clears the callback registration. No-op when
    /// not polling.
    pub fn input_stop(&mut self) -> Result<()> {
        self.bridge.stop()
    }

    /// Whether an input callback is currently registered.
    pub fn is_polling(&self) -> bool {
        self.bridge.is_polling()
    }

    /// The host's wait point: blocks up to `timeout_ms` (-1 to block
    /// indefinitely) for input readiness, then drains the engine's queue,
    /// dispatching each event to the callback in order.
    ///
    /// A callback error ([`Error::CallbackAborted`]) or cancellation
    /// ([`PumpOutcome::Stopped`]) leaves polling disabled until
    /// [`input_start`](Self::input_start) is called again.
    pub fn input_pump(&mut self, timeout_ms: i32) -> Result<PumpOutcome> {
        let Context { engine, bridge, .. } = self;
        bridge.pump(engine.as_mut(), timeout_ms)
    }

    /// Tears the session down: stops polling, then stops the engine.
    pub fn destroy(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.bridge.stop()?;
        self.engine.stop().map_err(Error::Engine)?;
        debug!("context destroyed");
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(e) = self.shutdown() {
                warn!("context teardown during drop failed: {}", e);
            }
        }
    }
}
