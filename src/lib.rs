// src/lib.rs

//! termplane: the resource- and event-management layer between a
//! terminal-graphics rendering engine and a host application.
//!
//! The engine, a stateful session compositing a tree of character-cell
//! "planes" and decoded-pixel "visuals" onto a terminal, is consumed
//! through the [`engine::RenderEngine`] trait and never exposed raw.
//! This layer owns three problems on top of it:
//!
//! - **Resource safety.** Native records (context, planes, visuals,
//!   decoded images and the host buffers backing them) live in arenas and
//!   are addressed through typed, generation-checked handles; use after
//!   destroy is a typed error, never a dangling access.
//! - **Event dispatch.** A re-armable, level-triggered polling loop
//!   drains batches of input events and invokes host callbacks
//!   synchronously, failing closed when a callback errors or cancels.
//! - **Channel packing.** The engine's 64-bit color/attribute pairs are
//!   decomposed, mutated, and recomposed losslessly by a pure codec.
//!
//! A host session looks like:
//!
//! ```no_run
//! use termplane::{Context, ContextOptions, Drain, MiceEvents, PlaneOptions};
//! use termplane::engine::headless::HeadlessEngine;
//!
//! # fn main() -> termplane::Result<()> {
//! let engine = HeadlessEngine::new(24, 80).expect("engine");
//! let mut ctx = Context::init(Box::new(engine), &ContextOptions::default())?;
//! let root = ctx.std_plane();
//! let status = ctx.plane_create(root, PlaneOptions {
//!     rows: 1,
//!     cols: 40,
//!     ..Default::default()
//! })?;
//! ctx.plane_put_text(status, 0, 0, "ready")?;
//! ctx.render()?;
//!
//! ctx.input_start(
//!     Box::new(|event| {
//!         Ok(if event.id() == 'q' as u32 { Drain::Stop } else { Drain::Continue })
//!     }),
//!     MiceEvents::empty(),
//! )?;
//! ctx.input_pump(0)?;
//! ctx.destroy()
//! # }
//! ```

pub mod arena;
pub mod channel;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod input;
pub mod keys;
pub mod os;
pub mod plane;
pub mod sysinfo;
pub mod visual;

pub use arena::Handle;
pub use channel::{Alpha, Channel, Channels};
pub use config::{ContextFlags, ContextOptions, Margins};
pub use context::Context;
pub use engine::{PixelSupport, RenderEngine};
pub use error::{Error, ResourceKind, Result};
pub use event::{Drain, InputCallback, PumpOutcome, ResizeCallback};
pub use input::InputEvent;
pub use keys::{key, EventKind, MiceEvents, Modifiers, Style};
pub use plane::{PerimeterKind, PlaneFlags, PlaneHandle, PlaneOptions, Rect};
pub use sysinfo::{runtime, RuntimeInfo};
pub use visual::{BlitOptions, Blitter, PixelBuffer, Scale, VisualFlags, VisualHandle};
