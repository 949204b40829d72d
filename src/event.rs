// src/event.rs

//! The event bridge: a re-armable, level-triggered polling loop that
//! drains a batch of input events per wake-up and dispatches each to the
//! registered host callback.
//!
//! Per context the bridge is a two-state machine, `Idle` <-> `Polling`,
//! with an implicit `Draining` excursion on every wake-up. The readiness
//! registration is one-shot, so "re-arm" is an explicit act that only
//! happens after a drain completes normally. Every early exit (callback
//! error, callback cancellation, broken input source) leaves the
//! registration dropped and the callback cleared: polling fails closed,
//! and the host must call `input_start` again to resume.

use log::{debug, trace, warn};

use crate::engine::{EngineError, RenderEngine};
use crate::error::{Error, Result};
use crate::input::InputEvent;
use crate::keys::MiceEvents;
use crate::os::poll::{ReadyFlags, ReadyWatch};

/// What an input callback tells the drain loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Keep dispatching queued events.
    Continue,
    /// Stop dispatching and leave polling disabled.
    Stop,
}

/// Host callback receiving one input event per invocation, strictly in
/// engine order. Returning `Err` also stops the drain and disables
/// polling, surfacing as [`Error::CallbackAborted`].
pub type InputCallback = Box<dyn FnMut(&InputEvent) -> anyhow::Result<Drain>>;

/// Host callback invoked, with no arguments, when a plane's dimensions
/// change. Returning `Err` aborts the pending resize cascade.
pub type ResizeCallback = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Result of one [`input_pump`](crate::context::Context::input_pump) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Polling is not active; nothing was waited on.
    Idle,
    /// The wait timed out, was interrupted, or woke spuriously.
    Empty,
    /// A drain completed normally; this many events were dispatched.
    Drained(usize),
    /// The callback requested cancellation. Polling is now disabled.
    Stopped,
}

pub(crate) struct InputBridge {
    watch: ReadyWatch,
    callback: Option<InputCallback>,
}

impl InputBridge {
    pub(crate) fn new() -> Result<Self> {
        let watch = ReadyWatch::new()
            .map_err(|e| EngineError::op("poll setup", format!("{:#}", e)))?;
        Ok(InputBridge {
            watch,
            callback: None,
        })
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.callback.is_some()
    }

    /// Registers the callback and arms the readiness watch.
    pub(crate) fn start(
        &mut self,
        engine: &mut dyn RenderEngine,
        callback: InputCallback,
        mice: MiceEvents,
    ) -> Result<()> {
        if self.callback.is_some() {
            return Err(Error::AlreadyPolling);
        }
        if !mice.is_empty() {
            // recoverable: nothing has been registered yet, so the host
            // may retry with different (or no) mouse classes
            engine.mice_enable(mice)?;
        }
        let fd = engine.input_ready_fd();
        self.watch
            .watch(fd)
            .map_err(|e| EngineError::op("poll registration", format!("{:#}", e)))?;
        self.callback = Some(callback);
        debug!("input polling started on fd {}", fd);
        Ok(())
    }

    /// Unregisters and clears the callback. No-op when idle.
    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.callback.is_none() {
            trace!("input_stop: not polling, nothing to do");
            return Ok(());
        }
        self.callback = None;
        self.watch
            .unwatch()
            .map_err(|e| EngineError::op("poll deregistration", format!("{:#}", e)))?;
        debug!("input polling stopped");
        Ok(())
    }

    /// Fail-closed teardown used on every early drain exit.
    fn disarm(&mut self) {
        self.callback = None;
        if let Err(e) = self.watch.unwatch() {
            warn!("failed to drop poll registration while disarming: {:#}", e);
        }
    }

    /// Waits up to `timeout_ms` (-1 to block) for readiness, then drains
    /// and dispatches every queued event.
    pub(crate) fn pump(
        &mut self,
        engine: &mut dyn RenderEngine,
        timeout_ms: i32,
    ) -> Result<PumpOutcome> {
        if self.callback.is_none() {
            return Ok(PumpOutcome::Idle);
        }
        let flags = self
            .watch
            .wait(timeout_ms)
            .map_err(|e| EngineError::op("poll wait", format!("{:#}", e)))?;
        let Some(flags) = flags else {
            return Ok(PumpOutcome::Empty);
        };
        if !flags.contains(ReadyFlags::READABLE) {
            // spurious wake-up: re-arm and go back to waiting
            trace!("spurious wake-up ({:?}), re-arming", flags);
            self.watch
                .rearm()
                .map_err(|e| EngineError::op("poll re-arm", format!("{:#}", e)))?;
            return Ok(PumpOutcome::Empty);
        }

        let mut dispatched = 0usize;
        loop {
            let raw = match engine.next_input() {
                Ok(Some(raw)) => raw,
                Ok(None) => break, // queue exhausted, drain complete
                Err(e) => {
                    // the readiness descriptor can no longer be trusted
                    self.disarm();
                    return Err(Error::Engine(e));
                }
            };
            let event = InputEvent::from_raw(raw);
            let outcome = {
                let callback = self.callback.as_mut().expect("polling implies callback");
                callback(&event)
            };
            match outcome {
                Ok(Drain::Continue) => dispatched += 1,
                Ok(Drain::Stop) => {
                    debug!("callback cancelled the drain after {} events", dispatched);
                    self.disarm();
                    return Ok(PumpOutcome::Stopped);
                }
                Err(e) => {
                    debug!("callback errored after {} events: {:#}", dispatched, e);
                    self.disarm();
                    return Err(Error::CallbackAborted(e));
                }
            }
        }

        self.watch
            .rearm()
            .map_err(|e| EngineError::op("poll re-arm", format!("{:#}", e)))?;
        trace!("drain complete, {} events dispatched, re-armed", dispatched);
        Ok(PumpOutcome::Drained(dispatched))
    }
}
