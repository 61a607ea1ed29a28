//! Device instance and lifecycle
//!
//! One [`SerialDevice`] exists per attached adapter. The bus layer
//! delivers lifecycle events through [`SerialDevice::handle_event`],
//! which drives configuration, bring-up and teardown; serial traffic
//! and line configuration arrive concurrently from any thread.
//!
//! Lifecycle events themselves are serialized by the caller. Only the
//! line state carries a lock; the endpoint bindings are written during
//! start and stop, which the event serialization already covers.

use crate::bringup::{self, ChipVariant};
use crate::bus::Bus;
use crate::enumerate::{self, Endpoints};
use crate::error::{Error, Result};
use crate::line::{HandFlow, LineControl, LineState, SerialChars};
use crate::transfer::{self, IoHandler, IoOutcome};
use crate::vendor;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle state of one device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnpState {
    NotStarted,
    Started,
    StopPending,
    Stopped,
    RemovePending,
    SurpriseRemovePending,
    Deleted,
}

/// A lifecycle event delivered by the bus layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    QueryStop,
    CancelStop,
    Stop,
    QueryRemove,
    CancelRemove,
    Remove,
    SurpriseRemoval,
    /// Any event the driver has no handling for; forwarded unchanged.
    Other(u8),
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::QueryStop => write!(f, "query-stop"),
            Self::CancelStop => write!(f, "cancel-stop"),
            Self::Stop => write!(f, "stop"),
            Self::QueryRemove => write!(f, "query-remove"),
            Self::CancelRemove => write!(f, "cancel-remove"),
            Self::Remove => write!(f, "remove"),
            Self::SurpriseRemoval => write!(f, "surprise-removal"),
            Self::Other(code) => write!(f, "other ({code:#04x})"),
        }
    }
}

struct Lifecycle {
    state: PnpState,
    /// State to restore when a query-stop or query-remove is canceled.
    previous: PnpState,
}

/// One attached CH341 adapter.
pub struct SerialDevice {
    name: String,
    bus: Arc<dyn Bus>,
    variant: ChipVariant,
    lifecycle: Mutex<Lifecycle>,
    endpoints: RwLock<Option<Endpoints>>,
    line: Mutex<LineState>,
}

impl SerialDevice {
    /// Build a device instance sitting on `bus`. The device starts in
    /// [`PnpState::NotStarted`]; nothing touches hardware until the
    /// start event arrives.
    pub fn new(name: impl Into<String>, bus: Arc<dyn Bus>, variant: ChipVariant) -> Self {
        Self {
            name: name.into(),
            bus,
            variant,
            lifecycle: Mutex::new(Lifecycle {
                state: PnpState::NotStarted,
                previous: PnpState::NotStarted,
            }),
            endpoints: RwLock::new(None),
            line: Mutex::new(LineState::startup_defaults()),
        }
    }

    /// The device's presentation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PnpState {
        self.lifecycle.lock().unwrap().state
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state() == PnpState::Deleted {
            return Err(Error::NoSuchDevice);
        }
        Ok(())
    }

    /// Handle one lifecycle event.
    ///
    /// Events the driver does not consume are forwarded to the bus
    /// unchanged. Once the device is deleted every event fails with
    /// [`Error::NoSuchDevice`] without reaching the bus.
    pub fn handle_event(&self, event: LifecycleEvent) -> Result<()> {
        self.ensure_alive()?;
        debug!(device = %self.name, %event, "lifecycle event");
        match event {
            LifecycleEvent::Start => self.start(),
            LifecycleEvent::QueryStop => self.query(event, PnpState::StopPending),
            LifecycleEvent::QueryRemove => self.query(event, PnpState::RemovePending),
            LifecycleEvent::CancelStop | LifecycleEvent::CancelRemove => self.cancel(event),
            LifecycleEvent::Stop => self.stop(),
            LifecycleEvent::SurpriseRemoval => self.surprise_removal(),
            LifecycleEvent::Remove => self.remove(),
            LifecycleEvent::Other(_) => Ok(self.bus.forward_event(&event)?),
        }
    }

    /// Start the device: the event goes downstream first and must
    /// succeed before any local work. Configuration, bring-up and the
    /// line defaults then run in order; a failure at any point leaves
    /// the lifecycle state where it was.
    fn start(&self) -> Result<()> {
        self.bus.forward_event(&LifecycleEvent::Start)?;

        let endpoints = enumerate::negotiate_configuration(self.bus.as_ref())?;
        *self.endpoints.write().unwrap() = Some(endpoints);

        bringup::bring_up(self.bus.as_ref(), self.variant)?;

        let snapshot = {
            let mut line = self.line.lock().unwrap();
            *line = LineState::startup_defaults();
            line.clone()
        };
        vendor::set_line(
            self.bus.as_ref(),
            snapshot.baud_rate,
            snapshot.line_control.stop_bits,
            snapshot.line_control.parity,
            snapshot.line_control.word_length,
        )?;

        self.lifecycle.lock().unwrap().state = PnpState::Started;
        info!(device = %self.name, "started");
        Ok(())
    }

    fn query(&self, event: LifecycleEvent, pending: PnpState) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            lifecycle.previous = lifecycle.state;
            lifecycle.state = pending;
        }
        Ok(self.bus.forward_event(&event)?)
    }

    fn cancel(&self, event: LifecycleEvent) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            lifecycle.state = lifecycle.previous;
        }
        Ok(self.bus.forward_event(&event)?)
    }

    /// Stop the device. The transition to `Stopped` is unconditional;
    /// a deconfigure failure only warns.
    fn stop(&self) -> Result<()> {
        if let Err(error) = self.unconfigure() {
            warn!(device = %self.name, %error, "unconfigure during stop failed");
        }
        self.lifecycle.lock().unwrap().state = PnpState::Stopped;
        info!(device = %self.name, "stopped");
        Ok(self.bus.forward_event(&LifecycleEvent::Stop)?)
    }

    /// The adapter vanished without an orderly stop. Teardown is
    /// attempted anyway; the hardware may already be gone, so failures
    /// only warn.
    fn surprise_removal(&self) -> Result<()> {
        if let Err(error) = self.unconfigure() {
            warn!(device = %self.name, %error, "unconfigure after surprise removal failed");
        }
        self.lifecycle.lock().unwrap().state = PnpState::SurpriseRemovePending;
        Ok(self.bus.forward_event(&LifecycleEvent::SurpriseRemoval)?)
    }

    fn remove(&self) -> Result<()> {
        let state = self.state();
        // After a surprise removal the device is presumed gone;
        // deconfiguring it again would just fail on the wire.
        if state != PnpState::SurpriseRemovePending
            && let Err(error) = self.unconfigure()
        {
            warn!(device = %self.name, %error, "unconfigure during removal failed");
        }
        self.lifecycle.lock().unwrap().state = PnpState::Deleted;
        info!(device = %self.name, "removed");
        Ok(self.bus.forward_event(&LifecycleEvent::Remove)?)
    }

    /// Release the endpoint bindings and deconfigure the device.
    fn unconfigure(&self) -> Result<()> {
        let had_endpoints = self.endpoints.write().unwrap().take().is_some();
        if had_endpoints {
            vendor::set_configuration(self.bus.as_ref(), 0)?;
        }
        Ok(())
    }

    fn bound_endpoints(&self) -> Result<Endpoints> {
        self.endpoints
            .read()
            .unwrap()
            .ok_or(Error::NotConfigured)
    }

    /// Submit an asynchronous read of up to `length` bytes from the
    /// bulk IN endpoint. `complete` runs when the transfer finishes; a
    /// short read is a success. A zero-length read completes inline
    /// without touching the bus.
    pub fn read(&self, length: usize, complete: IoHandler) -> Result<()> {
        self.ensure_alive()?;
        if length == 0 {
            complete(IoOutcome::empty_success());
            return Ok(());
        }
        let endpoints = self.bound_endpoints()?;
        transfer::submit_bulk(
            self.bus.as_ref(),
            endpoints.bulk_in.address,
            vec![0; length],
            complete,
        );
        Ok(())
    }

    /// Submit an asynchronous write of `data` to the bulk OUT
    /// endpoint. `complete` runs when the transfer finishes. A
    /// zero-length write completes inline without touching the bus.
    pub fn write(&self, data: Vec<u8>, complete: IoHandler) -> Result<()> {
        self.ensure_alive()?;
        if data.is_empty() {
            complete(IoOutcome::empty_success());
            return Ok(());
        }
        let endpoints = self.bound_endpoints()?;
        transfer::submit_bulk(self.bus.as_ref(), endpoints.bulk_out.address, data, complete);
        Ok(())
    }

    /// Current baud rate and framing.
    pub fn get_line_coding(&self) -> Result<(u32, LineControl)> {
        self.ensure_alive()?;
        let line = self.line.lock().unwrap();
        Ok((line.baud_rate, line.line_control))
    }

    /// Set baud rate and framing, pushing the new coding to the chip.
    ///
    /// The in-memory update happens under the line lock; the hardware
    /// push happens after the lock is released, from the values just
    /// written. Two concurrent setters can therefore reach the chip in
    /// either order; the cached state always reflects the later update.
    pub fn set_line_coding(&self, baud_rate: u32, line_control: LineControl) -> Result<()> {
        self.ensure_alive()?;
        {
            let mut line = self.line.lock().unwrap();
            line.baud_rate = baud_rate;
            line.line_control = line_control;
        }
        vendor::set_line(
            self.bus.as_ref(),
            baud_rate,
            line_control.stop_bits,
            line_control.parity,
            line_control.word_length,
        )
    }

    /// Current baud rate.
    pub fn get_baud_rate(&self) -> Result<u32> {
        self.ensure_alive()?;
        Ok(self.line.lock().unwrap().baud_rate)
    }

    /// Set just the baud rate. The chip takes baud and framing in one
    /// request, so the push carries the cached framing along.
    pub fn set_baud_rate(&self, baud_rate: u32) -> Result<()> {
        self.ensure_alive()?;
        let line_control = {
            let mut line = self.line.lock().unwrap();
            line.baud_rate = baud_rate;
            line.line_control
        };
        vendor::set_line(
            self.bus.as_ref(),
            baud_rate,
            line_control.stop_bits,
            line_control.parity,
            line_control.word_length,
        )
    }

    /// Current framing parameters.
    pub fn get_line_control(&self) -> Result<LineControl> {
        self.ensure_alive()?;
        Ok(self.line.lock().unwrap().line_control)
    }

    /// Set just the framing, pushing with the cached baud rate.
    pub fn set_line_control(&self, line_control: LineControl) -> Result<()> {
        self.ensure_alive()?;
        let baud_rate = {
            let mut line = self.line.lock().unwrap();
            line.line_control = line_control;
            line.baud_rate
        };
        vendor::set_line(
            self.bus.as_ref(),
            baud_rate,
            line_control.stop_bits,
            line_control.parity,
            line_control.word_length,
        )
    }

    /// Current DTR/RTS bit pair.
    pub fn get_control_lines(&self) -> Result<u16> {
        self.ensure_alive()?;
        Ok(self.line.lock().unwrap().dtr_rts)
    }

    /// Raise or drop DTR and push the new pair to the chip. Same
    /// locking shape as [`Self::set_line_coding`].
    pub fn set_dtr(&self, asserted: bool) -> Result<()> {
        self.ensure_alive()?;
        let dtr_rts = {
            let mut line = self.line.lock().unwrap();
            line.set_dtr(asserted);
            line.dtr_rts
        };
        vendor::set_control_lines(self.bus.as_ref(), dtr_rts)
    }

    /// Raise or drop RTS and push the new pair to the chip.
    pub fn set_rts(&self, asserted: bool) -> Result<()> {
        self.ensure_alive()?;
        let dtr_rts = {
            let mut line = self.line.lock().unwrap();
            line.set_rts(asserted);
            line.dtr_rts
        };
        vendor::set_control_lines(self.bus.as_ref(), dtr_rts)
    }

    /// Current special-character set.
    pub fn get_chars(&self) -> Result<SerialChars> {
        self.ensure_alive()?;
        Ok(self.line.lock().unwrap().chars)
    }

    /// Replace the special-character set. Cached only; the chip has no
    /// register for these.
    pub fn set_chars(&self, chars: SerialChars) -> Result<()> {
        self.ensure_alive()?;
        self.line.lock().unwrap().chars = chars;
        Ok(())
    }

    /// Current flow-control configuration.
    pub fn get_hand_flow(&self) -> Result<HandFlow> {
        self.ensure_alive()?;
        Ok(self.line.lock().unwrap().hand_flow)
    }

    /// Replace the flow-control configuration. Cached only.
    pub fn set_hand_flow(&self, hand_flow: HandFlow) -> Result<()> {
        self.ensure_alive()?;
        self.line.lock().unwrap().hand_flow = hand_flow;
        Ok(())
    }
}
