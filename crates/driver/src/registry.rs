//! Device registry
//!
//! Hands out the per-adapter instance numbers used to name devices and
//! owns the attach bookkeeping. Numbers are never reused within one
//! registry lifetime, so a detach/reattach cycle gets a fresh name.

use crate::bringup::ChipVariant;
use crate::bus::Bus;
use crate::device::SerialDevice;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

const NAME_PREFIX: &str = "ch341-serial";

/// Registry of attached devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    next_number: AtomicU32,
    attached: AtomicUsize,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a device instance for an adapter on `bus`.
    ///
    /// `alias` overrides the generated name when the configuration
    /// supplies one; its absence is not an error.
    pub fn attach_device(
        &self,
        bus: Arc<dyn Bus>,
        variant: ChipVariant,
        alias: Option<&str>,
    ) -> Arc<SerialDevice> {
        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let name = match alias {
            Some(alias) => alias.to_string(),
            None => format!("{NAME_PREFIX}{number}"),
        };
        self.attached.fetch_add(1, Ordering::Relaxed);
        info!(device = %name, number, "adapter attached");
        Arc::new(SerialDevice::new(name, bus, variant))
    }

    /// Record a device instance going away.
    pub fn release_device(&self, device: &SerialDevice) {
        self.attached.fetch_sub(1, Ordering::Relaxed);
        info!(device = %device.name(), "adapter released");
    }

    /// Number of devices currently attached.
    pub fn attached_count(&self) -> usize {
        self.attached.load(Ordering::Relaxed)
    }
}
