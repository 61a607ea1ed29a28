//! Scripted bus for tests
//!
//! [`ScriptedBus`] plays the part of the upstream USB stack: it answers
//! descriptor fetches with a canned CH341-shaped device, serves vendor
//! register reads from a register map, and completes every submission
//! inline on the submitting thread. Failure injection covers the
//! scenarios the driver has to survive: a failing vendor operation at a
//! chosen position, a failing request code, stalled or failing bulk
//! pipes, and a downstream stack that refuses to start.

use crate::bus::{Bus, TransferRequest};
use crate::device::LifecycleEvent;
use protocol::requests::{
    GET_DESCRIPTOR_REQUEST, SET_CONFIGURATION_REQUEST, SET_CONTROL_REQUEST, SET_LINE_REQUEST,
    VENDOR_READ_REQUEST, VENDOR_WRITE_REQUEST,
};
use protocol::descriptor::{CONFIGURATION_DESCRIPTOR_TYPE, DEVICE_DESCRIPTOR_TYPE};
use protocol::{BusError, Completion, TransferKind, UsbStatus};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// A canned CH341 device descriptor.
pub fn device_descriptor() -> Vec<u8> {
    vec![
        18, 0x01, // bLength, bDescriptorType
        0x10, 0x01, // bcdUSB 1.10
        0xFF, 0x00, 0x00, // class, subclass, protocol
        8,    // bMaxPacketSize0
        0x86, 0x1a, // idVendor 0x1a86
        0x23, 0x75, // idProduct 0x7523
        0x64, 0x02, // bcdDevice
        0, 0, 0, // string indices
        1, // bNumConfigurations
    ]
}

/// Build a full configuration blob declaring `num_interfaces` (a single
/// interface descriptor is emitted regardless) and one endpoint
/// descriptor per `(address, attributes)` pair.
pub fn config_blob(num_interfaces: u8, endpoints: &[(u8, u8)]) -> Vec<u8> {
    let mut blob = vec![
        9, CONFIGURATION_DESCRIPTOR_TYPE, 0, 0, num_interfaces, 1, 0, 0x80, 49,
    ];
    blob.extend_from_slice(&[9, 0x04, 0, 0, endpoints.len() as u8, 0xFF, 0x01, 0x02, 0]);
    for &(address, attributes) in endpoints {
        blob.extend_from_slice(&[7, 0x05, address, attributes, 32, 0, 0]);
    }
    let total = blob.len() as u16;
    blob[2..4].copy_from_slice(&total.to_le_bytes());
    blob
}

#[derive(Default)]
struct Script {
    registers: HashMap<(u16, u16), u8>,
    device_descriptor: Vec<u8>,
    config_blob: Vec<u8>,
    queued_reads: VecDeque<Vec<u8>>,
    vendor_ops_seen: usize,
    fail_vendor_at: Option<usize>,
    fail_requests: HashSet<u8>,
    bulk_failure: Option<BusError>,
    bulk_in_failure: Option<BusError>,
    bulk_stall: bool,
    fail_start_forward: bool,
    submissions: Vec<TransferKind>,
    forwarded: Vec<LifecycleEvent>,
}

/// Inline-completing bus with scriptable behavior.
pub struct ScriptedBus {
    script: Mutex<Script>,
}

impl Default for ScriptedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBus {
    /// A bus fronting a healthy CH341: bring-up probes answer their
    /// nominal values and the configuration carries one interface with
    /// all three endpoints.
    pub fn new() -> Self {
        let mut registers = HashMap::new();
        registers.insert((0x8484, 0), 2);
        registers.insert((0x8383, 0), 0);
        Self {
            script: Mutex::new(Script {
                registers,
                device_descriptor: device_descriptor(),
                config_blob: config_blob(1, &[(0x82, 0x02), (0x02, 0x02), (0x81, 0x03)]),
                ..Script::default()
            }),
        }
    }

    /// Replace the configuration blob served to descriptor fetches.
    pub fn set_config_blob(&self, blob: Vec<u8>) {
        self.script.lock().unwrap().config_blob = blob;
    }

    /// Set the byte a vendor read of `(value, index)` answers with.
    pub fn set_register(&self, value: u16, index: u16, byte: u8) {
        self.script.lock().unwrap().registers.insert((value, index), byte);
    }

    /// Queue a payload for the next bulk IN transfer.
    pub fn queue_read(&self, data: Vec<u8>) {
        self.script.lock().unwrap().queued_reads.push_back(data);
    }

    /// Fail the `position`-th vendor operation (1-based, reads and
    /// writes counted together) at the bus level.
    pub fn fail_vendor_op(&self, position: usize) {
        self.script.lock().unwrap().fail_vendor_at = Some(position);
    }

    /// Fail every control transfer carrying `request` at the bus level.
    pub fn fail_request(&self, request: u8) {
        self.script.lock().unwrap().fail_requests.insert(request);
    }

    /// Fail every bulk transfer at the bus level with `error`.
    pub fn fail_bulk(&self, error: BusError) {
        self.script.lock().unwrap().bulk_failure = Some(error);
    }

    /// Fail bulk IN transfers only, leaving the OUT pipe healthy.
    pub fn fail_bulk_in(&self, error: BusError) {
        self.script.lock().unwrap().bulk_in_failure = Some(error);
    }

    /// Complete every bulk transfer with a protocol-level stall.
    pub fn stall_bulk(&self) {
        self.script.lock().unwrap().bulk_stall = true;
    }

    /// Refuse the forwarded start event.
    pub fn fail_start_forward(&self) {
        self.script.lock().unwrap().fail_start_forward = true;
    }

    /// Everything submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<TransferKind> {
        self.script.lock().unwrap().submissions.clone()
    }

    /// Number of transfers submitted so far.
    pub fn submission_count(&self) -> usize {
        self.script.lock().unwrap().submissions.len()
    }

    /// Lifecycle events forwarded downstream, in order.
    pub fn forwarded_events(&self) -> Vec<LifecycleEvent> {
        self.script.lock().unwrap().forwarded.clone()
    }

    fn complete_control(
        script: &mut Script,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Completion {
        if script.fail_requests.contains(&request) {
            return Completion::bus_failed(BusError::Io);
        }
        match request {
            VENDOR_READ_REQUEST | VENDOR_WRITE_REQUEST => {
                script.vendor_ops_seen += 1;
                if script.fail_vendor_at == Some(script.vendor_ops_seen) {
                    return Completion::bus_failed(BusError::Io);
                }
                if request == VENDOR_READ_REQUEST {
                    let byte = script.registers.get(&(value, index)).copied().unwrap_or(0);
                    Completion::success(vec![byte])
                } else {
                    Completion::sent(0)
                }
            }
            GET_DESCRIPTOR_REQUEST => {
                let blob = match (value >> 8) as u8 {
                    DEVICE_DESCRIPTOR_TYPE => &script.device_descriptor,
                    CONFIGURATION_DESCRIPTOR_TYPE => &script.config_blob,
                    _ => return Completion::protocol_failed(UsbStatus::Stalled),
                };
                let answer = blob[..blob.len().min(data.len())].to_vec();
                Completion::success(answer)
            }
            SET_CONFIGURATION_REQUEST | SET_LINE_REQUEST | SET_CONTROL_REQUEST => {
                Completion::sent(data.len())
            }
            _ => Completion::protocol_failed(UsbStatus::Stalled),
        }
    }

    fn complete_bulk(script: &mut Script, endpoint: u8, data: &[u8]) -> Completion {
        if let Some(error) = script.bulk_failure.clone() {
            return Completion::bus_failed(error);
        }
        if endpoint & 0x80 != 0
            && let Some(error) = script.bulk_in_failure.clone()
        {
            return Completion::bus_failed(error);
        }
        if script.bulk_stall {
            return Completion::protocol_failed(UsbStatus::Stalled);
        }
        if endpoint & 0x80 != 0 {
            let payload = script.queued_reads.pop_front().unwrap_or_default();
            let answer = payload[..payload.len().min(data.len())].to_vec();
            Completion::success(answer)
        } else {
            Completion::sent(data.len())
        }
    }
}

impl Bus for ScriptedBus {
    fn submit(&self, request: TransferRequest) {
        let completion = {
            let mut script = self.script.lock().unwrap();
            script.submissions.push(request.kind().clone());
            match request.kind() {
                TransferKind::Control {
                    request,
                    value,
                    index,
                    data,
                    ..
                } => Self::complete_control(&mut script, *request, *value, *index, data),
                TransferKind::Bulk { endpoint, data }
                | TransferKind::Interrupt { endpoint, data } => {
                    Self::complete_bulk(&mut script, *endpoint, data)
                }
            }
        };
        request.complete(completion);
    }

    fn forward_event(&self, event: &LifecycleEvent) -> Result<(), BusError> {
        let mut script = self.script.lock().unwrap();
        script.forwarded.push(*event);
        if script.fail_start_forward && *event == LifecycleEvent::Start {
            return Err(BusError::NoDevice);
        }
        Ok(())
    }
}
