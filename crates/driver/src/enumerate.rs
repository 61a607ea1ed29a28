//! Configuration negotiation
//!
//! Walks the device's descriptors, insists on the single-interface
//! shape the CH341 presents, locates its three endpoints and selects
//! the configuration. Runs once, at device start.

use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::vendor;
use protocol::descriptor::{
    ConfigurationDescriptor, DescriptorWalker, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor, CONFIGURATION_DESCRIPTOR_LEN, CONFIGURATION_DESCRIPTOR_TYPE,
    DEVICE_DESCRIPTOR_LEN, DEVICE_DESCRIPTOR_TYPE, ENDPOINT_DESCRIPTOR_TYPE,
    INTERFACE_DESCRIPTOR_TYPE,
};
use protocol::{EndpointDirection, EndpointType};
use tracing::{debug, info};

/// The three pipes a configured CH341 exposes.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints {
    pub bulk_in: EndpointDescriptor,
    pub bulk_out: EndpointDescriptor,
    pub interrupt_in: EndpointDescriptor,
}

/// Negotiate the device's configuration and find its endpoints.
///
/// Fetches the device descriptor, probes the configuration header for
/// its total length, fetches the full configuration blob, checks it
/// exposes exactly one interface whose endpoints cover bulk IN, bulk
/// OUT and interrupt IN, then selects the configuration. Any deviation
/// from that shape fails with [`Error::ConfigurationMismatch`] and
/// leaves the device deconfigured.
pub fn negotiate_configuration(bus: &dyn Bus) -> Result<Endpoints> {
    let data = vendor::get_descriptor(bus, DEVICE_DESCRIPTOR_TYPE, DEVICE_DESCRIPTOR_LEN)?;
    let device = DeviceDescriptor::parse(&data)?;
    debug!(
        vendor_id = format_args!("{:#06x}", device.vendor_id),
        product_id = format_args!("{:#06x}", device.product_id),
        configurations = device.num_configurations,
        "device descriptor"
    );

    // Header first, so we know how much the full blob holds.
    let data = vendor::get_descriptor(bus, CONFIGURATION_DESCRIPTOR_TYPE, CONFIGURATION_DESCRIPTOR_LEN)?;
    let header = ConfigurationDescriptor::parse(&data)?;
    let data = vendor::get_descriptor(
        bus,
        CONFIGURATION_DESCRIPTOR_TYPE,
        usize::from(header.total_length),
    )?;
    let config = ConfigurationDescriptor::parse(&data)?;

    if config.num_interfaces != 1 {
        return Err(Error::ConfigurationMismatch {
            reason: format!("expected 1 interface, found {}", config.num_interfaces),
        });
    }

    let endpoints = find_endpoints(&data)?;
    vendor::set_configuration(bus, config.configuration_value)?;
    info!(
        bulk_in = format_args!("{:#04x}", endpoints.bulk_in.address),
        bulk_out = format_args!("{:#04x}", endpoints.bulk_out.address),
        interrupt_in = format_args!("{:#04x}", endpoints.interrupt_in.address),
        "configuration selected"
    );
    Ok(endpoints)
}

/// Scan a full configuration blob for the three required endpoints.
fn find_endpoints(config_blob: &[u8]) -> Result<Endpoints> {
    let mut interfaces = 0usize;
    let mut bulk_in = None;
    let mut bulk_out = None;
    let mut interrupt_in = None;

    for item in DescriptorWalker::new(config_blob) {
        let (descriptor_type, raw) = item?;
        if descriptor_type == INTERFACE_DESCRIPTOR_TYPE {
            let interface = InterfaceDescriptor::parse(raw)?;
            debug!(
                number = interface.interface_number,
                endpoints = interface.num_endpoints,
                class = format_args!("{:#04x}", interface.interface_class),
                "interface descriptor"
            );
            interfaces += 1;
            continue;
        }
        if descriptor_type != ENDPOINT_DESCRIPTOR_TYPE {
            continue;
        }
        let endpoint = EndpointDescriptor::parse(raw)?;
        match (endpoint.endpoint_type(), endpoint.direction()) {
            (EndpointType::Bulk, EndpointDirection::In) => {
                bulk_in.get_or_insert(endpoint);
            }
            (EndpointType::Bulk, EndpointDirection::Out) => {
                bulk_out.get_or_insert(endpoint);
            }
            (EndpointType::Interrupt, EndpointDirection::In) => {
                interrupt_in.get_or_insert(endpoint);
            }
            _ => {}
        }
    }

    if interfaces != 1 {
        return Err(Error::ConfigurationMismatch {
            reason: format!("expected 1 interface descriptor, found {interfaces}"),
        });
    }

    match (bulk_in, bulk_out, interrupt_in) {
        (Some(bulk_in), Some(bulk_out), Some(interrupt_in)) => Ok(Endpoints {
            bulk_in,
            bulk_out,
            interrupt_in,
        }),
        (bulk_in, bulk_out, interrupt_in) => {
            let mut missing = Vec::new();
            if bulk_in.is_none() {
                missing.push("bulk IN");
            }
            if bulk_out.is_none() {
                missing.push("bulk OUT");
            }
            if interrupt_in.is_none() {
                missing.push("interrupt IN");
            }
            Err(Error::ConfigurationMismatch {
                reason: format!("missing endpoints: {}", missing.join(", ")),
            })
        }
    }
}
