//! USB descriptor parsing
//!
//! Decodes the three descriptor shapes the driver needs during start-up:
//! the device descriptor, the configuration descriptor header, and the
//! interface/endpoint descriptors embedded in the full configuration
//! blob. Parsing is length-checked throughout; a device returning a
//! malformed descriptor yields a [`ProtocolError`], never a panic.

use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// bDescriptorType for a device descriptor
pub const DEVICE_DESCRIPTOR_TYPE: u8 = 0x01;
/// bDescriptorType for a configuration descriptor
pub const CONFIGURATION_DESCRIPTOR_TYPE: u8 = 0x02;
/// bDescriptorType for an interface descriptor
pub const INTERFACE_DESCRIPTOR_TYPE: u8 = 0x04;
/// bDescriptorType for an endpoint descriptor
pub const ENDPOINT_DESCRIPTOR_TYPE: u8 = 0x05;

/// Device descriptor size on the wire
pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
/// Configuration descriptor header size on the wire
pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9;
const INTERFACE_DESCRIPTOR_LEN: usize = 9;
const ENDPOINT_DESCRIPTOR_LEN: usize = 7;

/// Standard USB device descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub bcd_usb: u16,
    pub device_class: u8,
    pub device_sub_class: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Parse a device descriptor from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DEVICE_DESCRIPTOR_LEN {
            return Err(ProtocolError::Truncated {
                what: "device",
                needed: DEVICE_DESCRIPTOR_LEN,
                got: bytes.len(),
            });
        }
        if bytes[1] != DEVICE_DESCRIPTOR_TYPE {
            return Err(ProtocolError::UnexpectedType {
                expected: DEVICE_DESCRIPTOR_TYPE,
                got: bytes[1],
            });
        }
        Ok(Self {
            bcd_usb: LittleEndian::read_u16(&bytes[2..4]),
            device_class: bytes[4],
            device_sub_class: bytes[5],
            device_protocol: bytes[6],
            max_packet_size0: bytes[7],
            vendor_id: LittleEndian::read_u16(&bytes[8..10]),
            product_id: LittleEndian::read_u16(&bytes[10..12]),
            bcd_device: LittleEndian::read_u16(&bytes[12..14]),
            num_configurations: bytes[17],
        })
    }
}

/// Configuration descriptor header (without the embedded interface and
/// endpoint descriptors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub attributes: u8,
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    /// Parse the 9-byte configuration descriptor header.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONFIGURATION_DESCRIPTOR_LEN {
            return Err(ProtocolError::Truncated {
                what: "configuration",
                needed: CONFIGURATION_DESCRIPTOR_LEN,
                got: bytes.len(),
            });
        }
        if bytes[1] != CONFIGURATION_DESCRIPTOR_TYPE {
            return Err(ProtocolError::UnexpectedType {
                expected: CONFIGURATION_DESCRIPTOR_TYPE,
                got: bytes[1],
            });
        }
        Ok(Self {
            total_length: LittleEndian::read_u16(&bytes[2..4]),
            num_interfaces: bytes[4],
            configuration_value: bytes[5],
            attributes: bytes[7],
            max_power: bytes[8],
        })
    }
}

/// Interface descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_sub_class: u8,
    pub interface_protocol: u8,
}

impl InterfaceDescriptor {
    /// Parse an interface descriptor.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INTERFACE_DESCRIPTOR_LEN {
            return Err(ProtocolError::Truncated {
                what: "interface",
                needed: INTERFACE_DESCRIPTOR_LEN,
                got: bytes.len(),
            });
        }
        if bytes[1] != INTERFACE_DESCRIPTOR_TYPE {
            return Err(ProtocolError::UnexpectedType {
                expected: INTERFACE_DESCRIPTOR_TYPE,
                got: bytes[1],
            });
        }
        Ok(Self {
            interface_number: bytes[2],
            alternate_setting: bytes[3],
            num_endpoints: bytes[4],
            interface_class: bytes[5],
            interface_sub_class: bytes[6],
            interface_protocol: bytes[7],
        })
    }
}

/// Endpoint direction, taken from bit 7 of the endpoint address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointDirection {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// Endpoint transfer type, taken from the low two bits of bmAttributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint address including the direction bit
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Parse an endpoint descriptor.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENDPOINT_DESCRIPTOR_LEN {
            return Err(ProtocolError::Truncated {
                what: "endpoint",
                needed: ENDPOINT_DESCRIPTOR_LEN,
                got: bytes.len(),
            });
        }
        if bytes[1] != ENDPOINT_DESCRIPTOR_TYPE {
            return Err(ProtocolError::UnexpectedType {
                expected: ENDPOINT_DESCRIPTOR_TYPE,
                got: bytes[1],
            });
        }
        Ok(Self {
            address: bytes[2],
            attributes: bytes[3],
            max_packet_size: LittleEndian::read_u16(&bytes[4..6]),
            interval: bytes[6],
        })
    }

    /// Transfer direction of this endpoint.
    pub fn direction(&self) -> EndpointDirection {
        if self.address & 0x80 != 0 {
            EndpointDirection::In
        } else {
            EndpointDirection::Out
        }
    }

    /// Transfer type of this endpoint.
    pub fn endpoint_type(&self) -> EndpointType {
        match self.attributes & 0x03 {
            0 => EndpointType::Control,
            1 => EndpointType::Isochronous,
            2 => EndpointType::Bulk,
            _ => EndpointType::Interrupt,
        }
    }
}

/// Iterator over the sub-descriptors of a full configuration blob.
///
/// Yields `(descriptor_type, bytes)` pairs, where `bytes` spans the
/// whole sub-descriptor including its two-byte header. Malformed length
/// fields terminate the walk with an error.
pub struct DescriptorWalker<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> DescriptorWalker<'a> {
    /// Walk the sub-descriptors of `bytes`, which must start with the
    /// configuration descriptor header itself.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl<'a> Iterator for DescriptorWalker<'a> {
    type Item = Result<(u8, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let rest = &self.bytes[self.offset..];
        if rest.len() < 2 {
            let err = ProtocolError::InvalidLength {
                length: rest.len() as u8,
                offset: self.offset,
            };
            self.offset = self.bytes.len();
            return Some(Err(err));
        }
        let length = rest[0] as usize;
        if length < 2 || length > rest.len() {
            let err = ProtocolError::InvalidLength {
                length: rest[0],
                offset: self.offset,
            };
            self.offset = self.bytes.len();
            return Some(Err(err));
        }
        let descriptor_type = rest[1];
        self.offset += length;
        Some(Ok((descriptor_type, &rest[..length])))
    }
}
