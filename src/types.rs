//! Common types for endpoints and device identity

use serde::{Deserialize, Serialize};

/// Endpoint data direction, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Device to host (read)
    In,
    /// Host to device (write)
    Out,
}

/// USB transfer type of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// A single direction-specific channel on an interface
///
/// Endpoints are immutable once discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint address (bit 7 set for IN endpoints on USB)
    pub address: u8,
    /// Data direction
    pub direction: Direction,
    /// Transfer type
    pub transfer_type: TransferType,
    /// Maximum packet size, used as the transfer buffer size
    pub max_packet_size: u16,
}

impl Endpoint {
    /// Create an endpoint
    pub const fn new(
        address: u8,
        direction: Direction,
        transfer_type: TransferType,
        max_packet_size: u16,
    ) -> Self {
        Self {
            address,
            direction,
            transfer_type,
            max_packet_size,
        }
    }

    /// Bulk IN endpoint
    pub const fn bulk_in(address: u8, max_packet_size: u16) -> Self {
        Self::new(address, Direction::In, TransferType::Bulk, max_packet_size)
    }

    /// Bulk OUT endpoint
    pub const fn bulk_out(address: u8, max_packet_size: u16) -> Self {
        Self::new(address, Direction::Out, TransferType::Bulk, max_packet_size)
    }

    /// Interrupt IN endpoint
    pub const fn interrupt_in(address: u8, max_packet_size: u16) -> Self {
        Self::new(
            address,
            Direction::In,
            TransferType::Interrupt,
            max_packet_size,
        )
    }

    /// Interrupt OUT endpoint
    pub const fn interrupt_out(address: u8, max_packet_size: u16) -> Self {
        Self::new(
            address,
            Direction::Out,
            TransferType::Interrupt,
            max_packet_size,
        )
    }

    /// Transfer buffer size for this endpoint
    pub fn buffer_size(&self) -> usize {
        usize::from(self.max_packet_size)
    }

    pub fn is_read(&self) -> bool {
        self.direction == Direction::In
    }

    pub fn is_write(&self) -> bool {
        self.direction == Direction::Out
    }
}

/// Connection descriptor used to (re)acquire a platform connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Platform device id or path
    pub device_id: String,
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Product name if available
    #[serde(default)]
    pub product_name: Option<String>,
    /// Serial number if available
    #[serde(default)]
    pub serial: Option<String>,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            device_id: device_id.into(),
            vid,
            pid,
            product_name: None,
            serial: None,
        }
    }
}
