//! USB interfaces and their endpoint slots

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Endpoint, TransferType};

/// A logical group of endpoints on one device configuration
///
/// Each slot holds zero or one endpoint. The read and write slots are the
/// effective endpoints used for transfers; the interrupt slots are kept
/// separately so negotiation can fall back to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInterface {
    /// Interface number from the configuration descriptor
    pub index: u8,
    pub read_endpoint: Option<Endpoint>,
    pub write_endpoint: Option<Endpoint>,
    pub read_interrupt_endpoint: Option<Endpoint>,
    pub write_interrupt_endpoint: Option<Endpoint>,
}

impl UsbInterface {
    /// Create an interface with no endpoints
    pub fn new(index: u8) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Build an interface from a raw endpoint list
    ///
    /// The first bulk IN endpoint becomes the read endpoint, the first bulk
    /// OUT the write endpoint, and likewise for the interrupt slots. Control
    /// and isochronous endpoints are ignored.
    pub fn from_endpoints(index: u8, endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let mut iface = Self::new(index);
        for ep in endpoints {
            let slot = match (ep.transfer_type, ep.direction) {
                (TransferType::Bulk, Direction::In) => &mut iface.read_endpoint,
                (TransferType::Bulk, Direction::Out) => &mut iface.write_endpoint,
                (TransferType::Interrupt, Direction::In) => &mut iface.read_interrupt_endpoint,
                (TransferType::Interrupt, Direction::Out) => &mut iface.write_interrupt_endpoint,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(ep);
            }
        }
        iface
    }

    pub fn with_read(mut self, ep: Endpoint) -> Self {
        self.read_endpoint = Some(ep);
        self
    }

    pub fn with_write(mut self, ep: Endpoint) -> Self {
        self.write_endpoint = Some(ep);
        self
    }

    pub fn with_read_interrupt(mut self, ep: Endpoint) -> Self {
        self.read_interrupt_endpoint = Some(ep);
        self
    }

    pub fn with_write_interrupt(mut self, ep: Endpoint) -> Self {
        self.write_interrupt_endpoint = Some(ep);
        self
    }

    /// True if the interface exposes no endpoint in any slot
    pub fn is_empty(&self) -> bool {
        self.read_endpoint.is_none()
            && self.write_endpoint.is_none()
            && self.read_interrupt_endpoint.is_none()
            && self.write_interrupt_endpoint.is_none()
    }
}
