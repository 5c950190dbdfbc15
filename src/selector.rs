//! Read/write interface negotiation
//!
//! Picks which discovered interface serves reads and which serves writes.
//! Many HID-class devices expose only interrupt endpoints, so when no bulk
//! endpoint is found for a direction the interrupt interface is used instead.
//!
//! ```text
//! discovered interfaces ──► forward pass (first match wins)
//!                                │
//!                                ▼
//!                    interrupt fallback (read, then write)
//!                                │
//!                                ▼
//!                       InterfaceSelection
//! ```

use crate::diagnostics::{emit_warning, DiagnosticSink};
use crate::interface::UsbInterface;
use crate::types::Endpoint;

const SOURCE: &str = "InterfaceSelector";

/// An interface bound to a role, with the endpoint used for that role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointBinding {
    /// Position of the interface in discovery order
    pub position: usize,
    /// Effective endpoint for transfers in this role
    pub endpoint: Endpoint,
    /// Whether the binding came from the interrupt fallback
    pub via_interrupt: bool,
}

/// Outcome of negotiation
///
/// A missing read or write binding is a valid result; it only becomes an
/// error when the corresponding operation is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceSelection {
    pub read: Option<EndpointBinding>,
    pub write: Option<EndpointBinding>,
    /// Position of the first interface exposing a write-interrupt endpoint
    pub interrupt: Option<usize>,
}

impl InterfaceSelection {
    pub fn read_position(&self) -> Option<usize> {
        self.read.map(|b| b.position)
    }

    pub fn write_position(&self) -> Option<usize> {
        self.write.map(|b| b.position)
    }
}

/// Negotiate read, write and interrupt interfaces
///
/// Single forward pass in discovery order, first match wins for each role
/// independently. Afterwards, a missing read or write role is filled from the
/// interrupt interface if it has the matching interrupt endpoint, with one
/// warning per fallback.
pub fn negotiate(
    interfaces: &[UsbInterface],
    diagnostics: Option<&dyn DiagnosticSink>,
) -> InterfaceSelection {
    let mut selection = InterfaceSelection::default();

    for (position, iface) in interfaces.iter().enumerate() {
        if selection.read.is_none() {
            if let Some(endpoint) = iface.read_endpoint {
                selection.read = Some(EndpointBinding {
                    position,
                    endpoint,
                    via_interrupt: false,
                });
            }
        }

        if selection.write.is_none() {
            if let Some(endpoint) = iface.write_endpoint {
                selection.write = Some(EndpointBinding {
                    position,
                    endpoint,
                    via_interrupt: false,
                });
            }
        }

        if selection.interrupt.is_none() && iface.write_interrupt_endpoint.is_some() {
            selection.interrupt = Some(position);
        }
    }

    let Some(position) = selection.interrupt else {
        return selection;
    };
    let interrupt = &interfaces[position];

    if selection.read.is_none() {
        if let Some(endpoint) = interrupt.read_interrupt_endpoint {
            emit_warning(
                diagnostics,
                &format!(
                    "No read endpoint found; using read interrupt endpoint 0x{:02X} on interface {}",
                    endpoint.address, interrupt.index
                ),
                SOURCE,
            );
            selection.read = Some(EndpointBinding {
                position,
                endpoint,
                via_interrupt: true,
            });
        }
    }

    if selection.write.is_none() {
        if let Some(endpoint) = interrupt.write_interrupt_endpoint {
            emit_warning(
                diagnostics,
                &format!(
                    "No write endpoint found; using write interrupt endpoint 0x{:02X} on interface {}",
                    endpoint.address, interrupt.index
                ),
                SOURCE,
            );
            selection.write = Some(EndpointBinding {
                position,
                endpoint,
                via_interrupt: true,
            });
        }
    }

    selection
}
