//! Platform abstraction
//!
//! One trait, one implementation per platform. The core never talks to the
//! OS directly; it acquires a connection, asks for the interfaces, and hands
//! raw transfers back to the platform.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::interface::UsbInterface;
use crate::types::{DeviceIdentity, Endpoint};

/// Buffer handed to a single platform transfer
#[derive(Debug)]
pub enum TransferBuffer<'a> {
    /// Read into the buffer (IN transfer)
    In(&'a mut [u8]),
    /// Write the buffer out (OUT transfer)
    Out(&'a [u8]),
}

impl TransferBuffer<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::In(buf) => buf.len(),
            Self::Out(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Platform transport consumed by device handles
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Open connection to one device
    type Connection: Send + Sync;

    /// Open a connection for the given identity
    async fn acquire_connection(
        &self,
        identity: &DeviceIdentity,
    ) -> Result<Self::Connection, PlatformError>;

    /// List the interfaces of the active configuration, endpoints populated
    async fn discover_interfaces(
        &self,
        connection: &Self::Connection,
    ) -> Result<Vec<UsbInterface>, PlatformError>;

    /// Run one transfer on an endpoint
    ///
    /// # Returns
    /// Number of bytes transferred
    async fn transfer(
        &self,
        connection: &Self::Connection,
        interface: &UsbInterface,
        endpoint: &Endpoint,
        buffer: TransferBuffer<'_>,
    ) -> Result<usize, PlatformError>;

    /// Release a claimed interface. Default: nothing to release.
    fn release_interface(
        &self,
        _connection: &Self::Connection,
        _interface: &UsbInterface,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    /// Close the connection. Called exactly once per acquired connection.
    fn release_connection(&self, connection: Self::Connection);
}
