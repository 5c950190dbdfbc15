//! In-memory platform
//!
//! Simulates devices from a fixed interface list. Records every write,
//! serves queued read responses, and counts acquired and released
//! connections so lifecycle guarantees can be checked without hardware.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::PlatformError;
use crate::interface::UsbInterface;
use crate::platform::{Platform, TransferBuffer};
use crate::types::{DeviceIdentity, Endpoint};

/// Connection handed out by `MemoryPlatform`
#[derive(Debug)]
pub struct MemoryConnection {
    pub id: u64,
    pub device_id: String,
}

/// A write observed by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub connection: u64,
    pub interface: u8,
    pub endpoint: Endpoint,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct MemoryState {
    devices: HashMap<String, Vec<UsbInterface>>,
    next_connection: u64,
    acquired: u64,
    released: Vec<u64>,
    released_interfaces: Vec<(u64, u8)>,
    failing_interface_releases: HashSet<u8>,
    discovery_error: Option<PlatformError>,
    transfer_errors: VecDeque<PlatformError>,
    reads: VecDeque<Vec<u8>>,
    writes: Vec<RecordedWrite>,
    gate: Option<Arc<Semaphore>>,
    discovery_gate: Option<Arc<Semaphore>>,
}

/// Platform backed by in-memory device descriptions
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device; unknown ids fail `acquire_connection`
    pub fn add_device(&self, device_id: impl Into<String>, interfaces: Vec<UsbInterface>) {
        self.state.lock().devices.insert(device_id.into(), interfaces);
    }

    /// Queue bytes for the next IN transfer
    pub fn queue_read(&self, data: impl Into<Vec<u8>>) {
        self.state.lock().reads.push_back(data.into());
    }

    /// Fail the next transfer with `err`
    pub fn fail_next_transfer(&self, err: PlatformError) {
        self.state.lock().transfer_errors.push_back(err);
    }

    /// Fail the next interface discovery with `err`
    pub fn fail_discovery(&self, err: PlatformError) {
        self.state.lock().discovery_error = Some(err);
    }

    /// Make releasing the interface with this number fail
    pub fn fail_interface_release(&self, index: u8) {
        self.state.lock().failing_interface_releases.insert(index);
    }

    /// Hold every transfer until a permit is added to the returned semaphore
    pub fn gate_transfers(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().gate = Some(Arc::clone(&gate));
        gate
    }

    /// Hold interface discovery until a permit is added to the returned semaphore
    pub fn gate_discovery(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().discovery_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().writes.clone()
    }

    pub fn acquire_count(&self) -> u64 {
        self.state.lock().acquired
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().released.len()
    }

    /// Connection ids in release order
    pub fn released_connections(&self) -> Vec<u64> {
        self.state.lock().released.clone()
    }

    /// (connection id, interface number) pairs that were released successfully
    pub fn released_interfaces(&self) -> Vec<(u64, u8)> {
        self.state.lock().released_interfaces.clone()
    }

    /// Connections acquired and not yet released
    pub fn open_connections(&self) -> u64 {
        let state = self.state.lock();
        state.acquired - state.released.len() as u64
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    type Connection = MemoryConnection;

    async fn acquire_connection(
        &self,
        identity: &DeviceIdentity,
    ) -> Result<MemoryConnection, PlatformError> {
        let mut state = self.state.lock();
        if !state.devices.contains_key(&identity.device_id) {
            return Err(PlatformError::NotFound(identity.device_id.clone()));
        }
        state.next_connection += 1;
        state.acquired += 1;
        let id = state.next_connection;
        debug!("Opened memory connection {} to {}", id, identity.device_id);
        Ok(MemoryConnection {
            id,
            device_id: identity.device_id.clone(),
        })
    }

    async fn discover_interfaces(
        &self,
        connection: &MemoryConnection,
    ) -> Result<Vec<UsbInterface>, PlatformError> {
        let gate = self.state.lock().discovery_gate.clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| PlatformError::Other("discovery gate closed".into()))?;
            permit.forget();
        }

        let mut state = self.state.lock();
        if let Some(err) = state.discovery_error.take() {
            return Err(err);
        }
        state
            .devices
            .get(&connection.device_id)
            .cloned()
            .ok_or(PlatformError::Disconnected)
    }

    async fn transfer(
        &self,
        connection: &MemoryConnection,
        interface: &UsbInterface,
        endpoint: &Endpoint,
        buffer: TransferBuffer<'_>,
    ) -> Result<usize, PlatformError> {
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| PlatformError::Other("transfer gate closed".into()))?;
            permit.forget();
        }

        let mut state = self.state.lock();
        if state.released.contains(&connection.id) {
            return Err(PlatformError::Disconnected);
        }
        if let Some(err) = state.transfer_errors.pop_front() {
            return Err(err);
        }

        match buffer {
            TransferBuffer::Out(data) => {
                state.writes.push(RecordedWrite {
                    connection: connection.id,
                    interface: interface.index,
                    endpoint: *endpoint,
                    data: data.to_vec(),
                });
                Ok(data.len())
            }
            TransferBuffer::In(buf) => {
                let data = state.reads.pop_front().ok_or(PlatformError::Timeout)?;
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
        }
    }

    fn release_interface(
        &self,
        connection: &MemoryConnection,
        interface: &UsbInterface,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.failing_interface_releases.contains(&interface.index) {
            return Err(PlatformError::Io(format!(
                "interface {} busy",
                interface.index
            )));
        }
        state.released_interfaces.push((connection.id, interface.index));
        Ok(())
    }

    fn release_connection(&self, connection: MemoryConnection) {
        debug!("Released memory connection {}", connection.id);
        self.state.lock().released.push(connection.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> DeviceIdentity {
        DeviceIdentity::new(id, 0x1234, 0x5678)
    }

    #[tokio::test]
    async fn test_unknown_device_not_found() {
        let platform = MemoryPlatform::new();
        let err = platform.acquire_connection(&identity("missing")).await.unwrap_err();
        assert_eq!(err, PlatformError::NotFound("missing".into()));
        assert_eq!(platform.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_short_queued_read() {
        let platform = MemoryPlatform::new();
        let iface = UsbInterface::new(0).with_read(Endpoint::bulk_in(0x81, 8));
        platform.add_device("dev", vec![iface.clone()]);
        platform.queue_read(vec![1, 2, 3]);

        let conn = platform.acquire_connection(&identity("dev")).await.unwrap();
        let mut buf = [0u8; 8];
        let ep = Endpoint::bulk_in(0x81, 8);
        let n = platform
            .transfer(&conn, &iface, &ep, TransferBuffer::In(&mut buf))
            .await
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..4], &[1, 2, 3, 0]);

        let err = platform
            .transfer(&conn, &iface, &ep, TransferBuffer::In(&mut buf))
            .await
            .unwrap_err();
        assert_eq!(err, PlatformError::Timeout);
    }

    #[tokio::test]
    async fn test_release_tracking() {
        let platform = MemoryPlatform::new();
        platform.add_device("dev", vec![UsbInterface::new(0)]);
        let conn = platform.acquire_connection(&identity("dev")).await.unwrap();
        assert_eq!(platform.open_connections(), 1);
        platform.release_connection(conn);
        assert_eq!(platform.open_connections(), 0);
        assert_eq!(platform.released_connections(), vec![1]);
    }
}
