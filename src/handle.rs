//! Device handle: connection ownership, negotiated interfaces, lifecycle
//!
//! ```text
//!   Uninitialized ──initialize()──► Connected
//!        │   ▲                          │
//!        │   └── init failure           │
//!        └─────────dispose()────────────┴──► Disposed
//! ```
//!
//! All handle state sits behind one `RwLock`. Transfers hold the read guard
//! for their whole duration, so the disposed check and the use of the
//! connection form one scope; `initialize` and `dispose` take the write guard
//! and wait for in-flight transfers to finish.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::{HandleConfig, OversizePolicy};
use crate::diagnostics::DiagnosticSink;
use crate::error::{DeviceError, PlatformError};
use crate::interface::UsbInterface;
use crate::platform::{Platform, TransferBuffer};
use crate::report::{self, Report};
use crate::selector::{negotiate, EndpointBinding, InterfaceSelection};
use crate::types::DeviceIdentity;
use crate::Device;

/// Lifecycle state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Uninitialized,
    Connected,
    Disposed,
}

struct HandleState<C> {
    lifecycle: Lifecycle,
    connection: Option<C>,
    interfaces: Vec<UsbInterface>,
    selection: InterfaceSelection,
}

impl<C> HandleState<C> {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            connection: None,
            interfaces: Vec::new(),
            selection: InterfaceSelection::default(),
        }
    }
}

/// Owning handle for one device's connection and negotiated interfaces
pub struct DeviceHandle<P: Platform> {
    platform: Arc<P>,
    identity: DeviceIdentity,
    config: HandleConfig,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    state: RwLock<HandleState<P::Connection>>,
}

impl<P: Platform> DeviceHandle<P> {
    /// Create an uninitialized handle
    pub fn new(platform: Arc<P>, identity: DeviceIdentity, config: HandleConfig) -> Self {
        Self {
            platform,
            identity,
            config,
            diagnostics: None,
            state: RwLock::new(HandleState::new()),
        }
    }

    /// Create a handle and initialize it
    pub async fn open(
        platform: Arc<P>,
        identity: DeviceIdentity,
        config: HandleConfig,
    ) -> Result<Self, DeviceError> {
        let handle = Self::new(platform, identity, config);
        handle.initialize().await?;
        Ok(handle)
    }

    /// Attach a sink for negotiation diagnostics
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    /// Acquire the connection, discover interfaces and negotiate roles
    ///
    /// A device with no usable read or write endpoint still initializes;
    /// the missing direction fails when it is used. Calling this on a
    /// connected handle does nothing.
    pub async fn initialize(&self) -> Result<(), DeviceError> {
        let mut state = self.state.write().await;
        match state.lifecycle {
            Lifecycle::Disposed => return Err(self.disposed_error()),
            Lifecycle::Connected => {
                debug!(device_id = %self.identity.device_id, "Already initialized");
                return Ok(());
            }
            Lifecycle::Uninitialized => {}
        }

        // Left behind by an initialize that was cancelled mid-discovery
        if let Some(stale) = state.connection.take() {
            debug!(
                device_id = %self.identity.device_id,
                "Releasing connection from interrupted initialize"
            );
            self.platform.release_connection(stale);
        }

        let connection = self
            .platform
            .acquire_connection(&self.identity)
            .await
            .map_err(|source| DeviceError::Unreachable {
                device_id: self.identity.device_id.clone(),
                source,
            })?;

        // Owned by the state from here on, so dispose or drop releases it
        // even if this future is cancelled during discovery
        let connection = state.connection.insert(connection);
        let discovered = self.platform.discover_interfaces(connection).await;

        let interfaces = match discovered {
            Ok(interfaces) if !interfaces.is_empty() => interfaces,
            Ok(_) => {
                self.release_pending(&mut state);
                return Err(DeviceError::NoInterface {
                    device_id: self.identity.device_id.clone(),
                });
            }
            Err(source) => {
                self.release_pending(&mut state);
                return Err(DeviceError::Discovery {
                    device_id: self.identity.device_id.clone(),
                    source,
                });
            }
        };

        let selection = negotiate(&interfaces, self.diagnostics.as_deref());
        debug!(
            device_id = %self.identity.device_id,
            interfaces = interfaces.len(),
            read = ?selection.read_position(),
            write = ?selection.write_position(),
            interrupt = ?selection.interrupt,
            "Negotiated interfaces"
        );

        state.interfaces = interfaces;
        state.selection = selection;
        state.lifecycle = Lifecycle::Connected;

        info!(
            "Initialized device {} (VID={:04X} PID={:04X})",
            self.identity.device_id, self.identity.vid, self.identity.pid
        );
        Ok(())
    }

    /// Write raw bytes to the write endpoint
    ///
    /// # Returns
    /// Number of bytes the platform reports as written
    pub async fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        let state = self.state.read().await;
        self.write_locked(&state, data).await
    }

    /// Read one buffer from the read endpoint
    ///
    /// The result is truncated to the number of bytes the platform read.
    pub async fn read(&self) -> Result<Vec<u8>, DeviceError> {
        let state = self.state.read().await;
        let (mut buf, len) = self.read_locked(&state).await?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Write then read, with no dispose possible in between
    pub async fn write_and_read(&self, data: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let state = self.state.read().await;
        self.write_locked(&state, data).await?;
        let (mut buf, len) = self.read_locked(&state).await?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Write a HID report
    ///
    /// The report id defaults to the configured default id. The outbound
    /// buffer is the id followed by the payload, sized to the write
    /// endpoint's buffer.
    pub async fn write_report(&self, data: &[u8], report_id: Option<u8>) -> Result<(), DeviceError> {
        let report_id = report_id.unwrap_or(self.config.default_report_id);
        let state = self.state.read().await;
        let binding = self.write_binding(&state)?;

        let size = binding.endpoint.buffer_size();
        let max = report::payload_capacity(size);
        if data.len() > max {
            match self.config.oversized_reports {
                OversizePolicy::Reject => {
                    return Err(DeviceError::ReportTooLarge {
                        device_id: self.identity.device_id.clone(),
                        len: data.len(),
                        max,
                    });
                }
                OversizePolicy::Truncate => {
                    debug!(
                        "Truncating report 0x{:02X} from {} to {} bytes",
                        report_id,
                        data.len(),
                        max
                    );
                }
            }
        }

        let buf = report::encode(report_id, data, size);
        self.write_locked(&state, &buf).await?;
        Ok(())
    }

    /// Read one HID report
    ///
    /// The payload is always the read buffer size minus the id byte; bytes
    /// past a short read are zero.
    pub async fn read_report(&self) -> Result<Report, DeviceError> {
        let state = self.state.read().await;
        let (buf, _) = self.read_locked(&state).await?;
        Ok(Report::decode(&buf, self.config.default_report_id))
    }

    /// Release interfaces and the connection
    ///
    /// Idempotent: the first call does the work, later calls return
    /// immediately. Waits for in-flight transfers to finish.
    pub async fn dispose(&self) {
        let mut state = self.state.write().await;
        if state.lifecycle == Lifecycle::Disposed {
            return;
        }
        state.lifecycle = Lifecycle::Disposed;
        release_state(&*self.platform, &self.identity, &mut state);
        debug!(device_id = %self.identity.device_id, "Disposed");
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.state.read().await.lifecycle
    }

    pub async fn is_initialized(&self) -> bool {
        self.lifecycle().await == Lifecycle::Connected
    }

    pub async fn is_disposed(&self) -> bool {
        self.lifecycle().await == Lifecycle::Disposed
    }

    /// Snapshot of the discovered interfaces, in discovery order
    pub async fn interfaces(&self) -> Vec<UsbInterface> {
        self.state.read().await.interfaces.clone()
    }

    pub async fn selection(&self) -> InterfaceSelection {
        self.state.read().await.selection
    }

    /// Interface serving reads, with its effective read endpoint applied
    pub async fn read_interface(&self) -> Option<UsbInterface> {
        let state = self.state.read().await;
        let binding = state.selection.read?;
        let mut iface = state.interfaces.get(binding.position)?.clone();
        iface.read_endpoint = Some(binding.endpoint);
        Some(iface)
    }

    /// Interface serving writes, with its effective write endpoint applied
    pub async fn write_interface(&self) -> Option<UsbInterface> {
        let state = self.state.read().await;
        let binding = state.selection.write?;
        let mut iface = state.interfaces.get(binding.position)?.clone();
        iface.write_endpoint = Some(binding.endpoint);
        Some(iface)
    }

    pub async fn read_buffer_size(&self) -> Result<usize, DeviceError> {
        let state = self.state.read().await;
        Ok(self.read_binding(&state)?.endpoint.buffer_size())
    }

    pub async fn write_buffer_size(&self) -> Result<usize, DeviceError> {
        let state = self.state.read().await;
        Ok(self.write_binding(&state)?.endpoint.buffer_size())
    }

    fn release_pending(&self, state: &mut HandleState<P::Connection>) {
        if let Some(connection) = state.connection.take() {
            self.platform.release_connection(connection);
        }
    }

    fn disposed_error(&self) -> DeviceError {
        DeviceError::Disposed {
            device_id: self.identity.device_id.clone(),
        }
    }

    fn connection<'s>(
        &self,
        state: &'s HandleState<P::Connection>,
    ) -> Result<&'s P::Connection, DeviceError> {
        match state.lifecycle {
            Lifecycle::Disposed => Err(self.disposed_error()),
            Lifecycle::Uninitialized => Err(DeviceError::NotInitialized {
                device_id: self.identity.device_id.clone(),
            }),
            Lifecycle::Connected => {
                state
                    .connection
                    .as_ref()
                    .ok_or_else(|| DeviceError::NotInitialized {
                        device_id: self.identity.device_id.clone(),
                    })
            }
        }
    }

    fn read_binding(
        &self,
        state: &HandleState<P::Connection>,
    ) -> Result<EndpointBinding, DeviceError> {
        self.connection(state)?;
        state
            .selection
            .read
            .ok_or_else(|| DeviceError::NoReadInterface {
                device_id: self.identity.device_id.clone(),
            })
    }

    fn write_binding(
        &self,
        state: &HandleState<P::Connection>,
    ) -> Result<EndpointBinding, DeviceError> {
        self.connection(state)?;
        state
            .selection
            .write
            .ok_or_else(|| DeviceError::NoWriteInterface {
                device_id: self.identity.device_id.clone(),
            })
    }

    async fn write_locked(
        &self,
        state: &RwLockReadGuard<'_, HandleState<P::Connection>>,
        data: &[u8],
    ) -> Result<usize, DeviceError> {
        let binding = self.write_binding(state)?;
        let connection = self.connection(state)?;
        let iface = &state.interfaces[binding.position];

        debug!(
            "Writing {} bytes to endpoint 0x{:02X} on interface {}",
            data.len(),
            binding.endpoint.address,
            iface.index
        );
        self.platform
            .transfer(connection, iface, &binding.endpoint, TransferBuffer::Out(data))
            .await
            .map_err(|source| self.transfer_error(source))
    }

    async fn read_locked(
        &self,
        state: &RwLockReadGuard<'_, HandleState<P::Connection>>,
    ) -> Result<(Vec<u8>, usize), DeviceError> {
        let binding = self.read_binding(state)?;
        let connection = self.connection(state)?;
        let iface = &state.interfaces[binding.position];

        let mut buf = vec![0u8; binding.endpoint.buffer_size()];
        let len = self
            .platform
            .transfer(
                connection,
                iface,
                &binding.endpoint,
                TransferBuffer::In(&mut buf),
            )
            .await
            .map_err(|source| self.transfer_error(source))?;
        debug!(
            "Read {} bytes from endpoint 0x{:02X} on interface {}",
            len, binding.endpoint.address, iface.index
        );
        let len = len.min(buf.len());
        Ok((buf, len))
    }

    fn transfer_error(&self, source: PlatformError) -> DeviceError {
        DeviceError::Transfer {
            device_id: self.identity.device_id.clone(),
            source,
        }
    }
}

/// Release owned interfaces, then the connection
///
/// A failed interface release is logged and does not stop the others.
fn release_state<P: Platform>(
    platform: &P,
    identity: &DeviceIdentity,
    state: &mut HandleState<P::Connection>,
) {
    let interfaces = std::mem::take(&mut state.interfaces);
    state.selection = InterfaceSelection::default();

    let Some(connection) = state.connection.take() else {
        return;
    };
    for iface in &interfaces {
        if let Err(e) = platform.release_interface(&connection, iface) {
            warn!(
                "Failed to release interface {} on device {}: {}",
                iface.index, identity.device_id, e
            );
        }
    }
    platform.release_connection(connection);
}

impl<P: Platform> Drop for DeviceHandle<P> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.lifecycle != Lifecycle::Disposed {
            state.lifecycle = Lifecycle::Disposed;
            release_state(&*self.platform, &self.identity, state);
            debug!(device_id = %self.identity.device_id, "DeviceHandle dropped without dispose");
        }
    }
}

#[async_trait]
impl<P: Platform> Device for DeviceHandle<P> {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    async fn is_initialized(&self) -> bool {
        DeviceHandle::is_initialized(self).await
    }

    async fn initialize(&self) -> Result<(), DeviceError> {
        DeviceHandle::initialize(self).await
    }

    async fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        DeviceHandle::write(self, data).await
    }

    async fn read(&self) -> Result<Vec<u8>, DeviceError> {
        DeviceHandle::read(self).await
    }

    async fn write_and_read(&self, data: &[u8]) -> Result<Vec<u8>, DeviceError> {
        DeviceHandle::write_and_read(self, data).await
    }

    async fn write_report(&self, data: &[u8], report_id: Option<u8>) -> Result<(), DeviceError> {
        DeviceHandle::write_report(self, data, report_id).await
    }

    async fn read_report(&self) -> Result<Report, DeviceError> {
        DeviceHandle::read_report(self).await
    }

    async fn dispose(&self) {
        DeviceHandle::dispose(self).await
    }
}
