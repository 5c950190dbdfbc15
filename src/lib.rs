//! Interface negotiation and device-handle lifecycle for USB and HID devices
//!
//! This crate sits between a platform transport and device libraries:
//!
//! - Platforms implement [`Platform`] (acquire, discover, transfer, release)
//! - [`negotiate`] picks the read and write interfaces, falling back to
//!   interrupt endpoints when a device has no bulk endpoints
//! - [`DeviceHandle`] owns the connection and guards every operation against
//!   use after dispose
//! - [`report`] frames HID reports with a leading report-id byte
//!
//! ```text
//! [MemoryPlatform / HidApiPlatform]   ← implements Platform
//!                |
//!          [DeviceHandle<P>]          ← negotiation, lifecycle, report framing
//!                |
//!          [dyn Device]               ← uniform contract for callers
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod interface;
pub mod memory;
pub mod platform;
pub mod report;
pub mod selector;
pub mod types;

mod handle;

#[cfg(feature = "hidapi")]
pub mod hidapi_platform;

pub use config::{HandleConfig, OversizePolicy};
pub use diagnostics::{DiagnosticSink, Severity, TracingSink};
pub use error::{DeviceError, PlatformError};
pub use handle::{DeviceHandle, Lifecycle};
pub use interface::UsbInterface;
pub use memory::{MemoryConnection, MemoryPlatform, RecordedWrite};
pub use platform::{Platform, TransferBuffer};
pub use report::{Report, DEFAULT_REPORT_ID};
pub use selector::{negotiate, EndpointBinding, InterfaceSelection};
pub use types::{DeviceIdentity, Direction, Endpoint, TransferType};

#[cfg(feature = "hidapi")]
pub use hidapi_platform::{HidApiConfig, HidApiPlatform, HidConnection};

use async_trait::async_trait;
use std::sync::Arc;

/// Uniform device contract, independent of the platform behind it
#[async_trait]
pub trait Device: Send + Sync {
    /// Identity the device was opened with
    fn identity(&self) -> &DeviceIdentity;

    async fn is_initialized(&self) -> bool;

    /// Connect and negotiate interfaces
    async fn initialize(&self) -> Result<(), DeviceError>;

    /// Write raw bytes to the write endpoint
    async fn write(&self, data: &[u8]) -> Result<usize, DeviceError>;

    /// Read one buffer from the read endpoint
    async fn read(&self) -> Result<Vec<u8>, DeviceError>;

    /// Write, then read the response
    async fn write_and_read(&self, data: &[u8]) -> Result<Vec<u8>, DeviceError> {
        self.write(data).await?;
        self.read().await
    }

    /// Write a HID report; `None` uses the default report id
    async fn write_report(&self, data: &[u8], report_id: Option<u8>) -> Result<(), DeviceError>;

    /// Read one HID report
    async fn read_report(&self) -> Result<Report, DeviceError>;

    /// Release the device. Never fails; repeated calls do nothing.
    async fn dispose(&self);
}

/// Type alias for a shared device
pub type BoxedDevice = Arc<dyn Device>;
