//! hidapi-backed platform
//!
//! hidapi hides endpoint descriptors, so each opened HID device is exposed as
//! a single interface with one interrupt IN and one interrupt OUT endpoint.
//! Negotiation then binds both directions through the interrupt fallback.

use std::ffi::CString;

use async_trait::async_trait;
use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlatformError;
use crate::interface::UsbInterface;
use crate::platform::{Platform, TransferBuffer};
use crate::types::{DeviceIdentity, Endpoint};

/// Nominal endpoint addresses reported for hidapi devices
const INTERRUPT_IN_ADDRESS: u8 = 0x81;
const INTERRUPT_OUT_ADDRESS: u8 = 0x01;

/// Settings for `HidApiPlatform`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidApiConfig {
    /// Report buffer size including the report id byte
    pub report_size: u16,
    /// Read timeout in milliseconds (None blocks)
    pub read_timeout_ms: Option<u32>,
}

impl Default for HidApiConfig {
    fn default() -> Self {
        Self {
            report_size: 65,
            read_timeout_ms: Some(1000),
        }
    }
}

/// Open hidapi device
pub struct HidConnection {
    device: Mutex<HidDevice>,
    path: String,
}

impl HidConnection {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Platform using hidapi for HID devices
#[derive(Debug, Clone, Default)]
pub struct HidApiPlatform {
    config: HidApiConfig,
}

impl HidApiPlatform {
    pub fn new(config: HidApiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Platform for HidApiPlatform {
    type Connection = HidConnection;

    async fn acquire_connection(
        &self,
        identity: &DeviceIdentity,
    ) -> Result<HidConnection, PlatformError> {
        // Opening by path or vid/pid does not need the device list
        let api = HidApi::new_without_enumerate()?;
        let device = if identity.device_id.is_empty() {
            api.open(identity.vid, identity.pid)?
        } else {
            let path = CString::new(identity.device_id.as_str())
                .map_err(|e| PlatformError::Other(format!("invalid device path: {e}")))?;
            api.open_path(&path)?
        };
        debug!(
            "Opened HID device VID={:04X} PID={:04X} path={}",
            identity.vid, identity.pid, identity.device_id
        );
        Ok(HidConnection {
            device: Mutex::new(device),
            path: identity.device_id.clone(),
        })
    }

    async fn discover_interfaces(
        &self,
        connection: &HidConnection,
    ) -> Result<Vec<UsbInterface>, PlatformError> {
        let info = connection.device.lock().get_device_info()?;
        let index = u8::try_from(info.interface_number()).unwrap_or(0);
        let size = self.config.report_size;
        Ok(vec![UsbInterface::new(index)
            .with_read_interrupt(Endpoint::interrupt_in(INTERRUPT_IN_ADDRESS, size))
            .with_write_interrupt(Endpoint::interrupt_out(INTERRUPT_OUT_ADDRESS, size))])
    }

    async fn transfer(
        &self,
        connection: &HidConnection,
        _interface: &UsbInterface,
        _endpoint: &Endpoint,
        buffer: TransferBuffer<'_>,
    ) -> Result<usize, PlatformError> {
        let device = connection.device.lock();
        match buffer {
            TransferBuffer::Out(data) => Ok(device.write(data)?),
            TransferBuffer::In(buf) => {
                let timeout = self
                    .config
                    .read_timeout_ms
                    .map_or(-1, |ms| i32::try_from(ms).unwrap_or(i32::MAX));
                match device.read_timeout(buf, timeout)? {
                    0 if timeout >= 0 => Err(PlatformError::Timeout),
                    n => Ok(n),
                }
            }
        }
    }

    fn release_connection(&self, connection: HidConnection) {
        debug!("Closing HID device {}", connection.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_missing_path_fails() {
        let platform = HidApiPlatform::default();
        let identity = DeviceIdentity::new("/nonexistent/hidraw99", 0x0000, 0x0000);
        assert!(platform.acquire_connection(&identity).await.is_err());
    }

    /// Set USBHID_TEST_DEVICE to a hidraw path to run
    #[tokio::test]
    #[ignore] // requires hardware
    async fn test_open_real_device_uses_interrupt_fallback() {
        let path = std::env::var("USBHID_TEST_DEVICE").expect("USBHID_TEST_DEVICE not set");
        let platform = HidApiPlatform::default();
        let connection = platform
            .acquire_connection(&DeviceIdentity::new(path, 0, 0))
            .await
            .expect("open failed");

        let interfaces = platform.discover_interfaces(&connection).await.unwrap();
        assert_eq!(interfaces.len(), 1);
        let selection = crate::selector::negotiate(&interfaces, None);
        assert!(selection.read.unwrap().via_interrupt);
        assert!(selection.write.unwrap().via_interrupt);
        platform.release_connection(connection);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: HidApiConfig = serde_json::from_str(r#"{"report_size": 33}"#).unwrap();
        assert_eq!(config.report_size, 33);
        assert_eq!(config.read_timeout_ms, Some(1000));
    }
}
