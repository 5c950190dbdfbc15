//! Error types for platforms and device handles

use thiserror::Error;

/// Errors reported by a platform implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Transfer timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Platform error: {0}")]
    Other(String),
}

/// Errors returned by device handle operations
///
/// Every variant carries the device id so a failure can be traced back to the
/// device without a debugger attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device {device_id} has been disposed")]
    Disposed { device_id: String },

    #[error("Device {device_id} is not initialized")]
    NotInitialized { device_id: String },

    #[error("Could not connect to device {device_id}: {source}")]
    Unreachable {
        device_id: String,
        #[source]
        source: PlatformError,
    },

    #[error("Interface discovery failed on device {device_id}: {source}")]
    Discovery {
        device_id: String,
        #[source]
        source: PlatformError,
    },

    #[error("No interface found on device {device_id}")]
    NoInterface { device_id: String },

    #[error("No read interface available on device {device_id}")]
    NoReadInterface { device_id: String },

    #[error("No write interface available on device {device_id}")]
    NoWriteInterface { device_id: String },

    #[error("Report of {len} bytes exceeds {max} byte payload on device {device_id}")]
    ReportTooLarge {
        device_id: String,
        len: usize,
        max: usize,
    },

    #[error("Transfer failed on device {device_id}: {source}")]
    Transfer {
        device_id: String,
        #[source]
        source: PlatformError,
    },
}

impl DeviceError {
    /// Device id the error refers to
    pub fn device_id(&self) -> &str {
        match self {
            Self::Disposed { device_id }
            | Self::NotInitialized { device_id }
            | Self::Unreachable { device_id, .. }
            | Self::Discovery { device_id, .. }
            | Self::NoInterface { device_id }
            | Self::NoReadInterface { device_id }
            | Self::NoWriteInterface { device_id }
            | Self::ReportTooLarge { device_id, .. }
            | Self::Transfer { device_id, .. } => device_id,
        }
    }
}

#[cfg(feature = "hidapi")]
impl From<hidapi::HidError> for PlatformError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            PlatformError::PermissionDenied(msg)
        } else {
            PlatformError::Io(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_accessor() {
        let err = DeviceError::Transfer {
            device_id: "usb-1".into(),
            source: PlatformError::Timeout,
        };
        assert_eq!(err.device_id(), "usb-1");
    }

    #[test]
    fn test_messages_name_device_and_capability() {
        let err = DeviceError::NoWriteInterface {
            device_id: "hid-7".into(),
        };
        assert_eq!(
            err.to_string(),
            "No write interface available on device hid-7"
        );

        let err = DeviceError::Unreachable {
            device_id: "hid-7".into(),
            source: PlatformError::NotFound("hid-7".into()),
        };
        assert!(err.to_string().contains("Device not found: hid-7"));
    }
}
