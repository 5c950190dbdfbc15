//! Device handle configuration

use serde::{Deserialize, Serialize};

use crate::report::DEFAULT_REPORT_ID;

/// What to do with a report payload larger than the endpoint allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Drop the excess bytes
    #[default]
    Truncate,
    /// Fail with `DeviceError::ReportTooLarge`
    Reject,
}

/// Per-handle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// Report id used by `write_report` when none is given
    pub default_report_id: u8,
    pub oversized_reports: OversizePolicy,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            default_report_id: DEFAULT_REPORT_ID,
            oversized_reports: OversizePolicy::Truncate,
        }
    }
}

impl HandleConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn with_default_report_id(mut self, report_id: u8) -> Self {
        self.default_report_id = report_id;
        self
    }

    pub fn with_oversized_reports(mut self, policy: OversizePolicy) -> Self {
        self.oversized_reports = policy;
        self
    }
}
