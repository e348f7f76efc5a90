//! Build and session payloads returned by App Automate.
//!
//! The service is loose about which fields it includes, so every struct
//! decodes missing fields as their zero value instead of failing. Open
//! payloads (custom ids, per-test details, environment variables) are kept
//! as [`serde_json::Value`] because their shape varies per framework.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only build status the client reacts to.
pub const TERMINAL_STATUS: &str = "done";

/// One remote test execution spanning possibly many devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    pub build_id: String,
    pub framework: String,
    /// Free-form status. Only [`TERMINAL_STATUS`] is significant.
    pub status: String,
    pub input_capabilities: InputCapabilities,
    pub start_time: String,
    pub app_details: AppDetails,
    pub test_suite_details: TestSuiteDetails,
    pub duration: String,
    /// Device identifier to per-device run state. Iteration order is
    /// unspecified; use [`Build::device_entries`] for a stable list.
    pub devices: HashMap<String, Device>,
}

impl Build {
    /// Returns `true` once the build reached the terminal status.
    ///
    /// The comparison is exact: `"Done"` or `"failed"` are still running
    /// as far as the client is concerned.
    pub fn is_done(&self) -> bool {
        self.status == TERMINAL_STATUS
    }

    /// Flattens the device mapping into a list sorted by device identifier.
    pub fn device_entries(&self) -> Vec<DeviceEntry> {
        let mut entries: Vec<DeviceEntry> = self
            .devices
            .iter()
            .map(|(name, device)| DeviceEntry {
                name: name.clone(),
                device: device.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// The execute request as echoed back by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCapabilities {
    pub devices: Vec<String>,
    #[serde(rename = "deviceLogs")]
    pub device_logs: bool,
    pub app: String,
    #[serde(rename = "testSuite")]
    pub test_suite: String,
    #[serde(rename = "setEnvVariables")]
    pub set_env_variables: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDetails {
    pub url: String,
    pub bundle_id: String,
    pub version: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSuiteDetails {
    pub url: String,
    pub bundle_id: String,
    pub name: String,
}

/// A device's share of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub session_id: String,
    pub status: String,
    /// Opaque link to the session details page.
    pub session_details: String,
    pub test_status: TestStatus,
}

/// A [`Device`] together with the identifier it was keyed by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEntry {
    pub name: String,
    #[serde(flatten)]
    pub device: Device,
}

/// Aggregate test counters. Counters need not add up to anything in
/// particular; missing counters are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestStatus {
    #[serde(rename = "SUCCESS")]
    pub success: u64,
    #[serde(rename = "FAILED")]
    pub failed: u64,
    #[serde(rename = "IGNORED")]
    pub ignored: u64,
    #[serde(rename = "TIMEDOUT")]
    pub timed_out: u64,
    #[serde(rename = "QUEUED")]
    pub queued: u64,
}

impl TestStatus {
    pub fn total(&self) -> u64 {
        self.success
            .saturating_add(self.failed)
            .saturating_add(self.ignored)
            .saturating_add(self.timed_out)
            .saturating_add(self.queued)
    }

    /// Returns `true` if any test failed or timed out.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.timed_out > 0
    }
}

/// Session counters carry the same five fields as the build counters.
pub type SessionTestStatus = TestStatus;

/// One device's test run, fetched after the owning build is done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub build_id: String,
    pub session_id: String,
    pub device: String,
    pub start_time: String,
    pub duration: f64,
    pub app_details: SessionAppDetails,
    pub test_suite_details: SessionTestSuiteDetails,
    pub test_count: u64,
    /// Test name to framework specific detail.
    pub test_details: HashMap<String, Value>,
    pub test_status: SessionTestStatus,
}

impl Session {
    /// Test details sorted by test name.
    pub fn sorted_test_details(&self) -> Vec<(&str, &Value)> {
        let mut details: Vec<(&str, &Value)> = self
            .test_details
            .iter()
            .map(|(name, detail)| (name.as_str(), detail))
            .collect();
        details.sort_by(|a, b| a.0.cmp(b.0));
        details
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionAppDetails {
    pub url: String,
    pub bundle_id: String,
    /// Caller supplied identifier; string, number or null.
    pub custom_id: Value,
    pub version: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTestSuiteDetails {
    pub url: String,
    pub bundle_id: String,
    pub custom_id: Value,
    pub name: String,
}
