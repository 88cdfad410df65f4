//! Wrapper around `xcrun simctl` for finding a simulator and launching the
//! application under test.
//!
//! Every exerciser run starts from a fresh application instance:
//! [`Simctl::launch`] passes `--terminate-running-process` so any instance
//! left over from a previous run is killed first.
//!
//! ```no_run
//! use tessera_core::simctl::Simctl;
//!
//! let udid = Simctl::get_booted_udid().unwrap();
//! let pid = Simctl::launch(&udid, "com.example.Example").unwrap();
//! println!("launched pid {pid}");
//! ```

use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SimctlError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("No booted simulator found")]
    NoBootedSimulator,

    /// `simctl launch` succeeded but printed something other than
    /// `<bundle-id>: <pid>`.
    #[error("Unexpected launch output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A simulator as reported by `xcrun simctl list devices -j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorDevice {
    pub udid: String,

    /// Human-readable name (e.g. "iPhone 15 Pro").
    pub name: String,

    /// "Booted", "Shutdown", ...
    pub state: String,

    #[serde(rename = "deviceTypeIdentifier")]
    pub device_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: std::collections::HashMap<String, Vec<SimulatorDevice>>,
}

pub struct Simctl;

impl Simctl {
    /// Lists all simulators across all installed runtimes.
    pub fn list_devices() -> Result<Vec<SimulatorDevice>, SimctlError> {
        let stdout = Self::run(&["list", "devices", "-j"])?;
        Self::parse_device_list(&stdout)
    }

    /// Returns the UDID of the first booted simulator.
    pub fn get_booted_udid() -> Result<String, SimctlError> {
        let devices = Self::list_devices()?;
        Self::find_booted_device(&devices)
            .map(|d| d.udid.clone())
            .ok_or(SimctlError::NoBootedSimulator)
    }

    /// Launches `bundle_id` on the simulator, terminating any running
    /// instance first, and returns the new process id.
    pub fn launch(udid: &str, bundle_id: &str) -> Result<u32, SimctlError> {
        info!(udid, bundle_id, "launching fresh application instance");
        let stdout = Self::run(&Self::launch_args(udid, bundle_id))?;
        let pid = Self::parse_launch_pid(&String::from_utf8_lossy(&stdout), bundle_id)?;
        debug!(pid, "application launched");
        Ok(pid)
    }

    /// Arguments passed to `xcrun simctl` for a fresh launch.
    pub fn launch_args<'a>(udid: &'a str, bundle_id: &'a str) -> [&'a str; 4] {
        ["launch", "--terminate-running-process", udid, bundle_id]
    }

    /// Parses `simctl launch` output of the form `<bundle-id>: <pid>`.
    pub fn parse_launch_pid(output: &str, bundle_id: &str) -> Result<u32, SimctlError> {
        output
            .lines()
            .filter_map(|line| line.trim().strip_prefix(bundle_id))
            .filter_map(|rest| rest.trim_start().strip_prefix(':'))
            .find_map(|pid| pid.trim().parse().ok())
            .ok_or_else(|| SimctlError::UnexpectedOutput(output.trim().to_string()))
    }

    /// Flattens the per-runtime device map from `simctl list devices -j`.
    pub fn parse_device_list(json: &[u8]) -> Result<Vec<SimulatorDevice>, SimctlError> {
        let device_list: DeviceList = serde_json::from_slice(json)?;
        Ok(device_list.devices.into_values().flatten().collect())
    }

    pub fn find_booted_device(devices: &[SimulatorDevice]) -> Option<&SimulatorDevice> {
        devices.iter().find(|d| d.state == "Booted")
    }

    fn run(args: &[&str]) -> Result<Vec<u8>, SimctlError> {
        let output = Command::new("xcrun").arg("simctl").args(args).output()?;
        if !output.status.success() {
            return Err(SimctlError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(output.stdout)
    }
}
