use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StationError;

/// Bench-wide settings loaded from the station TOML file.
#[derive(Debug, Deserialize)]
pub struct StationConfig {
    pub station: StationSection,
    pub tester: DeviceSection,
    pub dut: DeviceSection,
    pub analyzer: AnalyzerSection,
    pub reference: ReferenceSection,
}

#[derive(Debug, Deserialize)]
pub struct StationSection {
    /// Hardware revision recorded in the report.
    pub revision: String,
    /// Directory receiving checkpoints and the final report.
    pub output_dir: PathBuf,
    /// XML configuration document sent to both devices at INIT.
    pub device_config: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DeviceSection {
    /// Fixed for the tester; the DUT address usually comes from the CLI.
    pub ip: Option<IpAddr>,
    pub ssh_user: String,
    pub ssh_password: String,
    /// Remote command starting the embedded test application.
    pub start_cmd: String,
    /// Remote command killing any previous application instance.
    pub kill_cmd: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerSection {
    /// host:port of the analyzer's SCPI socket.
    pub address: String,
    /// Instrument setup files for the two sweep passes.
    pub tx_setup: String,
    pub rx_setup: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceSection {
    /// Threshold tables the results are compared against.
    pub tx: PathBuf,
    pub rx: PathBuf,
}

pub fn load_config(path: &Path) -> Result<StationConfig, StationError> {
    let text = fs::read_to_string(path)
        .map_err(|e| StationError::Config(format!("cannot read {}: {e}", path.display())))?;

    toml::from_str(&text).map_err(|e| StationError::Config(e.to_string()))
}
