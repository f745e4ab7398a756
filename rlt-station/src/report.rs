use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StationError;

pub const TX_ROWS: usize = 8;
pub const RX_ROWS: usize = 32;

pub const TX_COLUMNS: [&str; 3] = ["8.3GHz [dBm]", "8.58GHz [dBm]", "8.9GHz [dBm]"];
pub const RX_COLUMNS: [&str; 2] = ["SNR [dB]", "Cross Antenna loss [dB]"];

/// One measurement table, sectors down, metrics across.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ResultTable {
    pub fn tx() -> Self {
        Self::zeroed(TX_ROWS, &TX_COLUMNS)
    }

    pub fn rx() -> Self {
        Self::zeroed(RX_ROWS, &RX_COLUMNS)
    }

    fn zeroed(rows: usize, columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: vec![vec![0.0; columns.len()]; rows],
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.rows[row][col] = value;
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Counts cells that do not strictly exceed the reference. A NaN result
    /// cell never exceeds anything, so it counts as failing.
    pub fn failing_cells(&self, reference: &ResultTable) -> Result<usize, StationError> {
        if self.rows.len() != reference.rows.len()
            || self.columns.len() != reference.columns.len()
        {
            return Err(StationError::Config(format!(
                "reference table is {}x{}, results are {}x{}",
                reference.rows.len(),
                reference.columns.len(),
                self.rows.len(),
                self.columns.len()
            )));
        }

        Ok(self
            .rows
            .iter()
            .zip(reference.rows.iter())
            .flat_map(|(row, ref_row)| row.iter().zip(ref_row.iter()))
            .filter(|(value, threshold)| !(*value > *threshold))
            .count())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), StationError> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["sector".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (sector, row) in self.rows.iter().enumerate() {
            let mut record = vec![sector.to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Loads a table previously written by `write_csv`, or a hand-maintained
    /// reference file of the same shape.
    pub fn read_csv(path: &Path, expected_rows: usize) -> Result<Self, StationError> {
        let mut reader = csv::Reader::from_path(path)?;

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|c| c.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Result<Vec<f64>, _> = record.iter().skip(1).map(str::parse).collect();
            rows.push(row.map_err(|e| {
                StationError::Config(format!("{}: bad table value: {e}", path.display()))
            })?);
        }

        if rows.len() != expected_rows || rows.iter().any(|r| r.len() != columns.len()) {
            return Err(StationError::Config(format!(
                "{}: expected {expected_rows} rows of {} values",
                path.display(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }
}

/// Identity block for the final report.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub revision: String,
    pub serial: String,
    pub eth_mac: String,
    pub wlan_mac: String,
}

#[derive(Debug)]
pub struct TestReport {
    pub info: DeviceInfo,
    pub tx: ResultTable,
    pub rx: ResultTable,
    pub pass: bool,
}

/// Persists per-sector checkpoints and the final report under one directory.
pub struct ReportWriter {
    dir: PathBuf,
    serial: String,
}

impl ReportWriter {
    pub fn new(dir: &Path, serial: &str) -> Result<Self, StationError> {
        fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            serial: serial.to_string(),
        })
    }

    /// Writes the partial tables so a crash mid-sweep keeps earlier sectors.
    pub fn checkpoint(&self, tx: &ResultTable, rx: &ResultTable) -> Result<(), StationError> {
        tx.write_csv(&self.dir.join(format!("{}_tx.csv", self.serial)))?;
        rx.write_csv(&self.dir.join(format!("{}_rx.csv", self.serial)))?;
        Ok(())
    }

    /// Writes the verdict-prefixed final artifacts and returns the info path.
    pub fn finalize(&self, report: &TestReport) -> Result<PathBuf, StationError> {
        let prefix = if report.pass { "Pass" } else { "Failed" };

        let info_path = self
            .dir
            .join(format!("{prefix}_{}_info.csv", self.serial));
        let mut writer = csv::Writer::from_path(&info_path)?;
        writer.write_record(["Revision", "Serial Number", "eth MAC", "wlan MAC"])?;
        writer.write_record([
            &report.info.revision,
            &report.info.serial,
            &report.info.eth_mac,
            &report.info.wlan_mac,
        ])?;
        writer.flush()?;

        report
            .tx
            .write_csv(&self.dir.join(format!("{prefix}_{}_tx.csv", self.serial)))?;
        report
            .rx
            .write_csv(&self.dir.join(format!("{prefix}_{}_rx.csv", self.serial)))?;

        Ok(info_path)
    }
}
