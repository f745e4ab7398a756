use std::time::Duration;

use rlt_device::role::{RX_SECTORS, TX_SECTORS};
use rlt_device::{DeviceSession, TestType, Transport};
use rlt_dsp::{measure_power_at_frequencies, SnrEngine, TX_TARGETS_GHZ};

use crate::analyzer::{Analyzer, SetupKind};
use crate::error::StationError;
use crate::report::{ReportWriter, ResultTable};

/// Antenna settle time after flipping the tester.
pub const SETTLE_TIME: Duration = Duration::from_millis(100);

/// DUT switch repetitions per Tx sector, enough sustained transmission for
/// the analyzer to accumulate a valid trace.
pub const TX_PULSES: usize = 50;

/// Captures averaged per Rx sub-test.
pub const RX_CAPTURES: usize = 10;

const TX_GAIN: i32 = 3;
const RX_GAIN: i32 = 0;

#[derive(Debug)]
pub struct SweepOutcome {
    pub tx: ResultTable,
    pub rx: ResultTable,
}

/// Drives the tester, the DUT and the analyzer through the full two-pass
/// sector sweep.
///
/// Calls into each session are strictly sequential; the sessions' capture
/// read loops are not reentrant.
pub struct SweepOrchestrator<'a, T: Transport, A: Analyzer> {
    tester: &'a mut DeviceSession<T>,
    dut: &'a mut DeviceSession<T>,
    analyzer: &'a mut A,
    writer: &'a ReportWriter,
}

impl<'a, T: Transport, A: Analyzer> SweepOrchestrator<'a, T, A> {
    pub fn new(
        tester: &'a mut DeviceSession<T>,
        dut: &'a mut DeviceSession<T>,
        analyzer: &'a mut A,
        writer: &'a ReportWriter,
    ) -> Self {
        Self {
            tester,
            dut,
            analyzer,
            writer,
        }
    }

    /// Runs the Tx pass at full gain, then the Rx pass at zero gain.
    pub async fn run(&mut self) -> Result<SweepOutcome, StationError> {
        let mut tx = ResultTable::tx();
        let mut rx = ResultTable::rx();

        self.analyzer.load_setup(SetupKind::Tx).await?;
        self.dut.change_transmit_gain(TX_GAIN).await?;
        self.tx_sweep(&mut tx).await?;

        self.dut.clear_buffer().await?;
        self.analyzer.load_setup(SetupKind::Rx).await?;
        self.dut.change_transmit_gain(RX_GAIN).await?;
        self.rx_sweep(&tx, &mut rx).await?;

        Ok(SweepOutcome { tx, rx })
    }

    async fn tx_sweep(&mut self, table: &mut ResultTable) -> Result<(), StationError> {
        for sector in 0..TX_SECTORS {
            self.analyzer.refresh_trace().await?;

            self.tester.switch(TestType::Tx, sector).await?;
            tokio::time::sleep(SETTLE_TIME).await;

            for _ in 0..TX_PULSES {
                self.dut.switch(TestType::Tx, sector).await?;
            }

            let spectrum = self
                .analyzer
                .spectrum_curve()
                .await?
                .ok_or_else(|| StationError::Analyzer("no spectrum curve".to_string()))?;

            let powers = measure_power_at_frequencies(&spectrum, &TX_TARGETS_GHZ);
            if powers.len() != TX_TARGETS_GHZ.len() {
                return Err(StationError::Analyzer("empty spectrum curve".to_string()));
            }
            for (col, &p) in powers.iter().enumerate() {
                table.set(sector, col, p);
            }

            log::info!("### Done Tx #{sector}");
        }

        Ok(())
    }

    async fn rx_sweep(
        &mut self,
        tx: &ResultTable,
        table: &mut ResultTable,
    ) -> Result<(), StationError> {
        let mut engine = SnrEngine::new();

        for sector in 0..RX_SECTORS {
            // Direct test: tester and DUT on the same sector.
            let direct = self.measure_sector_snr(&mut engine, sector, sector).await?;
            table.set(sector, 0, direct);
            self.writer.checkpoint(tx, table)?;

            // Cross test: tester on the adjacent sector, same DUT sector.
            let cross = self
                .measure_sector_snr(&mut engine, (sector + 1) % RX_SECTORS, sector)
                .await?;
            table.set(sector, 1, direct - cross);
            self.writer.checkpoint(tx, table)?;

            log::info!("### Done Rx #{sector}");
        }

        Ok(())
    }

    async fn measure_sector_snr(
        &mut self,
        engine: &mut SnrEngine,
        tester_sector: usize,
        dut_sector: usize,
    ) -> Result<f64, StationError> {
        self.tester.switch(TestType::Rx, tester_sector).await?;
        tokio::time::sleep(SETTLE_TIME).await;

        for _ in 0..RX_CAPTURES {
            let matrix = self
                .dut
                .switch(TestType::Rx, dut_sector)
                .await?
                .ok_or_else(|| {
                    StationError::Sweep("DUT switch returned no capture".to_string())
                })?;
            engine.record_snr_sample(&matrix);
        }

        engine
            .mean_snr_db()
            .ok_or_else(|| StationError::Sweep("no captures recorded".to_string()))
    }
}
