use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::error::StationError;

/// Instrument setup loaded for a sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupKind {
    Tx,
    Rx,
}

/// Spectrum analyzer boundary as consumed by the sweep.
///
/// The station only needs trace accumulation control and the accumulated
/// curve; driver internals stay behind this trait.
#[async_trait]
pub trait Analyzer: Send {
    async fn connect(&mut self) -> Result<(), StationError>;

    async fn load_setup(&mut self, kind: SetupKind) -> Result<(), StationError>;

    /// Resets the analyzer's trace accumulation.
    async fn refresh_trace(&mut self) -> Result<(), StationError>;

    /// Accumulated spectrum curve in dBm, `None` when the instrument could
    /// not produce one.
    async fn spectrum_curve(&mut self) -> Result<Option<Vec<f64>>, StationError>;
}

pub const CONNECT_ATTEMPTS: usize = 3;

/// SCPI-over-TCP analyzer client.
pub struct ScpiAnalyzer {
    address: String,
    tx_setup: String,
    rx_setup: String,
    stream: Option<BufStream<TcpStream>>,
}

impl ScpiAnalyzer {
    pub fn new(address: &str, tx_setup: &str, rx_setup: &str) -> Self {
        Self {
            address: address.to_string(),
            tx_setup: tx_setup.to_string(),
            rx_setup: rx_setup.to_string(),
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut BufStream<TcpStream>, StationError> {
        self.stream
            .as_mut()
            .ok_or_else(|| StationError::Analyzer("not connected".to_string()))
    }

    async fn write_cmd(&mut self, cmd: &str) -> Result<(), StationError> {
        let stream = self.stream()?;
        stream.write_all(cmd.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        Ok(())
    }

    async fn query(&mut self, cmd: &str) -> Result<String, StationError> {
        self.write_cmd(cmd).await?;

        let mut line = String::new();
        self.stream()?.read_line(&mut line).await?;
        Ok(line.trim_end().to_string())
    }
}

#[async_trait]
impl Analyzer for ScpiAnalyzer {
    async fn connect(&mut self) -> Result<(), StationError> {
        let mut last_err = String::new();

        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect(&self.address).await {
                Ok(stream) => {
                    self.stream = Some(BufStream::new(stream));
                    let idn = self.query("*IDN?").await?;
                    log::info!("### RSA: is connected ({idn})");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("analyzer connect attempt {attempt} failed: {e}");
                    last_err = e.to_string();
                }
            }
        }

        log::error!("### RSA: cannot connect to analyzer");
        Err(StationError::Analyzer(format!(
            "{} unreachable after {CONNECT_ATTEMPTS} attempts: {last_err}",
            self.address
        )))
    }

    async fn load_setup(&mut self, kind: SetupKind) -> Result<(), StationError> {
        let setup = match kind {
            SetupKind::Tx => self.tx_setup.clone(),
            SetupKind::Rx => self.rx_setup.clone(),
        };

        self.write_cmd(&format!("MMEMORY:LOAD:STATE \"{setup}\"")).await?;
        log::info!("{kind:?} setup is loaded");
        Ok(())
    }

    async fn refresh_trace(&mut self) -> Result<(), StationError> {
        self.write_cmd("SENSe:SPECtrum:CLEar:RESults").await
    }

    async fn spectrum_curve(&mut self) -> Result<Option<Vec<f64>>, StationError> {
        let response = self.query("FETCh:SPECtrum:TRACe?").await?;

        let values: Result<Vec<f64>, _> = response
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect();

        match values {
            Ok(curve) if !curve.is_empty() => Ok(Some(curve)),
            _ => {
                log::warn!("problem getting data from spectrum analyzer");
                Ok(None)
            }
        }
    }
}
