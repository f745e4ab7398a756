use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use rlt_device::{DeviceConfig, DeviceRole, DeviceSession, UdpTransport};

mod analyzer;
mod config;
mod error;
mod input;
mod lifecycle;
mod report;
mod sweep;

use analyzer::{Analyzer, ScpiAnalyzer};
use error::StationError;
use lifecycle::{AppLifecycle, SshLifecycle, APP_START_GRACE};
use report::{DeviceInfo, ReportWriter, ResultTable, TestReport, RX_ROWS, TX_ROWS};
use sweep::SweepOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "rlt-station")]
#[command(about = "Production-line RF validation station for radar modules")]
struct Args {
    /// Path to the station TOML file
    #[arg(long, short = 'c', default_value = "rlt-station.toml")]
    config: PathBuf,

    /// DUT address; overrides the configuration file
    #[arg(long)]
    dut: Option<IpAddr>,

    /// Serial number of the DUT; prompted for when omitted
    #[arg(long)]
    serial: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_level(log::Level::Info)?;

    let version = env!("CARGO_PKG_VERSION");
    log::info!("RLT Station: v{version}");

    let args = Args::parse();

    let cfg = match config::load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: could not load config file '{}': {e}", args.config.display());
            std::process::exit(1);
        }
    };

    // CLI arg takes precedence over config for the DUT address.
    let dut_ip = match args.dut.or(cfg.dut.ip) {
        Some(ip) => ip,
        None => {
            eprintln!("Error: no DUT address (pass --dut or set [dut] ip)");
            std::process::exit(1);
        }
    };
    let tester_ip = match cfg.tester.ip {
        Some(ip) => ip,
        None => {
            eprintln!("Error: no tester address in [tester] section");
            std::process::exit(1);
        }
    };

    let serial = match args.serial {
        Some(serial) if input::is_valid_serial(&serial) => serial,
        Some(serial) => {
            eprintln!("Error: invalid serial number '{serial}' (8 digits expected)");
            std::process::exit(1);
        }
        None => input::prompt_serial().await?,
    };

    let device_xml = fs::read_to_string(&cfg.station.device_config)?;
    let device_config = DeviceConfig::from_xml(&device_xml)?;

    let reference_tx = ResultTable::read_csv(&cfg.reference.tx, TX_ROWS)?;
    let reference_rx = ResultTable::read_csv(&cfg.reference.rx, RX_ROWS)?;

    let tester_ctl = SshLifecycle::new(tester_ip, &cfg.tester);
    let dut_ctl = SshLifecycle::new(dut_ip, &cfg.dut);

    tester_ctl.kill_app().await?;
    dut_ctl.kill_app().await?;
    tester_ctl.start_app().await?;
    dut_ctl.start_app().await?;
    tokio::time::sleep(APP_START_GRACE).await;

    let macs = match dut_ctl.mac_addresses().await {
        Ok(macs) => macs,
        Err(e) => {
            log::warn!("### Could not read DUT MAC addresses: {e}");
            Default::default()
        }
    };

    let mut tester = DeviceSession::new(DeviceRole::Tester, UdpTransport::connect(tester_ip).await?);
    let mut dut = DeviceSession::new(DeviceRole::Dut, UdpTransport::connect(dut_ip).await?);
    tester.load_config(device_config.clone());
    dut.load_config(device_config);

    let mut spectrum_analyzer =
        ScpiAnalyzer::new(&cfg.analyzer.address, &cfg.analyzer.tx_setup, &cfg.analyzer.rx_setup);

    // All three peripherals must be up before any sector is swept. Connect
    // concurrently so a dead bench reports every problem at once.
    let (tester_ok, dut_ok, analyzer_ok) =
        tokio::join!(tester.connect(), dut.connect(), spectrum_analyzer.connect());

    let mut aborted = false;
    if let Err(e) = tester_ok {
        log::error!("### Tester {tester_ip} is unavailable: {e}");
        aborted = true;
    }
    if let Err(e) = dut_ok {
        log::error!("### DUT {dut_ip} is unavailable: {e}");
        aborted = true;
    }
    if let Err(e) = analyzer_ok {
        log::error!("### Spectrum analyzer {} is unavailable: {e}", cfg.analyzer.address);
        aborted = true;
    }
    if aborted {
        return Err(StationError::Lifecycle("bench peripherals unavailable".to_string()).into());
    }

    let writer = ReportWriter::new(&cfg.station.output_dir, &serial)?;

    let outcome = SweepOrchestrator::new(&mut tester, &mut dut, &mut spectrum_analyzer, &writer)
        .run()
        .await?;

    let failing =
        outcome.tx.failing_cells(&reference_tx)? + outcome.rx.failing_cells(&reference_rx)?;
    let pass = failing == 0;

    let report = TestReport {
        info: DeviceInfo {
            revision: cfg.station.revision.clone(),
            serial: serial.clone(),
            eth_mac: macs
                .eth0
                .filter(|m| input::is_valid_mac(m))
                .unwrap_or_else(|| "unknown".to_string()),
            wlan_mac: macs
                .wlan0
                .filter(|m| input::is_valid_mac(m))
                .unwrap_or_else(|| "unknown".to_string()),
        },
        tx: outcome.tx,
        rx: outcome.rx,
        pass,
    };
    let info_path = writer.finalize(&report)?;

    tester_ctl.kill_app().await?;
    dut_ctl.kill_app().await?;

    log::info!("### Report written to {}", info_path.display());
    log::info!(
        "### Device test results {serial}: {}",
        if pass { "Pass" } else { "Failed" }
    );

    Ok(())
}
