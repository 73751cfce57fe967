//! Ramp Simulator Binary
//!
//! Usage: `ramp-sim [scenario-file]`. The report is printed to stdout as
//! JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ramp_sim::{simulate, LogFormat, LogSettings, SimConfig, SIM_VERSION};

fn main() -> Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = SimConfig::load(path.as_deref())?;
    init_tracing(&config.log);

    info!("Starting ramp simulator v{}", SIM_VERSION);
    info!(
        loans = config.scenario.loans.len(),
        steps = config.scenario.steps.len(),
        slippage_bps = config.ramp.slippage_bps,
        "Loaded scenario"
    );

    let report = simulate(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.ramp_clean {
        anyhow::bail!("ramp retained funds after the scenario");
    }
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
