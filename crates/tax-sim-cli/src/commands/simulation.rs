use clap::Args;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use tax_sim_core::forecast::TrendEstimator;
use tax_sim_core::simulation::engine::{METHOD_DETERMINISTIC, METHOD_WITH_ESTIMATE};
use tax_sim_core::{SimulationConfig, SimulationRequest, TaxSimulator};

use crate::input;

/// Arguments for a full tax simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON request file (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
    /// Path to YAML file with default rates and estimator timeout
    #[arg(long)]
    pub config: Option<String>,
    /// Project missing months from historical growth when the request asks for a forecast
    #[arg(long)]
    pub forecast: bool,
}

/// Arguments for series completion only
#[derive(Args)]
pub struct CompleteSeriesArgs {
    /// Path to JSON request file (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
    /// Path to YAML configuration file
    #[arg(long)]
    pub config: Option<String>,
    /// Project missing months from historical growth when the request asks for a forecast
    #[arg(long)]
    pub forecast: bool,
}

fn read_request(path: Option<&str>) -> Result<SimulationRequest, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_json(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err("--input <request.json> or stdin required for tax simulation".into())
    }
}

fn build_simulator(
    config_path: Option<&str>,
    forecast: bool,
) -> Result<TaxSimulator, Box<dyn std::error::Error>> {
    let config: SimulationConfig = match config_path {
        Some(path) => {
            debug!(path, "loading simulation config");
            input::file::read_yaml(path)?
        }
        None => SimulationConfig::default(),
    };
    let simulator = TaxSimulator::new(config)?;
    Ok(if forecast {
        debug!("trend estimator enabled");
        simulator.with_estimator(Arc::new(TrendEstimator::default()))
    } else {
        simulator
    })
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref())?;
    let simulator = build_simulator(args.config.as_deref(), args.forecast)?;
    let result = simulator.simulate(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_complete_series(args: CompleteSeriesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref())?;
    let simulator = build_simulator(args.config.as_deref(), args.forecast)?;
    let completion = simulator.complete(&request)?;
    let method = if completion.estimated_months > 0 {
        METHOD_WITH_ESTIMATE
    } else {
        METHOD_DETERMINISTIC
    };
    Ok(json!({
        "companyId": request.company_id,
        "year": request.year,
        "metodo": method,
        "mesesEstimados": completion.estimated_months,
        "baseMensal": completion.records,
    }))
}
