use napi::Result as NapiResult;
use napi_derive::napi;
use std::sync::Arc;

use tax_sim_core::forecast::TrendEstimator;
use tax_sim_core::{SimulationConfig, SimulationRequest, TaxSimError, TaxSimulator};

/// Internal faults are reported with the generic public message only.
fn to_napi_error(e: TaxSimError) -> napi::Error {
    napi::Error::from_reason(e.public_message())
}

fn simulator(config_json: Option<String>) -> Result<TaxSimulator, TaxSimError> {
    let config: SimulationConfig = match config_json {
        Some(json) => serde_json::from_str(&json)?,
        None => SimulationConfig::default(),
    };
    Ok(TaxSimulator::new(config)?.with_estimator(Arc::new(TrendEstimator::default())))
}

/// Run the full simulation for a JSON request and return the JSON response.
#[napi]
pub fn simulate_taxes(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let simulator = simulator(config_json).map_err(to_napi_error)?;
    simulator.simulate_json(&input_json).map_err(to_napi_error)
}

/// Only complete the twelve-month series of a JSON request.
#[napi]
pub fn complete_series(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let simulator = simulator(config_json).map_err(to_napi_error)?;
    let request: SimulationRequest =
        serde_json::from_str(&input_json).map_err(|e| to_napi_error(e.into()))?;
    let completion = simulator.complete(&request).map_err(to_napi_error)?;
    serde_json::to_string(&completion.records).map_err(|e| to_napi_error(e.into()))
}

/// Default rates and estimator timeout as JSON.
#[napi]
pub fn default_config() -> NapiResult<String> {
    serde_json::to_string(&SimulationConfig::default()).map_err(|e| to_napi_error(e.into()))
}
