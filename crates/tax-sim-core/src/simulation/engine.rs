use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{RateOverrides, SimulationConfig};
use crate::error::TaxSimError;
use crate::simulation::aggregate::aggregate;
use crate::simulation::allocation::{allocate_monthly, MonthlyAmount};
use crate::simulation::regimes::{calculate_all, TaxBreakdown};
use crate::simulation::selection::select_cheapest;
use crate::simulation::series::{
    complete_series_with, estimate_with_timeout, series_year, validate_estimate, validate_months,
    MonthRecord, SeriesCompletion, SeriesEstimator, MONTHS_PER_YEAR,
};
use crate::types::{money_str, opt_rate_str, Money, Rate};
use crate::TaxSimResult;

pub const METHOD_DETERMINISTIC: &str = "deterministico:v1:simulacao_reforma";
pub const METHOD_WITH_ESTIMATE: &str = "deterministico:v1:simulacao_reforma+estimativa";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Simulation request as sent by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub use_ai_forecast: bool,
    #[serde(default)]
    pub historical_monthly: Vec<MonthRecord>,
    #[serde(default)]
    pub target_year_monthly: Vec<MonthRecord>,
    #[serde(default, with = "opt_rate_str", skip_serializing_if = "Option::is_none")]
    pub cbs_rate: Option<Rate>,
    #[serde(default, with = "opt_rate_str", skip_serializing_if = "Option::is_none")]
    pub ibs_rate: Option<Rate>,
    #[serde(default, with = "opt_rate_str", skip_serializing_if = "Option::is_none")]
    pub cpp_rate: Option<Rate>,
    #[serde(default, with = "opt_rate_str", skip_serializing_if = "Option::is_none")]
    pub simples_share: Option<Rate>,
}

impl SimulationRequest {
    pub fn rate_overrides(&self) -> RateOverrides {
        RateOverrides {
            cbs_rate: self.cbs_rate,
            ibs_rate: self.ibs_rate,
            cpp_rate: self.cpp_rate,
            simples_share: self.simples_share,
        }
    }

    fn required_ids(&self) -> TaxSimResult<(i64, i32)> {
        let company_id = self
            .company_id
            .ok_or_else(|| TaxSimError::MissingRequiredField("companyId".to_string()))?;
        let year = self
            .year
            .ok_or_else(|| TaxSimError::MissingRequiredField("year".to_string()))?;
        Ok((company_id, year))
    }
}

/// One regime's annual tax, its monthly split and component detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "impostoTotalAnual", with = "money_str")]
    pub annual_tax: Money,
    #[serde(rename = "impostoTotalMensal")]
    pub monthly_allocation: Vec<MonthlyAmount>,
    #[serde(rename = "aliquotaEfetiva", with = "money_str")]
    pub effective_rate: Money,
    #[serde(rename = "detalhesTributos")]
    pub tax_breakdown: TaxBreakdown,
    #[serde(rename = "observacoes", default)]
    pub note: String,
}

/// Full simulation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(rename = "companyId")]
    pub company_id: i64,
    pub year: i32,
    #[serde(rename = "metodo")]
    pub method: String,
    #[serde(rename = "faturamentoTotalAnual", with = "money_str")]
    pub total_revenue: Money,
    #[serde(rename = "folhaTotalAnual", with = "money_str")]
    pub total_payroll: Money,
    #[serde(rename = "valorAdicionado", with = "money_str")]
    pub added_value: Money,
    #[serde(rename = "baseMensal")]
    pub monthly_basis: Vec<MonthRecord>,
    pub regimes: Vec<RegimeResult>,
    #[serde(rename = "recomendado", default)]
    pub recommended: String,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Request → response transformation. Holds only immutable configuration,
/// so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct TaxSimulator {
    config: SimulationConfig,
    estimator: Option<Arc<dyn SeriesEstimator>>,
}

impl std::fmt::Debug for TaxSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxSimulator")
            .field("config", &self.config)
            .field("estimator", &self.estimator.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

impl Default for TaxSimulator {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            estimator: None,
        }
    }
}

impl TaxSimulator {
    pub fn new(config: SimulationConfig) -> TaxSimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            estimator: None,
        })
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn SeriesEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Consult the estimator when the caller asked for a forecast. Any
    /// failure is logged and yields no estimate.
    fn forecast(&self, request: &SimulationRequest, year: i32) -> Vec<MonthRecord> {
        if !request.use_ai_forecast || request.target_year_monthly.len() >= MONTHS_PER_YEAR {
            return Vec::new();
        }
        let Some(estimator) = &self.estimator else {
            debug!("forecast requested without an estimator, using mean projection");
            return Vec::new();
        };

        let target = &request.target_year_monthly;
        let outcome = estimate_with_timeout(
            Arc::clone(estimator),
            target,
            &request.historical_monthly,
            year,
            self.config.estimator_timeout(),
        )
        .and_then(|records| {
            validate_estimate(&records, target)?;
            Ok(records)
        });

        match outcome {
            Ok(records) => {
                debug!(estimator = estimator.name(), months = records.len(), "estimate accepted");
                records
            }
            Err(e) => {
                warn!(
                    estimator = estimator.name(),
                    error = %e,
                    "forecast estimator unavailable, using mean projection"
                );
                Vec::new()
            }
        }
    }

    /// Validate the target months and fill the twelve-month series.
    pub fn complete(&self, request: &SimulationRequest) -> TaxSimResult<SeriesCompletion> {
        let (_, year) = request.required_ids()?;
        validate_months(&request.target_year_monthly, "targetYearMonthly")?;
        let year = series_year(&request.target_year_monthly, year);
        let estimated = self.forecast(request, year);
        complete_series_with(
            &request.target_year_monthly,
            &request.historical_monthly,
            year,
            &estimated,
        )
    }

    pub fn simulate(&self, request: &SimulationRequest) -> TaxSimResult<SimulationResult> {
        let (company_id, year) = request.required_ids()?;
        let rates = self.config.rates().with_overrides(&request.rate_overrides())?;
        debug!(company_id, year, "starting tax simulation");

        let completion = self.complete(request)?;
        let records = completion.records;
        let basis = aggregate(&records)?;
        let assessments = calculate_all(&basis, &rates)?;

        let recommended = select_cheapest(&assessments)
            .map(|i| assessments[i].regime.name().to_string())
            .unwrap_or_default();

        let regimes = assessments
            .into_iter()
            .map(|a| {
                Ok(RegimeResult {
                    name: a.regime.name().to_string(),
                    monthly_allocation: allocate_monthly(a.annual_tax, &records)?,
                    annual_tax: a.annual_tax,
                    effective_rate: a.effective_rate,
                    tax_breakdown: a.breakdown,
                    note: a.note,
                })
            })
            .collect::<TaxSimResult<Vec<_>>>()?;

        let method = if completion.estimated_months > 0 {
            METHOD_WITH_ESTIMATE
        } else {
            METHOD_DETERMINISTIC
        };
        debug!(company_id, year, recommended = %recommended, "tax simulation finished");

        Ok(SimulationResult {
            company_id,
            year,
            method: method.to_string(),
            total_revenue: basis.total_revenue,
            total_payroll: basis.total_payroll,
            added_value: basis.added_value,
            monthly_basis: records,
            regimes,
            recommended,
        })
    }

    /// JSON in, JSON out. Errors keep their class so callers can map them to
    /// a client or internal failure.
    pub fn simulate_json(&self, body: &str) -> TaxSimResult<String> {
        let request: SimulationRequest = serde_json::from_str(body)?;
        let result = self.simulate(&request)?;
        Ok(serde_json::to_string(&result)?)
    }
}

/// Run one simulation with the default configuration and no estimator.
pub fn simulate(request: &SimulationRequest) -> TaxSimResult<SimulationResult> {
    TaxSimulator::default().simulate(request)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::simulation::regimes::Regime;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn request_with(target: Vec<MonthRecord>) -> SimulationRequest {
        SimulationRequest {
            company_id: Some(123),
            year: Some(2026),
            target_year_monthly: target,
            ..Default::default()
        }
    }

    fn three_month_request() -> SimulationRequest {
        request_with(
            (1..=3)
                .map(|m| MonthRecord::new(2026, m, dec!(4000), dec!(1000)))
                .collect(),
        )
    }

    struct FixedEstimator(Vec<MonthRecord>);

    impl SeriesEstimator for FixedEstimator {
        fn name(&self) -> &str {
            "fixed"
        }

        fn estimate(&self, _: &[MonthRecord], _: &[MonthRecord], _: i32) -> TaxSimResult<Vec<MonthRecord>> {
            Ok(self.0.clone())
        }
    }

    struct StalledEstimator;

    impl SeriesEstimator for StalledEstimator {
        fn name(&self) -> &str {
            "stalled"
        }

        fn estimate(&self, _: &[MonthRecord], _: &[MonthRecord], _: i32) -> TaxSimResult<Vec<MonthRecord>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_three_months_scenario() {
        let result = simulate(&three_month_request()).unwrap();

        assert_eq!(result.total_revenue.to_string(), "48000.00");
        assert_eq!(result.total_payroll.to_string(), "12000.00");
        assert_eq!(result.method, METHOD_DETERMINISTIC);
        assert_eq!(result.monthly_basis.len(), 12);

        let names: Vec<&str> = result.regimes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                Regime::SimplesAnexoV.name(),
                Regime::LucroPresumido.name(),
                Regime::LucroReal.name(),
                Regime::ReformaCbsIbs.name(),
            ]
        );

        let anexo_v = &result.regimes[0];
        assert_eq!(anexo_v.annual_tax.to_string(), "7200.00");
        assert!(anexo_v
            .monthly_allocation
            .iter()
            .all(|m| m.amount.to_string() == "600.00"));

        assert_eq!(result.recommended, Regime::LucroReal.name());
    }

    #[test]
    fn test_allocations_reconcile_for_every_regime() {
        let target = vec![
            MonthRecord::new(2026, 1, dec!(52000.00), dec!(11000.00)),
            MonthRecord::new(2026, 2, dec!(48123.45), dec!(10000.00)),
            MonthRecord::new(2026, 7, dec!(61000.10), dec!(15000.00)),
        ];
        let result = simulate(&request_with(target)).unwrap();
        for regime in &result.regimes {
            assert_eq!(regime.monthly_allocation.len(), 12);
            let total: Money = regime.monthly_allocation.iter().map(|m| m.amount).sum();
            assert_eq!(total, regime.annual_tax, "{}", regime.name);
        }
    }

    #[test]
    fn test_missing_company_id() {
        let mut request = three_month_request();
        request.company_id = None;
        let err = simulate(&request).unwrap_err();
        assert!(matches!(err, TaxSimError::MissingRequiredField(ref f) if f == "companyId"));
        assert_eq!(err.class(), FailureClass::Client);
    }

    #[test]
    fn test_missing_year() {
        let mut request = three_month_request();
        request.year = None;
        let err = simulate(&request).unwrap_err();
        assert!(matches!(err, TaxSimError::MissingRequiredField(ref f) if f == "year"));
    }

    #[test]
    fn test_invalid_target_month() {
        let request = request_with(vec![MonthRecord::new(2026, 13, dec!(1), dec!(1))]);
        assert!(matches!(simulate(&request), Err(TaxSimError::InvalidSeries(_))));
    }

    #[test]
    fn test_request_rate_override_applies() {
        let mut request = three_month_request();
        request.cbs_rate = Some(dec!(0.10));
        let result = simulate(&request).unwrap();
        let reform = result.regimes.last().unwrap();
        assert_eq!(reform.tax_breakdown.cbs, dec!(3360.00));
    }

    #[test]
    fn test_estimator_fills_missing_months() {
        let estimated: Vec<MonthRecord> = (4..=12)
            .map(|m| MonthRecord::new(2026, m, dec!(5000), dec!(1000)))
            .collect();
        let simulator = TaxSimulator::default().with_estimator(Arc::new(FixedEstimator(estimated)));

        let mut request = three_month_request();
        request.use_ai_forecast = true;
        let result = simulator.simulate(&request).unwrap();
        assert_eq!(result.method, METHOD_WITH_ESTIMATE);
        assert_eq!(result.total_revenue, dec!(57000.00));

        // Without the flag the estimator is not consulted.
        request.use_ai_forecast = false;
        let plain = simulator.simulate(&request).unwrap();
        assert_eq!(plain.total_revenue, dec!(48000.00));
    }

    #[test]
    fn test_stalled_estimator_degrades_to_mean() {
        let config = SimulationConfig {
            estimator_timeout_ms: 20,
            ..Default::default()
        };
        let simulator = TaxSimulator::new(config)
            .unwrap()
            .with_estimator(Arc::new(StalledEstimator));
        let mut request = three_month_request();
        request.use_ai_forecast = true;

        let result = simulator.simulate(&request).unwrap();
        assert_eq!(result.method, METHOD_DETERMINISTIC);
        assert_eq!(result, simulate(&three_month_request()).unwrap());
    }

    #[test]
    fn test_malformed_estimate_discarded() {
        let bad = vec![MonthRecord::new(2026, 1, dec!(999999), dec!(0))];
        let simulator = TaxSimulator::default().with_estimator(Arc::new(FixedEstimator(bad)));
        let mut request = three_month_request();
        request.use_ai_forecast = true;
        let result = simulator.simulate(&request).unwrap();
        assert_eq!(result.total_revenue, dec!(48000.00));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig {
            ibs_rate: dec!(-0.01),
            ..Default::default()
        };
        assert!(TaxSimulator::new(config).is_err());
    }

    #[test]
    fn test_simulate_json_is_deterministic() {
        let body = serde_json::to_string(&three_month_request()).unwrap();
        let simulator = TaxSimulator::default();
        let first = simulator.simulate_json(&body).unwrap();
        let second = simulator.simulate_json(&body).unwrap();
        assert_eq!(first, second);
    }
}
