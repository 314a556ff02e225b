use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TaxSimError;
use crate::types::Rate;
use crate::TaxSimResult;

/// Engine-wide defaults, built once and handed to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// CBS rate applied to added value in the reform scenario
    pub cbs_rate: Rate,
    /// IBS rate applied to added value in the reform scenario
    pub ibs_rate: Rate,
    /// Employer payroll contribution rate, caps the CPP share of the DAS
    pub cpp_rate: Rate,
    /// Share of the Simples DAS that is not attributed to CPP
    pub simples_share: Rate,
    /// Fraction of input credits subtracted from the Lucro Real PIS/COFINS base
    pub credit_recognition: Rate,
    /// Upper bound for one forecast estimator call
    pub estimator_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cbs_rate: dec!(0.12),
            ibs_rate: dec!(0.14),
            cpp_rate: dec!(0.20),
            simples_share: dec!(0.70),
            credit_recognition: Decimal::ZERO,
            estimator_timeout_ms: 2_000,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> TaxSimResult<()> {
        self.rates().validate()
    }

    pub fn estimator_timeout(&self) -> Duration {
        Duration::from_millis(self.estimator_timeout_ms)
    }

    pub fn rates(&self) -> RateTable {
        RateTable {
            cbs_rate: self.cbs_rate,
            ibs_rate: self.ibs_rate,
            cpp_rate: self.cpp_rate,
            simples_share: self.simples_share,
            credit_recognition: self.credit_recognition,
        }
    }
}

/// Per-request overrides, each falling back to the configured default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateOverrides {
    pub cbs_rate: Option<Rate>,
    pub ibs_rate: Option<Rate>,
    pub cpp_rate: Option<Rate>,
    pub simples_share: Option<Rate>,
}

/// Effective rate parameters for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub cbs_rate: Rate,
    pub ibs_rate: Rate,
    pub cpp_rate: Rate,
    pub simples_share: Rate,
    pub credit_recognition: Rate,
}

impl Default for RateTable {
    fn default() -> Self {
        SimulationConfig::default().rates()
    }
}

impl RateTable {
    pub fn with_overrides(self, overrides: &RateOverrides) -> TaxSimResult<Self> {
        let table = RateTable {
            cbs_rate: overrides.cbs_rate.unwrap_or(self.cbs_rate),
            ibs_rate: overrides.ibs_rate.unwrap_or(self.ibs_rate),
            cpp_rate: overrides.cpp_rate.unwrap_or(self.cpp_rate),
            simples_share: overrides.simples_share.unwrap_or(self.simples_share),
            credit_recognition: self.credit_recognition,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> TaxSimResult<()> {
        let checks = [
            ("cbsRate", self.cbs_rate),
            ("ibsRate", self.ibs_rate),
            ("cppRate", self.cpp_rate),
            ("simplesShare", self.simples_share),
            ("creditRecognition", self.credit_recognition),
        ];
        for (field, rate) in checks {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(TaxSimError::InvalidInput {
                    field: field.to_string(),
                    reason: format!("Rate must be between 0 and 1, got {rate}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.cbs_rate, dec!(0.12));
        assert_eq!(cfg.ibs_rate, dec!(0.14));
        assert_eq!(cfg.cpp_rate, dec!(0.20));
        assert_eq!(cfg.simples_share, dec!(0.70));
        assert_eq!(cfg.credit_recognition, dec!(0));
        assert_eq!(cfg.estimator_timeout(), Duration::from_secs(2));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: SimulationConfig = serde_json::from_str(r#"{"cbs_rate": "0.10"}"#).unwrap();
        assert_eq!(cfg.cbs_rate, dec!(0.10));
        assert_eq!(cfg.ibs_rate, dec!(0.14));
    }

    #[test]
    fn test_overrides_apply_per_field() {
        let overrides = RateOverrides {
            ibs_rate: Some(dec!(0.15)),
            ..Default::default()
        };
        let table = RateTable::default().with_overrides(&overrides).unwrap();
        assert_eq!(table.cbs_rate, dec!(0.12));
        assert_eq!(table.ibs_rate, dec!(0.15));
    }

    #[test]
    fn test_out_of_range_override_rejected() {
        let overrides = RateOverrides {
            simples_share: Some(dec!(1.5)),
            ..Default::default()
        };
        match RateTable::default().with_overrides(&overrides) {
            Err(TaxSimError::InvalidInput { field, .. }) => assert_eq!(field, "simplesShare"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }
}
