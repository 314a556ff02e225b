pub mod aggregate;
pub mod allocation;
pub mod engine;
pub mod regimes;
pub mod selection;
pub mod series;

pub use aggregate::{aggregate, AnnualBasis};
pub use allocation::{allocate_monthly, MonthlyAmount};
pub use engine::{simulate, RegimeResult, SimulationRequest, SimulationResult, TaxSimulator};
pub use regimes::{Regime, RegimeAssessment, TaxBreakdown, TaxComponent};
pub use selection::select_cheapest;
pub use series::{complete_series, MonthRecord, SeriesEstimator};
