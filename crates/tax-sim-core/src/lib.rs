pub mod config;
pub mod error;
pub mod simulation;
pub mod types;

#[cfg(feature = "forecast")]
pub mod forecast;

pub use config::SimulationConfig;
pub use error::{ErrorResponse, FailureClass, TaxSimError};
pub use simulation::{SimulationRequest, SimulationResult, TaxSimulator};
pub use types::*;

/// Standard result type for all tax simulation operations
pub type TaxSimResult<T> = Result<T, TaxSimError>;
