//! tierscale-core: shared tier types and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CalculatorConfig, ControllerSettings, SimulationConfig, TierscaleConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
