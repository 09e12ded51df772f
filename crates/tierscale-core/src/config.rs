//! tierscale.toml configuration parser.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::TierCounts;

/// Default hysteresis window (number of remembered requests).
pub const DEFAULT_WINDOW: usize = 8;

/// Default fast-tier ceiling before overflow converts into spot.
pub const DEFAULT_MAX_FAST: u32 = 96;

/// Default tick interval.
pub const DEFAULT_INTERVAL: &str = "5s";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierscaleConfig {
    pub calculator: CalculatorConfig,
    #[serde(default)]
    pub controller: ControllerSettings,
    pub simulation: Option<SimulationConfig>,
}

/// Timing parameters of the demand calculation.
///
/// All four values share one time unit (seconds, minutes, ...). No unit
/// conversion is performed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalculatorConfig {
    /// Time to drain the backlog with base + fast workers.
    pub target: u32,
    /// Time to drain the backlog with every tier.
    pub spot_target: u32,
    /// Time for one worker to process one item.
    pub run: u32,
    /// Lag between requesting a worker and the worker being ready.
    pub spinup: u32,
}

impl CalculatorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let fields = [
            ("calculator.target", self.target),
            ("calculator.spot_target", self.spot_target),
            ("calculator.run", self.run),
            ("calculator.spinup", self.spinup),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Hysteresis window size.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Fast tier ceiling, applied after smoothing.
    #[serde(default = "default_max_fast")]
    pub max_fast: u32,
    /// Tick interval, e.g. "5s", "1m", "250ms".
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_fast: DEFAULT_MAX_FAST,
            interval: DEFAULT_INTERVAL.to_string(),
        }
    }
}

impl ControllerSettings {
    pub fn window(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.window).ok_or(ConfigError::NotPositive {
            field: "controller.window",
        })
    }

    pub fn interval(&self) -> ConfigResult<Duration> {
        parse_interval(&self.interval)
    }
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_max_fast() -> u32 {
    DEFAULT_MAX_FAST
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

/// Workload and cluster behaviour for the built-in simulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Simulated time units that pass per tick.
    #[serde(default = "default_tick_units")]
    pub tick_units: u32,
    /// Backlog present at simulation start.
    #[serde(default)]
    pub initial_backlog: u64,
    /// Items added to the backlog every tick.
    #[serde(default)]
    pub arrivals_per_tick: u64,
    /// Fail every Nth collaborator read. Zero disables failure injection.
    #[serde(default)]
    pub fail_every: u32,
    /// Requested (and ready) counts at simulation start.
    #[serde(default)]
    pub initial: TierCounts,
    /// One-off backlog spikes.
    #[serde(default)]
    pub bursts: Vec<Burst>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_units: default_tick_units(),
            initial_backlog: 0,
            arrivals_per_tick: 0,
            fail_every: 0,
            initial: TierCounts::default(),
            bursts: Vec::new(),
        }
    }
}

fn default_tick_units() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Burst {
    /// Number of elapsed ticks at which the burst lands. Zero adds it to
    /// the starting backlog.
    pub at: u64,
    pub jobs: u64,
}

impl TierscaleConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TierscaleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.calculator.validate()?;
        self.controller.window()?;
        self.controller.interval()?;
        if let Some(sim) = &self.simulation
            && sim.tick_units == 0
        {
            return Err(ConfigError::NotPositive {
                field: "simulation.tick_units",
            });
        }
        Ok(())
    }

    /// Scaffold a configuration with default controller settings and a
    /// small simulated workload.
    pub fn scaffold() -> Self {
        TierscaleConfig {
            calculator: CalculatorConfig {
                target: 10,
                spot_target: 5,
                run: 2,
                spinup: 1,
            },
            controller: ControllerSettings::default(),
            simulation: Some(SimulationConfig {
                initial: TierCounts::new(1, 0, 0),
                arrivals_per_tick: 20,
                bursts: vec![Burst { at: 3, jobs: 500 }],
                ..SimulationConfig::default()
            }),
        }
    }
}

/// Parse an interval like "30s", "5m", "250ms" or a bare number of seconds.
pub fn parse_interval(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = |reason: &str| ConfigError::Interval {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let (digits, unit_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| invalid("expected <number>[ms|s|m]"))?;
    if value == 0 {
        return Err(invalid("must be positive"));
    }
    let millis = value
        .checked_mul(unit_ms)
        .ok_or_else(|| invalid("out of range"))?;
    Ok(Duration::from_millis(millis))
}
