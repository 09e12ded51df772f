//! tierscale-autoscale: backlog-driven scaling of three worker tiers.
//!
//! Decides how many guaranteed (`base`), on-demand (`fast`) and
//! preemptible (`spot`) workers should run to drain a backlog within a
//! target time, damping oscillation while the backlog shrinks.
//!
//! # Control loop
//!
//! ```text
//! current, ready, qlen = backend reads      (any failure: skip tick)
//! desired  = DemandCalculator.calc(current, ready, qlen)
//! history.push(desired)
//! smoothed = history.scale_to(current)       (up: immediate, down: window max)
//! applied  = cap_fast(smoothed, max_fast)    (overflow moves into spot)
//! for tier where applied != current: backend.set_count(tier, applied)
//! ```
//!
//! All timing parameters share one unit; the calculator never converts.

pub mod backend;
pub mod calculator;
pub mod controller;
pub mod error;
pub mod hysteresis;

pub use backend::TierBackend;
pub use calculator::{DemandCalculator, DrainTime};
pub use controller::{
    cap_fast, ControllerConfig, ScalingController, TickOutcome, TickReport, TierChange,
};
pub use error::{BackendError, BackendResult};
pub use hysteresis::HysteresisBuffer;
