//! Scaling controller: one control cycle per tick.
//!
//! A tick reads the requested counts, ready counts and backlog from the
//! backend, asks the [`DemandCalculator`] for desired counts, smooths them
//! through the [`HysteresisBuffer`], caps the fast tier (spilling the excess
//! into spot) and resizes only the tiers whose count actually changed.
//!
//! Ticks take `&mut self`, so two ticks can never interleave and the
//! buffer's history is a true causal ordering of requests. A failed read
//! skips the tick entirely; the next scheduled tick is the retry.

use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tierscale_core::config::{DEFAULT_MAX_FAST, DEFAULT_WINDOW};
use tierscale_core::{CalculatorConfig, ConfigResult, ControllerSettings, Tier, TierCounts};

use crate::backend::TierBackend;
use crate::calculator::DemandCalculator;
use crate::error::{BackendError, BackendResult};
use crate::hysteresis::HysteresisBuffer;

/// Fixed configuration of a [`ScalingController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub calculator: CalculatorConfig,
    /// Hysteresis window size.
    pub window: NonZeroUsize,
    /// Fast tier ceiling. Applied after smoothing, so the history always
    /// holds uncapped demand.
    pub max_fast: u32,
}

impl ControllerConfig {
    /// Default window (8) and fast ceiling (96).
    pub fn new(calculator: CalculatorConfig) -> Self {
        Self {
            calculator,
            window: NonZeroUsize::new(DEFAULT_WINDOW).unwrap_or(NonZeroUsize::MIN),
            max_fast: DEFAULT_MAX_FAST,
        }
    }

    pub fn from_settings(
        calculator: CalculatorConfig,
        settings: &ControllerSettings,
    ) -> ConfigResult<Self> {
        Ok(Self {
            calculator,
            window: settings.window()?,
            max_fast: settings.max_fast,
        })
    }
}

/// A single tier resize emitted by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    pub tier: Tier,
    pub from: u32,
    pub to: u32,
}

/// Everything a completed tick observed and decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub current: TierCounts,
    pub ready: TierCounts,
    pub queue_len: u64,
    /// Raw calculator output, as pushed into the history.
    pub desired: TierCounts,
    /// Smoothed and capped counts.
    pub applied: TierCounts,
    /// Resizes sent to the backend, in base/fast/spot order.
    pub changes: Vec<TierChange>,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A backend read failed; nothing was recorded or resized.
    Skipped(BackendError),
    Evaluated(TickReport),
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped(_))
    }

    /// Resizes emitted by this tick (empty when skipped).
    pub fn changes(&self) -> &[TierChange] {
        match self {
            TickOutcome::Skipped(_) => &[],
            TickOutcome::Evaluated(report) => &report.changes,
        }
    }

    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Skipped(_) => None,
            TickOutcome::Evaluated(report) => Some(report),
        }
    }
}

/// Caps the fast tier at `max_fast`, moving the overflow into spot.
pub fn cap_fast(counts: TierCounts, max_fast: u32) -> TierCounts {
    if counts.fast <= max_fast {
        return counts;
    }
    TierCounts {
        fast: max_fast,
        spot: counts.spot.saturating_add(counts.fast - max_fast),
        ..counts
    }
}

/// Drives the demand calculation and smoothing against a backend.
pub struct ScalingController<B> {
    backend: B,
    calculator: DemandCalculator,
    history: HysteresisBuffer,
    max_fast: u32,
}

impl<B: TierBackend> ScalingController<B> {
    pub fn new(backend: B, config: ControllerConfig) -> ConfigResult<Self> {
        Ok(Self {
            backend,
            calculator: DemandCalculator::new(config.calculator)?,
            history: HysteresisBuffer::new(config.window),
            max_fast: config.max_fast,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Desired-count requests remembered for smoothing.
    pub fn history(&self) -> &HysteresisBuffer {
        &self.history
    }

    pub fn max_fast(&self) -> u32 {
        self.max_fast
    }

    /// Run one control cycle.
    pub fn tick(&mut self) -> TickOutcome {
        let (current, ready, queue_len) = match self.collect() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "skipping tick: failed to read cluster state");
                return TickOutcome::Skipped(e);
            }
        };

        let desired = self.calculator.calc(current, ready, queue_len);
        self.history.push(desired);
        // The push above guarantees a non-empty history.
        let smoothed = self.history.scale_to(&current).unwrap_or(desired);
        let applied = cap_fast(smoothed, self.max_fast);

        debug!(
            %current,
            %ready,
            queue_len,
            %desired,
            %applied,
            "tick evaluated"
        );

        let mut changes = Vec::new();
        for tier in Tier::ALL {
            let (from, to) = (current.get(tier), applied.get(tier));
            if from == to {
                continue;
            }
            info!(%tier, from, to, queue_len, "scaling tier");
            self.backend.set_count(tier, to);
            changes.push(TierChange { tier, from, to });
        }

        TickOutcome::Evaluated(TickReport {
            current,
            ready,
            queue_len,
            desired,
            applied,
            changes,
        })
    }

    fn collect(&mut self) -> BackendResult<(TierCounts, TierCounts, u64)> {
        let current = self.backend.counts()?;
        let ready = self.backend.ready_counts()?;
        let queue_len = self.backend.queue_len()?;
        Ok((current, ready, queue_len))
    }

    /// Run the control loop until `shutdown` fires.
    pub async fn run(&mut self, interval: Duration, shutdown: watch::Receiver<bool>) {
        self.run_with(interval, shutdown, |_, _| ControlFlow::Continue(()))
            .await;
    }

    /// Run the control loop, calling `after_tick` with the backend and the
    /// outcome of every tick. Stops when `shutdown` fires or `after_tick`
    /// breaks.
    pub async fn run_with<F>(
        &mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut after_tick: F,
    ) where
        F: FnMut(&mut B, &TickOutcome) -> ControlFlow<()>,
    {
        info!(
            interval_ms = interval.as_millis() as u64,
            window = self.history.capacity(),
            max_fast = self.max_fast,
            "scaling controller started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let outcome = self.tick();
                    if after_tick(&mut self.backend, &outcome).is_break() {
                        info!("scaling controller finished");
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    info!("scaling controller shutting down");
                    break;
                }
            }
        }
    }
}
