//! Demand calculation: backlog and worker counts in, desired counts out.
//!
//! Every formula works in integers and truncates toward zero, so the
//! calculator under-provisions rather than over-provisions at the
//! boundaries. Intermediates are computed in `i128`: they may go negative
//! (a backlog projected to be gone before new workers arrive) and are
//! clamped into the `u32` range only when a tier count is produced.

use tierscale_core::{CalculatorConfig, ConfigResult, TierCounts};

/// Projected time to drain a backlog.
///
/// Variant order matters: the derived ordering makes `Unreachable` greater
/// than every finite drain time, so "no workers at all" always misses any
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrainTime {
    Finite(u64),
    /// No capacity: the backlog never drains.
    Unreachable,
}

impl DrainTime {
    fn from_capacity(qlen: u64, run: u32, workers: u64) -> Self {
        if workers == 0 {
            return DrainTime::Unreachable;
        }
        let time = u128::from(qlen) * u128::from(run) / u128::from(workers);
        DrainTime::Finite(u64::try_from(time).unwrap_or(u64::MAX))
    }

    /// Strictly longer than `limit`.
    pub fn exceeds(self, limit: u32) -> bool {
        self > DrainTime::Finite(limit.into())
    }

    /// Strictly shorter than `limit`.
    pub fn is_under(self, limit: u32) -> bool {
        self < DrainTime::Finite(limit.into())
    }
}

/// Calculates how many workers each tier should have.
#[derive(Debug, Clone)]
pub struct DemandCalculator {
    config: CalculatorConfig,
}

impl DemandCalculator {
    /// Create a calculator. Every timing value must be positive.
    pub fn new(config: CalculatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Time to get through `qlen` items with the base and fast workers in
    /// `counts`. Spot workers are ignored.
    pub fn will_take(&self, counts: &TierCounts, qlen: u64) -> DrainTime {
        let workers = u64::from(counts.base) + u64::from(counts.fast);
        DrainTime::from_capacity(qlen, self.config.run, workers)
    }

    /// Time to get through `qlen` items with every worker in `counts`.
    pub fn will_take_with_spot(&self, counts: &TierCounts, qlen: u64) -> DrainTime {
        DrainTime::from_capacity(qlen, self.config.run, counts.total())
    }

    /// Desired worker counts for a backlog of `qlen` items.
    ///
    /// `counts` are the requested counts, `ready` the ones actually able to
    /// take work. The base tier is passed through untouched.
    pub fn calc(&self, counts: TierCounts, ready: TierCounts, qlen: u64) -> TierCounts {
        if qlen == 0 {
            return TierCounts {
                fast: 0,
                spot: 0,
                ..counts
            };
        }

        let CalculatorConfig {
            target,
            spot_target,
            run,
            spinup,
        } = self.config;
        let (run_i, spinup_i) = (i128::from(run), i128::from(spinup));
        let q = i128::from(qlen);
        let base = i128::from(counts.base);

        // Backlog left once the ready workers have had `spinup` to chip at it.
        let ready_non_spot = i128::from(ready.base) + i128::from(ready.fast);
        let shorter_qlen = q - ready_non_spot * spinup_i / run_i;
        let shorter_qlen_spot = q - (ready_non_spot + i128::from(ready.spot)) * spinup_i / run_i;

        let will_take = self.will_take(&ready, qlen);
        let will_take_when_ready = self.will_take(&counts, qlen);

        let mut fast = i128::from(counts.fast);
        if will_take_when_ready.exceeds(spinup) && will_take_when_ready.exceeds(target) {
            // Solve qlen * run / (base + fast) = target for fast.
            fast = fast.max(shorter_qlen * run_i / i128::from(target) - base);
        } else if will_take.is_under(target) {
            fast = q * run_i / i128::from(target) - base;
        }
        let mut fast = clamp_count(fast);
        // Someone has to work the backlog while base is absent or starting.
        if (counts.base == 0 || ready.base == 0) && fast == 0 {
            fast = 1;
        }
        let counts = TierCounts { fast, ..counts };

        let will_take_spot = self.will_take_with_spot(&ready, qlen);
        let will_take_spot_when_ready = self.will_take_with_spot(&counts, qlen);
        let fast = i128::from(fast);

        let mut spot = i128::from(counts.spot);
        if will_take_when_ready.exceeds(spinup) && will_take_spot_when_ready.exceeds(spot_target) {
            spot = spot.max(shorter_qlen_spot * run_i / i128::from(spot_target) - base - fast);
        } else if will_take_spot.is_under(spot_target) {
            spot = q * run_i / i128::from(spot_target) - base - fast;
        }

        TierCounts {
            spot: clamp_count(spot),
            ..counts
        }
    }
}

fn clamp_count(value: i128) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
