//! In-process cluster simulator.
//!
//! `SimulatedCluster` stands in for both the orchestrator and the work
//! queue: requested workers become ready `spinup` time units after they
//! are asked for, every ready worker chips away at the backlog at one item
//! per `run` time units, and a workload adds items each tick.

use tracing::info;

use tierscale_autoscale::{BackendError, BackendResult, TickOutcome, TierBackend};
use tierscale_core::{CalculatorConfig, SimulationConfig, Tier, TierCounts};

/// Workers of one tier that were requested but are still spinning up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBatch {
    tier: Tier,
    count: u32,
    ready_at: u64,
}

/// Aggregate results of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub tier_changes: u64,
    /// Highest requested count seen for each tier.
    pub peak: TierCounts,
    pub peak_backlog: u64,
    pub completed_jobs: u64,
    pub final_backlog: u64,
    pub final_counts: TierCounts,
}

pub struct SimulatedCluster {
    config: SimulationConfig,
    run: u32,
    spinup: u32,
    requested: TierCounts,
    ready: TierCounts,
    pending: Vec<PendingBatch>,
    backlog: u64,
    /// Worker time spent on the item currently in progress.
    progress: u64,
    now: u64,
    summary: SimulationSummary,
}

impl SimulatedCluster {
    pub fn new(calculator: CalculatorConfig, config: SimulationConfig) -> Self {
        let backlog = config
            .initial_backlog
            .saturating_add(burst_jobs(&config, 0));
        let summary = SimulationSummary {
            peak: config.initial,
            peak_backlog: backlog,
            ..SimulationSummary::default()
        };
        Self {
            run: calculator.run.max(1),
            spinup: calculator.spinup,
            requested: config.initial,
            ready: config.initial,
            pending: Vec::new(),
            backlog,
            progress: 0,
            now: 0,
            summary,
            config,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.summary.ticks
    }

    pub fn backlog(&self) -> u64 {
        self.backlog
    }

    pub fn requested(&self) -> TierCounts {
        self.requested
    }

    pub fn ready(&self) -> TierCounts {
        self.ready
    }

    /// Fold a controller tick into the run summary.
    pub fn record(&mut self, outcome: &TickOutcome) {
        if outcome.is_skipped() {
            self.summary.skipped_ticks += 1;
        }
        self.summary.tier_changes += outcome.changes().len() as u64;
        let peak = &mut self.summary.peak;
        for tier in Tier::ALL {
            peak.set(tier, peak.get(tier).max(self.requested.get(tier)));
        }
    }

    /// Move simulated time forward by one tick.
    pub fn advance(&mut self) {
        let tick_units = u64::from(self.config.tick_units);
        self.now += tick_units;
        self.summary.ticks += 1;
        self.promote_ready();

        self.progress = self
            .progress
            .saturating_add(self.ready.total().saturating_mul(tick_units));
        let finished = (self.progress / u64::from(self.run)).min(self.backlog);
        self.progress %= u64::from(self.run);
        self.backlog -= finished;
        self.summary.completed_jobs += finished;
        if self.backlog == 0 {
            // Idle workers don't bank time for future items.
            self.progress = 0;
        }

        let arrivals = self
            .config
            .arrivals_per_tick
            .saturating_add(burst_jobs(&self.config, self.summary.ticks));
        self.backlog = self.backlog.saturating_add(arrivals);
        self.summary.peak_backlog = self.summary.peak_backlog.max(self.backlog);
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            final_backlog: self.backlog,
            final_counts: self.requested,
            ..self.summary.clone()
        }
    }

    fn promote_ready(&mut self) {
        let now = self.now;
        let ready = &mut self.ready;
        self.pending.retain(|batch| {
            if batch.ready_at > now {
                return true;
            }
            ready.set(batch.tier, ready.get(batch.tier).saturating_add(batch.count));
            false
        });
    }

    /// Drop `excess` workers of `tier`, newest pending ones first.
    fn release(&mut self, tier: Tier, mut excess: u32) {
        for batch in self.pending.iter_mut().rev().filter(|b| b.tier == tier) {
            let taken = excess.min(batch.count);
            batch.count -= taken;
            excess -= taken;
            if excess == 0 {
                break;
            }
        }
        self.pending.retain(|batch| batch.count > 0);
        self.ready.set(tier, self.ready.get(tier).saturating_sub(excess));
    }

    fn check_available(&self) -> BackendResult<()> {
        let every = u64::from(self.config.fail_every);
        if every > 0 && (self.summary.ticks + 1) % every == 0 {
            return Err(BackendError::Unavailable(format!(
                "injected failure at tick {}",
                self.summary.ticks
            )));
        }
        Ok(())
    }
}

fn burst_jobs(config: &SimulationConfig, tick: u64) -> u64 {
    config
        .bursts
        .iter()
        .filter(|burst| burst.at == tick)
        .fold(0u64, |sum, burst| sum.saturating_add(burst.jobs))
}

impl TierBackend for SimulatedCluster {
    fn counts(&mut self) -> BackendResult<TierCounts> {
        self.check_available()?;
        Ok(self.requested)
    }

    fn ready_counts(&mut self) -> BackendResult<TierCounts> {
        self.check_available()?;
        Ok(self.ready)
    }

    fn queue_len(&mut self) -> BackendResult<u64> {
        self.check_available()?;
        Ok(self.backlog)
    }

    fn set_count(&mut self, tier: Tier, count: u32) {
        let requested = self.requested.get(tier);
        if count > requested {
            self.pending.push(PendingBatch {
                tier,
                count: count - requested,
                ready_at: self.now + u64::from(self.spinup),
            });
        } else if count < requested {
            self.release(tier, requested - count);
        }
        self.requested.set(tier, count);
    }
}

/// Log the result of a run.
pub fn log_summary(summary: &SimulationSummary) {
    info!(
        ticks = summary.ticks,
        skipped_ticks = summary.skipped_ticks,
        tier_changes = summary.tier_changes,
        peak = %summary.peak,
        peak_backlog = summary.peak_backlog,
        completed_jobs = summary.completed_jobs,
        final_backlog = summary.final_backlog,
        final_counts = %summary.final_counts,
        "simulation finished"
    );
}
