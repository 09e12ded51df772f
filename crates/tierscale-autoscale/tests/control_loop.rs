//! Control loop integration tests.
//!
//! Drives a `ScalingController` over several ticks against an in-memory
//! backend whose workers become ready as soon as they are requested.

use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::time::Duration;

use tierscale_autoscale::*;
use tierscale_core::{CalculatorConfig, Tier, TierCounts};
use tokio::sync::watch;

#[derive(Default)]
struct InstantBackend {
    counts: TierCounts,
    queue_len: u64,
    unavailable: bool,
    set_calls: Vec<(Tier, u32)>,
}

impl TierBackend for InstantBackend {
    fn counts(&mut self) -> BackendResult<TierCounts> {
        if self.unavailable {
            return Err(BackendError::Unavailable("orchestrator down".into()));
        }
        Ok(self.counts)
    }

    fn ready_counts(&mut self) -> BackendResult<TierCounts> {
        Ok(self.counts)
    }

    fn queue_len(&mut self) -> BackendResult<u64> {
        Ok(self.queue_len)
    }

    fn set_count(&mut self, tier: Tier, count: u32) {
        self.set_calls.push((tier, count));
        self.counts.set(tier, count);
    }
}

fn controller(window: usize, max_fast: u32) -> ScalingController<InstantBackend> {
    let config = ControllerConfig {
        calculator: CalculatorConfig {
            target: 10,
            spot_target: 5,
            run: 2,
            spinup: 1,
        },
        window: NonZeroUsize::new(window).unwrap(),
        max_fast,
    };
    let backend = InstantBackend {
        counts: TierCounts::new(1, 0, 0),
        ..Default::default()
    };
    ScalingController::new(backend, config).unwrap()
}

#[test]
fn downscale_waits_for_the_window_to_forget_the_spike() {
    let mut ctl = controller(3, 96);

    ctl.backend_mut().queue_len = 100;
    let spike = ctl.tick();
    assert_eq!(
        spike.changes(),
        [
            TierChange { tier: Tier::Fast, from: 0, to: 19 },
            TierChange { tier: Tier::Spot, from: 0, to: 20 },
        ]
    );

    // Backlog collapses: demand drops to fast=1 spot=2, but the spike is
    // still in the window so nothing shrinks for two ticks.
    ctl.backend_mut().queue_len = 10;
    for _ in 0..2 {
        let outcome = ctl.tick();
        assert_eq!(outcome.report().unwrap().desired, TierCounts::new(1, 1, 2));
        assert!(outcome.changes().is_empty());
    }
    assert_eq!(ctl.backend().counts, TierCounts::new(1, 19, 20));

    // Third low tick evicts the spike.
    let outcome = ctl.tick();
    assert_eq!(
        outcome.changes(),
        [
            TierChange { tier: Tier::Fast, from: 19, to: 1 },
            TierChange { tier: Tier::Spot, from: 20, to: 2 },
        ]
    );
    assert_eq!(ctl.backend().counts, TierCounts::new(1, 1, 2));
}

#[test]
fn upscale_is_never_delayed() {
    let mut ctl = controller(8, 1_000);

    ctl.backend_mut().queue_len = 10;
    ctl.tick();
    let before = ctl.backend().counts;

    ctl.backend_mut().queue_len = 1_000;
    let outcome = ctl.tick();
    let applied = outcome.report().unwrap().applied;
    assert!(applied.fast > before.fast);
    assert_eq!(applied, outcome.report().unwrap().desired);
    assert_eq!(ctl.backend().counts, applied);
}

#[test]
fn skipped_tick_leaves_no_trace() {
    let mut ctl = controller(8, 96);
    ctl.backend_mut().queue_len = 100;
    ctl.tick();
    let calls_before = ctl.backend().set_calls.len();

    ctl.backend_mut().unavailable = true;
    ctl.backend_mut().queue_len = 5_000;
    let outcome = ctl.tick();
    assert_eq!(
        outcome,
        TickOutcome::Skipped(BackendError::Unavailable("orchestrator down".into()))
    );
    assert_eq!(ctl.history().len(), 1);
    assert_eq!(ctl.backend().set_calls.len(), calls_before);

    // Next tick heals on its own.
    ctl.backend_mut().unavailable = false;
    assert!(!ctl.tick().is_skipped());
    assert_eq!(ctl.history().len(), 2);
}

#[test]
fn fast_overflow_lands_in_spot_every_tick() {
    let mut ctl = controller(8, 10);
    ctl.backend_mut().queue_len = 100;

    let report = ctl.tick().report().cloned().unwrap();
    // Uncapped demand is fast=19 spot=20; 9 fast workers spill over.
    assert_eq!(report.desired, TierCounts::new(1, 19, 20));
    assert_eq!(report.applied, TierCounts::new(1, 10, 29));
    assert_eq!(ctl.backend().counts, TierCounts::new(1, 10, 29));
    assert!(ctl.history().iter().all(|req| req.fast == 19));
}

#[test]
fn history_is_bounded_over_many_ticks() {
    let mut ctl = controller(4, 96);
    for qlen in [0, 50, 100, 400, 30, 0, 0, 0, 0, 7] {
        ctl.backend_mut().queue_len = qlen;
        ctl.tick();
        assert!(ctl.history().len() <= 4);
    }
    assert_eq!(ctl.history().len(), 4);
    assert_eq!(ctl.backend().counts.base, 1, "base is never resized");
}

#[tokio::test(start_paused = true)]
async fn run_with_stops_when_callback_breaks() {
    let mut ctl = controller(8, 96);
    ctl.backend_mut().queue_len = 100;
    let (_tx, rx) = watch::channel(false);

    let mut ticks = 0;
    ctl.run_with(Duration::from_secs(5), rx, |backend, outcome| {
        ticks += 1;
        assert!(!outcome.is_skipped());
        backend.queue_len = backend.queue_len.saturating_sub(40);
        if ticks == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .await;

    assert_eq!(ticks, 3);
    assert_eq!(ctl.history().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_stops_on_shutdown() {
    let mut ctl = controller(8, 96);
    let (tx, rx) = watch::channel(false);

    let stopper = async move {
        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(true).unwrap();
    };
    tokio::join!(ctl.run(Duration::from_millis(10), rx), stopper);

    assert!(!ctl.history().is_empty());
}
