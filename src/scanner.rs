use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::probe::Probe;
use crate::types::{ProbeOutcome, ScanResults, Target};

/// Receives per-target start/finish events from the scheduler.
///
/// Both hooks run synchronously on the scheduler's coordinator loop, so they
/// should only record or render, never block.
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, _target: &Target) {}
    fn on_finish(&self, _target: &Target, _outcome: &ProbeOutcome) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Probe every target exactly once with at most `concurrency` probes in flight.
///
/// - Freed slots are refilled as soon as any probe resolves, so one slow target
///   never holds back the others.
/// - Outcomes are returned in completion order, not input order.
/// - A `concurrency` of zero is treated as one.
pub async fn scan_targets<P: Probe>(
    targets: &[Target],
    probe: Arc<P>,
    concurrency: usize,
    reporter: &dyn ProgressReporter,
) -> ScanResults {
    scan_targets_with_cancel(
        targets,
        probe,
        concurrency,
        reporter,
        CancellationToken::new(),
    )
    .await
}

/// Variant that stops launching new probes once `cancel` fires.
///
/// Probes already in flight still resolve (each is bounded by its own
/// timeout) and are recorded.
pub async fn scan_targets_with_cancel<P: Probe>(
    targets: &[Target],
    probe: Arc<P>,
    concurrency: usize,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> ScanResults {
    let ceiling = concurrency.max(1);
    let started = Instant::now();
    info!(
        targets = targets.len(),
        concurrency = ceiling,
        mode = %probe.mode(),
        "scan starting"
    );

    let mut state = RunState::new(targets.len());
    loop {
        while state.in_flight.len() < ceiling
            && state.cursor < targets.len()
            && !cancel.is_cancelled()
        {
            let target = &targets[state.cursor];
            state.cursor += 1;
            let probe = Arc::clone(&probe);
            let owned = target.clone();
            let handle = state.in_flight.spawn(async move { probe.probe(&owned).await });
            state.launched.insert(handle.id(), (target, Instant::now()));
            reporter.on_start(target);
        }

        let Some(joined) = state.in_flight.join_next_with_id().await else {
            break;
        };
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(e) => {
                let id = e.id();
                // Every spawned task id is inserted into `launched` before the
                // next join, so a miss here would drop an outcome.
                let Some(&(target, launched_at)) = state.launched.get(&id) else {
                    debug_assert!(false, "join error for untracked task {id}");
                    warn!(error = %e, "probe task ended without a known target");
                    continue;
                };
                warn!(%target, error = %e, "probe task aborted");
                let outcome = ProbeOutcome::failed(
                    target,
                    probe.mode(),
                    format!("probe task failed: {e}"),
                    launched_at.elapsed(),
                );
                (id, outcome)
            }
        };
        if let Some((target, _)) = state.launched.remove(&id) {
            reporter.on_finish(target, &outcome);
        }
        debug!(
            host = %outcome.host,
            port = outcome.port,
            reachable = outcome.reachable,
            "probe finished"
        );
        state.results.record(outcome);
    }

    if state.cursor < targets.len() {
        warn!(
            skipped = targets.len() - state.cursor,
            "scan cancelled before all targets were launched"
        );
    }
    info!(
        done = state.results.scanned_done,
        reachable = state.results.reachable_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scan finished"
    );
    state.results
}

/// Mutable state of one run, owned by the coordinator loop alone.
struct RunState<'a> {
    cursor: usize,
    in_flight: JoinSet<ProbeOutcome>,
    launched: HashMap<Id, (&'a Target, Instant)>,
    results: ScanResults,
}

impl<'a> RunState<'a> {
    fn new(total: usize) -> Self {
        Self {
            cursor: 0,
            in_flight: JoinSet::new(),
            launched: HashMap::new(),
            results: ScanResults::with_capacity(total),
        }
    }
}
