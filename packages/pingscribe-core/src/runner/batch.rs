//! Concurrent batch execution over a bounded worker pool.
//!
//! A fixed number of worker tasks pull target indices from a shared cursor,
//! run invoke-then-parse for each, and send the outcome back tagged with the
//! input index. Results land in input-order slots, so the report order never
//! depends on completion order, and one slow or broken target never blocks
//! the rest.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::parser::PingStats;
use crate::runner::{InvocationSpec, PingTarget, ProbeFailure, invoke_with_deadline};

/// Upper bound on concurrent ping processes, however large the request.
const MAX_WORKERS: usize = 128;

/// Caller-side misconfiguration; the only errors that abort a batch, and
/// they do so before any execution begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchConfigError {
    #[error("no targets were given")]
    NoTargets,
    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

/// Batch-level knobs, separate from the per-invocation spec.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Workers in flight at once; defaults to twice the CPU count.
    pub max_workers: Option<usize>,
    /// Overall wall-clock bound; shrinks the per-invocation deadline of
    /// targets still queued as it approaches.
    pub batch_deadline: Option<Duration>,
}

/// What happened to one target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TargetOutcome {
    Ok {
        stats: PingStats,
    },
    Failed {
        kind: super::FailureKind,
        message: String,
    },
}

impl TargetOutcome {
    fn from_result(result: Result<PingStats, ProbeFailure>) -> Self {
        match result {
            Ok(stats) => TargetOutcome::Ok { stats },
            Err(failure) => TargetOutcome::Failed {
                kind: failure.kind(),
                message: failure.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TargetOutcome::Ok { .. })
    }
}

/// One entry of the batch report: the target's literal identity plus either
/// its statistics or its failure.
#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub target: String,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

/// Terminal artifact of a batch run, ordered like the input.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<TargetResult>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.ok_count()
    }
}

/// Worker count when the caller does not pick one: twice the available
/// cores, decided here once rather than read from ambient state later.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
        .min(MAX_WORKERS)
}

/// Run every target through invoke-then-parse under a bounded worker pool.
///
/// The report always contains exactly one entry per input target, in input
/// order. Per-target failures (launch errors, timeouts, unparsable output)
/// are data in the report; only an empty target list or a zero worker count
/// fail the call itself.
pub async fn run_batch(
    targets: Vec<PingTarget>,
    spec: InvocationSpec,
    options: BatchOptions,
) -> Result<BatchReport, BatchConfigError> {
    if targets.is_empty() {
        return Err(BatchConfigError::NoTargets);
    }
    let workers = match options.max_workers {
        Some(0) => return Err(BatchConfigError::ZeroWorkers),
        Some(n) => n.min(MAX_WORKERS),
        None => default_worker_count(),
    }
    .min(targets.len());

    let started = Instant::now();
    let batch_deadline = options.batch_deadline.map(|d| started + d);

    tracing::info!(
        targets = targets.len(),
        workers,
        batch_deadline = ?options.batch_deadline,
        "starting ping batch"
    );

    let jobs: Arc<[PingTarget]> = targets.into();
    let spec = Arc::new(spec);
    let cursor = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::channel::<(usize, TargetResult)>(jobs.len());

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let tx = tx.clone();
        let jobs = Arc::clone(&jobs);
        let spec = Arc::clone(&spec);
        let cursor = Arc::clone(&cursor);

        handles.push(tokio::spawn(async move {
            loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                if idx >= jobs.len() {
                    break;
                }
                let target = &jobs[idx];
                tracing::debug!(target = %target, index = idx, "target running");

                let outcome = run_one(target, &spec, batch_deadline).await;
                match &outcome {
                    TargetOutcome::Ok { .. } => {
                        tracing::debug!(target = %target, "target parsed")
                    }
                    TargetOutcome::Failed { kind, message } => {
                        tracing::warn!(target = %target, ?kind, %message, "target failed")
                    }
                }

                let entry = TargetResult {
                    target: target.to_string(),
                    outcome,
                };
                if tx.send((idx, entry)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    // Each worker writes only to its own claimed slots, keyed by input
    // index, so assembly needs no further ordering work.
    let mut slots: Vec<Option<TargetResult>> = vec![None; jobs.len()];
    while let Some((idx, entry)) = rx.recv().await {
        slots[idx] = Some(entry);
    }

    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "batch worker aborted");
        }
    }

    Ok(assemble_report(&jobs, slots, started.elapsed()))
}

/// Run a single target to its terminal state.
async fn run_one(
    target: &PingTarget,
    spec: &InvocationSpec,
    batch_deadline: Option<Instant>,
) -> TargetOutcome {
    let deadline = match effective_deadline(spec.deadline, batch_deadline) {
        Ok(deadline) => deadline,
        Err(expired) => {
            return TargetOutcome::from_result(Err(ProbeFailure::Timeout(expired)));
        }
    };

    let result = match invoke_with_deadline(target, spec, deadline).await {
        Ok(capture) => super::classify(&capture, spec),
        Err(failure) => Err(failure),
    };
    TargetOutcome::from_result(result)
}

/// Per-invocation deadline after applying the batch bound. A target picked
/// up once the batch deadline has already passed fails fast.
fn effective_deadline(
    per_target: Option<Duration>,
    batch_deadline: Option<Instant>,
) -> Result<Option<Duration>, Duration> {
    let Some(batch_deadline) = batch_deadline else {
        return Ok(per_target);
    };
    let remaining = batch_deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(Duration::ZERO);
    }
    Ok(Some(match per_target {
        Some(limit) => limit.min(remaining),
        None => remaining,
    }))
}

/// Assemble the final report from the indexed slots.
fn assemble_report(
    jobs: &[PingTarget],
    slots: Vec<Option<TargetResult>>,
    elapsed: Duration,
) -> BatchReport {
    let results = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| TargetResult {
                target: jobs[idx].to_string(),
                outcome: TargetOutcome::Failed {
                    kind: super::FailureKind::Invocation,
                    message: "worker terminated before producing a result".to_string(),
                },
            })
        })
        .collect();

    BatchReport {
        results,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}
