//! Readiness polling with a single-flight remediation trigger.
//!
//! ```text
//! start() ──spawn──▶ poll loop (owns OrchestrationRun)
//!                        │  status() every poll_interval
//!                        │  not target & untriggered ──spawn──▶ remediation task
//!                        │                                          │ oneshot
//!                        │◀──────────── result (logged only) ───────┘
//!                        ▼
//!                 sink.complete(outcome) ──watch──▶ RunHandle::wait()
//! ```
//!
//! All run state lives inside the loop task. Callers hold a [`RunHandle`] and
//! can only cancel or wait.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::capability::{EventSink, RemediationAction, StatusProvider};
use crate::config::OrchestratorConfig;
use crate::error::{ReadinessError, Result, RunFailure};
use crate::run::{OrchestrationRun, RunId, RunOutcome, RunState};
use crate::trigger::SingleFlight;

// ─── Orchestrator ─────────────────────────────────────────────────────────

/// Starts readiness runs with a fixed, pre-validated configuration.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Spawn a polling loop on the current Tokio runtime and return at once.
    ///
    /// The first status query happens immediately. Fails only when called
    /// outside a runtime.
    pub fn start<P, R, S>(&self, provider: P, remediation: R, sink: S) -> Result<RunHandle>
    where
        P: StatusProvider + 'static,
        R: RemediationAction + 'static,
        S: EventSink + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ReadinessError::NoRuntime)?;

        let run = OrchestrationRun::new(
            self.config.target_status.clone(),
            self.config.poll_interval,
        );
        let id = run.id;
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);

        let span = tracing::info_span!(
            "readiness",
            run_id = %id.short(),
            target = %self.config.target_status,
        );
        let poll = PollLoop {
            config: self.config.clone(),
            run: run.clone(),
            guard: SingleFlight::new(),
            provider: Arc::new(provider),
            remediation: Arc::new(remediation),
            sink: Arc::new(sink),
            cancel: cancel.clone(),
            open: Arc::new(AtomicBool::new(true)),
            failures: 0,
        };
        runtime.spawn(
            async move {
                let outcome = poll.drive().await;
                let _ = tx.send(Some(outcome));
            }
            .instrument(span),
        );

        Ok(RunHandle {
            id,
            seed: Arc::new(run),
            cancel,
            outcome: rx,
        })
    }
}

/// Validate `config` and start a run with it.
pub fn start<P, R, S>(
    config: OrchestratorConfig,
    provider: P,
    remediation: R,
    sink: S,
) -> Result<RunHandle>
where
    P: StatusProvider + 'static,
    R: RemediationAction + 'static,
    S: EventSink + 'static,
{
    Orchestrator::new(config)?.start(provider, remediation, sink)
}

// ─── RunHandle ────────────────────────────────────────────────────────────

/// The caller's side of a run. Cheap to clone; every clone sees the same run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    /// Snapshot at start, used only if the loop vanishes without an outcome.
    seed: Arc<OrchestrationRun>,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<RunOutcome>>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Ask the loop to stop. Takes effect at the next suspension point; an
    /// in-flight remediation is left to finish but its result is ignored.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(run_id = %self.id.short(), "cancel requested");
        }
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// The terminal outcome, if the run has finished.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait for the terminal outcome.
    ///
    /// Returns only after the sink has received its `complete` call.
    pub async fn wait(&self) -> RunOutcome {
        let mut rx = self.outcome.clone();
        if let Ok(current) = rx.wait_for(Option::is_some).await {
            if let Some(outcome) = current.as_ref() {
                return outcome.clone();
            }
        }

        // The loop task was dropped (runtime shutdown or panic).
        let mut run = (*self.seed).clone();
        let _ = run.transition(RunState::Failed);
        RunOutcome {
            state: RunState::Failed,
            failure: Some(RunFailure::Aborted),
            run,
        }
    }
}

// ─── Poll loop ────────────────────────────────────────────────────────────

type RemediationResult = oneshot::Receiver<Result<()>>;

enum Wake<T> {
    Ready(T),
    Cancelled,
    Expired,
}

struct PollLoop {
    config: OrchestratorConfig,
    run: OrchestrationRun,
    guard: SingleFlight,
    provider: Arc<dyn StatusProvider>,
    remediation: Arc<dyn RemediationAction>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    /// Cleared when the run ends so a lingering remediation stops logging.
    open: Arc<AtomicBool>,
    failures: u32,
}

impl PollLoop {
    async fn drive(mut self) -> RunOutcome {
        // A deadline too far out to represent is the same as none.
        let deadline = self
            .config
            .deadline
            .and_then(|d| Instant::now().checked_add(d));
        let expired = expire_at(deadline);
        tokio::pin!(expired);
        let mut remediation: Option<RemediationResult> = None;

        info!(
            interval = ?self.config.poll_interval,
            deadline = ?self.config.deadline,
            "readiness run started"
        );

        let (state, failure) = loop {
            if self.cancel.is_cancelled() {
                break self.cancelled();
            }

            // Query, unless cancelled or out of time first.
            let cancel = self.cancel.clone();
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = &mut expired => Wake::Expired,
                r = self.query_status() => Wake::Ready(r),
            };
            let result = match polled {
                Wake::Ready(r) => r,
                Wake::Cancelled => break self.cancelled(),
                Wake::Expired => break self.expired(),
            };
            self.run.polls += 1;

            // React to what came back.
            match result {
                Ok(status) => {
                    self.failures = 0;
                    self.sink.log(&format!("status: {status}"));
                    debug!(poll = self.run.polls, status = %status, "observed status");
                    let reached = self.run.is_target(&status);
                    self.run.record_status(status);
                    if reached {
                        break (RunState::Succeeded, None);
                    }
                    if self.guard.try_claim() {
                        remediation = Some(self.trigger());
                    }
                }
                Err(e) => {
                    self.failures += 1;
                    let message = e.to_string();
                    warn!(consecutive = self.failures, "status query failed: {message}");
                    self.sink.log(&format!(
                        "status query failed ({} in a row): {message}",
                        self.failures
                    ));
                    if let Some(max) = self.config.max_consecutive_failures {
                        if self.failures >= max {
                            break (
                                RunState::Failed,
                                Some(RunFailure::StatusQueryLimit {
                                    consecutive: self.failures,
                                    last_error: message,
                                }),
                            );
                        }
                    }
                }
            }

            // Sleep until the next tick, logging remediation as it finishes.
            let next_tick = tokio::time::sleep(self.config.poll_interval);
            tokio::pin!(next_tick);
            let woke = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Wake::Cancelled,
                    _ = &mut expired => break Wake::Expired,
                    res = remediation_finished(&mut remediation) => {
                        remediation = None;
                        self.on_remediation_finished(res);
                    }
                    _ = &mut next_tick => break Wake::Ready(()),
                }
            };
            match woke {
                Wake::Ready(()) => {}
                Wake::Cancelled => break self.cancelled(),
                Wake::Expired => break self.expired(),
            }
        };

        self.finish(state, failure)
    }

    async fn query_status(&self) -> Result<String> {
        match self.config.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.status())
                .await
                .unwrap_or_else(|_| {
                    Err(ReadinessError::StatusQuery(format!(
                        "no answer within {limit:?}"
                    )))
                }),
            None => self.provider.status().await,
        }
    }

    /// Fire the remediation on its own task. Called at most once per run.
    fn trigger(&mut self) -> RemediationResult {
        if let Err(e) = self.run.mark_triggered() {
            warn!("{e}");
        }
        self.enter(RunState::Remediating);

        let observed = self.run.last_observed_status.as_deref().unwrap_or("unknown");
        info!(status = %observed, "target not reached, starting remediation");
        self.sink.log(&format!(
            "status {observed} is not {}; starting remediation",
            self.run.target_status
        ));

        let (tx, rx) = oneshot::channel();
        let action = Arc::clone(&self.remediation);
        let sink = GatedSink {
            inner: Arc::clone(&self.sink),
            open: Arc::clone(&self.open),
        };
        tokio::spawn(
            async move {
                let res = action.run(&sink).await;
                let _ = tx.send(res);
            }
            .in_current_span(),
        );

        self.enter(RunState::Polling);
        rx
    }

    fn on_remediation_finished(&self, res: Result<()>) {
        match res {
            Ok(()) => {
                info!("remediation finished");
                self.sink.log("remediation finished");
            }
            Err(e) => {
                warn!("{e}");
                self.sink.log(&format!("{e}; continuing to poll"));
            }
        }
    }

    fn cancelled(&self) -> (RunState, Option<RunFailure>) {
        self.sink.log("cancellation requested; stopping");
        (RunState::Cancelled, None)
    }

    fn expired(&self) -> (RunState, Option<RunFailure>) {
        let after = self.config.deadline.unwrap_or(Duration::ZERO);
        self.sink.log(&format!("timed out after {after:?}"));
        (
            RunState::Failed,
            Some(RunFailure::TimeoutExceeded {
                after,
                last_status: self.run.last_observed_status.clone(),
            }),
        )
    }

    fn enter(&mut self, next: RunState) {
        if let Err(e) = self.run.transition(next) {
            warn!("{e}");
        }
    }

    fn finish(mut self, state: RunState, failure: Option<RunFailure>) -> RunOutcome {
        self.enter(state);
        self.open.store(false, Ordering::Release);

        let outcome = RunOutcome {
            state,
            failure,
            run: self.run,
        };
        match state {
            RunState::Succeeded => info!(polls = outcome.run.polls, "readiness run succeeded"),
            _ => warn!(polls = outcome.run.polls, "readiness run ended: {outcome}"),
        }
        self.sink.complete(&outcome);
        outcome
    }
}

/// Resolves at `deadline`, or never.
fn expire_at(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

/// Resolves when the spawned remediation reports, or never if none is running.
async fn remediation_finished(rx: &mut Option<RemediationResult>) -> Result<()> {
    match rx {
        Some(rx) => rx.await.unwrap_or_else(|_| {
            Err(ReadinessError::Remediation(
                "remediation task ended without reporting".into(),
            ))
        }),
        None => std::future::pending().await,
    }
}

/// The sink handed to the remediation: passes lines through while the run is
/// open and drops them afterwards. Never completes a run.
struct GatedSink {
    inner: Arc<dyn EventSink>,
    open: Arc<AtomicBool>,
}

impl EventSink for GatedSink {
    fn log(&self, line: &str) {
        if self.open.load(Ordering::Acquire) {
            self.inner.log(line);
        }
    }

    fn complete(&self, _outcome: &RunOutcome) {}
}

// ─── Tests ────────────────────────────────────────────────────────────────
