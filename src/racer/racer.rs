use super::attempt::{AttemptOutcome, AttemptReport, SubmissionAttempt};
use super::policy::RetryPolicy;
use crate::chain::TransactionBuilder;
use crate::clock::Clock;
use crate::endpoint_pool::{CandidateSet, Endpoint, EndpointPool};
use crate::errors::{BroadcastError, FailureClass};
use crate::metrics::metrics;
use crate::reporter::{EventBus, ProgressEvent};
use crate::types::{ExhaustReason, RunResult, SubmissionHandle, TxTemplate};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

enum RoundOutcome {
    Won {
        handle: SubmissionHandle,
        endpoint: String,
    },
    Stopped {
        endpoint: String,
        message: String,
    },
    Failed(String),
}

/// How a round ended, plus one settled record per launched attempt.
/// Attempts still in flight after a win or stop stay `Pending`.
struct RoundRecord {
    outcome: RoundOutcome,
    attempts: Vec<SubmissionAttempt>,
}

/// Races one submission across endpoints, round after round, at most once
/// per instance.
///
/// The first caller of [`run`](Self::run) drives the campaign; every later
/// or concurrent caller waits for and receives the same [`RunResult`].
#[derive(Debug)]
pub struct SubmissionRacer {
    builder: Arc<dyn TransactionBuilder>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    candidates: CandidateSet,
    attempted: AtomicBool,
    outcome: watch::Sender<Option<RunResult>>,
    rounds_started: AtomicU32,
}

/// Publishes `Abandoned` if the driving future is dropped mid-campaign, so
/// callers waiting on the memoized result are released.
struct AbandonGuard<'a> {
    racer: &'a SubmissionRacer,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let attempts = self.racer.rounds_started();
        let abandoned = RunResult::Exhausted {
            attempts,
            reason: ExhaustReason::Abandoned,
        };
        let published = self.racer.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(abandoned.clone());
            true
        });

        if published {
            warn!(attempts, "Campaign dropped before finishing");
            metrics().runs_exhausted.inc();
            self.racer.events.emit(ProgressEvent::Finished(abandoned));
        }
    }
}

impl SubmissionRacer {
    pub fn new(builder: Arc<dyn TransactionBuilder>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let (outcome, _rx) = watch::channel(None);
        Self {
            builder,
            clock,
            events,
            candidates: CandidateSet::default(),
            attempted: AtomicBool::new(false),
            outcome,
            rounds_started: AtomicU32::new(0),
        }
    }

    pub fn with_candidates(mut self, candidates: CandidateSet) -> Self {
        self.candidates = candidates;
        self
    }

    /// Whether a campaign has been started on this instance
    pub fn attempted(&self) -> bool {
        self.attempted.load(Ordering::Acquire)
    }

    pub fn rounds_started(&self) -> u32 {
        self.rounds_started.load(Ordering::Relaxed)
    }

    /// Outcome of the finished campaign, if any
    pub fn result(&self) -> Option<RunResult> {
        self.outcome.borrow().clone()
    }

    pub async fn run(&self, template: &TxTemplate, pool: &EndpointPool, policy: &RetryPolicy) -> RunResult {
        if let Err(e) = self.claim() {
            debug!(reason = %e, "Campaign already claimed, awaiting its result");
            return self.memoized().await;
        }

        let _abandon = AbandonGuard { racer: self };
        let started = Instant::now();
        let result = self.campaign(template, pool, policy).await;

        metrics().run_duration.observe(started.elapsed().as_secs_f64());
        if result.is_success() {
            metrics().runs_success.inc();
        } else {
            metrics().runs_exhausted.inc();
        }

        self.events.emit(ProgressEvent::Finished(result.clone()));
        self.outcome.send_replace(Some(result.clone()));
        result
    }

    fn claim(&self) -> Result<(), BroadcastError> {
        self.attempted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| BroadcastError::AlreadyAttempted)
    }

    async fn memoized(&self) -> RunResult {
        let mut rx = self.outcome.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(result) => result.clone(),
            Err(_) => None,
        };
        result.unwrap_or(RunResult::Exhausted {
            attempts: 0,
            reason: ExhaustReason::RetriesExhausted,
        })
    }

    #[instrument(
        skip_all,
        fields(context_id = %self.events.correlation_id(), account = %template.from, max_attempts = policy.max_attempts)
    )]
    async fn campaign(&self, template: &TxTemplate, pool: &EndpointPool, policy: &RetryPolicy) -> RunResult {
        let template = Arc::new(template.clone());

        for round in 0..policy.max_attempts {
            self.rounds_started.fetch_add(1, Ordering::Relaxed);
            let attempts = round + 1;

            let record = self.race_round(round, &template, pool, policy).await;
            match record.outcome {
                RoundOutcome::Won { handle, endpoint } => {
                    info!(round = attempts, endpoint = %endpoint, handle = %handle, "🏁 Round won");
                    return RunResult::Success {
                        handle,
                        endpoint,
                        attempts,
                    };
                }
                RoundOutcome::Stopped { endpoint, message } => {
                    warn!(round = attempts, endpoint = %endpoint, error = %message, "🛑 Permanent rejection, stopping");
                    return RunResult::Exhausted {
                        attempts,
                        reason: ExhaustReason::PermanentStop { endpoint, message },
                    };
                }
                RoundOutcome::Failed(reason) => {
                    self.events.emit(ProgressEvent::RoundFailed { round, reason });
                    if attempts < policy.max_attempts {
                        self.between_rounds(&record.attempts, pool, policy).await;
                    }
                }
            }
        }

        RunResult::Exhausted {
            attempts: policy.max_attempts,
            reason: ExhaustReason::RetriesExhausted,
        }
    }

    /// Backoff, overlapped with re-probing endpoints that went silent or
    /// refused connections plus any that are dead, so the next round's
    /// candidate set reflects current liveness.
    async fn between_rounds(&self, attempts: &[SubmissionAttempt], pool: &EndpointPool, policy: &RetryPolicy) {
        let suspects: Vec<Arc<Endpoint>> = attempts
            .iter()
            .filter(|a| a.unreachable())
            .map(|a| Arc::clone(&a.endpoint))
            .collect();

        let refresh = tokio::time::timeout(policy.round_timeout, pool.reprobe(&suspects));
        let (refreshed, ()) = tokio::join!(refresh, self.clock.sleep(policy.backoff));
        if refreshed.is_err() {
            debug!(suspects = suspects.len(), "Endpoint re-probe cut short");
        }
    }

    /// One concurrent fan-out. Returns on the first accepted dispatch, the
    /// first permanent rejection, when every attempt failed, or at the round
    /// deadline. Attempts still in flight are left to finish on their own.
    async fn race_round(
        &self,
        round: u32,
        template: &Arc<TxTemplate>,
        pool: &EndpointPool,
        policy: &RetryPolicy,
    ) -> RoundRecord {
        let deadline = Instant::now() + policy.round_timeout;
        let timeout_ms = policy.round_timeout.as_millis() as u64;

        let mut endpoints = pool.candidates(self.candidates);
        if endpoints.is_empty() {
            match tokio::time::timeout_at(deadline, pool.select_current()).await {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(_) => {
                    return RoundRecord {
                        outcome: RoundOutcome::Failed(format!("no live endpoint within {}ms", timeout_ms)),
                        attempts: Vec::new(),
                    }
                }
            }
        }

        metrics().rounds_total.inc();
        metrics().attempts_total.inc_by(endpoints.len() as u64);
        self.events.emit(ProgressEvent::RoundStarted {
            round,
            endpoints: endpoints.len(),
        });

        let mut attempts: Vec<SubmissionAttempt> = endpoints
            .iter()
            .map(|e| SubmissionAttempt::new(round, Arc::clone(e)))
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<AttemptReport>();
        for (slot, endpoint) in endpoints.iter().enumerate() {
            let mut attempt = SubmissionAttempt::new(round, Arc::clone(endpoint));
            let template = Arc::clone(template);
            let builder = Arc::clone(&self.builder);
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = attempt.execute(&template, builder.as_ref()).await;
                // Receiver is gone once the round is decided
                let _ = tx.send(AttemptReport { slot, attempt, result });
            });
        }
        drop(tx);

        let launched = endpoints.len();
        let outcome = loop {
            let report = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(report)) => report,
                Ok(None) => break RoundOutcome::Failed(format!("all {} attempts failed", launched)),
                Err(_) => {
                    let unanswered = self.settle_unanswered(round, &mut attempts, timeout_ms);
                    break RoundOutcome::Failed(format!(
                        "round timed out after {}ms ({} of {} attempts unanswered)",
                        timeout_ms, unanswered, launched
                    ));
                }
            };

            let AttemptReport { slot, mut attempt, result } = report;
            let endpoint = attempt.endpoint.url().to_string();

            match result {
                Ok(handle) => {
                    attempt.settle(AttemptOutcome::Sent(handle.clone()));
                    attempts[slot] = attempt;
                    break RoundOutcome::Won { handle, endpoint };
                }
                Err(err) => {
                    let message = err.message();
                    let class = policy.classify(&message);
                    attempt.settle(AttemptOutcome::Rejected(err.into_broadcast(&endpoint, class)));
                    attempts[slot] = attempt;

                    metrics()
                        .attempts_failed
                        .with_label_values(&[class.as_str()])
                        .inc();
                    self.events.emit(ProgressEvent::AttemptFailed {
                        round,
                        endpoint: endpoint.clone(),
                        class,
                        message: message.clone(),
                    });

                    if class == FailureClass::PermanentStop {
                        break RoundOutcome::Stopped { endpoint, message };
                    }
                }
            }
        };

        RoundRecord { outcome, attempts }
    }

    /// Mark every attempt without an answer at the deadline as timed out
    fn settle_unanswered(&self, round: u32, attempts: &mut [SubmissionAttempt], timeout_ms: u64) -> usize {
        let mut unanswered = 0;
        for attempt in attempts.iter_mut() {
            if attempt.settle(AttemptOutcome::TimedOut) {
                unanswered += 1;
                self.events.emit(ProgressEvent::AttemptFailed {
                    round,
                    endpoint: attempt.endpoint.url().to_string(),
                    class: FailureClass::Retryable,
                    message: format!("no answer within {}ms", timeout_ms),
                });
            }
        }
        metrics()
            .attempts_failed
            .with_label_values(&["timed_out"])
            .inc_by(unanswered as u64);
        unanswered
    }
}
