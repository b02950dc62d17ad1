/*!
 * Orchestrates one submission end to end: validation gate, quota gate,
 * webhook call, response normalization and quota accounting, plus the
 * cosmetic progress indicator shown while a submission is in flight.
 */

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{error, info, warn};

use super::normalize::normalize;
use super::quota::QuotaTracker;
use super::submission::SubmissionClient;
use super::validator::{self, ValidationError};
use crate::models::{ExtractionOutcome, PlanTier, UploadCandidate};
use crate::session::SessionContext;

const PROGRESS_TICK: Duration = Duration::from_millis(300);
const PROGRESS_STEP: u8 = 10;
/// In-flight progress never reaches 100 until the submission resolves.
const PROGRESS_CAP: u8 = 90;
const PROGRESS_RESET_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No file in play.
    Idle,
    /// A file passed validation and is about to be submitted.
    Ready,
    /// One submission in flight; further submits are refused.
    Submitting,
}

/// A submission that never made it into flight. Distinct from a `Failure`
/// outcome: no network call to the OCR service happened and no quota moved.
#[derive(Debug, thiserror::Error)]
pub enum SubmitRefused {
    #[error("A submission is already in progress")]
    AlreadySubmitting,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Monthly extraction limit reached ({limit} per month on the {plan} plan)")]
    QuotaExhausted { limit: i64, plan: PlanTier },
}

/// One controller per session; a single logical submission at a time. No
/// cancellation: once in flight, a submission runs to completion before the
/// state resets.
pub struct UploadController {
    session: Arc<SessionContext>,
    submission: SubmissionClient,
    quota: Arc<QuotaTracker>,
    state: Mutex<ControllerState>,
    progress: Arc<AtomicU8>,
    in_flight: Arc<AtomicBool>,
}

impl UploadController {
    pub fn new(
        session: Arc<SessionContext>,
        submission: SubmissionClient,
        quota: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            session,
            submission,
            quota,
            state: Mutex::new(ControllerState::Idle),
            progress: Arc::new(AtomicU8::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cosmetic progress value, 0-100. Time-based, not byte-based.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Run one submission. Refusals (validation, quota, concurrent submit)
    /// happen before any OCR call; every accepted submission produces an
    /// outcome and returns the controller to `Idle`.
    pub async fn submit(
        &self,
        candidate: UploadCandidate,
    ) -> Result<ExtractionOutcome, SubmitRefused> {
        // Best-effort refresh of the local counter copy. The gate itself is
        // advisory and runs against the cached count.
        if let Err(e) = self.quota.refresh().await {
            warn!(
                user_id = %self.session.user_id,
                "could not refresh extraction counter, using cached count: {e}"
            );
        }

        self.begin(&candidate)?;
        self.spawn_progress_ticker();

        let outcome = match self.submission.submit(&candidate).await {
            Ok(raw) => normalize(&raw),
            Err(e) => ExtractionOutcome::Failure {
                message: format!("Error: {e}"),
            },
        };

        match &outcome {
            ExtractionOutcome::Success { .. } => {
                // Exactly one unit of usage per successful extraction. A
                // store failure here is reported but never revokes the text
                // already produced for the user.
                match self.quota.record_extraction().await {
                    Ok(count) => {
                        info!(
                            user_id = %self.session.user_id,
                            count,
                            "extraction recorded"
                        );
                    }
                    Err(e) => {
                        error!(
                            user_id = %self.session.user_id,
                            "failed to record extraction: {e}"
                        );
                    }
                }
            }
            ExtractionOutcome::Failure { message } => {
                info!(
                    user_id = %self.session.user_id,
                    "extraction failed without consuming quota: {message}"
                );
            }
        }

        self.finish();
        Ok(outcome)
    }

    /// Idle -> Ready -> Submitting under one lock, so a second submit can
    /// never slip in between validation and the in-flight guard.
    fn begin(&self, candidate: &UploadCandidate) -> Result<(), SubmitRefused> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ControllerState::Submitting {
            return Err(SubmitRefused::AlreadySubmitting);
        }

        validator::validate(candidate, self.session.plan())?;
        *state = ControllerState::Ready;

        if !self.quota.can_submit_now() {
            *state = ControllerState::Idle;
            let plan = self.session.plan();
            return Err(SubmitRefused::QuotaExhausted {
                limit: plan.monthly_extraction_limit(),
                plan,
            });
        }

        *state = ControllerState::Submitting;
        self.progress.store(0, Ordering::Relaxed);
        self.in_flight.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Submitting -> Idle, always, success or failure.
    fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
        self.progress.store(100, Ordering::Relaxed);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ControllerState::Idle;

        let progress = Arc::clone(&self.progress);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            tokio::time::sleep(PROGRESS_RESET_DELAY).await;
            if !in_flight.load(Ordering::SeqCst) {
                progress.store(0, Ordering::Relaxed);
            }
        });
    }

    /// Ticker stepping the indicator while the submission is in flight.
    /// Purely cosmetic; independent of actual transfer progress.
    fn spawn_progress_ticker(&self) {
        let progress = Arc::clone(&self.progress);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            interval.tick().await;
            while in_flight.load(Ordering::SeqCst) {
                interval.tick().await;
                if !in_flight.load(Ordering::SeqCst) {
                    break;
                }
                let current = progress.load(Ordering::Relaxed);
                if current < PROGRESS_CAP {
                    progress.store(current + PROGRESS_STEP, Ordering::Relaxed);
                }
            }
        });
    }
}
