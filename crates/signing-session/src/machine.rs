//! Signing session state machine
//!
//! Client-side states around the server-communicated step. The machine
//! starts in `Loading`, lands in `Loaded` with the server payload, and
//! wraps in-flight mutations in transient `Submitting`/`Proceeding`
//! states that gate duplicate actions. `Failed` is terminal: the user
//! recovers by reloading or through the access-request flow.
//!
//! The machine never decides the next step itself. After any successful
//! round-trip it branches solely on the step the server returned.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{classify_transport_error, ErrorPhase, SessionError};
use crate::reconcile::SigningOutcome;
use crate::session::{FieldResponse, SessionPayload, SessionStep};
use crate::transport::SessionTransport;
use crate::validator::{validate_responses, InvalidFields, ResponseMap};

/// Cadence of the waiting-step session refetch.
pub const WAITING_POLL_PERIOD: Duration = Duration::from_secs(30);

/// Client-side machine status.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineStatus {
    Loading,
    Loaded(SessionPayload),
    /// Submit round-trip outstanding; the wrapped payload is the state
    /// the submit was issued from.
    Submitting(SessionPayload),
    /// Proceed round-trip outstanding.
    Proceeding(SessionPayload),
    /// Terminal; no automatic retries.
    Failed(SessionError),
}

/// What the owning view should render. Transient statuses that would have
/// nothing to show fall back to `Loading`; the view never renders an
/// absent payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewState<'a> {
    Loading,
    Session {
        payload: &'a SessionPayload,
        /// A mutating round-trip is outstanding; disable the triggering
        /// action but keep reads interactive.
        busy: bool,
    },
    Failed(&'a SessionError),
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Round-trip completed; the machine now holds the server's new step.
    Accepted,
    /// Validation blocked the submit; no network call was made. Carries
    /// the ids now surfaced as invalid.
    Rejected(Vec<String>),
    /// The signer has not ticked agreement; no network call was made.
    NotAgreed,
    /// The machine was not in a state that accepts this action.
    NotActionable,
    /// The round-trip failed; the machine is now `Failed`.
    Failed,
}

/// The state machine for one signer token.
pub struct SessionMachine<T: SessionTransport + ?Sized> {
    transport: Arc<T>,
    token: String,
    status: MachineStatus,
    invalid: InvalidFields,
    /// Bumped whenever the machine is re-pointed at a new token; loops
    /// holding a stale epoch stop without touching state.
    epoch: u64,
}

impl<T: SessionTransport + ?Sized> SessionMachine<T> {
    pub fn new(transport: Arc<T>, token: impl Into<String>) -> Self {
        Self {
            transport,
            token: token.into(),
            status: MachineStatus::Loading,
            invalid: InvalidFields::default(),
            epoch: 0,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn invalid_fields(&self) -> &InvalidFields {
        &self.invalid
    }

    /// Re-point the machine at a new token, discarding in-flight work.
    pub fn reset(&mut self, token: impl Into<String>) {
        self.token = token.into();
        self.status = MachineStatus::Loading;
        self.invalid = InvalidFields::default();
        self.epoch += 1;
    }

    pub fn view_state(&self) -> ViewState<'_> {
        match &self.status {
            MachineStatus::Loading => ViewState::Loading,
            MachineStatus::Loaded(payload) => ViewState::Session {
                payload,
                busy: false,
            },
            MachineStatus::Submitting(payload) | MachineStatus::Proceeding(payload) => {
                ViewState::Session {
                    payload,
                    busy: true,
                }
            }
            MachineStatus::Failed(err) => ViewState::Failed(err),
        }
    }

    /// Initial load (or explicit refresh). A failure is terminal.
    pub async fn load(&mut self) {
        match self.transport.load(&self.token).await {
            Ok(payload) => self.status = MachineStatus::Loaded(payload),
            Err(err) => {
                self.status =
                    MachineStatus::Failed(classify_transport_error(&err, ErrorPhase::Load));
            }
        }
    }

    /// Submit form responses from the preview step.
    ///
    /// Validation runs first, on this attempt's responses; when it fails
    /// the invalid set is surfaced and no network call is attempted.
    pub async fn submit(&mut self, responses: Vec<FieldResponse>, agreed: bool) -> SubmitOutcome {
        let payload = match &self.status {
            MachineStatus::Loaded(p) if p.step == SessionStep::Preview => p,
            _ => return SubmitOutcome::NotActionable,
        };

        if !agreed {
            return SubmitOutcome::NotAgreed;
        }

        if let Some(form) = &payload.form {
            let map: ResponseMap = responses
                .iter()
                .map(|r| (r.field_id.clone(), r.response.clone()))
                .collect();
            let invalid = validate_responses(&form.fields, &map);
            if !invalid.is_empty() {
                let ids: Vec<String> = invalid.iter().cloned().collect();
                self.invalid.replace(invalid);
                return SubmitOutcome::Rejected(ids);
            }
        }

        let MachineStatus::Loaded(payload) = std::mem::replace(&mut self.status, MachineStatus::Loading)
        else {
            unreachable!("status checked above");
        };
        self.status = MachineStatus::Submitting(payload);

        match self.transport.submit(&self.token, &responses).await {
            Ok(next) => {
                self.invalid.clear();
                self.status = MachineStatus::Loaded(next);
                SubmitOutcome::Accepted
            }
            Err(err) => {
                self.status =
                    MachineStatus::Failed(classify_transport_error(&err, ErrorPhase::Submit));
                SubmitOutcome::Failed
            }
        }
    }

    /// Proceed from preview without a form submission (no fields, or
    /// already submitted on a previous visit).
    pub async fn proceed(&mut self) -> SubmitOutcome {
        let MachineStatus::Loaded(payload) = &self.status else {
            return SubmitOutcome::NotActionable;
        };
        if payload.step != SessionStep::Preview {
            return SubmitOutcome::NotActionable;
        }

        let MachineStatus::Loaded(payload) = std::mem::replace(&mut self.status, MachineStatus::Loading)
        else {
            unreachable!("status checked above");
        };
        self.status = MachineStatus::Proceeding(payload);

        match self.transport.proceed(&self.token).await {
            Ok(next) => {
                self.status = MachineStatus::Loaded(next);
                SubmitOutcome::Accepted
            }
            Err(err) => {
                self.status =
                    MachineStatus::Failed(classify_transport_error(&err, ErrorPhase::Submit));
                SubmitOutcome::Failed
            }
        }
    }

    /// Clearing rule: an edit removes the field from the surfaced invalid
    /// set immediately, without re-running validation.
    pub fn edit_field(&mut self, field_id: &str) {
        self.invalid.clear_field(field_id);
    }

    /// One waiting-step poll tick. Failures are swallowed and retried on
    /// the next tick; they never transition to `Failed`. Returns `true`
    /// once the server reports a step other than `waiting`.
    pub async fn poll_waiting_once(&mut self) -> bool {
        match &self.status {
            MachineStatus::Loaded(p) if p.step == SessionStep::Waiting => {}
            _ => return true,
        }

        match self.transport.load(&self.token).await {
            Ok(payload) if payload.step != SessionStep::Waiting => {
                self.status = MachineStatus::Loaded(payload);
                true
            }
            Ok(_) => false,
            Err(err) => {
                tracing::debug!(%err, "waiting poll failed; retrying next interval");
                false
            }
        }
    }

    /// Drive the waiting poll until the step changes, the machine leaves
    /// `waiting`, or the machine is re-pointed at another token.
    pub async fn run_waiting_poll(machine: &tokio::sync::Mutex<Self>, period: Duration) {
        let epoch = machine.lock().await.epoch;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let mut m = machine.lock().await;
            if m.epoch != epoch {
                return;
            }
            if m.poll_waiting_once().await {
                return;
            }
        }
    }

    /// The full-page redirect target, when the provider cannot be
    /// embedded. Terminal from this page's perspective.
    pub fn redirect_url(&self) -> Option<&str> {
        match &self.status {
            MachineStatus::Loaded(p) if p.step == SessionStep::Signing => {
                p.fallback_url.as_deref()
            }
            _ => None,
        }
    }

    /// Apply an outcome observed by the completion reconciliation
    /// protocol. Transitions locally, reusing the retained display
    /// metadata; the best-effort completion notification is the
    /// watcher's responsibility, not the machine's.
    pub fn apply_signing_outcome(&mut self, outcome: SigningOutcome) {
        let MachineStatus::Loaded(payload) = &self.status else {
            return;
        };
        if payload.step != SessionStep::Signing {
            return;
        }

        let step = match outcome {
            SigningOutcome::Signed => SessionStep::Completed,
            SigningOutcome::Declined => SessionStep::Declined,
        };

        let MachineStatus::Loaded(payload) = std::mem::replace(&mut self.status, MachineStatus::Loading)
        else {
            unreachable!("status checked above");
        };
        self.status = MachineStatus::Loaded(payload.into_terminal(step));
    }

}
