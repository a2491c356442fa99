//! End-to-end tests for the session machine and completion watcher
//!
//! Drives the machine and the reconciliation watcher against a scripted
//! transport, covering the signer journey, the waiting poll, and the
//! race between the three completion channels.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;

use portable_doc::{FieldOption, FieldResponseValue, FieldType, InteractiveFieldDef, Node};
use signing_session::{
    watch_for_completion, AccessInfo, ErrorCode, FieldResponse, MachineStatus, MessageEvent,
    PreSigningForm, SessionMachine, SessionPayload, SessionStep, SessionTransport, SigningOutcome,
    SubmitOutcome, TransportError, ViewState, WatchConfig, SIGNING_EVENT_TYPE,
    WAITING_POLL_PERIOD,
};

const HOST: &str = "https://sign.example.com";

// ============================================================
// Scripted transport
// ============================================================

/// Transport with a scripted queue per operation. An exhausted load
/// queue repeats `load_default` so background polls stay inert.
struct ScriptedTransport {
    load_results: Mutex<VecDeque<Result<SessionPayload, TransportError>>>,
    load_default: SessionPayload,
    submit_results: Mutex<VecDeque<Result<SessionPayload, TransportError>>>,
    proceed_results: Mutex<VecDeque<Result<SessionPayload, TransportError>>>,
    complete_calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(load_default: SessionPayload) -> Self {
        Self {
            load_results: Mutex::new(VecDeque::new()),
            load_default,
            submit_results: Mutex::new(VecDeque::new()),
            proceed_results: Mutex::new(VecDeque::new()),
            complete_calls: AtomicUsize::new(0),
        }
    }

    fn push_load(&self, result: Result<SessionPayload, TransportError>) {
        self.load_results.lock().unwrap().push_back(result);
    }

    fn push_submit(&self, result: Result<SessionPayload, TransportError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    fn push_proceed(&self, result: Result<SessionPayload, TransportError>) {
        self.proceed_results.lock().unwrap().push_back(result);
    }

    fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn load(&self, _token: &str) -> Result<SessionPayload, TransportError> {
        self.load_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.load_default.clone()))
    }

    async fn submit(
        &self,
        _token: &str,
        _responses: &[FieldResponse],
    ) -> Result<SessionPayload, TransportError> {
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted submit call")
    }

    async fn proceed(&self, _token: &str) -> Result<SessionPayload, TransportError> {
        self.proceed_results
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted proceed call")
    }

    async fn complete(&self, _token: &str) -> Result<(), TransportError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn access_info(&self, _document_id: &str) -> Result<AccessInfo, TransportError> {
        panic!("unexpected access_info call");
    }

    async fn request_access(&self, _document_id: &str, _email: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

// ============================================================
// Payload fixtures
// ============================================================

fn payload(step: SessionStep) -> SessionPayload {
    SessionPayload {
        step,
        document_title: "Lease Agreement".to_string(),
        recipient_name: "Alice".to_string(),
        form: None,
        embedded_signing_url: None,
        fallback_url: None,
        signing_position: None,
        total_signers: None,
    }
}

fn preview_with_fields(fields: Vec<InteractiveFieldDef>) -> SessionPayload {
    SessionPayload {
        form: Some(PreSigningForm {
            content: Node::doc(Vec::new()),
            fields,
            role_id: "r1".to_string(),
        }),
        ..payload(SessionStep::Preview)
    }
}

fn signing_payload() -> SessionPayload {
    SessionPayload {
        embedded_signing_url: Some("https://provider.example/s/xyz".to_string()),
        ..payload(SessionStep::Signing)
    }
}

fn text_field(id: &str, required: bool) -> InteractiveFieldDef {
    InteractiveFieldDef {
        id: id.to_string(),
        field_type: FieldType::Text,
        role_id: "r1".to_string(),
        label: format!("Field {id}"),
        required,
        options: Vec::new(),
        placeholder: None,
        max_length: 0,
    }
}

fn radio_field(id: &str) -> InteractiveFieldDef {
    InteractiveFieldDef {
        id: id.to_string(),
        field_type: FieldType::Radio,
        role_id: "r1".to_string(),
        label: format!("Choice {id}"),
        required: true,
        options: vec![
            FieldOption {
                id: "a".to_string(),
                label: "Option A".to_string(),
            },
            FieldOption {
                id: "b".to_string(),
                label: "Option B".to_string(),
            },
        ],
        placeholder: None,
        max_length: 0,
    }
}

fn response(field_id: &str, field_type: FieldType, value: FieldResponseValue) -> FieldResponse {
    FieldResponse {
        field_id: field_id.to_string(),
        field_type,
        response: value,
    }
}

// ============================================================
// Machine: load and submit flow
// ============================================================

#[tokio::test]
async fn test_load_reaches_loaded_state() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Ok(preview_with_fields(vec![text_field("f1", true)])));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    match machine.view_state() {
        ViewState::Session { payload, busy } => {
            assert!(!busy);
            assert_eq!(payload.step, SessionStep::Preview);
            assert!(payload.has_form_fields());
        }
        other => panic!("unexpected view state {other:?}"),
    }
}

#[tokio::test]
async fn test_load_unknown_token_maps_to_not_found() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Err(TransportError::Http {
        status: 401,
        message: None,
    }));

    let mut machine = SessionMachine::new(transport, "bogus");
    machine.load().await;

    match machine.status() {
        MachineStatus::Failed(err) => assert_eq!(err.code, ErrorCode::NotFound),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_load_expired_body_maps_to_expired() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Err(TransportError::Http {
        status: 401,
        message: Some("signing link has expired".to_string()),
    }));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    match machine.status() {
        MachineStatus::Failed(err) => assert_eq!(err.code, ErrorCode::Expired),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_valid_submit_advances_to_server_step() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Ok(preview_with_fields(vec![
        text_field("f1", true),
        radio_field("f2"),
    ])));
    transport.push_submit(Ok(signing_payload()));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    let responses = vec![
        response("f1", FieldType::Text, FieldResponseValue::text("Alice")),
        response("f2", FieldType::Radio, FieldResponseValue::selection(["a"])),
    ];
    assert_eq!(machine.submit(responses, true).await, SubmitOutcome::Accepted);

    match machine.status() {
        MachineStatus::Loaded(p) => {
            assert_eq!(p.step, SessionStep::Signing);
            assert!(p.embedded_signing_url.is_some());
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert!(machine.invalid_fields().is_empty());
}

#[tokio::test]
async fn test_invalid_submit_stays_in_preview_and_later_succeeds() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Ok(preview_with_fields(vec![text_field("f1", true)])));
    transport.push_submit(Ok(signing_payload()));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    // First attempt misses the required field; rejected locally.
    let outcome = machine.submit(Vec::new(), true).await;
    assert_eq!(outcome, SubmitOutcome::Rejected(vec!["f1".to_string()]));
    assert!(machine.invalid_fields().contains("f1"));

    // Corrected attempt goes through and clears the invalid set.
    let responses = vec![response("f1", FieldType::Text, FieldResponseValue::text("ok"))];
    assert_eq!(machine.submit(responses, true).await, SubmitOutcome::Accepted);
    assert!(machine.invalid_fields().is_empty());
}

#[tokio::test]
async fn test_submit_used_token_maps_to_already_used() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Ok(preview_with_fields(vec![])));
    transport.push_submit(Err(TransportError::Http {
        status: 400,
        message: Some("this signing link has already been used".to_string()),
    }));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    assert_eq!(machine.submit(Vec::new(), true).await, SubmitOutcome::Failed);
    match machine.status() {
        MachineStatus::Failed(err) => assert_eq!(err.code, ErrorCode::AlreadyUsed),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_proceed_without_fields() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Preview)));
    transport.push_load(Ok(payload(SessionStep::Preview)));
    transport.push_proceed(Ok(payload(SessionStep::Waiting)));

    let mut machine = SessionMachine::new(transport, "tok");
    machine.load().await;

    assert_eq!(machine.proceed().await, SubmitOutcome::Accepted);
    match machine.status() {
        MachineStatus::Loaded(p) => assert_eq!(p.step, SessionStep::Waiting),
        other => panic!("unexpected status {other:?}"),
    }
}

// ============================================================
// Machine: waiting poll
// ============================================================

#[tokio::test(start_paused = true)]
async fn test_waiting_poll_survives_failures_then_advances() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Waiting)));
    transport.push_load(Ok(payload(SessionStep::Waiting)));
    // Three failed ticks, one still-waiting tick, then the turn arrives.
    transport.push_load(Err(TransportError::Network("connection reset".to_string())));
    transport.push_load(Err(TransportError::Http {
        status: 500,
        message: None,
    }));
    transport.push_load(Err(TransportError::Network("timeout".to_string())));
    transport.push_load(Ok(payload(SessionStep::Waiting)));
    transport.push_load(Ok(signing_payload()));

    let machine = tokio::sync::Mutex::new(SessionMachine::new(transport, "tok"));
    machine.lock().await.load().await;

    SessionMachine::run_waiting_poll(&machine, WAITING_POLL_PERIOD).await;

    let machine = machine.into_inner();
    match machine.status() {
        MachineStatus::Loaded(p) => assert_eq!(p.step, SessionStep::Signing),
        other => panic!("poll failures must not surface as errors, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_waiting_poll_stops_after_reset() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Waiting)));
    transport.push_load(Ok(payload(SessionStep::Waiting)));

    let machine = Arc::new(tokio::sync::Mutex::new(SessionMachine::new(
        transport, "tok",
    )));
    machine.lock().await.load().await;

    let poll = {
        let machine = Arc::clone(&machine);
        tokio::spawn(async move {
            SessionMachine::run_waiting_poll(&machine, WAITING_POLL_PERIOD).await;
        })
    };

    machine.lock().await.reset("fresh-token");
    poll.await.expect("poll task must exit after reset");

    assert!(matches!(machine.lock().await.status(), MachineStatus::Loading));
}

// ============================================================
// Completion reconciliation
// ============================================================

fn bridge_message(status: &str) -> MessageEvent {
    MessageEvent {
        origin: HOST.to_string(),
        from_signing_frame: false,
        data: json!({ "type": SIGNING_EVENT_TYPE, "status": status }),
    }
}

#[tokio::test(start_paused = true)]
async fn test_bridge_message_resolves_signed_and_notifies_once() {
    let transport = Arc::new(ScriptedTransport::new(signing_payload()));
    let (tx, rx) = mpsc::unbounded_channel();

    let (_watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    tx.send(bridge_message("signed")).unwrap();
    assert_eq!(outcome.await.unwrap(), SigningOutcome::Signed);
    assert_eq!(transport.complete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_provider_frame_decline_skips_completion_call() {
    let transport = Arc::new(ScriptedTransport::new(signing_payload()));
    let (tx, rx) = mpsc::unbounded_channel();

    let (_watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    tx.send(MessageEvent {
        origin: "https://provider.example".to_string(),
        from_signing_frame: true,
        data: json!({ "event": "recipient_declined" }),
    })
    .unwrap();

    assert_eq!(outcome.await.unwrap(), SigningOutcome::Declined);
    assert_eq!(transport.complete_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_fallback_resolves_when_no_message_arrives() {
    let transport = Arc::new(ScriptedTransport::new(signing_payload()));
    transport.push_load(Ok(payload(SessionStep::Completed)));

    let (tx, rx) = mpsc::unbounded_channel::<MessageEvent>();
    drop(tx);

    let (_watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    assert_eq!(outcome.await.unwrap(), SigningOutcome::Signed);
    assert_eq!(transport.complete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_signals_notify_exactly_once() {
    let transport = Arc::new(ScriptedTransport::new(payload(SessionStep::Completed)));
    let (tx, rx) = mpsc::unbounded_channel();

    let (_watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    // Both message channels fire, and the fallback poll would also
    // report completed. Only the first signal is acted on.
    tx.send(bridge_message("signed")).unwrap();
    tx.send(MessageEvent {
        origin: "https://provider.example".to_string(),
        from_signing_frame: true,
        data: json!({ "type": "envelope_signing_completed" }),
    })
    .unwrap();

    assert_eq!(outcome.await.unwrap(), SigningOutcome::Signed);
    assert_eq!(transport.complete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_tears_down_watcher() {
    let transport = Arc::new(ScriptedTransport::new(signing_payload()));
    let (tx, rx) = mpsc::unbounded_channel();

    let (watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    watch.cancel();
    assert!(outcome.await.is_err());
    assert_eq!(transport.complete_calls(), 0);

    // Messages after teardown go nowhere.
    let _ = tx.send(bridge_message("signed"));
}

#[tokio::test(start_paused = true)]
async fn test_outcome_feeds_back_into_machine() {
    let transport = Arc::new(ScriptedTransport::new(signing_payload()));
    transport.push_load(Ok(signing_payload()));

    let mut machine = SessionMachine::new(Arc::clone(&transport), "tok");
    machine.load().await;

    let (tx, rx) = mpsc::unbounded_channel();
    let (_watch, outcome) =
        watch_for_completion(Arc::clone(&transport), "tok", WatchConfig::new(HOST), rx);

    tx.send(bridge_message("signed")).unwrap();
    machine.apply_signing_outcome(outcome.await.unwrap());

    match machine.status() {
        MachineStatus::Loaded(p) => {
            assert_eq!(p.step, SessionStep::Completed);
            assert_eq!(p.document_title, "Lease Agreement");
            assert!(p.embedded_signing_url.is_none());
        }
        other => panic!("unexpected status {other:?}"),
    }
}
