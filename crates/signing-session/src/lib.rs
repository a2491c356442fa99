//! Public signing session core
//!
//! Everything an external signer's journey through one document needs,
//! independent of any UI framework: the token-addressed session payload,
//! the submit-readiness validator, the session state machine, and the
//! dual-channel completion reconciliation protocol for embedded
//! third-party signing.
//!
//! The server is the sole source of truth for the session step; the
//! client only ever branches on what the server returned. All network
//! access goes through the [`SessionTransport`] collaborator trait.

pub mod access;
pub mod error;
pub mod machine;
pub mod reconcile;
pub mod session;
pub mod transport;
pub mod validator;

pub use access::{request_access, AccessInfo, AccessStatus};
pub use error::{classify_transport_error, ErrorCode, ErrorPhase, SessionError, TransportError};
pub use machine::{MachineStatus, SessionMachine, SubmitOutcome, ViewState, WAITING_POLL_PERIOD};
pub use reconcile::{
    classify_message, watch_for_completion, CompletionWatch, MessageEvent, SigningOutcome,
    WatchConfig, COMPLETION_POLL_PERIOD, SIGNING_EVENT_TYPE,
};
pub use session::{FieldResponse, PreSigningForm, SessionPayload, SessionStep};
pub use transport::SessionTransport;
pub use validator::{
    check_submission, validate_responses, InvalidFields, ResponseError, ResponseMap,
};
