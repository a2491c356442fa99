//! HTTP handlers for the signing API

use axum::{
    extract::{Path, Query, State},
    response::Html,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use portable_doc::{collect_fields_for_role, FieldValue, OrderMode, SignerRole, WorkflowConfig};
use signing_session::{
    check_submission, AccessInfo, AccessStatus, PreSigningForm, SessionPayload, SessionStep,
};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

// ============================================================
// Session lookup and payload assembly
// ============================================================

const SELECT_SIGNER: &str = r#"
    SELECT token, document_id, role_id, recipient_name, recipient_email, step,
           responses_json, signing_url, fallback_url, used, position,
           expires_at, created_at, updated_at
    FROM signers
    WHERE token = ?
"#;

const SELECT_DOCUMENT_SIGNERS: &str = r#"
    SELECT token, document_id, role_id, recipient_name, recipient_email, step,
           responses_json, signing_url, fallback_url, used, position,
           expires_at, created_at, updated_at
    FROM signers
    WHERE document_id = ?
    ORDER BY position
"#;

async fn load_signer(state: &AppState, token: &str) -> Result<DbSigner, ApiError> {
    let signer: Option<DbSigner> = sqlx::query_as(SELECT_SIGNER)
        .bind(token)
        .fetch_optional(&state.db)
        .await?;

    let signer = signer.ok_or(ApiError::InvalidToken)?;
    if signer.is_expired(Utc::now()) {
        return Err(ApiError::TokenExpired);
    }
    Ok(signer)
}

async fn load_document(state: &AppState, id: &str) -> Result<DbDocument, ApiError> {
    let document: Option<DbDocument> = sqlx::query_as(
        r#"
        SELECT id, title, content_json, roles_json, variables_json, workflow_json,
               injected_json, status, created_at, updated_at
        FROM documents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    document.ok_or(ApiError::DocumentNotFound)
}

fn parse_step(s: &str) -> SessionStep {
    match s {
        "signing" => SessionStep::Signing,
        "waiting" => SessionStep::Waiting,
        "completed" => SessionStep::Completed,
        "declined" => SessionStep::Declined,
        _ => SessionStep::Preview,
    }
}

/// Sequential order gate: the signer's turn arrives once every signer
/// ahead of them has completed.
fn turn_has_arrived(signers: &[DbSigner], me: &DbSigner) -> bool {
    signers
        .iter()
        .filter(|s| s.position < me.position)
        .all(|s| parse_step(&s.step) == SessionStep::Completed)
}

fn build_payload(
    document: &DbDocument,
    signer: &DbSigner,
    total_signers: usize,
) -> Result<SessionPayload, ApiError> {
    let step = parse_step(&signer.step);
    let workflow = document.workflow()?;
    let sequential = workflow.order_mode == OrderMode::Sequential;

    let mut payload = SessionPayload {
        step,
        document_title: document.title.clone(),
        recipient_name: signer.recipient_name.clone(),
        form: None,
        embedded_signing_url: None,
        fallback_url: None,
        signing_position: None,
        total_signers: None,
    };

    match step {
        SessionStep::Preview => {
            let content = document.content()?;
            let fields = collect_fields_for_role(&content, &signer.role_id);
            if !fields.is_empty() {
                payload.form = Some(PreSigningForm {
                    content,
                    fields,
                    role_id: signer.role_id.clone(),
                });
            }
        }
        SessionStep::Signing => {
            payload.embedded_signing_url = signer.signing_url.clone();
            payload.fallback_url = signer.fallback_url.clone();
        }
        SessionStep::Waiting => {
            if sequential {
                payload.signing_position = Some(signer.position as u32 + 1);
                payload.total_signers = Some(total_signers as u32);
            }
        }
        SessionStep::Completed | SessionStep::Declined => {}
    }

    Ok(payload)
}

async fn set_step(state: &AppState, token: &str, step: SessionStep) -> Result<(), ApiError> {
    sqlx::query("UPDATE signers SET step = ?, updated_at = ? WHERE token = ?")
        .bind(step.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(token)
        .execute(&state.db)
        .await?;
    Ok(())
}

/// Step after the pre-signing gate: straight to signing, unless the
/// document signs in sequence and the turn has not arrived yet.
async fn step_after_presigning(
    state: &AppState,
    document: &DbDocument,
    signer: &DbSigner,
) -> Result<SessionStep, ApiError> {
    let workflow = document.workflow()?;
    if workflow.order_mode != OrderMode::Sequential {
        return Ok(SessionStep::Signing);
    }

    let signers: Vec<DbSigner> = sqlx::query_as(SELECT_DOCUMENT_SIGNERS)
        .bind(&signer.document_id)
        .fetch_all(&state.db)
        .await?;

    if turn_has_arrived(&signers, signer) {
        Ok(SessionStep::Signing)
    } else {
        Ok(SessionStep::Waiting)
    }
}

// ============================================================
// Public signing endpoints
// ============================================================

/// Get the current session state for a token
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<SessionPayload>, ApiError> {
    let mut signer = load_signer(&state, &token).await?;
    let document = load_document(&state, &signer.document_id).await?;

    let signers: Vec<DbSigner> = sqlx::query_as(SELECT_DOCUMENT_SIGNERS)
        .bind(&signer.document_id)
        .fetch_all(&state.db)
        .await?;

    // A waiting signer's turn may have arrived since the last fetch;
    // the waiting poll picks the transition up here.
    if parse_step(&signer.step) == SessionStep::Waiting && turn_has_arrived(&signers, &signer) {
        set_step(&state, &token, SessionStep::Signing).await?;
        signer.step = SessionStep::Signing.to_string();
    }

    let payload = build_payload(&document, &signer, signers.len())?;
    Ok(Json(payload))
}

/// Submit pre-signing field responses
pub async fn submit_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SessionPayload>, ApiError> {
    let signer = load_signer(&state, &token).await?;
    if signer.used {
        return Err(ApiError::TokenUsed);
    }
    if parse_step(&signer.step) != SessionStep::Preview {
        return Err(ApiError::InvalidRequest(
            "Session is past the preview step".to_string(),
        ));
    }

    let document = load_document(&state, &signer.document_id).await?;
    let content = document.content()?;
    let fields = collect_fields_for_role(&content, &signer.role_id);

    check_submission(&fields, &req.responses)?;

    let next = step_after_presigning(&state, &document, &signer).await?;
    let responses_json = serde_json::to_string(&req.responses)?;

    sqlx::query(
        r#"
        UPDATE signers
        SET responses_json = ?, step = ?, used = 1, updated_at = ?
        WHERE token = ?
        "#,
    )
    .bind(&responses_json)
    .bind(next.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(&token)
    .execute(&state.db)
    .await?;

    tracing::info!("Submitted responses for token {}, next step {}", token, next);

    let signer = load_signer(&state, &token).await?;
    let total = signer_count(&state, &signer.document_id).await?;
    Ok(Json(build_payload(&document, &signer, total)?))
}

/// Proceed from preview without a form submission
pub async fn proceed_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<SessionPayload>, ApiError> {
    let signer = load_signer(&state, &token).await?;
    if signer.used {
        return Err(ApiError::TokenUsed);
    }
    if parse_step(&signer.step) != SessionStep::Preview {
        return Err(ApiError::InvalidRequest(
            "Session is past the preview step".to_string(),
        ));
    }

    let document = load_document(&state, &signer.document_id).await?;
    let next = step_after_presigning(&state, &document, &signer).await?;

    sqlx::query("UPDATE signers SET step = ?, used = 1, updated_at = ? WHERE token = ?")
        .bind(next.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(&token)
        .execute(&state.db)
        .await?;

    let signer = load_signer(&state, &token).await?;
    let total = signer_count(&state, &signer.document_id).await?;
    Ok(Json(build_payload(&document, &signer, total)?))
}

async fn signer_count(state: &AppState, document_id: &str) -> Result<usize, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM signers WHERE document_id = ?")
        .bind(document_id)
        .fetch_one(&state.db)
        .await?;
    Ok(count.0 as usize)
}

/// Mark the embedded signing ceremony complete. Idempotent: repeated
/// calls for an already-completed signer are acknowledged without
/// changing anything.
pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signer = load_signer(&state, &token).await?;

    if parse_step(&signer.step) != SessionStep::Completed {
        set_step(&state, &token, SessionStep::Completed).await?;

        let signers: Vec<DbSigner> = sqlx::query_as(SELECT_DOCUMENT_SIGNERS)
            .bind(&signer.document_id)
            .fetch_all(&state.db)
            .await?;
        let all_done = signers
            .iter()
            .all(|s| s.token == token || parse_step(&s.step) == SessionStep::Completed);

        if all_done {
            sqlx::query("UPDATE documents SET status = 'completed', updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&signer.document_id)
                .execute(&state.db)
                .await?;
            tracing::info!("Document {} fully signed", signer.document_id);
        }
    }

    Ok(Json(json!({ "status": "completed" })))
}

// ============================================================
// Callback bridge
// ============================================================

/// Normalize provider status values to the two the host understands.
/// Unrecognized values fall through to "signed": by the time a provider
/// redirects here at all, completion is the overwhelmingly likely case.
fn normalize_callback_status(status: &str, event: &str) -> &'static str {
    match status.to_ascii_lowercase().as_str() {
        "signed" | "completed" | "signing_complete" => "signed",
        "declined" | "voided" | "cancel" => "declined",
        _ => {
            let event = event.to_ascii_lowercase();
            if event.contains("sign") || event.contains("complete") {
                "signed"
            } else if event.contains("decline") || event.contains("cancel") {
                "declined"
            } else {
                "signed"
            }
        }
    }
}

/// Provider-agnostic callback bridge. Providers redirect their frame
/// here when the ceremony ends; the page relays a standardized event to
/// the parent window on the host's own origin, so the host never has to
/// listen to any provider domain.
pub async fn signing_callback(
    State(state): State<Arc<AppState>>,
    Path(_token): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Html<String> {
    let status = normalize_callback_status(
        query.status.as_deref().unwrap_or("signed"),
        query.event.as_deref().unwrap_or(""),
    );

    // Both interpolations are safe: status is one of two fixed literals
    // and the origin is operator configuration, not request input.
    let page = format!(
        r#"<!DOCTYPE html>
<html><head><title>Signing</title></head><body>
<script>
window.parent.postMessage(
  {{type:"SIGNING_EVENT",status:"{status}"}},
  "{origin}"
);
</script>
</body></html>"#,
        status = status,
        origin = state.public_origin,
    );

    Html(page)
}

// ============================================================
// Access endpoints
// ============================================================

const ACCESS_ACK: &str =
    "If the request matches an active signer, a new signing link will be sent by email.";

/// Public access info for a document
pub async fn get_access_info(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<AccessInfo>, ApiError> {
    let document = load_document(&state, &document_id).await?;

    let status = match document.status() {
        DocumentStatus::Active => AccessStatus::Active,
        DocumentStatus::Completed => AccessStatus::Completed,
        DocumentStatus::Expired => AccessStatus::Expired,
    };

    Ok(Json(AccessInfo {
        document_id: document.id,
        document_title: document.title,
        status,
    }))
}

/// Issue a fresh token for a signer, invalidating the previous one.
async fn regenerate_token(state: &AppState, old_token: &str, ttl_days: u32) -> Result<(), ApiError> {
    let fresh = Uuid::new_v4().to_string();
    let expires = Utc::now() + chrono::Duration::days(i64::from(ttl_days));

    sqlx::query(
        r#"
        UPDATE signers
        SET token = ?, expires_at = ?, updated_at = ?
        WHERE token = ?
        "#,
    )
    .bind(&fresh)
    .bind(expires.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(old_token)
    .execute(&state.db)
    .await?;

    // Delivery is the notification pipeline's job; the fresh token never
    // appears in any response body.
    tracing::info!("Issued fresh signing token replacing {}", old_token);
    Ok(())
}

/// Expired-link recovery addressed by the old token. The response is
/// the same acknowledgement whether or not the token matched anything.
pub async fn request_access_by_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Json<GenericAck> {
    let outcome = async {
        let signer: Option<DbSigner> = sqlx::query_as(SELECT_SIGNER)
            .bind(&token)
            .fetch_optional(&state.db)
            .await?;
        let Some(signer) = signer else {
            return Ok(());
        };

        let document = load_document(&state, &signer.document_id).await?;
        if document.status() == DocumentStatus::Active {
            let ttl = document.workflow()?.pre_signing_ttl_days();
            regenerate_token(&state, &token, ttl).await?;
        }
        Ok::<_, ApiError>(())
    }
    .await;

    if let Err(err) = outcome {
        tracing::warn!("Access request by token failed internally: {}", err);
    }

    Json(GenericAck {
        message: ACCESS_ACK.to_string(),
    })
}

/// Access request addressed by document and email. Same fixed
/// acknowledgement for matched, unmatched, and unknown documents.
pub async fn request_access_by_email(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Json(body): Json<RequestAccessBody>,
) -> Json<GenericAck> {
    let outcome = async {
        let Ok(document) = load_document(&state, &document_id).await else {
            return Ok(());
        };
        if document.status() != DocumentStatus::Active {
            return Ok(());
        }

        let signers: Vec<DbSigner> = sqlx::query_as(SELECT_DOCUMENT_SIGNERS)
            .bind(&document_id)
            .fetch_all(&state.db)
            .await?;

        let wanted = body.email.trim().to_ascii_lowercase();
        for signer in &signers {
            if signer.recipient_email.to_ascii_lowercase() == wanted {
                let ttl = document.workflow()?.pre_signing_ttl_days();
                regenerate_token(&state, &signer.token, ttl).await?;
            }
        }
        Ok::<_, ApiError>(())
    }
    .await;

    if let Err(err) = outcome {
        tracing::warn!("Access request by email failed internally: {}", err);
    }

    Json(GenericAck {
        message: ACCESS_ACK.to_string(),
    })
}

// ============================================================
// Dispatch
// ============================================================

fn resolve_field_value(
    value: &FieldValue,
    injected: &std::collections::BTreeMap<String, serde_json::Value>,
) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Injectable(variable_id) => injected
            .get(variable_id)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

fn signing_order(roles: &[SignerRole], workflow: &WorkflowConfig) -> Vec<SignerRole> {
    let mut ordered = roles.to_vec();
    if workflow.order_mode == OrderMode::Sequential {
        ordered.sort_by_key(|r| r.order);
    }
    ordered
}

/// Create a document with one signing session per role
pub async fn create_sessions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<Json<CreateDocumentResponse>, ApiError> {
    req.workflow
        .validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    if req.roles.is_empty() {
        return Err(ApiError::InvalidRequest(
            "At least one signer role is required".to_string(),
        ));
    }

    let document_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires = now + chrono::Duration::days(i64::from(req.workflow.pre_signing_ttl_days()));

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, title, content_json, roles_json, variables_json, workflow_json,
             injected_json, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
        "#,
    )
    .bind(&document_id)
    .bind(&req.title)
    .bind(serde_json::to_string(&req.content)?)
    .bind(serde_json::to_string(&req.roles)?)
    .bind(serde_json::to_string(&req.variables)?)
    .bind(serde_json::to_string(&req.workflow)?)
    .bind(serde_json::to_string(&req.injected_values)?)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    let mut signers = Vec::with_capacity(req.roles.len());
    for (position, role) in signing_order(&req.roles, &req.workflow).iter().enumerate() {
        let token = Uuid::new_v4().to_string();
        let recipient_name = resolve_field_value(&role.name, &req.injected_values);
        let recipient_email = resolve_field_value(&role.email, &req.injected_values);

        sqlx::query(
            r#"
            INSERT INTO signers
                (token, document_id, role_id, recipient_name, recipient_email, step,
                 responses_json, signing_url, fallback_url, used, position,
                 expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'preview', '[]', ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&token)
        .bind(&document_id)
        .bind(&role.id)
        .bind(&recipient_name)
        .bind(&recipient_email)
        .bind(req.signing_urls.get(&role.id))
        .bind(req.fallback_urls.get(&role.id))
        .bind(position as i64)
        .bind(expires.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        signers.push(CreatedSigner {
            role_id: role.id.clone(),
            recipient_name,
            recipient_email,
            token,
        });
    }

    tx.commit().await?;

    tracing::info!(
        "Created document {} with {} signing sessions",
        document_id,
        signers.len()
    );

    Ok(Json(CreateDocumentResponse {
        document_id,
        signers,
    }))
}
