use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    composer::StyleComposer,
    error::StylistError,
    models::{
        DetailsUpdate, PhotoUpload, PreferencesUpdate, StylistOptions, SuggestionInput,
        SuggestionOutput, MAX_PHOTO_BYTES,
    },
    wizard::{run_submission, Outcome, Wizard, WizardEvent, WizardView},
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Wizard>>>,
    pub composer: Arc<dyn StyleComposer>,
}

/// Sessions untouched for this long are discarded.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

impl AppState {
    pub fn new(composer: Arc<dyn StyleComposer>) -> Self {
        Self { sessions: Arc::default(), composer }
    }

    /// Drops idle sessions past `SESSION_TTL`. In-flight submissions are kept.
    pub fn evict_idle_sessions(&self) -> usize {
        let mut guard = self.sessions.write();
        let before = guard.len();
        guard.retain(|_, wizard| wizard.is_submitting() || wizard.idle_for() < SESSION_TTL);
        let evicted = before - guard.len();
        if evicted > 0 {
            tracing::info!("🧹 Evicted {} idle stylist sessions", evicted);
        }
        evicted
    }
}

/// Periodically sweeps abandoned sessions.
pub async fn sweep_idle_sessions(state: AppState) {
    let mut ticker = tokio::time::interval(SESSION_TTL / 4);
    loop {
        ticker.tick().await;
        state.evict_idle_sessions();
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stylist/options", get(stylist_options))
        .route(
            "/api/stylist/suggestions",
            post(generate_suggestions).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES * 2)),
        )
        .route("/api/stylist/sessions", post(create_session))
        .route("/api/stylist/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/stylist/sessions/:id/preferences", put(update_preferences))
        .route("/api/stylist/sessions/:id/details", put(update_details))
        .route(
            "/api/stylist/sessions/:id/photo",
            // One byte over the cap still reaches the handler so it can answer per field
            put(attach_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 1)),
        )
        .route("/api/stylist/sessions/:id/next", post(next_step))
        .route("/api/stylist/sessions/:id/back", post(previous_step))
        .route("/api/stylist/sessions/:id/submit", post(submit))
        .route("/api/stylist/sessions/:id/restart", post(restart))
        .with_state(state)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "composer": state.composer.name() }))
}

pub async fn stylist_options() -> Json<StylistOptions> {
    Json(StylistOptions::default())
}

pub async fn generate_suggestions(
    State(state): State<AppState>,
    Json(body): Json<SuggestionInput>,
) -> Result<Json<SuggestionOutput>, StylistError> {
    tracing::info!("🎯 Direct suggestion request for: {}", body.quiz_answers);
    let output = state.composer.suggest(&body).await?;
    Ok(Json(output))
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<WizardView>) {
    state.evict_idle_sessions();
    let wizard = Wizard::new();
    let view = wizard.view();
    state.sessions.write().insert(wizard.id(), wizard);
    tracing::info!("✅ Created stylist session {}", view.id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WizardView>, StylistError> {
    let guard = state.sessions.read();
    let wizard = guard.get(&id).ok_or(StylistError::SessionNotFound(id))?;
    Ok(Json(wizard.view()))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, StylistError> {
    let mut guard = state.sessions.write();
    guard.get(&id).ok_or(StylistError::SessionNotFound(id))?.ensure_idle()?;
    guard.remove(&id);
    tracing::info!("🗑️ Discarded stylist session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn apply_event(state: &AppState, id: Uuid, event: WizardEvent) -> Result<Json<WizardView>, StylistError> {
    let mut guard = state.sessions.write();
    let wizard = guard.get_mut(&id).ok_or(StylistError::SessionNotFound(id))?;
    wizard.apply(event)?;
    Ok(Json(wizard.view()))
}

pub async fn update_preferences(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<PreferencesUpdate>,
) -> Result<Json<WizardView>, StylistError> {
    apply_event(&state, id, WizardEvent::UpdatePreferences(body))
}

pub async fn update_details(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<DetailsUpdate>,
) -> Result<Json<WizardView>, StylistError> {
    apply_event(&state, id, WizardEvent::UpdateBodyType(body.body_type_description))
}

/// Raw image body; `Content-Type` and optional `X-File-Name` describe it.
pub async fn attach_photo(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WizardView>, StylistError> {
    let header_str = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    let upload = PhotoUpload {
        file_name: header_str(header::HeaderName::from_static("x-file-name")),
        content_type: header_str(header::CONTENT_TYPE),
        bytes: body,
    };
    tracing::info!("📷 Received {} byte photo for session {}", upload.bytes.len(), id);
    apply_event(&state, id, WizardEvent::AttachPhoto(upload))
}

pub async fn next_step(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WizardView>, StylistError> {
    apply_event(&state, id, WizardEvent::Next)
}

pub async fn previous_step(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WizardView>, StylistError> {
    apply_event(&state, id, WizardEvent::Back)
}

pub async fn restart(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WizardView>, StylistError> {
    apply_event(&state, id, WizardEvent::Restart)
}

#[axum::debug_handler]
pub async fn submit(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WizardView>, StylistError> {
    // Take the submission under the lock, compose outside it
    let submission = {
        let mut guard = state.sessions.write();
        let wizard = guard.get_mut(&id).ok_or(StylistError::SessionNotFound(id))?;
        match wizard.apply(WizardEvent::Submit)? {
            Outcome::Submit(submission) => submission,
            _ => return Ok(Json(wizard.view())),
        }
    };

    // Detached so `Completed` is applied even if this handler is dropped
    let task = tokio::spawn(async move {
        let result = run_submission(state.composer.as_ref(), submission).await;

        let mut guard = state.sessions.write();
        let wizard = guard.get_mut(&id).ok_or(StylistError::SessionNotFound(id))?;
        wizard.apply(WizardEvent::Completed(result))?;
        Ok::<_, StylistError>(wizard.view())
    });

    let view = task
        .await
        .map_err(|e| StylistError::Generation(format!("submission task failed: {e}")))??;
    Ok(Json(view))
}
