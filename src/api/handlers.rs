//! HTTP request handlers

use super::types::{Activity, ErrorResponse, OutgoingActivity, TurnResponse};
use super::AppState;
use crate::db::conversation_state_key;
use crate::dialog::{BotMessage, APOLOGY};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

/// Channel id used when the activity carries none
const UNKNOWN_CHANNEL: &str = "unknown";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Channel messaging endpoint
        .route("/api/messages", post(receive_activity))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Messaging
// ============================================================

async fn receive_activity(
    State(state): State<AppState>,
    Json(activity): Json<Activity>,
) -> Result<Json<TurnResponse>, AppError> {
    let conversation_id = activity
        .conversation_id()
        .ok_or_else(|| AppError::BadRequest("Activity has no conversation id".to_string()))?;
    let channel_id = activity.channel_id.as_deref().unwrap_or(UNKNOWN_CHANNEL);
    let key = conversation_state_key(channel_id, conversation_id);

    let Some(event) = activity.to_event() else {
        tracing::debug!(key = %key, activity_type = %activity.activity_type, "Activity needs no turn");
        return Ok(Json(TurnResponse { activities: vec![] }));
    };

    tracing::info!(key = %key, event = event.kind(), "Received activity");

    // Dropping the handler (client went away) cancels in-flight downloads
    // and classification
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let messages = match state.runtime.submit_turn(&key, event, cancel).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Turn failed, sending apology");
            vec![BotMessage::text(APOLOGY)]
        }
    };

    let activities = messages
        .into_iter()
        .map(|message| OutgoingActivity::reply_to(&activity, message))
        .collect();

    Ok(Json(TurnResponse { activities }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("withbugs-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
