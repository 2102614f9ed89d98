//! Alert Source Handlers
//!
//! Entry points for the service that produces alerts. Both return the
//! per-channel delivery report.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::application::dto::BroadcastRequest;
use crate::application::services::{DeliveryResult, RoleFilter};
use crate::domain::{AlertEvent, Payload, UserId};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Deliver an event to one user's channels
pub async fn publish_to_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(event): Json<AlertEvent>,
) -> Result<Json<DeliveryResult>, AppError> {
    let payload = Payload::new(event).map_err(|e| AppError::Internal(e.to_string()))?;
    let user_id = UserId::new(user_id);

    tracing::debug!(
        caller = %caller.user_id,
        user_id = %user_id,
        event = payload.event_name(),
        "Publishing alert"
    );

    Ok(Json(state.dispatcher.publish(&user_id, payload)))
}

/// Deliver an event to every channel whose role matches
pub async fn broadcast(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<DeliveryResult>, AppError> {
    let payload = Payload::new(request.event).map_err(|e| AppError::Internal(e.to_string()))?;
    let filter = RoleFilter::from_targets(request.target_roles.as_deref());

    tracing::debug!(
        caller = %caller.user_id,
        event = payload.event_name(),
        filter = ?filter,
        "Broadcasting alert"
    );

    Ok(Json(state.dispatcher.broadcast(payload, &filter)))
}
