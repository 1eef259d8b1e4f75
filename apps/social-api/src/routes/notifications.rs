//! Notification listing and read-state endpoints, plus the shared helper
//! every mutation uses to persist and announce a notification.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::Event;
use crate::models::notification::Notification;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/notifications",
        get(list_notifications).put(mark_notifications_read),
    )
}

/// Persist a notification, then announce it to its recipient's room.
///
/// Self-notifications are skipped. A persistence failure is logged and does
/// not fail the mutation that triggered it.
pub async fn notify(state: &AppState, notification: Notification) -> Option<Notification> {
    if notification.recipient_id == notification.sender.id {
        return None;
    }

    let recipient_id = notification.recipient_id.clone();
    let kind = notification.kind;
    match state.store.create_notification(notification).await {
        Ok(saved) => {
            state
                .hub
                .emit_to_user(&recipient_id, Event::NewNotification(saved.clone()));
            Some(saved)
        }
        Err(e) => {
            tracing::warn!(%recipient_id, ?kind, error = %e, "failed to persist notification");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/notifications
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListNotificationsParams {
    /// Maximum number of notifications (1-100, default 20).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    params(ListNotificationsParams),
    responses(
        (status = 200, description = "Newest notifications first", body = ListNotificationsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Banned", body = ApiErrorBody),
    ),
)]
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<ListNotificationsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = state.store.list_notifications(auth.id(), limit).await?;
    let unread_count = state.store.unread_notification_count(auth.id()).await?;

    Ok(Json(ListNotificationsResponse {
        has_more: notifications.len() == limit,
        notifications,
        unread_count,
    }))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub notification_ids: Vec<String>,
    #[serde(default)]
    pub mark_all_as_read: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub updated: usize,
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Notifications marked read", body = MarkReadResponse),
        (status = 400, description = "Nothing to mark", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn mark_notifications_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let ids = if body.mark_all_as_read {
        None
    } else if body.notification_ids.is_empty() {
        return Err(ApiError::bad_request(
            "Provide notification_ids or set mark_all_as_read",
        ));
    } else {
        Some(body.notification_ids.as_slice())
    };

    let updated = state.store.mark_notifications_read(auth.id(), ids).await?;
    Ok(Json(MarkReadResponse { updated }))
}
