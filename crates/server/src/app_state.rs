use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use server_api::{authorize_admin, ApiContext};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::ServerEvent,
};
use tokio::sync::broadcast;
use tracing::debug;

pub(crate) const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

pub(crate) type HttpError = (StatusCode, Json<ApiError>);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    /// Fans an event out to connected dashboards. Having no subscribers is fine.
    pub(crate) fn publish(&self, event: ServerEvent) {
        if let Err(broadcast::error::SendError(event)) = self.events.send(event) {
            debug!(?event, "no live subscribers for event");
        }
    }

    pub(crate) fn require_admin(&self, headers: &HeaderMap) -> Result<(), HttpError> {
        let supplied = headers
            .get(ADMIN_PASSWORD_HEADER)
            .and_then(|value| value.to_str().ok());
        authorize_admin(&self.api, supplied).map_err(http_error)
    }
}

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}
