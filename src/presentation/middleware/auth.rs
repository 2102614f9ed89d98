//! Authentication Middleware
//!
//! Bearer credential validation for the alert-source routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::domain::UserId;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Role allowed to push alerts
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated caller extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Validate the bearer credential and require the admin role.
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(&state, &request)?;
    if !user.is_admin() {
        tracing::debug!(user_id = %user.user_id, "Non-admin caller rejected");
        return Err(AppError::Forbidden("Admin role required".into()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn authenticate_request(state: &AppState, request: &Request) -> Result<AuthUser, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    let credential = state.verifier.verify(token)?;

    Ok(AuthUser {
        user_id: credential.user_id,
        role: credential.role,
    })
}
