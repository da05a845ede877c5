use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Bearer-token guard for protected routes. On success the `User` is
/// available to handlers as `Extension<User>`.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Role gate used at the top of handlers. Returns the caller's role.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<Role, AppError> {
    let role = user.clinic_role().ok_or_else(|| {
        AppError::Forbidden("Token carries no clinic role".to_string())
    })?;

    if !allowed.contains(&role) {
        debug!("User {} with role {} denied, requires one of {:?}", user.id, role, allowed);
        let required = allowed.iter().map(Role::to_string).collect::<Vec<_>>().join(", ");
        return Err(AppError::Forbidden(format!(
            "You do not have access to this resource. Required roles: {}",
            required
        )));
    }

    Ok(role)
}
