use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State, rejection::RawPathParamsRejection},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::{AccessError, AccessRequest, AuthorizationRegistry};
use crate::error::ApiError;
use crate::models::User;

/// Guard
///
/// The state of one `authorize` middleware instance: the shared registry and
/// the action the wrapped routes require.
#[derive(Clone)]
pub struct Guard {
    registry: Arc<AuthorizationRegistry>,
    action: String,
}

impl Guard {
    pub fn new(registry: Arc<AuthorizationRegistry>, action: impl Into<String>) -> Self {
        Self {
            registry,
            action: action.into(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// authorize
///
/// Route-layer middleware checking the guard's action before the handler
/// runs. Installed with `middleware::from_fn_with_state(guard, authorize)`;
/// it must be a `route_layer` so the matched path parameters are available
/// to the roles. The acting user resolved along the way is handed to the
/// handler as an `AuthUser` extension.
pub async fn authorize(
    State(guard): State<Guard>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let params: HashMap<String, String> = params
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut access = AccessRequest::new(
        request.method().clone(),
        request.headers().clone(),
        params,
    );

    guard
        .registry
        .authorize(&guard.action, &mut access)
        .await
        .inspect_err(|e| tracing::info!(action = %guard.action, error = %e, "request refused"))?;

    if let Some(user) = access.into_acting_user() {
        request.extensions_mut().insert(AuthUser(user));
    }
    Ok(next.run(request).await)
}

/// AuthUser
///
/// The acting user resolved by the guard in front of the handler. Rejects
/// with 401 when the route's roles did not resolve one.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| {
                AccessError::Denied {
                    action: "identify".to_string(),
                    reasons: vec!["Unauthorized".to_string()],
                }
                .into()
            })
    }
}
