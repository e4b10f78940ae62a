/// Router Module Index
///
/// Every protected route carries its own guard: a `route_layer` running the
/// `authorize` middleware for one named action. Nothing is protected by
/// position in the router tree.
use axum::{middleware, routing::MethodRouter};
use std::sync::Arc;

use crate::{
    AppState,
    auth::{AuthorizationRegistry, authorize},
};

/// Routes open to anonymous clients.
pub mod public;

/// `/me` and `/users/*`.
pub mod users;

/// `/teams/*`.
pub mod teams;

/// `/images/*`, `/videos/*` and `/news/*`.
pub mod collections;

/// guarded
///
/// Wraps `route` so that `action` is authorized before its handler runs.
pub fn guarded(
    route: MethodRouter<AppState>,
    registry: &Arc<AuthorizationRegistry>,
    action: &str,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        registry.can(action),
        authorize,
    ))
}
