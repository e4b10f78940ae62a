//! Role-based authorization.
//!
//! An `AuthorizationRegistry` maps role names to `Role` predicates and action
//! names to ordered lists of roles. Checking an action tries its roles in
//! declaration order; the first one that grants wins, and when none does every
//! denial reason is reported together.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::User;

pub mod middleware;
pub mod roles;

pub use middleware::{AuthUser, Guard, authorize};
pub use roles::default_registry;

/// AccessError
///
/// Why a request was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The action is unknown or has no roles; such requests are refused.
    #[error("action '{0}' cannot be checked")]
    Unchecked(String),

    /// Every role of the action denied. Reasons are kept in role order.
    #[error("access to '{action}' denied: {}", .reasons.join("; "))]
    Denied {
        action: String,
        reasons: Vec<String>,
    },
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Unchecked(_) => StatusCode::FORBIDDEN,
            AccessError::Denied { .. } => StatusCode::UNAUTHORIZED,
        }
    }
}

/// AccessRequest
///
/// The typed view of an inbound request that roles inspect. Roles that
/// resolve an identity record it as the acting user for later roles and for
/// the handler.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    acting_user: Option<User>,
}

impl AccessRequest {
    pub fn new(method: Method, headers: HeaderMap, params: HashMap<String, String>) -> Self {
        Self {
            method,
            headers,
            params,
            acting_user: None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn acting_user(&self) -> Option<&User> {
        self.acting_user.as_ref()
    }

    pub fn set_acting_user(&mut self, user: User) {
        self.acting_user = Some(user);
    }

    pub fn into_acting_user(self) -> Option<User> {
        self.acting_user
    }
}

/// Role
///
/// A named authorization predicate. `Err` carries a human-readable denial
/// reason. Roles may defer to other roles through the registry.
#[async_trait]
pub trait Role: Send + Sync {
    async fn check(
        &self,
        request: &mut AccessRequest,
        registry: &AuthorizationRegistry,
    ) -> Result<(), String>;
}

/// AuthorizationRegistry
///
/// Built once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct AuthorizationRegistry {
    roles: HashMap<String, Arc<dyn Role>>,
    actions: HashMap<String, Vec<String>>,
}

impl AuthorizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a role. A second registration under the same name is logged
    /// and ignored; returns whether `role` was kept.
    pub fn add_role(&mut self, name: impl Into<String>, role: impl Role + 'static) -> bool {
        let name = name.into();
        if self.roles.contains_key(&name) {
            tracing::warn!(role = %name, "role already registered, keeping the first one");
            return false;
        }
        self.roles.insert(name, Arc::new(role));
        true
    }

    /// Registers an action as an ordered list of sufficient roles. Same
    /// first-wins rule as `add_role`.
    pub fn add_action<I, S>(&mut self, name: impl Into<String>, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if self.actions.contains_key(&name) {
            tracing::warn!(action = %name, "action already registered, keeping the first one");
            return false;
        }
        self.actions
            .insert(name, roles.into_iter().map(Into::into).collect());
        true
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Runs a single role by name.
    pub async fn check_role(&self, name: &str, request: &mut AccessRequest) -> Result<(), String> {
        match self.roles.get(name) {
            Some(role) => role.check(request, self).await,
            None => Err(format!("role '{name}' is not registered")),
        }
    }

    /// Decides whether `request` may perform `action`.
    ///
    /// Pre-flight requests always pass. Unknown actions and actions without
    /// roles are refused with `Unchecked`.
    pub async fn authorize(
        &self,
        action: &str,
        request: &mut AccessRequest,
    ) -> Result<(), AccessError> {
        if request.method == Method::OPTIONS {
            return Ok(());
        }

        let roles = match self.actions.get(action) {
            Some(roles) if !roles.is_empty() => roles,
            _ => return Err(AccessError::Unchecked(action.to_string())),
        };

        let mut reasons = Vec::with_capacity(roles.len());
        for role in roles {
            match self.check_role(role, request).await {
                Ok(()) => {
                    tracing::debug!(action, role = %role, "access granted");
                    return Ok(());
                }
                Err(reason) => reasons.push(reason),
            }
        }

        tracing::debug!(action, ?reasons, "access denied");
        Err(AccessError::Denied {
            action: action.to_string(),
            reasons,
        })
    }

    /// A route guard for `action`, to be installed with `authorize`.
    pub fn can(self: &Arc<Self>, action: impl Into<String>) -> Guard {
        Guard::new(Arc::clone(self), action)
    }
}
