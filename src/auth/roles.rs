use async_trait::async_trait;
use axum::http::header;
use std::marker::PhantomData;

use super::{AccessRequest, AuthorizationRegistry, Role};
use crate::error::ModelError;
use crate::models::{Collection, Entity, ImagesCollection, NewsCollection, Team, User, VideosCollection};
use crate::store::StoreState;

pub const AUTHENTICATED: &str = "Authenticated";
pub const ADMIN: &str = "Admin";
pub const ONESELF: &str = "Oneself";
pub const TEAM_MEMBER: &str = "TeamMember";

/// Name of the owner role registered for collection kind `C`.
pub fn owner_role<C: Collection>() -> String {
    format!("{}Owner", C::NAME)
}

/// Authenticated
///
/// Resolves `Authorization: Bearer <authkey>` to a `User` and records it as
/// the acting user. Every other built-in role starts from this one.
pub struct Authenticated {
    store: StoreState,
}

impl Authenticated {
    pub fn new(store: StoreState) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Role for Authenticated {
    async fn check(
        &self,
        request: &mut AccessRequest,
        _registry: &AuthorizationRegistry,
    ) -> Result<(), String> {
        if request.acting_user().is_some() {
            return Ok(());
        }

        let authkey = request
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| "Unauthorized".to_string())?;

        match User::find_one_by_authkey(self.store.as_ref(), authkey).await {
            Ok(user) => {
                request.set_acting_user(user);
                Ok(())
            }
            Err(ModelError::NotFound { .. }) => {
                tracing::debug!("authkey did not resolve to a user");
                Err("Unauthorized".to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "authkey lookup failed");
                Err("Unauthorized".to_string())
            }
        }
    }
}

/// Admin
///
/// An authenticated user carrying the admin flag.
pub struct Admin;

#[async_trait]
impl Role for Admin {
    async fn check(
        &self,
        request: &mut AccessRequest,
        registry: &AuthorizationRegistry,
    ) -> Result<(), String> {
        registry.check_role(AUTHENTICATED, request).await?;
        match request.acting_user() {
            Some(user) if user.is_admin => Ok(()),
            _ => Err("Admin rights required".to_string()),
        }
    }
}

/// Oneself
///
/// The acting user is the one addressed by the `user` path parameter.
pub struct Oneself;

#[async_trait]
impl Role for Oneself {
    async fn check(
        &self,
        request: &mut AccessRequest,
        registry: &AuthorizationRegistry,
    ) -> Result<(), String> {
        registry.check_role(AUTHENTICATED, request).await?;
        let addressed = request.param("user");
        match request.acting_user() {
            Some(user) if addressed == Some(user.hashid()) => Ok(()),
            _ => Err("Only the addressed user may do this".to_string()),
        }
    }
}

/// TeamMember
///
/// The acting user belongs to the team addressed by the `team` path parameter.
pub struct TeamMember {
    store: StoreState,
}

impl TeamMember {
    pub fn new(store: StoreState) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Role for TeamMember {
    async fn check(
        &self,
        request: &mut AccessRequest,
        registry: &AuthorizationRegistry,
    ) -> Result<(), String> {
        registry.check_role(AUTHENTICATED, request).await?;
        let hashid = request
            .param("team")
            .ok_or_else(|| "No team addressed".to_string())?;

        let store = self.store.as_ref();
        let mut team = Team::find_one_by_hashid(store, hashid)
            .await
            .map_err(|e| e.to_string())?;
        team.load_users(store).await.map_err(|e| e.to_string())?;

        let user = request
            .acting_user()
            .ok_or_else(|| "Unauthorized".to_string())?;
        if team.has_member(user).map_err(|e| e.to_string())? {
            Ok(())
        } else {
            Err(format!("Not a member of team {}", team.hashid()))
        }
    }
}

/// CollectionOwner
///
/// The acting user owns the collection addressed by the `collection` path
/// parameter, directly or through its team.
pub struct CollectionOwner<C> {
    store: StoreState,
    kind: PhantomData<fn() -> C>,
}

impl<C> CollectionOwner<C> {
    pub fn new(store: StoreState) -> Self {
        Self {
            store,
            kind: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Collection> Role for CollectionOwner<C> {
    async fn check(
        &self,
        request: &mut AccessRequest,
        registry: &AuthorizationRegistry,
    ) -> Result<(), String> {
        registry.check_role(AUTHENTICATED, request).await?;
        let hashid = request
            .param("collection")
            .ok_or_else(|| "No collection addressed".to_string())?;

        let store = self.store.as_ref();
        let mut collection = C::find_one_by_hashid(store, hashid)
            .await
            .map_err(|e| e.to_string())?;

        let user = request
            .acting_user()
            .ok_or_else(|| "Unauthorized".to_string())?;
        if collection
            .is_owned_by(store, user)
            .await
            .map_err(|e| e.to_string())?
        {
            Ok(())
        } else {
            Err(format!("Not an owner of {} {}", C::NAME, collection.hashid()))
        }
    }
}

/// Actions checked by the collection routes of kind `C`.
pub fn collection_actions<C: Collection>() -> [(String, Vec<String>); 6] {
    let owner = owner_role::<C>();
    let owned = || vec![owner.clone(), ADMIN.to_string()];
    [
        (format!("list{}", C::NAME), vec![AUTHENTICATED.to_string()]),
        (format!("create{}", C::NAME), vec![AUTHENTICATED.to_string()]),
        (format!("read{}", C::NAME), owned()),
        (format!("update{}", C::NAME), owned()),
        (format!("delete{}", C::NAME), owned()),
        (format!("manage{}Members", C::NAME), owned()),
    ]
}

/// default_registry
///
/// Every role and action the router relies on.
pub fn default_registry(store: StoreState) -> AuthorizationRegistry {
    let mut registry = AuthorizationRegistry::new();

    registry.add_role(AUTHENTICATED, Authenticated::new(store.clone()));
    registry.add_role(ADMIN, Admin);
    registry.add_role(ONESELF, Oneself);
    registry.add_role(TEAM_MEMBER, TeamMember::new(store.clone()));
    registry.add_role(
        owner_role::<ImagesCollection>(),
        CollectionOwner::<ImagesCollection>::new(store.clone()),
    );
    registry.add_role(
        owner_role::<VideosCollection>(),
        CollectionOwner::<VideosCollection>::new(store.clone()),
    );
    registry.add_role(
        owner_role::<NewsCollection>(),
        CollectionOwner::<NewsCollection>::new(store),
    );

    registry.add_action("readProfile", [AUTHENTICATED]);
    registry.add_action("listUsers", [ADMIN]);
    registry.add_action("createUser", [ADMIN]);
    registry.add_action("readUser", [ONESELF, ADMIN]);
    registry.add_action("updateUser", [ONESELF, ADMIN]);
    registry.add_action("deleteUser", [ADMIN]);

    registry.add_action("listTeams", [ADMIN]);
    registry.add_action("createTeam", [ADMIN]);
    registry.add_action("readTeam", [TEAM_MEMBER, ADMIN]);
    registry.add_action("deleteTeam", [ADMIN]);
    registry.add_action("manageTeamUsers", [ADMIN]);

    for (action, roles) in collection_actions::<ImagesCollection>()
        .into_iter()
        .chain(collection_actions::<VideosCollection>())
        .chain(collection_actions::<NewsCollection>())
    {
        registry.add_action(action, roles);
    }

    registry
}
