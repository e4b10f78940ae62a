use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use super::guarded;
use crate::{
    AppState,
    auth::AuthorizationRegistry,
    handlers,
    models::{Collection, ImagesCollection, NewsCollection, VideosCollection, requests::CollectionMember},
};

/// Collection Router Module
///
/// The same route set for every collection kind, mounted under the kind's
/// directory name. Reading or changing a collection requires owning it
/// (directly or through its team) or being an admin.
pub fn collection_routes(registry: &Arc<AuthorizationRegistry>) -> Router<AppState> {
    Router::new()
        .merge(kind_routes::<ImagesCollection>(registry))
        .merge(kind_routes::<VideosCollection>(registry))
        .merge(kind_routes::<NewsCollection>(registry))
}

fn kind_routes<C>(registry: &Arc<AuthorizationRegistry>) -> Router<AppState>
where
    C: Collection,
    C::Member: CollectionMember,
{
    let root = format!("/{}", C::DIRECTORY);
    let item = format!("{root}/{{collection}}");
    let members = format!("{item}/members");
    let member = format!("{members}/{{member}}");
    let action = |verb: &str| format!("{verb}{}", C::NAME);

    Router::new()
        .route(
            &root,
            guarded(get(handlers::list_collections::<C>), registry, &action("list")).merge(
                guarded(
                    post(handlers::create_collection::<C>),
                    registry,
                    &action("create"),
                ),
            ),
        )
        .route(
            &item,
            guarded(get(handlers::get_collection::<C>), registry, &action("read"))
                .merge(guarded(
                    put(handlers::update_collection::<C>),
                    registry,
                    &action("update"),
                ))
                .merge(guarded(
                    delete(handlers::delete_collection::<C>),
                    registry,
                    &action("delete"),
                )),
        )
        // POST /{kind}/{collection}/members
        // Creates a member from metadata and links it; the first one becomes the cover.
        .route(
            &members,
            guarded(
                post(handlers::add_collection_member::<C>),
                registry,
                &format!("manage{}Members", C::NAME),
            ),
        )
        .route(
            &member,
            guarded(
                delete(handlers::remove_collection_member::<C>),
                registry,
                &format!("manage{}Members", C::NAME),
            ),
        )
}
