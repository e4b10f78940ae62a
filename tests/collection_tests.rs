use axum::http::StatusCode;
use media_cms::{
    error::ModelError,
    models::{
        Collection, Entity, ImageObject, ImagesCollection, News, NewsCollection, Team, User,
        Video, VideosCollection,
    },
    store::{InMemoryRecordStore, StoreOp},
};

// --- Fixtures ---

async fn images_collection(store: &InMemoryRecordStore, hashid: &str) -> ImagesCollection {
    let mut collection = ImagesCollection::new(hashid, "Trip", "d");
    collection.create(store).await.unwrap();
    collection
}

async fn image(store: &InMemoryRecordStore, hashid: &str) -> ImageObject {
    let mut image = ImageObject::new(hashid, hashid, "image/jpeg", "jpg");
    image.create(store).await.unwrap();
    image
}

fn cover_hashid<C: Collection>(collection: &C) -> Option<String> {
    collection
        .cover()
        .unwrap()
        .map(|cover| cover.hashid().to_string())
}

fn member_hashids<C: Collection>(collection: &C) -> Vec<String> {
    collection
        .members()
        .unwrap()
        .iter()
        .map(|member| member.hashid().to_string())
        .collect()
}

// --- Scenario ---

#[tokio::test]
async fn test_first_image_of_an_owned_collection_becomes_its_cover() {
    let store = InMemoryRecordStore::new();

    let mut alice = User::new("u1", "alice", "a@x.com", "k1");
    alice.create(&store).await.unwrap();

    let mut trip = ImagesCollection::new("c1", "Trip", "d");
    trip.create(&store).await.unwrap();
    alice.add_images_collection(&store, &trip).await.unwrap();

    let mut i1 = ImageObject::new("i1", "beach", "image/jpeg", "jpg");
    i1.create(&store).await.unwrap();
    trip.add_image(&store, &i1).await.unwrap();

    assert_eq!(cover_hashid(&trip).as_deref(), Some("i1"));

    let view = trip.to_json_object(true);
    let images = view["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"], "i1");
    assert_eq!(view["cover"]["id"], "i1");

    assert!(trip.is_owned_by(&store, &alice).await.unwrap());
}

// --- Membership ---

#[tokio::test]
async fn test_add_member_keeps_existing_cover() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let first = image(&store, "i1").await;
    let second = image(&store, "i2").await;

    collection.add_image(&store, &first).await.unwrap();
    collection.add_image(&store, &second).await.unwrap();

    assert_eq!(cover_hashid(&collection).as_deref(), Some("i1"));
    assert_eq!(member_hashids(&collection), ["i1", "i2"]);
}

#[tokio::test]
async fn test_add_member_on_fresh_instance_loads_the_full_list() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    collection.add_image(&store, &image(&store, "i1").await).await.unwrap();

    let mut fresh = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    fresh.add_image(&store, &image(&store, "i2").await).await.unwrap();

    assert_eq!(member_hashids(&fresh), ["i1", "i2"]);
    assert_eq!(cover_hashid(&fresh).as_deref(), Some("i1"));
}

#[tokio::test]
async fn test_adding_a_member_twice_tracks_it_once() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let member = image(&store, "i1").await;

    collection.add_image(&store, &member).await.unwrap();
    collection.add_image(&store, &member).await.unwrap();

    assert_eq!(collection.images().unwrap().len(), 1);
}

#[tokio::test]
async fn test_member_sees_its_collection() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let member = image(&store, "i1").await;
    collection.add_image(&store, &member).await.unwrap();

    let mut member = ImageObject::find_one_by_hashid(&store, "i1").await.unwrap();
    member.load_collection(&store).await.unwrap();

    assert_eq!(member.collection().unwrap().unwrap().hashid(), "c1");
}

#[tokio::test]
async fn test_unpersisted_member_is_rejected_before_any_store_call() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let calls = store.total_calls();

    let error = collection
        .add_image(&store, &ImageObject::new("i1", "x", "image/png", "png"))
        .await
        .unwrap_err();

    assert!(matches!(error, ModelError::NotPersisted { .. }));
    assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.total_calls(), calls);
}

#[tokio::test]
async fn test_removing_the_cover_promotes_the_next_member() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let first = image(&store, "i1").await;
    let second = image(&store, "i2").await;
    collection.add_image(&store, &first).await.unwrap();
    collection.add_image(&store, &second).await.unwrap();

    collection.remove_image(&store, &first).await.unwrap();
    assert_eq!(cover_hashid(&collection).as_deref(), Some("i2"));
    assert_eq!(member_hashids(&collection), ["i2"]);

    collection.remove_image(&store, &second).await.unwrap();
    assert_eq!(cover_hashid(&collection), None);
    assert!(collection.images().unwrap().is_empty());

    let mut fresh = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    fresh.load_associations(&store).await.unwrap();
    assert!(fresh.images().unwrap().is_empty());
    assert_eq!(cover_hashid(&fresh), None);
}

#[tokio::test]
async fn test_removing_another_member_keeps_the_cover() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let first = image(&store, "i1").await;
    let second = image(&store, "i2").await;
    collection.add_image(&store, &first).await.unwrap();
    collection.add_image(&store, &second).await.unwrap();

    collection.remove_image(&store, &second).await.unwrap();

    assert_eq!(cover_hashid(&collection).as_deref(), Some("i1"));
}

#[tokio::test]
async fn test_failed_unlink_puts_the_member_back() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let first = image(&store, "i1").await;
    let second = image(&store, "i2").await;
    collection.add_image(&store, &first).await.unwrap();
    collection.add_image(&store, &second).await.unwrap();

    store.fail_next(StoreOp::RemoveRelated);
    let result = collection.remove_image(&store, &first).await;

    assert!(result.is_err());
    assert_eq!(member_hashids(&collection), ["i1", "i2"]);
    assert_eq!(cover_hashid(&collection).as_deref(), Some("i1"));

    let mut fresh = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    fresh.load_images(&store).await.unwrap();
    assert_eq!(fresh.images().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_cover_reassignment_keeps_the_member() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let first = image(&store, "i1").await;
    let second = image(&store, "i2").await;
    collection.add_image(&store, &first).await.unwrap();
    collection.add_image(&store, &second).await.unwrap();

    store.fail_next(StoreOp::SetRelated);
    let result = collection.remove_image(&store, &first).await;

    assert!(result.is_err());
    assert_eq!(member_hashids(&collection), ["i1", "i2"]);
    assert_eq!(cover_hashid(&collection).as_deref(), Some("i1"));

    let mut fresh = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    fresh.load_associations(&store).await.unwrap();
    assert_eq!(member_hashids(&fresh), ["i1", "i2"]);
    assert_eq!(cover_hashid(&fresh).as_deref(), Some("i1"));
}

#[tokio::test]
async fn test_removing_a_stranger_is_a_relation_violation() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    collection.load_images(&store).await.unwrap();
    let stranger = image(&store, "i9").await;

    let error = collection.remove_image(&store, &stranger).await.unwrap_err();

    assert!(matches!(error, ModelError::RelationViolation { .. }));
    assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- Kinds ---

#[tokio::test]
async fn test_videos_collection_uses_a_video_as_cover() {
    let store = InMemoryRecordStore::new();
    let mut collection = VideosCollection::new("c1", "Clips", "");
    collection.create(&store).await.unwrap();
    let mut clip = Video::new("v1", "clip", "video/mp4", "mp4");
    clip.create(&store).await.unwrap();

    collection.add_video(&store, &clip).await.unwrap();

    assert_eq!(cover_hashid(&collection).as_deref(), Some("v1"));
    assert_eq!(collection.videos().unwrap().len(), 1);
    assert_eq!(clip.file_name(), "v1.mp4");
}

#[tokio::test]
async fn test_news_collection_has_no_cover() {
    let store = InMemoryRecordStore::new();
    let mut feed = NewsCollection::new("c1", "Feed", "");
    feed.create(&store).await.unwrap();
    let mut item = News::new("n1", "Hello", "World");
    item.create(&store).await.unwrap();

    feed.add_news(&store, &item).await.unwrap();

    assert!(feed.cover().unwrap().is_none());
    let view = feed.to_json_object(true);
    assert!(view.get("cover").is_none());
    assert_eq!(view["news"][0]["id"], "n1");

    feed.remove_news(&store, &item).await.unwrap();
    assert!(feed.news().unwrap().is_empty());
}

// --- Ownership ---

#[tokio::test]
async fn test_team_members_own_team_collections() {
    let store = InMemoryRecordStore::new();
    let mut bob = User::new("u2", "bob", "b@x.com", "k2");
    bob.create(&store).await.unwrap();
    let mut carol = User::new("u3", "carol", "c@x.com", "k3");
    carol.create(&store).await.unwrap();

    let mut team = Team::new("t1", "crew");
    team.create(&store).await.unwrap();
    team.add_user(&store, &bob).await.unwrap();

    let mut collection = images_collection(&store, "c1").await;
    collection.set_team(&store, Some(&team)).await.unwrap();

    let mut reloaded = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    assert!(reloaded.is_owned_by(&store, &bob).await.unwrap());
    assert!(!reloaded.is_owned_by(&store, &carol).await.unwrap());
}

#[tokio::test]
async fn test_unpersisted_user_owns_nothing() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    let ghost = User::new("u9", "ghost", "g@x.com", "k9");

    assert!(!collection.is_owned_by(&store, &ghost).await.unwrap());
}

#[tokio::test]
async fn test_set_user_replaces_the_owner() {
    let store = InMemoryRecordStore::new();
    let mut alice = User::new("u1", "alice", "a@x.com", "k1");
    alice.create(&store).await.unwrap();
    let mut collection = images_collection(&store, "c1").await;

    collection.set_user(&store, Some(&alice)).await.unwrap();
    assert_eq!(collection.user().unwrap().unwrap().hashid(), "u1");

    collection.set_user(&store, None).await.unwrap();
    let mut fresh = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    fresh.load_user(&store).await.unwrap();
    assert!(fresh.user().unwrap().is_none());
}

// --- Cascade delete ---

#[tokio::test]
async fn test_delete_removes_every_member() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    for hashid in ["i1", "i2", "i3"] {
        let member = image(&store, hashid).await;
        collection.add_image(&store, &member).await.unwrap();
    }

    let deleted = collection.delete(&store).await.unwrap();

    assert_eq!(deleted.id, "c1");
    assert_eq!(collection.hashid(), "");
    assert!(ImageObject::all(&store).await.unwrap().is_empty());
    assert!(ImagesCollection::all(&store).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_member_delete_keeps_the_collection() {
    let store = InMemoryRecordStore::new();
    let mut collection = images_collection(&store, "c1").await;
    for hashid in ["i1", "i2", "i3"] {
        let member = image(&store, hashid).await;
        collection.add_image(&store, &member).await.unwrap();
    }

    store.fail_next(StoreOp::Destroy);
    let result = collection.delete(&store).await;

    assert!(result.is_err());
    assert_eq!(collection.hashid(), "c1");
    assert!(collection.id().is_some());
    assert!(ImagesCollection::find_one_by_hashid(&store, "c1").await.is_ok());

    // The other members are gone; only the survivor is still tracked.
    assert_eq!(ImageObject::all(&store).await.unwrap().len(), 1);
    assert_eq!(collection.images().unwrap().len(), 1);
    assert_eq!(store.calls(StoreOp::Destroy), 3);
}
