use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Entity, ImagesCollection, LazyMany, NewsCollection, Record, Team, VideosCollection, base_json,
    with_relations,
};
use crate::error::ModelResult;
use crate::store::{RecordStore, Row, Table, relations};

/// User
///
/// An account. `authkey` is the opaque bearer credential resolved by the
/// `Authenticated` role; it is stored but never rendered in JSON views.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub authkey: String,
    #[serde(default)]
    pub is_admin: bool,

    #[serde(skip)]
    teams: LazyMany<Team>,
    #[serde(skip)]
    images_collections: LazyMany<ImagesCollection>,
    #[serde(skip)]
    videos_collections: LazyMany<VideosCollection>,
    #[serde(skip)]
    news_collections: LazyMany<NewsCollection>,
}

impl User {
    pub fn new(
        hashid: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        authkey: impl Into<String>,
    ) -> Self {
        Self {
            record: Record::new(hashid),
            username: username.into(),
            email: email.into(),
            authkey: authkey.into(),
            ..Self::default()
        }
    }

    pub async fn find_one_by_email(store: &dyn RecordStore, email: &str) -> ModelResult<Self> {
        Self::find_one_by(store, "email", json!(email)).await
    }

    pub async fn find_one_by_authkey(store: &dyn RecordStore, authkey: &str) -> ModelResult<Self> {
        Self::find_one_by(store, "authkey", json!(authkey)).await
    }

    // --- Associations ---

    pub fn teams(&self) -> ModelResult<&[Team]> {
        self.teams.get(relations::USER_TEAMS.name)
    }

    pub fn images_collections(&self) -> ModelResult<&[ImagesCollection]> {
        self.images_collections
            .get(relations::USER_IMAGES_COLLECTIONS.name)
    }

    pub fn videos_collections(&self) -> ModelResult<&[VideosCollection]> {
        self.videos_collections
            .get(relations::USER_VIDEOS_COLLECTIONS.name)
    }

    pub fn news_collections(&self) -> ModelResult<&[NewsCollection]> {
        self.news_collections
            .get(relations::USER_NEWS_COLLECTIONS.name)
    }

    pub async fn load_teams(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.teams.load(store, &relations::USER_TEAMS, id).await
    }

    pub async fn load_images_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.images_collections
            .load(store, &relations::USER_IMAGES_COLLECTIONS, id)
            .await
    }

    pub async fn load_videos_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.videos_collections
            .load(store, &relations::USER_VIDEOS_COLLECTIONS, id)
            .await
    }

    pub async fn load_news_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.news_collections
            .load(store, &relations::USER_NEWS_COLLECTIONS, id)
            .await
    }

    /// Loads every association concurrently. The first failure is returned
    /// without waiting for the others; slots that finished stay loaded.
    pub async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        futures::try_join!(
            self.teams.load(store, &relations::USER_TEAMS, id),
            self.images_collections
                .load(store, &relations::USER_IMAGES_COLLECTIONS, id),
            self.videos_collections
                .load(store, &relations::USER_VIDEOS_COLLECTIONS, id),
            self.news_collections
                .load(store, &relations::USER_NEWS_COLLECTIONS, id),
        )?;
        Ok(())
    }

    pub async fn add_images_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &ImagesCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.images_collections
            .link(store, &relations::USER_IMAGES_COLLECTIONS, id, collection)
            .await
    }

    pub async fn add_videos_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &VideosCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.videos_collections
            .link(store, &relations::USER_VIDEOS_COLLECTIONS, id, collection)
            .await
    }

    pub async fn add_news_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &NewsCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.news_collections
            .link(store, &relations::USER_NEWS_COLLECTIONS, id, collection)
            .await
    }
}

impl Entity for User {
    const TABLE: Table = Table::Users;
    const NAME: &'static str = "User";
    const CLEARS_HASHID: bool = true;

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn attributes(&self) -> Row {
        let mut row = Row::new();
        row.insert("hashid".to_string(), json!(self.record.hashid));
        row.insert("username".to_string(), json!(self.username));
        row.insert("email".to_string(), json!(self.email));
        row.insert("authkey".to_string(), json!(self.authkey));
        row.insert("is_admin".to_string(), json!(self.is_admin));
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("username".to_string(), json!(self.username));
        object.insert("email".to_string(), json!(self.email));
        object.insert("is_admin".to_string(), json!(self.is_admin));

        if !complete {
            return Value::Object(object);
        }
        with_relations(
            object,
            [
                ("teams", self.teams.json()),
                ("imagesCollections", self.images_collections.json()),
                ("videosCollections", self.videos_collections.json()),
                ("newsCollections", self.news_collections.json()),
            ],
        )
    }
}
