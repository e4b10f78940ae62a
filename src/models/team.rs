use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Entity, ImagesCollection, LazyMany, NewsCollection, Record, User, VideosCollection, base_json,
    with_relations,
};
use crate::error::ModelResult;
use crate::store::{RecordStore, Row, Table, relations};

/// Team
///
/// A group of users sharing ownership of collections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub name: String,

    #[serde(skip)]
    users: LazyMany<User>,
    #[serde(skip)]
    images_collections: LazyMany<ImagesCollection>,
    #[serde(skip)]
    videos_collections: LazyMany<VideosCollection>,
    #[serde(skip)]
    news_collections: LazyMany<NewsCollection>,
}

impl Team {
    pub fn new(hashid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            record: Record::new(hashid),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn users(&self) -> ModelResult<&[User]> {
        self.users.get(relations::TEAM_USERS.name)
    }

    pub fn images_collections(&self) -> ModelResult<&[ImagesCollection]> {
        self.images_collections
            .get(relations::TEAM_IMAGES_COLLECTIONS.name)
    }

    pub fn videos_collections(&self) -> ModelResult<&[VideosCollection]> {
        self.videos_collections
            .get(relations::TEAM_VIDEOS_COLLECTIONS.name)
    }

    pub fn news_collections(&self) -> ModelResult<&[NewsCollection]> {
        self.news_collections
            .get(relations::TEAM_NEWS_COLLECTIONS.name)
    }

    pub async fn load_users(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.users.load(store, &relations::TEAM_USERS, id).await
    }

    pub async fn load_images_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.images_collections
            .load(store, &relations::TEAM_IMAGES_COLLECTIONS, id)
            .await
    }

    pub async fn load_videos_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.videos_collections
            .load(store, &relations::TEAM_VIDEOS_COLLECTIONS, id)
            .await
    }

    pub async fn load_news_collections(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.news_collections
            .load(store, &relations::TEAM_NEWS_COLLECTIONS, id)
            .await
    }

    pub async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        futures::try_join!(
            self.users.load(store, &relations::TEAM_USERS, id),
            self.images_collections
                .load(store, &relations::TEAM_IMAGES_COLLECTIONS, id),
            self.videos_collections
                .load(store, &relations::TEAM_VIDEOS_COLLECTIONS, id),
            self.news_collections
                .load(store, &relations::TEAM_NEWS_COLLECTIONS, id),
        )?;
        Ok(())
    }

    /// Whether `user` belongs to this team. Requires `users` to be loaded.
    pub fn has_member(&self, user: &User) -> ModelResult<bool> {
        let Some(user_id) = user.id() else {
            return Ok(false);
        };
        Ok(self.users()?.iter().any(|member| member.id() == Some(user_id)))
    }

    pub async fn add_user(&mut self, store: &dyn RecordStore, user: &User) -> ModelResult<()> {
        let id = self.require_id()?;
        self.users
            .link(store, &relations::TEAM_USERS, id, user)
            .await
    }

    pub async fn remove_user(&mut self, store: &dyn RecordStore, user: &User) -> ModelResult<()> {
        let id = self.require_id()?;
        self.users
            .unlink(store, &relations::TEAM_USERS, id, user)
            .await
    }

    pub async fn add_images_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &ImagesCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.images_collections
            .link(store, &relations::TEAM_IMAGES_COLLECTIONS, id, collection)
            .await
    }

    pub async fn add_videos_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &VideosCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.videos_collections
            .link(store, &relations::TEAM_VIDEOS_COLLECTIONS, id, collection)
            .await
    }

    pub async fn add_news_collection(
        &mut self,
        store: &dyn RecordStore,
        collection: &NewsCollection,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        self.news_collections
            .link(store, &relations::TEAM_NEWS_COLLECTIONS, id, collection)
            .await
    }
}

impl Entity for Team {
    const TABLE: Table = Table::Teams;
    const NAME: &'static str = "Team";
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
        row.insert("name".to_string(), json!(self.name));
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("name".to_string(), json!(self.name));

        if !complete {
            return Value::Object(object);
        }
        with_relations(
            object,
            [
                ("users", self.users.json()),
                ("imagesCollections", self.images_collections.json()),
                ("videosCollections", self.videos_collections.json()),
                ("newsCollections", self.news_collections.json()),
            ],
        )
    }
}
