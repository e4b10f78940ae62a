use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::collection::CollectionSlots;
use super::{
    Collection, Entity, ImageObject, Lazy, LazyMany, Record, Team, User, base_json, with_relations,
};
use crate::error::ModelResult;
use crate::store::{RecordStore, Relation, Row, Table, relations};

/// ImagesCollection
///
/// A named set of images with a cover. `autogenerate` marks collections the
/// CMS creates on its own (thumbnails for a videos collection, for instance)
/// as opposed to the ones users create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesCollection {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub autogenerate: bool,

    #[serde(skip)]
    team: Lazy<Team>,
    #[serde(skip)]
    user: Lazy<User>,
    #[serde(skip)]
    cover: Lazy<ImageObject>,
    #[serde(skip)]
    images: LazyMany<ImageObject>,
}

impl ImagesCollection {
    pub fn new(
        hashid: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            record: Record::new(hashid),
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn images(&self) -> ModelResult<&[ImageObject]> {
        self.members()
    }

    pub async fn load_images(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.load_members(store).await
    }

    pub async fn add_image(
        &mut self,
        store: &dyn RecordStore,
        image: &ImageObject,
    ) -> ModelResult<()> {
        self.add_member(store, image).await
    }

    pub async fn remove_image(
        &mut self,
        store: &dyn RecordStore,
        image: &ImageObject,
    ) -> ModelResult<()> {
        self.remove_member(store, image).await
    }
}

#[async_trait]
impl Entity for ImagesCollection {
    const TABLE: Table = Table::ImagesCollections;
    const NAME: &'static str = "ImagesCollection";
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
        row.insert("description".to_string(), json!(self.description));
        row.insert("autogenerate".to_string(), json!(self.autogenerate));
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("name".to_string(), json!(self.name));
        object.insert("description".to_string(), json!(self.description));
        object.insert("autogenerate".to_string(), json!(self.autogenerate));

        if !complete {
            return Value::Object(object);
        }
        with_relations(
            object,
            [
                ("team", self.team.json()),
                ("user", self.user.json()),
                ("cover", self.cover.json()),
                ("images", self.images.json()),
            ],
        )
    }

    async fn delete_dependents(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.delete_members(store).await
    }
}

impl Collection for ImagesCollection {
    type Member = ImageObject;

    const MEMBERS: &'static Relation = &relations::IMAGES_COLLECTION_IMAGES;
    const COVER: Option<&'static Relation> = Some(&relations::IMAGES_COLLECTION_COVER);
    const TEAM: &'static Relation = &relations::IMAGES_COLLECTION_TEAM;
    const USER: &'static Relation = &relations::IMAGES_COLLECTION_USER;
    const DIRECTORY: &'static str = "images";

    fn named(hashid: String, name: String, description: String) -> Self {
        Self::new(hashid, name, description)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn set_details(&mut self, name: Option<String>, description: Option<String>) {
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
    }

    fn team_slot(&self) -> &Lazy<Team> {
        &self.team
    }

    fn user_slot(&self) -> &Lazy<User> {
        &self.user
    }

    fn cover_slot(&self) -> Option<&Lazy<ImageObject>> {
        Some(&self.cover)
    }

    fn members_slot(&self) -> &LazyMany<ImageObject> {
        &self.images
    }

    fn slots_mut(&mut self) -> CollectionSlots<'_, ImageObject> {
        CollectionSlots {
            team: &mut self.team,
            user: &mut self.user,
            cover: Some(&mut self.cover),
            members: &mut self.images,
        }
    }
}
