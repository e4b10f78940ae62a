use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::collection::CollectionSlots;
use super::{Collection, Entity, Lazy, LazyMany, Record, Team, User, Video, base_json, with_relations};
use crate::error::ModelResult;
use crate::store::{RecordStore, Relation, Row, Table, relations};

/// VideosCollection
///
/// A named set of videos. Its cover is one of its own videos.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideosCollection {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,

    #[serde(skip)]
    team: Lazy<Team>,
    #[serde(skip)]
    user: Lazy<User>,
    #[serde(skip)]
    cover: Lazy<Video>,
    #[serde(skip)]
    videos: LazyMany<Video>,
}

impl VideosCollection {
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

    pub fn videos(&self) -> ModelResult<&[Video]> {
        self.members()
    }

    pub async fn add_video(&mut self, store: &dyn RecordStore, video: &Video) -> ModelResult<()> {
        self.add_member(store, video).await
    }

    pub async fn remove_video(&mut self, store: &dyn RecordStore, video: &Video) -> ModelResult<()> {
        self.remove_member(store, video).await
    }
}

#[async_trait]
impl Entity for VideosCollection {
    const TABLE: Table = Table::VideosCollections;
    const NAME: &'static str = "VideosCollection";
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
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("name".to_string(), json!(self.name));
        object.insert("description".to_string(), json!(self.description));

        if !complete {
            return Value::Object(object);
        }
        with_relations(
            object,
            [
                ("team", self.team.json()),
                ("user", self.user.json()),
                ("cover", self.cover.json()),
                ("videos", self.videos.json()),
            ],
        )
    }

    async fn delete_dependents(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.delete_members(store).await
    }
}

impl Collection for VideosCollection {
    type Member = Video;

    const MEMBERS: &'static Relation = &relations::VIDEOS_COLLECTION_VIDEOS;
    const COVER: Option<&'static Relation> = Some(&relations::VIDEOS_COLLECTION_COVER);
    const TEAM: &'static Relation = &relations::VIDEOS_COLLECTION_TEAM;
    const USER: &'static Relation = &relations::VIDEOS_COLLECTION_USER;
    const DIRECTORY: &'static str = "videos";

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

    fn cover_slot(&self) -> Option<&Lazy<Video>> {
        Some(&self.cover)
    }

    fn members_slot(&self) -> &LazyMany<Video> {
        &self.videos
    }

    fn slots_mut(&mut self) -> CollectionSlots<'_, Video> {
        CollectionSlots {
            team: &mut self.team,
            user: &mut self.user,
            cover: Some(&mut self.cover),
            members: &mut self.videos,
        }
    }
}
