use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::collection::CollectionSlots;
use super::{Collection, Entity, Lazy, LazyMany, News, Record, Team, User, base_json, with_relations};
use crate::error::ModelResult;
use crate::store::{RecordStore, Relation, Row, Table, relations};

/// NewsCollection
///
/// A feed of news items. Unlike the media collections it has no cover.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsCollection {
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
    news: LazyMany<News>,
}

impl NewsCollection {
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

    pub fn news(&self) -> ModelResult<&[News]> {
        self.members()
    }

    pub async fn add_news(&mut self, store: &dyn RecordStore, news: &News) -> ModelResult<()> {
        self.add_member(store, news).await
    }

    pub async fn remove_news(&mut self, store: &dyn RecordStore, news: &News) -> ModelResult<()> {
        self.remove_member(store, news).await
    }
}

#[async_trait]
impl Entity for NewsCollection {
    const TABLE: Table = Table::NewsCollections;
    const NAME: &'static str = "NewsCollection";
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
                ("news", self.news.json()),
            ],
        )
    }

    async fn delete_dependents(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.delete_members(store).await
    }
}

impl Collection for NewsCollection {
    type Member = News;

    const MEMBERS: &'static Relation = &relations::NEWS_COLLECTION_NEWS;
    const COVER: Option<&'static Relation> = None;
    const TEAM: &'static Relation = &relations::NEWS_COLLECTION_TEAM;
    const USER: &'static Relation = &relations::NEWS_COLLECTION_USER;
    const DIRECTORY: &'static str = "news";

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

    fn cover_slot(&self) -> Option<&Lazy<News>> {
        None
    }

    fn members_slot(&self) -> &LazyMany<News> {
        &self.news
    }

    fn slots_mut(&mut self) -> CollectionSlots<'_, News> {
        CollectionSlots {
            team: &mut self.team,
            user: &mut self.user,
            cover: None,
            members: &mut self.news,
        }
    }
}
