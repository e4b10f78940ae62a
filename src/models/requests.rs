use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{ImageObject, News, Video};

// --- Request DTOs ---

/// CreateUserRequest
///
/// Payload for registering an account. The authkey is generated server-side
/// and returned once in the creation response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// UpdateUserRequest
///
/// Partial update. `is_admin` is only honoured when an admin sends it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTeamRequest {
    pub name: String,
}

/// CreateCollectionRequest
///
/// Shared by the images, videos and news collection routes. `team` is the
/// hashid of the owning team; without it the creator owns the collection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCollectionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCollectionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// CreateMemberRequest
///
/// Metadata of a new collection member. Media kinds read `name`,
/// `description`, `mimetype` and `extension`; news reads `title`, `content`,
/// `begin` and `end`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateMemberRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub mimetype: Option<String>,
    pub extension: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub begin: Option<String>,
    pub end: Option<String>,
}

/// CollectionMember
///
/// What the member routes need from a member type: building it from a
/// `CreateMemberRequest` (naming the first missing field on failure) and the
/// name of the file it owns on disk, if any.
pub trait CollectionMember: Sized {
    fn from_request(hashid: String, request: CreateMemberRequest) -> Result<Self, String>;

    fn stored_file(&self) -> Option<String> {
        None
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("'{field}' is required"))
}

impl CollectionMember for ImageObject {
    fn from_request(hashid: String, request: CreateMemberRequest) -> Result<Self, String> {
        let mut image = ImageObject::new(
            hashid,
            request.name.unwrap_or_default(),
            required(request.mimetype, "mimetype")?,
            required(request.extension, "extension")?,
        );
        image.description = request.description.unwrap_or_default();
        Ok(image)
    }

    fn stored_file(&self) -> Option<String> {
        Some(self.file_name())
    }
}

impl CollectionMember for Video {
    fn from_request(hashid: String, request: CreateMemberRequest) -> Result<Self, String> {
        let mut video = Video::new(
            hashid,
            request.name.unwrap_or_default(),
            required(request.mimetype, "mimetype")?,
            required(request.extension, "extension")?,
        );
        video.description = request.description.unwrap_or_default();
        Ok(video)
    }

    fn stored_file(&self) -> Option<String> {
        Some(self.file_name())
    }
}

impl CollectionMember for News {
    fn from_request(hashid: String, request: CreateMemberRequest) -> Result<Self, String> {
        let mut news = News::new(
            hashid,
            required(request.title, "title")?,
            request.content.unwrap_or_default(),
        );
        news.begin = request.begin;
        news.end = request.end;
        Ok(news)
    }
}

// --- Response DTOs ---

/// Credentials
///
/// The one response that carries a user's authkey.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Credentials {
    pub id: String,
    pub authkey: String,
}
