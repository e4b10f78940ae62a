//! Relation metadata shared by the entity loaders and the store adapters.

use super::Table;

/// How the two sides of a relation are physically joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Foreign key column on the owner table pointing at the target row.
    BelongsTo { foreign_key: &'static str },
    /// Foreign key column on the target table pointing back at the owner row.
    HasMany { foreign_key: &'static str },
    /// Join table holding one column per side.
    ManyToMany {
        join_table: &'static str,
        owner_key: &'static str,
        target_key: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub owner: Table,
    pub target: Table,
    pub link: Link,
}

const fn belongs_to(
    name: &'static str,
    owner: Table,
    target: Table,
    foreign_key: &'static str,
) -> Relation {
    Relation {
        name,
        owner,
        target,
        link: Link::BelongsTo { foreign_key },
    }
}

const fn has_many(
    name: &'static str,
    owner: Table,
    target: Table,
    foreign_key: &'static str,
) -> Relation {
    Relation {
        name,
        owner,
        target,
        link: Link::HasMany { foreign_key },
    }
}

// --- Users & Teams ---

pub const USER_TEAMS: Relation = Relation {
    name: "teams",
    owner: Table::Users,
    target: Table::Teams,
    link: Link::ManyToMany {
        join_table: "teams_users",
        owner_key: "user_id",
        target_key: "team_id",
    },
};

pub const TEAM_USERS: Relation = Relation {
    name: "users",
    owner: Table::Teams,
    target: Table::Users,
    link: Link::ManyToMany {
        join_table: "teams_users",
        owner_key: "team_id",
        target_key: "user_id",
    },
};

pub const USER_IMAGES_COLLECTIONS: Relation =
    has_many("imagesCollections", Table::Users, Table::ImagesCollections, "user_id");
pub const USER_VIDEOS_COLLECTIONS: Relation =
    has_many("videosCollections", Table::Users, Table::VideosCollections, "user_id");
pub const USER_NEWS_COLLECTIONS: Relation =
    has_many("newsCollections", Table::Users, Table::NewsCollections, "user_id");

pub const TEAM_IMAGES_COLLECTIONS: Relation =
    has_many("imagesCollections", Table::Teams, Table::ImagesCollections, "team_id");
pub const TEAM_VIDEOS_COLLECTIONS: Relation =
    has_many("videosCollections", Table::Teams, Table::VideosCollections, "team_id");
pub const TEAM_NEWS_COLLECTIONS: Relation =
    has_many("newsCollections", Table::Teams, Table::NewsCollections, "team_id");

// --- Collections ---

pub const IMAGES_COLLECTION_TEAM: Relation =
    belongs_to("team", Table::ImagesCollections, Table::Teams, "team_id");
pub const IMAGES_COLLECTION_USER: Relation =
    belongs_to("user", Table::ImagesCollections, Table::Users, "user_id");
pub const IMAGES_COLLECTION_COVER: Relation =
    belongs_to("cover", Table::ImagesCollections, Table::ImageObjects, "cover_id");
pub const IMAGES_COLLECTION_IMAGES: Relation =
    has_many("images", Table::ImagesCollections, Table::ImageObjects, "collection_id");

pub const VIDEOS_COLLECTION_TEAM: Relation =
    belongs_to("team", Table::VideosCollections, Table::Teams, "team_id");
pub const VIDEOS_COLLECTION_USER: Relation =
    belongs_to("user", Table::VideosCollections, Table::Users, "user_id");
pub const VIDEOS_COLLECTION_COVER: Relation =
    belongs_to("cover", Table::VideosCollections, Table::Videos, "cover_id");
pub const VIDEOS_COLLECTION_VIDEOS: Relation =
    has_many("videos", Table::VideosCollections, Table::Videos, "collection_id");

pub const NEWS_COLLECTION_TEAM: Relation =
    belongs_to("team", Table::NewsCollections, Table::Teams, "team_id");
pub const NEWS_COLLECTION_USER: Relation =
    belongs_to("user", Table::NewsCollections, Table::Users, "user_id");
pub const NEWS_COLLECTION_NEWS: Relation =
    has_many("news", Table::NewsCollections, Table::News, "collection_id");

// --- Leaves ---

pub const IMAGE_OBJECT_COLLECTION: Relation =
    belongs_to("collection", Table::ImageObjects, Table::ImagesCollections, "collection_id");
pub const VIDEO_COLLECTION: Relation =
    belongs_to("collection", Table::Videos, Table::VideosCollections, "collection_id");
pub const NEWS_ITEM_COLLECTION: Relation =
    belongs_to("collection", Table::News, Table::NewsCollections, "collection_id");

/// Every relation, used by stores that emulate foreign-key cleanup on delete.
pub const ALL: &[Relation] = &[
    USER_TEAMS,
    TEAM_USERS,
    USER_IMAGES_COLLECTIONS,
    USER_VIDEOS_COLLECTIONS,
    USER_NEWS_COLLECTIONS,
    TEAM_IMAGES_COLLECTIONS,
    TEAM_VIDEOS_COLLECTIONS,
    TEAM_NEWS_COLLECTIONS,
    IMAGES_COLLECTION_TEAM,
    IMAGES_COLLECTION_USER,
    IMAGES_COLLECTION_COVER,
    IMAGES_COLLECTION_IMAGES,
    VIDEOS_COLLECTION_TEAM,
    VIDEOS_COLLECTION_USER,
    VIDEOS_COLLECTION_COVER,
    VIDEOS_COLLECTION_VIDEOS,
    NEWS_COLLECTION_TEAM,
    NEWS_COLLECTION_USER,
    NEWS_COLLECTION_NEWS,
    IMAGE_OBJECT_COLLECTION,
    VIDEO_COLLECTION,
    NEWS_ITEM_COLLECTION,
];
