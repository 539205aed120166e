use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub last_login_time: Option<String>,
}

/// Minimal tag view attached to posts and used for form choices.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub subheading: String,
    pub image: Option<String>,
    pub overview: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub num_posts: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Post {
    pub id: i64,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub title: String,
    pub subheading: Option<String>,
    pub image: Option<String>,
    pub created_date: DateTime<Utc>,
    pub publish_date: Option<DateTime<Utc>>,
    pub edited_date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub tags: Vec<TagRef>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.publish_date.is_some()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub created_date: DateTime<Utc>,
    pub edited_date: Option<DateTime<Utc>>,
    pub text: String,
}

/// Validated post fields, ready to be written.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub subheading: Option<String>,
    pub text: Option<String>,
    pub tag_ids: Vec<i64>,
}

/// Validated tag fields. The slug is derived, never submitted.
#[derive(Debug, Clone, Default)]
pub struct TagInput {
    pub name: String,
    pub subheading: String,
    pub overview: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

pub mod db_operations;
pub mod queries;
