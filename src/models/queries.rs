//! Typed queries produced by the search helpers and compiled to SQL by the
//! db operations.

use serde::Serialize;

/// Which posts a search may ever see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    Published,
    /// Unpublished posts authored by the given user id.
    DraftsOf(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostOrder {
    NewestFirst,
    OldestFirst,
}

impl PostOrder {
    pub fn from_choice(choice: u8) -> Option<Self> {
        match choice {
            0 => Some(PostOrder::NewestFirst),
            1 => Some(PostOrder::OldestFirst),
            _ => None,
        }
    }

    pub fn choice(self) -> u8 {
        match self {
            PostOrder::NewestFirst => 0,
            PostOrder::OldestFirst => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub scope: PostScope,
    pub title_contains: Option<String>,
    /// Exact, case-insensitive tag name.
    pub tag_name: Option<String>,
    pub order: PostOrder,
}

impl PostQuery {
    pub fn published() -> Self {
        PostQuery {
            scope: PostScope::Published,
            title_contains: None,
            tag_name: None,
            order: PostOrder::NewestFirst,
        }
    }

    pub fn drafts_of(author_id: i64) -> Self {
        PostQuery {
            scope: PostScope::DraftsOf(author_id),
            ..PostQuery::published()
        }
    }

    pub fn with_tag(mut self, tag_name: &str) -> Self {
        self.tag_name = Some(tag_name.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagOrder {
    MostPosts,
    LeastPosts,
    NameAscending,
    NameDescending,
}

impl TagOrder {
    pub fn from_choice(choice: u8) -> Option<Self> {
        match choice {
            0 => Some(TagOrder::MostPosts),
            1 => Some(TagOrder::LeastPosts),
            2 => Some(TagOrder::NameAscending),
            3 => Some(TagOrder::NameDescending),
            _ => None,
        }
    }

    pub fn choice(self) -> u8 {
        match self {
            TagOrder::MostPosts => 0,
            TagOrder::LeastPosts => 1,
            TagOrder::NameAscending => 2,
            TagOrder::NameDescending => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub name_contains: Option<String>,
    pub order: TagOrder,
}

impl Default for TagQuery {
    fn default() -> Self {
        TagQuery { name_contains: None, order: TagOrder::MostPosts }
    }
}

/// Escapes LIKE wildcards so user input is matched literally (`ESCAPE '\'`).
pub fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
