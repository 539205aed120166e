//! Translates submitted search fields into typed queries. Fields that are
//! blank or malformed are dropped individually, never rejected.

use crate::errors::BlogError;
use crate::models::db_operations::{tags_db_operations, DbError};
use crate::models::queries::{PostOrder, PostQuery, TagOrder, TagQuery};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const MAX_SEARCH_LEN: usize = 100;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PostSearchParams {
    pub post_input: Option<String>,
    pub tag_input: Option<String>,
    pub order_input: Option<String>,
    pub page: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct TagSearchParams {
    pub name_input: Option<String>,
    pub order_input: Option<String>,
    pub page: Option<String>,
}

/// Cleaned values echoed back into the search form.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PostSearchForm {
    pub post_input: String,
    pub tag_input: String,
    pub order_input: u8,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TagSearchForm {
    pub name_input: String,
    pub order_input: u8,
}

fn clean_text(raw: Option<&String>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_SEARCH_LEN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn clean_choice(raw: Option<&String>) -> Option<u8> {
    raw?.trim().parse::<u8>().ok()
}

impl PostSearchParams {
    pub fn order(&self) -> Option<PostOrder> {
        clean_choice(self.order_input.as_ref()).and_then(PostOrder::from_choice)
    }
}

/// Applies the submitted fields on top of `base`, which fixes the scope.
/// An unknown tag name filters nothing.
pub fn build_post_query(
    conn: &Connection,
    base: PostQuery,
    params: &PostSearchParams,
) -> Result<(PostQuery, PostSearchForm), DbError> {
    let mut query = base;
    query.title_contains = clean_text(params.post_input.as_ref());

    query.tag_name = match clean_text(params.tag_input.as_ref()) {
        Some(name) => tags_db_operations::read_tag_by_name(conn, &name)?.map(|tag| tag.name),
        None => None,
    };

    if let Some(order) = params.order() {
        query.order = order;
    }

    let form = PostSearchForm {
        post_input: query.title_contains.clone().unwrap_or_default(),
        tag_input: query.tag_name.clone().unwrap_or_default(),
        order_input: query.order.choice(),
    };
    Ok((query, form))
}

/// Search reached through a tag slug. A submitted form (valid sort choice)
/// wins; otherwise the slug must resolve to a tag, which pre-fills the form.
pub fn build_pre_search_query(
    conn: &Connection,
    slug: &str,
    params: &PostSearchParams,
) -> Result<(PostQuery, PostSearchForm), BlogError> {
    if params.order().is_some() {
        return Ok(build_post_query(conn, PostQuery::published(), params)?);
    }

    let tag = tags_db_operations::read_tag_by_slug(conn, slug)?
        .ok_or_else(|| BlogError::NotFound(format!("tag '{}'", slug)))?;

    let query = PostQuery::published().with_tag(&tag.name);
    let form = PostSearchForm {
        post_input: String::new(),
        tag_input: tag.name,
        order_input: PostOrder::NewestFirst.choice(),
    };
    Ok((query, form))
}

pub fn build_tag_query(params: &TagSearchParams) -> (TagQuery, TagSearchForm) {
    let mut query = TagQuery::default();
    query.name_contains = clean_text(params.name_input.as_ref());
    if let Some(order) = clean_choice(params.order_input.as_ref()).and_then(TagOrder::from_choice) {
        query.order = order;
    }
    let form = TagSearchForm {
        name_input: query.name_contains.clone().unwrap_or_default(),
        order_input: query.order.choice(),
    };
    (query, form)
}
