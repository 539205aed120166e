use crate::errors::BlogError;
use crate::helper::pagination::{self, Page};
use crate::models::db_operations::comments_db_operations;
use crate::models::{Comment, Post};
use chrono::Utc;
use rusqlite::Connection;

pub fn fetch_comment(conn: &Connection, comment_id: i64) -> Result<Comment, BlogError> {
    comments_db_operations::read_comment(conn, comment_id)?
        .ok_or_else(|| BlogError::NotFound(format!("comment {}", comment_id)))
}

/// Comments are only accepted on published posts.
pub fn post_comment(conn: &Connection, post: &Post, author_id: i64, text: &str) -> Result<i64, BlogError> {
    if !post.is_published() {
        return Err(BlogError::Forbidden(format!("post {} is not published", post.id)));
    }
    Ok(comments_db_operations::insert_comment(conn, post.id, author_id, text, &Utc::now())?)
}

pub fn edit_comment(conn: &Connection, comment: &Comment, text: &str) -> Result<(), BlogError> {
    comments_db_operations::update_comment_text(conn, comment.id, text, &Utc::now())?;
    Ok(())
}

pub fn delete_comment(conn: &Connection, comment: &Comment) -> Result<(), BlogError> {
    comments_db_operations::delete_comment(conn, comment.id)?;
    Ok(())
}

/// One page of a post's comments, newest first.
pub fn comments_page(conn: &Connection, post_id: i64, raw_page: Option<&str>) -> Result<(Vec<Comment>, Page), BlogError> {
    let total = comments_db_operations::count_comments_for_post(conn, post_id)?;
    let page = pagination::resolve_page(raw_page, total, pagination::COMMENTS_PER_PAGE)?;
    let comments = comments_db_operations::read_comments_for_post(conn, post_id, page.per_page, page.offset())?;
    Ok((comments, page))
}
