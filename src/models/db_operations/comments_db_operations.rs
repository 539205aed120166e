use crate::models::db_operations::{optional_timestamp_column, timestamp_column, to_db_timestamp, DbError};
use crate::models::Comment;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.author_id, u.username, c.created_date, c.edited_date, c.text";

fn comment_from_row(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        created_date: timestamp_column(row, 4)?,
        edited_date: optional_timestamp_column(row, 5)?,
        text: row.get(6)?,
    })
}

pub fn insert_comment(
    conn: &Connection,
    post_id: i64,
    author_id: i64,
    text: &str,
    created: &DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, created_date, text) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, author_id, to_db_timestamp(created), text],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_comment(conn: &Connection, comment_id: i64) -> Result<Option<Comment>, DbError> {
    Ok(conn.query_row(
        &format!(
            "SELECT {} FROM comments c LEFT JOIN users u ON u.id = c.author_id WHERE c.id = ?1",
            COMMENT_COLUMNS
        ),
        [comment_id],
        comment_from_row,
    ).optional()?)
}

pub fn update_comment_text(conn: &Connection, comment_id: i64, text: &str, edited: &DateTime<Utc>) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE comments SET text = ?1, edited_date = ?2 WHERE id = ?3",
        params![text, to_db_timestamp(edited), comment_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("comment {}", comment_id)));
    }
    Ok(())
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?)
}

/// Newest first.
pub fn read_comments_for_post(conn: &Connection, post_id: i64, limit: u32, offset: u32) -> Result<Vec<Comment>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments c LEFT JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created_date DESC, c.id DESC
         LIMIT ?2 OFFSET ?3",
        COMMENT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![post_id, limit, offset], comment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_comments_for_post(conn: &Connection, post_id: i64) -> Result<u32, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM comments WHERE post_id = ?1", [post_id], |row| row.get(0))?;
    Ok(count as u32)
}
