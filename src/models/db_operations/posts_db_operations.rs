use crate::models::db_operations::{optional_timestamp_column, timestamp_column, to_db_timestamp, DbError};
use crate::models::queries::{contains_pattern, PostOrder, PostQuery, PostScope};
use crate::models::{Post, PostInput, TagRef};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

const POST_COLUMNS: &str = "p.id, p.author_id, u.username, p.title, p.subheading, p.image, \
                            p.created_date, p.publish_date, p.edited_date, p.text";

fn post_from_row(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row.get(2)?,
        title: row.get(3)?,
        subheading: row.get(4)?,
        image: row.get(5)?,
        created_date: timestamp_column(row, 6)?,
        publish_date: optional_timestamp_column(row, 7)?,
        edited_date: optional_timestamp_column(row, 8)?,
        text: row.get(9)?,
        tags: Vec::new(),
    })
}

fn read_post_tags(conn: &Connection, post_id: i64) -> Result<Vec<TagRef>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?1
         ORDER BY lower(t.name), t.id",
    )?;
    let rows = stmt.query_map([post_id], |row| {
        Ok(TagRef { id: row.get(0)?, name: row.get(1)?, slug: row.get(2)? })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn attach_tags(conn: &Connection, posts: &mut [Post]) -> Result<(), DbError> {
    for post in posts.iter_mut() {
        post.tags = read_post_tags(conn, post.id)?;
    }
    Ok(())
}

/// Replaces the tag set of a post. Callers wrap this in a transaction together
/// with the post write.
pub fn replace_post_tags(conn: &Connection, post_id: i64, tag_ids: &[i64]) -> Result<(), DbError> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", [post_id])?;
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute([post_id, *tag_id])?;
    }
    Ok(())
}

pub fn insert_post(
    conn: &Connection,
    author_id: i64,
    input: &PostInput,
    image: Option<&str>,
    created: &DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO posts (author_id, title, subheading, image, created_date, text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![author_id, input.title, input.subheading, image, to_db_timestamp(created), input.text],
    )?;
    let post_id = conn.last_insert_rowid();
    replace_post_tags(conn, post_id, &input.tag_ids)?;
    Ok(post_id)
}

/// Overwrites the editable fields and stamps the edited date. The image is
/// handled separately by `set_post_image`.
pub fn update_post(conn: &Connection, post_id: i64, input: &PostInput, edited: &DateTime<Utc>) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE posts SET title = ?1, subheading = ?2, text = ?3, edited_date = ?4 WHERE id = ?5",
        params![input.title, input.subheading, input.text, to_db_timestamp(edited), post_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("post {}", post_id)));
    }
    replace_post_tags(conn, post_id, &input.tag_ids)
}

pub fn set_post_image(conn: &Connection, post_id: i64, image: Option<&str>) -> Result<(), DbError> {
    conn.execute("UPDATE posts SET image = ?1 WHERE id = ?2", params![image, post_id])?;
    Ok(())
}

pub fn set_publish_date(conn: &Connection, post_id: i64, published: &DateTime<Utc>) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE posts SET publish_date = ?1 WHERE id = ?2",
        params![to_db_timestamp(published), post_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("post {}", post_id)));
    }
    Ok(())
}

/// Comments and tag links go with the post.
pub fn delete_post(conn: &Connection, post_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?)
}

pub fn read_post(conn: &Connection, post_id: i64) -> Result<Option<Post>, DbError> {
    let post = conn.query_row(
        &format!(
            "SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id WHERE p.id = ?1",
            POST_COLUMNS
        ),
        [post_id],
        post_from_row,
    ).optional()?;

    match post {
        Some(mut post) => {
            post.tags = read_post_tags(conn, post.id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

pub fn title_taken(conn: &Connection, title: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE title = ?1 AND id != ?2)",
        params![title, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?)
}

fn compile_post_filter(query: &PostQuery) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    match query.scope {
        PostScope::Published => clauses.push("p.publish_date IS NOT NULL".to_string()),
        PostScope::DraftsOf(author_id) => {
            clauses.push("p.publish_date IS NULL AND p.author_id = ?".to_string());
            values.push(Value::Integer(author_id));
        }
    }

    if let Some(title) = &query.title_contains {
        clauses.push("p.title LIKE ? ESCAPE '\\'".to_string());
        values.push(Value::Text(contains_pattern(title)));
    }

    if let Some(tag_name) = &query.tag_name {
        clauses.push(
            "EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
                     WHERE pt.post_id = p.id AND t.name = ? COLLATE NOCASE)"
                .to_string(),
        );
        values.push(Value::Text(tag_name.clone()));
    }

    (format!("WHERE {}", clauses.join(" AND ")), values)
}

fn post_order_clause(query: &PostQuery) -> &'static str {
    match (query.scope, query.order) {
        (PostScope::Published, PostOrder::NewestFirst) => "ORDER BY p.publish_date DESC, p.id DESC",
        (PostScope::Published, PostOrder::OldestFirst) => "ORDER BY p.publish_date ASC, p.id ASC",
        (PostScope::DraftsOf(_), PostOrder::NewestFirst) => "ORDER BY p.created_date DESC, p.id DESC",
        (PostScope::DraftsOf(_), PostOrder::OldestFirst) => "ORDER BY p.created_date ASC, p.id ASC",
    }
}

pub fn search_posts(conn: &Connection, query: &PostQuery, limit: u32, offset: u32) -> Result<Vec<Post>, DbError> {
    let (where_sql, mut values) = compile_post_filter(query);
    let sql = format!(
        "SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id {} {} LIMIT ? OFFSET ?",
        POST_COLUMNS,
        where_sql,
        post_order_clause(query),
    );
    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), post_from_row)?;
    let mut posts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    attach_tags(conn, &mut posts)?;
    Ok(posts)
}

pub fn count_posts(conn: &Connection, query: &PostQuery) -> Result<u32, DbError> {
    let (where_sql, values) = compile_post_filter(query);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p {}", where_sql),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    Ok(count as u32)
}
