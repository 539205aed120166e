use crate::models::db_operations::DbError;
use crate::models::queries::{contains_pattern, TagOrder, TagQuery};
use crate::models::{Tag, TagInput, TagRef, TagWithCount};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

const TAG_COLUMNS: &str = "t.id, t.name, t.slug, t.subheading, t.image, t.overview";

fn tag_from_row(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        subheading: row.get(3)?,
        image: row.get(4)?,
        overview: row.get(5)?,
    })
}

pub fn insert_tag(conn: &Connection, input: &TagInput, slug: &str, image: Option<&str>) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO tags (name, slug, subheading, image, overview) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![input.name, slug, input.subheading, image, input.overview],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_tag(conn: &Connection, tag_id: i64, input: &TagInput, slug: &str) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE tags SET name = ?1, slug = ?2, subheading = ?3, overview = ?4 WHERE id = ?5",
        params![input.name, slug, input.subheading, input.overview, tag_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("tag {}", tag_id)));
    }
    Ok(())
}

pub fn set_tag_image(conn: &Connection, tag_id: i64, image: Option<&str>) -> Result<(), DbError> {
    conn.execute("UPDATE tags SET image = ?1 WHERE id = ?2", params![image, tag_id])?;
    Ok(())
}

/// Removing a tag only detaches it from its posts.
pub fn delete_tag(conn: &Connection, tag_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM tags WHERE id = ?1", [tag_id])?)
}

pub fn read_tag_by_slug(conn: &Connection, slug: &str) -> Result<Option<Tag>, DbError> {
    Ok(conn.query_row(
        &format!("SELECT {} FROM tags t WHERE t.slug = ?1", TAG_COLUMNS),
        [slug],
        tag_from_row,
    ).optional()?)
}

pub fn read_tag_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>, DbError> {
    Ok(conn.query_row(
        &format!("SELECT {} FROM tags t WHERE t.name = ?1 COLLATE NOCASE", TAG_COLUMNS),
        [name],
        tag_from_row,
    ).optional()?)
}

pub fn name_taken(conn: &Connection, name: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?1 AND id != ?2)",
        params![name, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?)
}

pub fn slug_taken(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE slug = ?1 AND id != ?2)",
        params![slug, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?)
}

/// All tags as form choices, alphabetical.
pub fn read_tag_choices(conn: &Connection) -> Result<Vec<TagRef>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name, slug FROM tags ORDER BY lower(name), id")?;
    let rows = stmt.query_map([], |row| Ok(TagRef { id: row.get(0)?, name: row.get(1)?, slug: row.get(2)? }))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_existing_tags(conn: &Connection, tag_ids: &[i64]) -> Result<usize, DbError> {
    if tag_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; tag_ids.len()].join(", ");
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tags WHERE id IN ({})", placeholders),
        params_from_iter(tag_ids.iter()),
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn compile_tag_filter(query: &TagQuery) -> (String, Vec<Value>) {
    match &query.name_contains {
        Some(needle) => (
            "WHERE t.name LIKE ? ESCAPE '\\'".to_string(),
            vec![Value::Text(contains_pattern(needle))],
        ),
        None => (String::new(), Vec::new()),
    }
}

fn tag_order_clause(order: TagOrder) -> &'static str {
    match order {
        TagOrder::MostPosts => "ORDER BY num_posts DESC, t.id ASC",
        TagOrder::LeastPosts => "ORDER BY num_posts ASC, t.id ASC",
        TagOrder::NameAscending => "ORDER BY lower(t.name) ASC, t.id ASC",
        TagOrder::NameDescending => "ORDER BY lower(t.name) DESC, t.id ASC",
    }
}

/// Every row carries its post count, whatever the ordering.
pub fn search_tags(conn: &Connection, query: &TagQuery, limit: u32, offset: u32) -> Result<Vec<TagWithCount>, DbError> {
    let (where_sql, mut values) = compile_tag_filter(query);
    let sql = format!(
        "SELECT {}, (SELECT COUNT(*) FROM post_tags pt WHERE pt.tag_id = t.id) AS num_posts
         FROM tags t {} {} LIMIT ? OFFSET ?",
        TAG_COLUMNS,
        where_sql,
        tag_order_clause(query.order),
    );
    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok(TagWithCount { tag: tag_from_row(row)?, num_posts: row.get(6)? })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_tags(conn: &Connection, query: &TagQuery) -> Result<u32, DbError> {
    let (where_sql, values) = compile_tag_filter(query);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tags t {}", where_sql),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::test_support::memory_db;

    fn tag(conn: &Connection, name: &str, slug: &str) -> i64 {
        let input = TagInput { name: name.to_string(), subheading: "sub".to_string(), overview: "<p>o</p>".to_string() };
        insert_tag(conn, &input, slug, None).unwrap()
    }

    fn attach_posts(conn: &Connection, tag_id: i64, count: usize) {
        for i in 0..count {
            conn.execute(
                "INSERT INTO posts (title, created_date) VALUES (?1, '2020-01-01T00:00:00.000000Z')",
                [format!("post {} for {}", i, tag_id)],
            ).unwrap();
            let post_id = conn.last_insert_rowid();
            conn.execute("INSERT INTO post_tags (post_id, tag_id) VALUES (?1, ?2)", [post_id, tag_id]).unwrap();
        }
    }

    #[test]
    fn name_search_is_case_insensitive_and_sorted_by_name() {
        let conn = memory_db();
        tag(&conn, "Golang", "golang");
        tag(&conn, "django", "django");
        tag(&conn, "Rust", "rust");
        tag(&conn, "GOTCHAS", "gotchas");

        let query = TagQuery { name_contains: Some("go".to_string()), order: TagOrder::NameAscending };
        let names: Vec<String> = search_tags(&conn, &query, 12, 0).unwrap().into_iter().map(|t| t.tag.name).collect();
        assert_eq!(names, vec!["django", "Golang", "GOTCHAS"]);
        assert_eq!(count_tags(&conn, &query).unwrap(), 3);

        let query = TagQuery { order: TagOrder::NameDescending, ..query };
        let names: Vec<String> = search_tags(&conn, &query, 12, 0).unwrap().into_iter().map(|t| t.tag.name).collect();
        assert_eq!(names, vec!["GOTCHAS", "Golang", "django"]);
    }

    #[test]
    fn rows_carry_post_counts_for_every_ordering() {
        let conn = memory_db();
        let a = tag(&conn, "A", "a");
        let b = tag(&conn, "B", "b");
        let c = tag(&conn, "C", "c");
        attach_posts(&conn, a, 1);
        attach_posts(&conn, b, 3);
        attach_posts(&conn, c, 2);

        let most = search_tags(&conn, &TagQuery::default(), 12, 0).unwrap();
        let counts: Vec<(String, i64)> = most.iter().map(|t| (t.tag.name.clone(), t.num_posts)).collect();
        assert_eq!(counts, vec![("B".to_string(), 3), ("C".to_string(), 2), ("A".to_string(), 1)]);

        let query = TagQuery { name_contains: None, order: TagOrder::LeastPosts };
        let least: Vec<i64> = search_tags(&conn, &query, 12, 0).unwrap().iter().map(|t| t.num_posts).collect();
        assert_eq!(least, vec![1, 2, 3]);

        let query = TagQuery { name_contains: None, order: TagOrder::NameAscending };
        let by_name: Vec<i64> = search_tags(&conn, &query, 12, 0).unwrap().iter().map(|t| t.num_posts).collect();
        assert_eq!(by_name, vec![1, 3, 2]);
    }

    #[test]
    fn wildcards_in_search_input_match_literally() {
        let conn = memory_db();
        tag(&conn, "100% Rust", "100-rust");
        tag(&conn, "1000 Rust", "1000-rust");
        let query = TagQuery { name_contains: Some("100%".to_string()), order: TagOrder::NameAscending };
        let found = search_tags(&conn, &query, 12, 0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag.slug, "100-rust");
    }

    #[test]
    fn deleting_a_tag_detaches_it_from_posts() {
        let conn = memory_db();
        let id = tag(&conn, "Temp", "temp");
        attach_posts(&conn, id, 2);
        assert_eq!(delete_tag(&conn, id).unwrap(), 1);
        let links: i64 = conn.query_row("SELECT COUNT(*) FROM post_tags", [], |r| r.get(0)).unwrap();
        let posts: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0)).unwrap();
        assert_eq!((links, posts), (0, 2));
    }

    #[test]
    fn lookups_by_name_ignore_case() {
        let conn = memory_db();
        tag(&conn, "Go Lang", "go-lang");
        assert_eq!(read_tag_by_name(&conn, "go lang").unwrap().map(|t| t.slug), Some("go-lang".to_string()));
        assert!(name_taken(&conn, "Go Lang", None).unwrap());
        let id = read_tag_by_slug(&conn, "go-lang").unwrap().unwrap().id;
        assert!(!name_taken(&conn, "Go Lang", Some(id)).unwrap());
        assert!(slug_taken(&conn, "go-lang", None).unwrap());
    }
}
