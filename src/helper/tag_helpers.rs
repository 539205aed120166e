use crate::errors::BlogError;
use crate::helper::form_helpers::{FormErrors, TagForm};
use crate::helper::image_helpers::MediaStore;
use crate::helper::pagination::{self, Page};
use crate::helper::post_helpers::SaveOutcome;
use crate::models::db_operations::{posts_db_operations, tags_db_operations, DbError};
use crate::models::queries::{PostQuery, TagQuery};
use crate::models::{Post, Tag, TagWithCount};
use rusqlite::Connection;

pub fn fetch_tag(conn: &Connection, slug: &str) -> Result<Tag, BlogError> {
    tags_db_operations::read_tag_by_slug(conn, slug)?
        .ok_or_else(|| BlogError::NotFound(format!("tag '{}'", slug)))
}

/// The tag and its four newest published posts.
pub fn overview(conn: &Connection, slug: &str) -> Result<(Tag, Vec<Post>), BlogError> {
    let tag = fetch_tag(conn, slug)?;
    let posts = posts_db_operations::search_posts(conn, &PostQuery::published().with_tag(&tag.name), 4, 0)?;
    Ok((tag, posts))
}

pub fn search_page(conn: &Connection, query: &TagQuery, raw_page: Option<&str>) -> Result<(Vec<TagWithCount>, Page), BlogError> {
    let total = tags_db_operations::count_tags(conn, query)?;
    let page = pagination::resolve_page(raw_page, total, pagination::TAGS_PER_PAGE)?;
    let tags = tags_db_operations::search_tags(conn, query, page.per_page, page.offset())?;
    Ok((tags, page))
}

fn name_conflict(e: DbError) -> Result<FormErrors, BlogError> {
    match e {
        DbError::Conflict(_) => {
            let mut errors = FormErrors::default();
            errors.add("name", "Tag with this Name already exists.");
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

/// Creates a tag. Its slug is derived from the name and the image is stored
/// under that slug.
pub fn create_tag(conn: &Connection, store: &MediaStore, form: &TagForm) -> Result<SaveOutcome<Tag>, BlogError> {
    let (input, slug, errors) = form.validate(conn, None)?;
    if !errors.is_empty() {
        return Ok(SaveOutcome::Invalid(errors));
    }

    let image = match &form.image {
        Some(image) => Some(store.save_tag_image(&slug, image)?),
        None => None,
    };

    match tags_db_operations::insert_tag(conn, &input, &slug, image.as_deref()) {
        Ok(tag_id) => {
            log::info!("Created tag {} '{}' ({})", tag_id, input.name, slug);
            Ok(SaveOutcome::Saved(fetch_tag(conn, &slug)?))
        }
        Err(e) => {
            if let Some(path) = &image {
                store.delete(path);
            }
            Ok(SaveOutcome::Invalid(name_conflict(e)?))
        }
    }
}

/// Saves edits to `tag`, re-deriving the slug from the new name.
pub fn update_tag(conn: &mut Connection, store: &MediaStore, tag: &Tag, form: &TagForm) -> Result<SaveOutcome<Tag>, BlogError> {
    let (input, slug, errors) = form.validate(conn, Some(tag.id))?;
    if !errors.is_empty() {
        return Ok(SaveOutcome::Invalid(errors));
    }

    let new_image = match &form.image {
        Some(image) => Some(store.save_tag_image(&slug, image)?),
        None => None,
    };

    let result = (|| -> Result<(), DbError> {
        let tx = conn.transaction()?;
        tags_db_operations::update_tag(&tx, tag.id, &input, &slug)?;
        if new_image.is_some() {
            tags_db_operations::set_tag_image(&tx, tag.id, new_image.as_deref())?;
        } else if form.clear_image {
            tags_db_operations::set_tag_image(&tx, tag.id, None)?;
        }
        tx.commit()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            if new_image.is_some() || form.clear_image {
                if let Some(old) = &tag.image {
                    store.delete(old);
                }
            }
            if slug != tag.slug {
                log::info!("Tag {} renamed, slug {} -> {}", tag.id, tag.slug, slug);
            }
            Ok(SaveOutcome::Saved(fetch_tag(conn, &slug)?))
        }
        Err(e) => {
            if let Some(path) = &new_image {
                store.delete(path);
            }
            Ok(SaveOutcome::Invalid(name_conflict(e)?))
        }
    }
}

/// Removes the tag from every post, then deletes its image file.
pub fn delete_tag(conn: &Connection, store: &MediaStore, tag: &Tag) -> Result<(), BlogError> {
    tags_db_operations::delete_tag(conn, tag.id)?;
    if let Some(image) = &tag.image {
        store.delete(image);
    }
    log::info!("Deleted tag {} ({})", tag.id, tag.slug);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::form_helpers::MultipartData;
    use crate::helper::image_helpers::test_images::png;
    use crate::models::db_operations::test_support::memory_db;
    use tempfile::TempDir;

    fn form(name: &str, image: bool) -> TagForm {
        let data = MultipartData::from_pairs(
            &[("name", name), ("subheading", "About it"), ("overview", "<p>Overview</p>")],
            if image { Some(png("banner.png")) } else { None },
        );
        TagForm::from_multipart(data)
    }

    fn saved(outcome: SaveOutcome<Tag>) -> Tag {
        match outcome {
            SaveOutcome::Saved(tag) => tag,
            SaveOutcome::Invalid(errors) => panic!("invalid: {:?}", errors),
        }
    }

    #[test]
    fn slug_follows_every_rename() {
        let mut conn = memory_db();
        let media = TempDir::new().unwrap();
        let store = MediaStore::new(media.path());

        let tag = saved(create_tag(&conn, &store, &form("Go Lang", true)).unwrap());
        assert_eq!(tag.slug, "go-lang");
        assert_eq!(tag.image.as_deref(), Some("tag_pictures/go-lang/banner.png"));

        let renamed = saved(update_tag(&mut conn, &store, &tag, &form("Golang", false)).unwrap());
        assert_eq!(renamed.slug, "golang");
        assert_eq!(renamed.image, tag.image);
        assert!(matches!(fetch_tag(&conn, "go-lang"), Err(BlogError::NotFound(_))));
    }

    #[test]
    fn deleting_a_tag_removes_its_image() {
        let conn = memory_db();
        let media = TempDir::new().unwrap();
        let store = MediaStore::new(media.path());
        let tag = saved(create_tag(&conn, &store, &form("Rust", true)).unwrap());
        let image = media.path().join(tag.image.as_deref().unwrap());
        assert!(image.exists());

        delete_tag(&conn, &store, &tag).unwrap();
        assert!(!image.exists());
        assert!(fetch_tag(&conn, "rust").is_err());
    }

    #[test]
    fn overview_lists_only_published_posts() {
        let conn = memory_db();
        let media = TempDir::new().unwrap();
        let store = MediaStore::new(media.path());
        let tag = saved(create_tag(&conn, &store, &form("Rust", false)).unwrap());
        for (i, published) in [true, false, true, true, true, true].iter().enumerate() {
            conn.execute(
                "INSERT INTO posts (title, created_date, publish_date) VALUES (?1, '2021-01-01T00:00:00.000000Z', ?2)",
                rusqlite::params![format!("p{}", i), if *published { Some(format!("2021-01-0{}T00:00:00.000000Z", i + 1)) } else { None }],
            ).unwrap();
            conn.execute("INSERT INTO post_tags (post_id, tag_id) VALUES (?1, ?2)", [conn.last_insert_rowid(), tag.id]).unwrap();
        }

        let (_, posts) = overview(&conn, "rust").unwrap();
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["p5", "p4", "p3", "p2"]);
    }
}
