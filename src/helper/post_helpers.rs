use crate::errors::BlogError;
use crate::helper::form_helpers::{FormErrors, PostForm};
use crate::helper::image_helpers::MediaStore;
use crate::helper::pagination::{self, Page};
use crate::models::db_operations::{posts_db_operations, tags_db_operations, DbError};
use crate::models::queries::{PostQuery, TagQuery};
use crate::models::{Post, PostInput, TagWithCount};
use chrono::Utc;
use rusqlite::Connection;

/// Result of a form submission that reached the store.
#[derive(Debug)]
pub enum SaveOutcome<T> {
    Saved(T),
    Invalid(FormErrors),
}

pub fn fetch_post(conn: &Connection, post_id: i64) -> Result<Post, BlogError> {
    posts_db_operations::read_post(conn, post_id)?
        .ok_or_else(|| BlogError::NotFound(format!("post {}", post_id)))
}

/// The four most-posted tags and the four newest published posts.
pub fn landing(conn: &Connection) -> Result<(Vec<TagWithCount>, Vec<Post>), DbError> {
    let tags = tags_db_operations::search_tags(conn, &TagQuery::default(), 4, 0)?;
    let posts = posts_db_operations::search_posts(conn, &PostQuery::published(), 4, 0)?;
    Ok((tags, posts))
}

pub fn search_page(conn: &Connection, query: &PostQuery, raw_page: Option<&str>) -> Result<(Vec<Post>, Page), BlogError> {
    let total = posts_db_operations::count_posts(conn, query)?;
    let page = pagination::resolve_page(raw_page, total, pagination::POSTS_PER_PAGE)?;
    let posts = posts_db_operations::search_posts(conn, query, page.per_page, page.offset())?;
    Ok((posts, page))
}

fn title_conflict(e: DbError) -> Result<FormErrors, BlogError> {
    match e {
        DbError::Conflict(_) => {
            let mut errors = FormErrors::default();
            errors.add("title", "Post with this Title already exists.");
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

/// Inserts the post and moves its staged image under the new id, all in one
/// transaction. A relocated file is removed again if anything after the move
/// fails.
fn insert_and_relocate(
    conn: &mut Connection,
    store: &MediaStore,
    author_id: i64,
    input: &PostInput,
    staged: Option<&str>,
) -> Result<i64, BlogError> {
    let tx = conn.transaction().map_err(DbError::from)?;
    let post_id = posts_db_operations::insert_post(&tx, author_id, input, staged, &Utc::now())?;

    let moved = match staged {
        Some(staged) => store.relocate_post_image(post_id, staged)?,
        None => None,
    };

    let result = (|| -> Result<(), DbError> {
        if let Some(new_path) = &moved {
            posts_db_operations::set_post_image(&tx, post_id, Some(new_path.as_str()))?;
        }
        tx.commit()?;
        Ok(())
    })();

    if let Err(e) = result {
        if let Some(path) = &moved {
            store.delete(path);
        }
        return Err(e.into());
    }
    Ok(post_id)
}

/// Creates a post authored by `author_id`. An uploaded image is staged first
/// and relocated once the post has an id; any failure leaves neither a row
/// nor a staged file behind.
pub fn create_post(
    conn: &mut Connection,
    store: &MediaStore,
    author_id: i64,
    form: &PostForm,
) -> Result<SaveOutcome<Post>, BlogError> {
    let (input, errors) = form.validate(conn, None)?;
    if !errors.is_empty() {
        return Ok(SaveOutcome::Invalid(errors));
    }

    let staged = match &form.image {
        Some(image) => Some(store.stage_post_image(image)?),
        None => None,
    };

    match insert_and_relocate(conn, store, author_id, &input, staged.as_deref()) {
        Ok(post_id) => {
            log::info!("Created post {} '{}'", post_id, input.title);
            Ok(SaveOutcome::Saved(fetch_post(conn, post_id)?))
        }
        Err(e) => {
            if let Some(staged) = &staged {
                if MediaStore::is_staged(staged) && store.absolute(staged).map(|p| p.exists()).unwrap_or(false) {
                    store.delete(staged);
                }
            }
            match e {
                BlogError::Database(db) => Ok(SaveOutcome::Invalid(title_conflict(db)?)),
                other => Err(other),
            }
        }
    }
}

/// Saves edits to `post`, stamping the edited date. A new upload goes straight
/// to the post's directory; the replaced or cleared file is deleted after commit.
pub fn update_post(
    conn: &mut Connection,
    store: &MediaStore,
    post: &Post,
    form: &PostForm,
) -> Result<SaveOutcome<Post>, BlogError> {
    let (input, errors) = form.validate(conn, Some(post.id))?;
    if !errors.is_empty() {
        return Ok(SaveOutcome::Invalid(errors));
    }

    let new_image = match &form.image {
        Some(image) => Some(store.save(&MediaStore::post_image_dir(post.id), image)?),
        None => None,
    };

    let result = (|| -> Result<(), DbError> {
        let tx = conn.transaction()?;
        posts_db_operations::update_post(&tx, post.id, &input, &Utc::now())?;
        if new_image.is_some() {
            posts_db_operations::set_post_image(&tx, post.id, new_image.as_deref())?;
        } else if form.clear_image {
            posts_db_operations::set_post_image(&tx, post.id, None)?;
        }
        tx.commit()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            if new_image.is_some() || form.clear_image {
                if let Some(old) = &post.image {
                    store.delete(old);
                }
            }
            Ok(SaveOutcome::Saved(fetch_post(conn, post.id)?))
        }
        Err(e) => {
            if let Some(path) = &new_image {
                store.delete(path);
            }
            Ok(SaveOutcome::Invalid(title_conflict(e)?))
        }
    }
}

/// Removes the post with its comments, then its image file.
pub fn delete_post(conn: &Connection, store: &MediaStore, post: &Post) -> Result<(), BlogError> {
    posts_db_operations::delete_post(conn, post.id)?;
    if let Some(image) = &post.image {
        store.delete(image);
    }
    log::info!("Deleted post {}", post.id);
    Ok(())
}

/// Stamps the publish date with the current time. Publishing again overwrites it.
pub fn publish_post(conn: &Connection, post_id: i64) -> Result<(), BlogError> {
    posts_db_operations::set_publish_date(conn, post_id, &Utc::now())?;
    log::info!("Published post {}", post_id);
    Ok(())
}
