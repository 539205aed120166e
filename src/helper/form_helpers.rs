use crate::errors::BlogError;
use crate::helper::image_helpers::UploadedImage;
use crate::helper::sanitization_helpers;
use crate::helper::slug_helpers::slugify;
use crate::models::db_operations::{posts_db_operations, tags_db_operations, DbError};
use crate::models::{Comment, Post, PostInput, Tag, TagInput};
use actix_csrf::extractor::{CsrfCookie, CsrfGuarded, CsrfToken};
use actix_csrf::CsrfError;
use actix_multipart::Multipart;
use actix_web::web;
use futures_util::StreamExt;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::form_urlencoded;

const MAX_NAME_LEN: usize = 100;
const REQUIRED: &str = "This field is required.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Parses URL-encoded form data from bytes. Repeated keys keep the last value.
pub fn parse_form(form_bytes: &web::Bytes) -> Result<HashMap<String, String>, BlogError> {
    let body = std::str::from_utf8(form_bytes)
        .map_err(|_| BlogError::BadRequest("Invalid UTF-8 in request body.".to_string()))?;
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

pub const CSRF_FIELD: &str = "csrf_token";

/// Body of the button-only forms: delete, publish and logout.
#[derive(Deserialize)]
pub struct TokenForm {
    csrf_token: CsrfToken,
}

impl CsrfGuarded for TokenForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

/// Compares a token read out of a multipart or hand-parsed body with the CSRF
/// cookie. The token is handed back so a re-rendered form can carry it again.
pub fn check_csrf(cookie: Option<&CsrfCookie>, submitted: &str) -> Result<String, BlogError> {
    let cookie = cookie.ok_or(CsrfError::MissingCookie)?;
    if submitted.is_empty() {
        return Err(CsrfError::MissingToken.into());
    }
    if !cookie.validate(submitted) {
        return Err(CsrfError::TokenMismatch.into());
    }
    Ok(submitted.to_string())
}

/// Field messages keyed by field name, rendered next to each input.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

/// Text fields and the optional image of a multipart form.
#[derive(Debug, Default)]
pub struct MultipartData {
    fields: HashMap<String, Vec<String>>,
    pub image: Option<UploadedImage>,
    pub image_error: Option<String>,
}

impl MultipartData {
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).and_then(|v| v.last()).cloned().unwrap_or_default()
    }

    pub fn all(&self, name: &str) -> Vec<String> {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn checked(&self, name: &str) -> bool {
        self.fields.get(name).map_or(false, |v| v.iter().any(|s| !s.is_empty()))
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)], image: Option<UploadedImage>) -> Self {
        let mut data = MultipartData { image, ..Default::default() };
        for (k, v) in pairs {
            data.fields.entry(k.to_string()).or_default().push(v.to_string());
        }
        data
    }
}

/// Reads a whole multipart body. Text fields must be UTF-8; the `image` part is
/// kept in memory up to `max_image_bytes`, beyond which it is dropped and a
/// field error is recorded.
pub async fn read_multipart(mut payload: Multipart, max_image_bytes: u64) -> Result<MultipartData, BlogError> {
    let mut data = MultipartData::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| BlogError::BadRequest(format!("Malformed multipart body: {}", e)))?;
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();

        if name == "image" {
            let filename = field.content_disposition().get_filename().unwrap_or_default().to_string();
            let mut bytes = Vec::new();
            let mut too_large = false;
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| BlogError::BadRequest(format!("Malformed multipart body: {}", e)))?;
                if bytes.len() as u64 + chunk.len() as u64 > max_image_bytes {
                    too_large = true;
                    bytes.clear();
                    continue;
                }
                if !too_large {
                    bytes.extend_from_slice(&chunk);
                }
            }
            if too_large {
                data.image_error = Some(format!(
                    "The image exceeds the maximum upload size of {} MB.",
                    max_image_bytes / (1024 * 1024)
                ));
            } else if !filename.is_empty() || !bytes.is_empty() {
                data.image = Some(UploadedImage { filename, bytes });
            }
        } else {
            let mut bytes = web::BytesMut::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| BlogError::BadRequest(format!("Malformed multipart body: {}", e)))?;
                bytes.extend_from_slice(&chunk);
            }
            let value = String::from_utf8(bytes.to_vec())
                .map_err(|_| BlogError::BadRequest("Invalid UTF-8 in form field.".to_string()))?;
            data.fields.entry(name).or_default().push(value);
        }
    }
    Ok(data)
}

fn check_name(errors: &mut FormErrors, field: &str, value: &str) {
    let len = value.chars().count();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else if len > MAX_NAME_LEN {
        errors.add(field, format!("Ensure this value has at most {} characters (it has {}).", MAX_NAME_LEN, len));
    }
}

fn check_image(errors: &mut FormErrors, data_error: &Option<String>, image: &Option<UploadedImage>, clear: bool) {
    if let Some(message) = data_error {
        errors.add("image", message.clone());
    } else if let Some(image) = image {
        if image.safe_extension().is_none() {
            errors.add("image", INVALID_IMAGE);
        } else if clear {
            errors.add("image", "Please either submit a file or check the clear checkbox, not both.");
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

// --- Post ---

#[derive(Serialize, Debug, Default)]
pub struct PostForm {
    pub title: String,
    pub subheading: String,
    pub text: String,
    /// Raw submitted tag ids, kept for re-rendering the selection.
    pub tags: Vec<String>,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
    #[serde(skip)]
    pub image_error: Option<String>,
    pub clear_image: bool,
}

impl PostForm {
    pub fn from_multipart(data: MultipartData) -> Self {
        PostForm {
            title: data.text("title").trim().to_string(),
            subheading: data.text("subheading"),
            text: data.text("text"),
            tags: data.all("tags").into_iter().filter(|t| !t.trim().is_empty()).collect(),
            clear_image: data.checked("image-clear"),
            image: data.image,
            image_error: data.image_error,
        }
    }

    /// Pre-filled form for editing an existing post.
    pub fn from_post(post: &Post) -> Self {
        PostForm {
            title: post.title.clone(),
            subheading: post.subheading.clone().unwrap_or_default(),
            text: post.text.clone().unwrap_or_default(),
            tags: post.tags.iter().map(|t| t.id.to_string()).collect(),
            ..Default::default()
        }
    }

    fn tag_ids(&self, errors: &mut FormErrors) -> Vec<i64> {
        let mut ids = Vec::new();
        for raw in &self.tags {
            match raw.trim().parse::<i64>() {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(_) => errors.add("tags", format!("\"{}\" is not a valid value.", raw)),
            }
        }
        ids
    }

    /// Validates against the store. `post_id` excludes the post being edited
    /// from the uniqueness check.
    pub fn validate(&self, conn: &Connection, post_id: Option<i64>) -> Result<(PostInput, FormErrors), DbError> {
        let mut errors = FormErrors::default();

        check_name(&mut errors, "title", &self.title);
        if errors.get("title").is_none() && posts_db_operations::title_taken(conn, &self.title, post_id)? {
            errors.add("title", "Post with this Title already exists.");
        }

        let tag_ids = self.tag_ids(&mut errors);
        if errors.get("tags").is_none() && tags_db_operations::count_existing_tags(conn, &tag_ids)? != tag_ids.len() {
            errors.add("tags", "Select a valid choice. One of the selected topics is not available.");
        }

        check_image(&mut errors, &self.image_error, &self.image, self.clear_image);

        let text = sanitization_helpers::sanitize_rich_text(&self.text);
        let input = PostInput {
            title: self.title.clone(),
            subheading: optional(&self.subheading),
            text: optional(&text),
            tag_ids,
        };
        Ok((input, errors))
    }
}

// --- Tag ---

#[derive(Serialize, Debug, Default)]
pub struct TagForm {
    pub name: String,
    pub subheading: String,
    pub overview: String,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
    #[serde(skip)]
    pub image_error: Option<String>,
    pub clear_image: bool,
}

impl TagForm {
    pub fn from_multipart(data: MultipartData) -> Self {
        TagForm {
            name: data.text("name").trim().to_string(),
            subheading: data.text("subheading"),
            overview: data.text("overview"),
            clear_image: data.checked("image-clear"),
            image: data.image,
            image_error: data.image_error,
        }
    }

    pub fn from_tag(tag: &Tag) -> Self {
        TagForm {
            name: tag.name.clone(),
            subheading: tag.subheading.clone(),
            overview: tag.overview.clone(),
            ..Default::default()
        }
    }

    /// Returns the cleaned input together with the slug derived from the name.
    pub fn validate(&self, conn: &Connection, tag_id: Option<i64>) -> Result<(TagInput, String, FormErrors), DbError> {
        let mut errors = FormErrors::default();
        let slug = slugify(&self.name);

        check_name(&mut errors, "name", &self.name);
        if errors.get("name").is_none() {
            if tags_db_operations::name_taken(conn, &self.name, tag_id)? {
                errors.add("name", "Tag with this Name already exists.");
            } else if slug.is_empty() {
                errors.add("name", "The name must contain at least one letter or digit.");
            } else if tags_db_operations::slug_taken(conn, &slug, tag_id)? {
                errors.add("name", "A tag with a similar name already exists.");
            }
        }

        if self.subheading.trim().is_empty() {
            errors.add("subheading", REQUIRED);
        }

        let overview = sanitization_helpers::sanitize_rich_text(&self.overview);
        if overview.trim().is_empty() {
            errors.add("overview", REQUIRED);
        }

        check_image(&mut errors, &self.image_error, &self.image, self.clear_image);

        let input = TagInput {
            name: self.name.clone(),
            subheading: self.subheading.trim().to_string(),
            overview,
        };
        Ok((input, slug, errors))
    }
}

// --- Comment ---

#[derive(Serialize, Debug, Default, Clone)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        CommentForm { text: fields.get("text").cloned().unwrap_or_default() }
    }

    pub fn from_comment(comment: &Comment) -> Self {
        CommentForm { text: comment.text.clone() }
    }

    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED);
            return Err(errors);
        }
        Ok(text.to_string())
    }
}
