use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

/// Staging directory for post images uploaded before the post has an id.
pub const POST_TMP_DIR: &str = "post_pictures/tmp";
const MAX_STEM_LEN: usize = 80;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid media path: {0}")]
    InvalidPath(String),
}

/// An image received in a multipart form, held in memory until the form is valid.
/// Its type is taken from the bytes, never from the declared part header.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Maps an image MIME type to the extension files are stored with.
pub fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
    ].iter().cloned().collect();

    map.get(mime_type).cloned()
}

/// Detects the image type from the file signature. The declared content type
/// is not trusted.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

impl UploadedImage {
    pub fn safe_extension(&self) -> Option<&'static str> {
        sniff_image_mime(&self.bytes).and_then(mime_to_safe_extension)
    }
}

/// Reduces a client supplied file name to a safe stem, without directories or extension.
fn safe_stem(original: &str) -> String {
    let base = original.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() { "image".to_string() } else { trimmed.to_string() }
}

/// Files under the configured media root, addressed by relative paths such as
/// `post_pictures/post_4/cat.png`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MediaStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored relative path, refusing anything that escapes the root.
    pub fn absolute(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Picks a free file name in `dir`, adding a short random suffix on collision.
    fn free_name(&self, dir: &str, stem: &str, ext: &str) -> Result<String, StorageError> {
        let candidate = format!("{}/{}.{}", dir, stem, ext);
        if !self.absolute(&candidate)?.exists() {
            return Ok(candidate);
        }
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let candidate = format!("{}/{}_{}.{}", dir, stem, &suffix[..7], ext);
            if !self.absolute(&candidate)?.exists() {
                return Ok(candidate);
            }
        }
    }

    fn write_new(&self, dir: &str, stem: &str, ext: &str, bytes: &[u8]) -> Result<String, StorageError> {
        fs::create_dir_all(self.absolute(dir)?)?;
        let relative = self.free_name(dir, stem, ext)?;
        fs::write(self.absolute(&relative)?, bytes)?;
        Ok(relative)
    }

    /// Stores an upload under `dir` and returns its relative path.
    pub fn save(&self, dir: &str, image: &UploadedImage) -> Result<String, StorageError> {
        let ext = image
            .safe_extension()
            .ok_or_else(|| StorageError::InvalidPath(format!("{} is not a supported image", image.filename)))?;
        self.write_new(dir, &safe_stem(&image.filename), ext, &image.bytes)
    }

    pub fn stage_post_image(&self, image: &UploadedImage) -> Result<String, StorageError> {
        self.save(POST_TMP_DIR, image)
    }

    pub fn save_tag_image(&self, slug: &str, image: &UploadedImage) -> Result<String, StorageError> {
        self.save(&format!("tag_pictures/{}", slug), image)
    }

    pub fn post_image_dir(post_id: i64) -> String {
        format!("post_pictures/post_{}", post_id)
    }

    pub fn is_staged(relative: &str) -> bool {
        Path::new(relative).parent() == Some(Path::new(POST_TMP_DIR))
    }

    /// Moves a staged post image under the post's own directory. Returns the
    /// new relative path, or `None` when the image is not staged. A failure
    /// to remove the staged copy is logged and does not fail the move.
    pub fn relocate_post_image(&self, post_id: i64, relative: &str) -> Result<Option<String>, StorageError> {
        if !Self::is_staged(relative) {
            return Ok(None);
        }

        let staged = self.absolute(relative)?;
        let bytes = fs::read(&staged)?;
        let file_name = Path::new(relative)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(relative.to_string()))?;
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => (file_name, "bin"),
        };

        let new_path = self.write_new(&Self::post_image_dir(post_id), stem, ext, &bytes)?;

        if let Err(e) = fs::remove_file(&staged) {
            log::error!("Failed to remove staged image {}: {}", staged.display(), e);
        }
        log::info!("Relocated post image {} -> {}", relative, new_path);
        Ok(Some(new_path))
    }

    /// Deletes a stored file, logging instead of failing. Emptied entity
    /// directories are removed too.
    pub fn delete(&self, relative: &str) {
        let path = match self.absolute(relative) {
            Ok(path) => path,
            Err(e) => {
                log::error!("Refusing to delete media file: {}", e);
                return;
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    if parent != self.root.as_path() && !parent.ends_with(POST_TMP_DIR) {
                        // Only succeeds when empty.
                        let _ = fs::remove_dir(parent);
                    }
                }
            }
            Err(e) => log::error!("Failed to delete media file {}: {}", path.display(), e),
        }
    }

    /// Removes staged files older than `max_age`, left behind by abandoned
    /// forms. Returns the number of files removed.
    pub fn prune_staged(&self, max_age: Duration) -> Result<usize, StorageError> {
        let tmp = self.absolute(POST_TMP_DIR)?;
        if !tmp.exists() {
            return Ok(0);
        }
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in WalkDir::new(&tmp).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StorageError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry.metadata().map_err(|e| StorageError::Io(io::Error::new(io::ErrorKind::Other, e)))?.modified()?;
            if now.duration_since(modified).unwrap_or_default() >= max_age {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
