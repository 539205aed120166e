use crate::errors::BlogError;
use serde::{Deserialize, Serialize};

pub const POSTS_PER_PAGE: u32 = 12;
pub const TAGS_PER_PAGE: u32 = 12;
pub const COMMENTS_PER_PAGE: u32 = 10;

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Resolved page, exposed to templates for the plain prev/next links.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page {
    pub number: u32,
    pub num_pages: u32,
    pub total: u32,
    pub per_page: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Page {
    pub fn offset(&self) -> u32 {
        (self.number - 1) * self.per_page
    }
}

/// Resolves the `page` parameter against a result count. Accepts a 1-based
/// number or `last`. Anything else, or a page past the end, is a 404, except
/// that page 1 of an empty result always exists.
pub fn resolve_page(raw: Option<&str>, total: u32, per_page: u32) -> Result<Page, BlogError> {
    let num_pages = if total == 0 { 1 } else { (total + per_page - 1) / per_page };

    let number = match raw.map(str::trim) {
        None | Some("") => 1,
        Some("last") => num_pages,
        Some(other) => other
            .parse::<u32>()
            .map_err(|_| BlogError::NotFound(format!("page '{}'", other)))?,
    };

    if number == 0 || number > num_pages {
        return Err(BlogError::NotFound(format!("page {} of {}", number, num_pages)));
    }

    Ok(Page {
        number,
        num_pages,
        total,
        per_page,
        has_previous: number > 1,
        has_next: number < num_pages,
    })
}
