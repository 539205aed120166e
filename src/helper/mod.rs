pub mod authorization;
pub mod comment_helpers;
pub mod form_helpers;
pub mod image_helpers;
pub mod pagination;
pub mod post_helpers;
pub mod render_helpers;
pub mod sanitization_helpers;
pub mod search_helpers;
pub mod slug_helpers;
pub mod tag_helpers;
