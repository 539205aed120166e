//! Per-action guards over `(actor, target)`. Handlers compose them explicitly:
//! existence first, then these checks, then business state.

use crate::errors::BlogError;
use crate::middleware::{Actor, SessionUser};
use crate::models::{Comment, Post};

/// Anonymous actors are redirected to the login page instead of being denied.
pub fn require_login(actor: &Actor) -> Result<&SessionUser, BlogError> {
    actor
        .user
        .as_ref()
        .ok_or_else(|| BlogError::Unauthenticated { next: actor.path.clone() })
}

pub fn staff_only(actor: &Actor) -> Result<&SessionUser, BlogError> {
    let user = require_login(actor)?;
    if user.is_staff {
        Ok(user)
    } else {
        Err(BlogError::Forbidden(format!("{} is not staff", user.username)))
    }
}

pub fn is_post_author(user: &SessionUser, post: &Post) -> Result<(), BlogError> {
    if post.author_id == Some(user.id) {
        Ok(())
    } else {
        Err(BlogError::Forbidden(format!("{} is not the author of post {}", user.username, post.id)))
    }
}

pub fn is_comment_author(user: &SessionUser, comment: &Comment) -> Result<(), BlogError> {
    if comment.author_id == Some(user.id) {
        Ok(())
    } else {
        Err(BlogError::Forbidden(format!("{} is not the author of comment {}", user.username, comment.id)))
    }
}

pub fn is_comment_author_or_staff(user: &SessionUser, comment: &Comment) -> Result<(), BlogError> {
    if user.is_staff {
        return Ok(());
    }
    is_comment_author(user, comment)
}

/// Drafts are private to their author. Staff do not override this.
pub fn is_self_for_drafts<'a>(actor: &'a Actor, username: &str) -> Result<&'a SessionUser, BlogError> {
    let user = staff_only(actor)?;
    if user.username == username {
        Ok(user)
    } else {
        Err(BlogError::Forbidden(format!("{} may not view drafts of {}", user.username, username)))
    }
}

/// Unpublished posts are only visible to their author.
pub fn can_view_post(actor: &Actor, post: &Post) -> Result<(), BlogError> {
    if post.is_published() {
        return Ok(());
    }
    match &actor.user {
        Some(user) if post.author_id == Some(user.id) => Ok(()),
        _ => Err(BlogError::Forbidden(format!("post {} is a draft", post.id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor(id: i64, name: &str, is_staff: bool) -> Actor {
        Actor {
            user: Some(SessionUser { id, username: name.to_string(), is_staff }),
            path: "/".to_string(),
        }
    }

    fn post(author_id: Option<i64>, published: bool) -> Post {
        Post {
            id: 7,
            author_id,
            author_username: None,
            title: "t".into(),
            subheading: None,
            image: None,
            created_date: Utc::now(),
            publish_date: if published { Some(Utc::now()) } else { None },
            edited_date: None,
            text: None,
            tags: Vec::new(),
        }
    }

    fn comment(author_id: Option<i64>) -> Comment {
        Comment {
            id: 3,
            post_id: 7,
            author_id,
            author_username: None,
            created_date: Utc::now(),
            edited_date: None,
            text: "hi".into(),
        }
    }

    #[test]
    fn anonymous_actor_is_asked_to_log_in() {
        let anon = Actor::anonymous("/post/create");
        match staff_only(&anon) {
            Err(BlogError::Unauthenticated { next }) => assert_eq!(next, "/post/create"),
            other => panic!("unexpected {:?}", other.map(|u| u.id)),
        }
    }

    #[test]
    fn staff_only_denies_regular_users() {
        assert!(matches!(staff_only(&actor(1, "ann", false)), Err(BlogError::Forbidden(_))));
        assert!(staff_only(&actor(1, "ann", true)).is_ok());
    }

    #[test]
    fn comment_guards() {
        let staff = actor(1, "ann", true);
        let author = actor(2, "bob", false);
        let other = actor(3, "cy", false);
        let c = comment(Some(2));

        let user = |a: &Actor| a.user.clone().unwrap();
        assert!(is_comment_author(&user(&author), &c).is_ok());
        assert!(is_comment_author(&user(&staff), &c).is_err());
        assert!(is_comment_author_or_staff(&user(&staff), &c).is_ok());
        assert!(is_comment_author_or_staff(&user(&other), &c).is_err());
        assert!(is_comment_author_or_staff(&user(&author), &comment(None)).is_err());
    }

    #[test]
    fn drafts_are_self_only_even_for_staff() {
        let staff = actor(1, "ann", true);
        assert!(is_self_for_drafts(&staff, "ann").is_ok());
        assert!(matches!(is_self_for_drafts(&staff, "bob"), Err(BlogError::Forbidden(_))));
        assert!(matches!(is_self_for_drafts(&actor(2, "bob", false), "bob"), Err(BlogError::Forbidden(_))));
    }

    #[test]
    fn drafts_are_visible_to_their_author_only() {
        let draft = post(Some(2), false);
        assert!(can_view_post(&actor(2, "bob", false), &draft).is_ok());
        assert!(can_view_post(&actor(1, "ann", true), &draft).is_err());
        assert!(can_view_post(&Actor::anonymous("/"), &draft).is_err());
        assert!(can_view_post(&Actor::anonymous("/"), &post(None, true)).is_ok());
        assert!(is_post_author(&actor(2, "bob", true).user.unwrap(), &draft).is_ok());
    }
}
