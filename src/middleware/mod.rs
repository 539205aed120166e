use crate::errors::BlogError;
use actix_session::{Session, SessionExt, SessionInsertError};
use actix_web::{dev, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_USERNAME: &str = "username";
pub const SESSION_IS_STAFF: &str = "is_staff";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

/// The identity issuing the request, possibly anonymous. Handlers take it as
/// an explicit parameter and pass it to the guards.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: Option<SessionUser>,
    /// Path and query of the request, used as the login `next` target.
    pub path: String,
}

impl Actor {
    pub fn anonymous(path: &str) -> Self {
        Actor { user: None, path: path.to_string() }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().map_or(false, |u| u.is_staff)
    }
}

fn read_session_user(session: &Session) -> Option<SessionUser> {
    match (
        session.get::<i64>(SESSION_USER_ID),
        session.get::<String>(SESSION_USERNAME),
        session.get::<bool>(SESSION_IS_STAFF),
    ) {
        (Ok(Some(id)), Ok(Some(username)), Ok(Some(is_staff))) => Some(SessionUser { id, username, is_staff }),
        _ => None,
    }
}

impl FromRequest for Actor {
    type Error = BlogError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());
        let user = read_session_user(&req.get_session());
        ready(Ok(Actor { user, path }))
    }
}

pub fn start_session(session: &Session, user: &SessionUser) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_ID, user.id)?;
    session.insert(SESSION_USERNAME, &user.username)?;
    session.insert(SESSION_IS_STAFF, user.is_staff)?;
    Ok(())
}
