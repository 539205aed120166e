use crate::helper::image_helpers::StorageError;
use crate::models::db_operations::DbError;
use actix_csrf::CsrfError;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use url::form_urlencoded;

/// Request-level failures. Validation problems are not errors here: they are
/// rendered back into the submitted form.
#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Login required for {next}")]
    Unauthenticated { next: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error("Session error: {0}")]
    Session(#[from] actix_session::SessionInsertError),
    #[error("CSRF check failed: {0}")]
    Csrf(#[from] CsrfError),
}

impl From<r2d2::Error> for BlogError {
    fn from(e: r2d2::Error) -> Self {
        BlogError::Database(DbError::Pool(e))
    }
}

impl From<rusqlite::Error> for BlogError {
    fn from(e: rusqlite::Error) -> Self {
        BlogError::Database(DbError::from(e))
    }
}

pub fn login_url(next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("/accounts/login?{}", query)
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::NotFound(_) => StatusCode::NOT_FOUND,
            BlogError::Forbidden(_) => StatusCode::FORBIDDEN,
            BlogError::Unauthenticated { .. } => StatusCode::FOUND,
            BlogError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BlogError::Csrf(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BlogError::Database(DbError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            BlogError::Unauthenticated { next } => HttpResponse::Found()
                .append_header((header::LOCATION, login_url(next)))
                .finish(),
            BlogError::NotFound(what) => {
                log::debug!("404 for {}", what);
                HttpResponse::NotFound().content_type("text/html; charset=utf-8").body("<h1>Not Found</h1>")
            }
            BlogError::Forbidden(reason) => {
                log::warn!("Denied request: {}", reason);
                HttpResponse::Forbidden().content_type("text/html; charset=utf-8").body("<h1>Forbidden</h1>")
            }
            BlogError::BadRequest(reason) => HttpResponse::BadRequest()
                .content_type("text/plain; charset=utf-8")
                .body(reason.clone()),
            BlogError::Csrf(e) => e.error_response(),
            other => {
                let status = other.status_code();
                if status == StatusCode::NOT_FOUND {
                    return HttpResponse::NotFound().content_type("text/html; charset=utf-8").body("<h1>Not Found</h1>");
                }
                log::error!("Request failed: {}", other);
                HttpResponse::InternalServerError()
                    .content_type("text/html; charset=utf-8")
                    .body("<h1>Server Error</h1>")
            }
        }
    }
}
