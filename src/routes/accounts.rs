use crate::errors::BlogError;
use crate::helper::authorization;
use crate::helper::form_helpers::TokenForm;
use crate::helper::render_helpers::{base_context, notify_error, redirect, render};
use crate::middleware::{start_session, Actor, SessionUser};
use crate::models::db_operations::users_db_operations;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tera::Tera;

#[derive(Deserialize)]
struct LoginForm {
    csrf_token: CsrfToken,
    username: String,
    password: String,
    next: Option<String>,
}

impl CsrfGuarded for LoginForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

/// Mounted under `/accounts`.
pub fn config_login(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::get().to(show_login_form))
        .route("/login", web::post().to(handle_login));
}

pub fn config_logout(cfg: &mut web::ServiceConfig) {
    cfg.route("/logout", web::post().to(handle_logout));
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

async fn show_login_form(
    actor: Actor,
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
    query: web::Query<LoginQuery>,
) -> Result<HttpResponse, BlogError> {
    let next = safe_next(query.next.as_deref()).to_string();
    if actor.is_authenticated() {
        return Ok(redirect(&next));
    }

    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("next", &next);
    render(&tera, "accounts/login.html", &ctx)
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<LoginForm>>,
) -> Result<HttpResponse, BlogError> {
    let login_data = form.into_inner().into_inner();
    let next = safe_next(login_data.next.as_deref()).to_string();

    let user = web::block({
        let pool = pool.clone();
        let username = login_data.username.clone();
        move || -> Result<_, BlogError> {
            let conn = pool.get()?;
            let user = users_db_operations::verify_credentials(&conn, &username, &login_data.password);
            if user.is_some() {
                if let Err(e) = users_db_operations::update_last_login_time(&conn, &username) {
                    log::error!("Failed to record login time for {}: {}", username, e);
                }
            }
            Ok(user)
        }
    })
    .await??;

    match user {
        Some(user) => {
            log::info!("User '{}' logged in", user.username);
            start_session(&session, &SessionUser { id: user.id, username: user.username, is_staff: user.is_staff })?;
            Ok(redirect(&next))
        }
        None => {
            log::warn!("Failed login attempt for '{}'", login_data.username);
            notify_error(&session, "Please enter a correct username and password.")?;
            let login_url = crate::errors::login_url(&next);
            Ok(redirect(&login_url))
        }
    }
}

async fn handle_logout(
    actor: Actor,
    session: Session,
    _form: Csrf<web::Form<TokenForm>>,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    log::info!("User '{}' logged out", user.username);
    session.purge();
    Ok(redirect("/"))
}
