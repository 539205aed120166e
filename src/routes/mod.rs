pub mod accounts;
pub mod blog;
pub mod tags;

use actix_csrf::CsrfMiddleware;
use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::{Key, SameSite};
use actix_web::http::Method;
use actix_web::web;
use rand::prelude::StdRng;

pub fn session_middleware(key: Key, secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_secure(secure)
        .cookie_http_only(true)
        .cookie_same_site(SameSite::Lax)
        .build()
}

/// GET pages that render a form, including the logout button every page shows
/// to a signed-in user. Each of them issues a fresh CSRF cookie and token.
const FORM_PAGES: &[&str] = &[
    "/",
    "/accounts/login",
    "/post/create",
    r"/post/{id:\d+}",
    r"/post/{id:\d+}/comments",
    r"/post/update/{id:\d+}",
    r"/post/delete/{id:\d+}",
    "/search",
    "/search/pre_search/{slug}",
    r"/comment/update/{id:\d+}",
    r"/comment/delete/{id:\d+}",
    "/tag/create",
    "/tag/list",
    "/tag/overview/{slug}",
    "/tag/update/{slug}",
    "/tag/delete/{slug}",
    "/{username}/drafts",
];

pub fn csrf_middleware() -> CsrfMiddleware<StdRng> {
    FORM_PAGES
        .iter()
        .fold(CsrfMiddleware::<StdRng>::new(), |csrf, page| csrf.set_cookie(Method::GET, *page))
}

/// Every page of the site. Must be mounted inside the session middleware.
pub fn config_site(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .wrap(csrf_middleware())
            .service(web::scope("/accounts").configure(accounts::config_login))
            .configure(accounts::config_logout)
            .configure(tags::config_tags)
            .configure(blog::config_blog),
    );
}
