use crate::errors::BlogError;
use crate::helper::sanitization_helpers;
use crate::middleware::Actor;
use crate::models::Notification;
use actix_session::Session;
use actix_web::http::header;
use actix_web::HttpResponse;
use serde_json::Value;
use std::collections::HashMap;
use tera::{Context, Tera};

const NOTIFICATION_KEY: &str = "notification";
const DEFAULT_EXCERPT_CHARS: usize = 200;

/// `{{ post.text | excerpt(chars=120) }}`: plain-text preview of rich text.
fn excerpt_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value.as_str().unwrap_or_default();
    let chars = match args.get("chars") {
        Some(v) => v.as_u64().ok_or_else(|| tera::Error::msg("excerpt: `chars` must be a positive integer"))? as usize,
        None => DEFAULT_EXCERPT_CHARS,
    };
    Ok(Value::String(sanitization_helpers::excerpt(text, chars)))
}

/// Loads every template matching `glob` and registers the site's filters.
pub fn load_templates(glob: &str) -> Result<Tera, tera::Error> {
    let mut tera = Tera::new(glob)?;
    tera.register_filter("excerpt", excerpt_filter);
    Ok(tera)
}

/// Queues a one-shot message shown on the next rendered page.
pub fn notify(session: &Session, message: impl Into<String>) -> Result<(), BlogError> {
    session.insert(
        NOTIFICATION_KEY,
        Notification { message: message.into(), r#type: "success".to_string() },
    )?;
    Ok(())
}

pub fn notify_error(session: &Session, message: impl Into<String>) -> Result<(), BlogError> {
    session.insert(
        NOTIFICATION_KEY,
        Notification { message: message.into(), r#type: "error".to_string() },
    )?;
    Ok(())
}

pub fn take_notification(session: &Session) -> Option<Notification> {
    session.remove_as::<Notification>(NOTIFICATION_KEY).and_then(Result::ok)
}

/// Context shared by every page: the current user, the CSRF token for its
/// forms and any pending notification.
pub fn base_context(actor: &Actor, session: &Session, csrf_token: &str) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &actor.user);
    ctx.insert("csrf_token", csrf_token);
    if let Some(notification) = take_notification(session) {
        ctx.insert("notification", &notification);
    }
    ctx
}

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> Result<HttpResponse, BlogError> {
    let rendered = tera.render(template, ctx)?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().append_header((header::LOCATION, location)).finish()
}

pub fn notify_and_redirect(session: &Session, message: impl Into<String>, location: &str) -> Result<HttpResponse, BlogError> {
    notify(session, message)?;
    Ok(redirect(location))
}
