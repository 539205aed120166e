use crate::config::Config;
use crate::errors::BlogError;
use crate::helper::authorization;
use crate::helper::comment_helpers;
use crate::helper::form_helpers::{self, CommentForm, FormErrors, PostForm, TokenForm, CSRF_FIELD};
use crate::helper::image_helpers::MediaStore;
use crate::helper::pagination::PageQuery;
use crate::helper::post_helpers::{self, SaveOutcome};
use crate::helper::render_helpers::{base_context, notify_and_redirect, render};
use crate::helper::search_helpers::{self, PostSearchForm, PostSearchParams};
use crate::middleware::Actor;
use crate::models::db_operations::{tags_db_operations, users_db_operations};
use crate::models::queries::PostQuery;
use crate::models::Post;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfCookie, CsrfToken};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use tera::{Context, Tera};
use url::form_urlencoded;

pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(landing))
        .route("/post/create", web::get().to(show_post_create_form))
        .route("/post/create", web::post().to(create_post_action))
        .route(r"/post/{id:\d+}", web::get().to(post_detail))
        .route(r"/post/{id:\d+}", web::post().to(post_comment_action))
        .route(r"/post/{id:\d+}/comments", web::get().to(comment_list))
        .route(r"/post/update/{id:\d+}", web::get().to(show_post_update_form))
        .route(r"/post/update/{id:\d+}", web::post().to(update_post_action))
        .route(r"/post/update/{id:\d+}", web::put().to(update_post_action))
        .route(r"/post/delete/{id:\d+}", web::get().to(show_post_delete_confirm))
        .route(r"/post/delete/{id:\d+}", web::post().to(delete_post_action))
        .route(r"/post/delete/{id:\d+}", web::delete().to(delete_post_action))
        .route(r"/post/publish/{id:\d+}", web::post().to(publish_post_action))
        .route("/search", web::get().to(search))
        .route("/search/pre_search/{slug}", web::get().to(pre_search))
        .route(r"/comment/update/{id:\d+}", web::get().to(show_comment_update_form))
        .route(r"/comment/update/{id:\d+}", web::post().to(update_comment_action))
        .route(r"/comment/update/{id:\d+}", web::put().to(update_comment_action))
        .route(r"/comment/delete/{id:\d+}", web::get().to(show_comment_delete_confirm))
        .route(r"/comment/delete/{id:\d+}", web::post().to(delete_comment_action))
        .route(r"/comment/delete/{id:\d+}", web::delete().to(delete_comment_action))
        .route("/{username}/drafts", web::get().to(user_drafts));
}

fn post_url(post_id: i64) -> String {
    format!("/post/{}", post_id)
}

/// Query string that reproduces a search, used by the pagination links.
fn search_query_string(form: &PostSearchForm) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("post_input", &form.post_input)
        .append_pair("tag_input", &form.tag_input)
        .append_pair("order_input", &form.order_input.to_string())
        .finish()
}

// --- Landing ---

async fn landing(
    actor: Actor,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let (tags, posts) = post_helpers::landing(&conn)?;
    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("tags", &tags);
    ctx.insert("posts", &posts);
    render(&tera, "blog/landing.html", &ctx)
}

// --- Post forms ---

fn render_post_form(
    tera: &Tera,
    conn: &Connection,
    mut ctx: Context,
    form: &PostForm,
    errors: &FormErrors,
    post: Option<&Post>,
) -> Result<HttpResponse, BlogError> {
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("tag_choices", &tags_db_operations::read_tag_choices(conn)?);
    ctx.insert("post", &post);
    match post {
        Some(post) => ctx.insert("action", &format!("/post/update/{}", post.id)),
        None => ctx.insert("action", "/post/create"),
    }
    render(tera, "blog/post_form.html", &ctx)
}

async fn show_post_create_form(
    actor: Actor,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let ctx = base_context(&actor, &session, token.get());
    render_post_form(&tera, &conn, ctx, &PostForm::default(), &FormErrors::default(), None)
}

async fn create_post_action(
    actor: Actor,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    store: web::Data<MediaStore>,
    config: web::Data<Config>,
    csrf: Option<CsrfCookie>,
    payload: Multipart,
) -> Result<HttpResponse, BlogError> {
    let author = authorization::staff_only(&actor)?.clone();
    let data = form_helpers::read_multipart(payload, config.max_upload_size_bytes()).await?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), &data.text(CSRF_FIELD))?;
    let form = PostForm::from_multipart(data);

    let (form, outcome) = web::block({
        let pool = pool.clone();
        let store = store.clone();
        move || -> Result<_, BlogError> {
            let mut conn = pool.get()?;
            let outcome = post_helpers::create_post(&mut conn, &store, author.id, &form)?;
            Ok((form, outcome))
        }
    })
    .await??;

    match outcome {
        SaveOutcome::Saved(post) => notify_and_redirect(
            &session,
            format!("{} was created successfully", post.title),
            &post_url(post.id),
        ),
        SaveOutcome::Invalid(errors) => {
            let conn = pool.get()?;
            render_post_form(&tera, &conn, base_context(&actor, &session, &csrf_token), &form, &errors, None)
        }
    }
}

async fn show_post_update_form(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    authorization::is_post_author(user, &post)?;

    let ctx = base_context(&actor, &session, token.get());
    render_post_form(&tera, &conn, ctx, &PostForm::from_post(&post), &FormErrors::default(), Some(&post))
}

async fn update_post_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    store: web::Data<MediaStore>,
    config: web::Data<Config>,
    csrf: Option<CsrfCookie>,
    payload: Multipart,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::staff_only(&actor)?;
    let post = {
        let conn = pool.get()?;
        post_helpers::fetch_post(&conn, path.into_inner())?
    };
    authorization::is_post_author(user, &post)?;

    let data = form_helpers::read_multipart(payload, config.max_upload_size_bytes()).await?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), &data.text(CSRF_FIELD))?;
    let form = PostForm::from_multipart(data);

    let (form, post, outcome) = web::block({
        let pool = pool.clone();
        let store = store.clone();
        move || -> Result<_, BlogError> {
            let mut conn = pool.get()?;
            let outcome = post_helpers::update_post(&mut conn, &store, &post, &form)?;
            Ok((form, post, outcome))
        }
    })
    .await??;

    match outcome {
        SaveOutcome::Saved(updated) => notify_and_redirect(
            &session,
            format!("{} was edited successfully", updated.title),
            &post_url(updated.id),
        ),
        SaveOutcome::Invalid(errors) => {
            let conn = pool.get()?;
            render_post_form(&tera, &conn, base_context(&actor, &session, &csrf_token), &form, &errors, Some(&post))
        }
    }
}

async fn show_post_delete_confirm(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("post", &post);
    render(&tera, "blog/post_confirm_delete.html", &ctx)
}

async fn delete_post_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    store: web::Data<MediaStore>,
    _form: Csrf<web::Form<TokenForm>>,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let post_id = path.into_inner();
    web::block(move || -> Result<(), BlogError> {
        let conn = pool.get()?;
        let post = post_helpers::fetch_post(&conn, post_id)?;
        post_helpers::delete_post(&conn, &store, &post)
    })
    .await??;
    notify_and_redirect(&session, "Post deleted", "/")
}

async fn publish_post_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    _form: Csrf<web::Form<TokenForm>>,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    post_helpers::publish_post(&conn, post.id)?;
    notify_and_redirect(&session, "Published!", &post_url(post.id))
}

// --- Post detail and comments ---

fn render_post_detail(
    tera: &Tera,
    conn: &Connection,
    mut ctx: Context,
    post: &Post,
    form: &CommentForm,
    errors: &FormErrors,
) -> Result<HttpResponse, BlogError> {
    let (comments, page) = comment_helpers::comments_page(conn, post.id, None)?;
    ctx.insert("post", post);
    ctx.insert("comments", &comments);
    ctx.insert("comment_count", &page.total);
    ctx.insert("more_comments", &page.has_next);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    render(tera, "blog/post_detail.html", &ctx)
}

async fn post_detail(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    authorization::can_view_post(&actor, &post)?;
    let ctx = base_context(&actor, &session, token.get());
    render_post_detail(&tera, &conn, ctx, &post, &CommentForm::default(), &FormErrors::default())
}

async fn post_comment_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    csrf: Option<CsrfCookie>,
    body: web::Bytes,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    if !post.is_published() {
        return Err(BlogError::Forbidden(format!("post {} is not published", post.id)));
    }

    let fields = form_helpers::parse_form(&body)?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), fields.get(CSRF_FIELD).map_or("", String::as_str))?;
    let form = CommentForm::from_fields(&fields);
    match form.validate() {
        Ok(text) => {
            comment_helpers::post_comment(&conn, &post, user.id, &text)?;
            notify_and_redirect(&session, "Comment posted successfully!", &post_url(post.id))
        }
        Err(errors) => {
            let ctx = base_context(&actor, &session, &csrf_token);
            render_post_detail(&tera, &conn, ctx, &post, &form, &errors)
        }
    }
}

async fn comment_list(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let post = post_helpers::fetch_post(&conn, path.into_inner())?;
    authorization::can_view_post(&actor, &post)?;
    let (comments, page) = comment_helpers::comments_page(&conn, post.id, query.page.as_deref())?;

    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    ctx.insert("page", &page);
    render(&tera, "blog/comment_list.html", &ctx)
}

async fn show_comment_update_form(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    let conn = pool.get()?;
    let comment = comment_helpers::fetch_comment(&conn, path.into_inner())?;
    authorization::is_comment_author(user, &comment)?;

    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("comment", &comment);
    ctx.insert("form", &CommentForm::from_comment(&comment));
    ctx.insert("errors", &FormErrors::default());
    render(&tera, "blog/comment_form.html", &ctx)
}

async fn update_comment_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    csrf: Option<CsrfCookie>,
    body: web::Bytes,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    let conn = pool.get()?;
    let comment = comment_helpers::fetch_comment(&conn, path.into_inner())?;
    authorization::is_comment_author(user, &comment)?;

    let fields = form_helpers::parse_form(&body)?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), fields.get(CSRF_FIELD).map_or("", String::as_str))?;
    let form = CommentForm::from_fields(&fields);
    match form.validate() {
        Ok(text) => {
            comment_helpers::edit_comment(&conn, &comment, &text)?;
            notify_and_redirect(&session, "Comment was edited successfully!", &post_url(comment.post_id))
        }
        Err(errors) => {
            let mut ctx = base_context(&actor, &session, &csrf_token);
            ctx.insert("comment", &comment);
            ctx.insert("form", &form);
            ctx.insert("errors", &errors);
            render(&tera, "blog/comment_form.html", &ctx)
        }
    }
}

async fn show_comment_delete_confirm(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    let conn = pool.get()?;
    let comment = comment_helpers::fetch_comment(&conn, path.into_inner())?;
    authorization::is_comment_author_or_staff(user, &comment)?;

    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("comment", &comment);
    render(&tera, "blog/comment_confirm_delete.html", &ctx)
}

async fn delete_comment_action(
    actor: Actor,
    session: Session,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
    _form: Csrf<web::Form<TokenForm>>,
) -> Result<HttpResponse, BlogError> {
    let user = authorization::require_login(&actor)?;
    let conn = pool.get()?;
    let comment = comment_helpers::fetch_comment(&conn, path.into_inner())?;
    authorization::is_comment_author_or_staff(user, &comment)?;

    comment_helpers::delete_comment(&conn, &comment)?;
    notify_and_redirect(&session, "Comment deleted", &post_url(comment.post_id))
}

// --- Search ---

fn render_search(
    tera: &Tera,
    conn: &Connection,
    mut ctx: Context,
    template: &str,
    action: &str,
    query: &PostQuery,
    form: &PostSearchForm,
    raw_page: Option<&str>,
) -> Result<HttpResponse, BlogError> {
    let (posts, page) = post_helpers::search_page(conn, query, raw_page)?;
    ctx.insert("posts", &posts);
    ctx.insert("page", &page);
    ctx.insert("search_form", form);
    ctx.insert("search_action", action);
    ctx.insert("search_query", &search_query_string(form));
    ctx.insert("tag_choices", &tags_db_operations::read_tag_choices(conn)?);
    render(tera, template, &ctx)
}

async fn search(
    actor: Actor,
    session: Session,
    params: web::Query<PostSearchParams>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let (query, form) = search_helpers::build_post_query(&conn, PostQuery::published(), &params)?;
    let ctx = base_context(&actor, &session, token.get());
    render_search(&tera, &conn, ctx, "blog/search.html", "/search", &query, &form, params.page.as_deref())
}

async fn pre_search(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    params: web::Query<PostSearchParams>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let (query, form) = search_helpers::build_pre_search_query(&conn, &slug, &params)?;
    let ctx = base_context(&actor, &session, token.get());
    render_search(&tera, &conn, ctx, "blog/search.html", "/search", &query, &form, params.page.as_deref())
}

async fn user_drafts(
    actor: Actor,
    session: Session,
    username: web::Path<String>,
    params: web::Query<PostSearchParams>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    if !users_db_operations::user_exists(&conn, &username)? {
        return Err(BlogError::NotFound(format!("user '{}'", username)));
    }
    let user = authorization::is_self_for_drafts(&actor, &username)?;

    let (query, form) = search_helpers::build_post_query(&conn, PostQuery::drafts_of(user.id), &params)?;
    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("drafts_owner", username.as_str());
    let action = format!("/{}/drafts", username);
    render_search(&tera, &conn, ctx, "blog/user_draft_list.html", &action, &query, &form, params.page.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_links_repeat_the_search() {
        let form = PostSearchForm { post_input: "a b".into(), tag_input: "Go Lang".into(), order_input: 1 };
        assert_eq!(search_query_string(&form), "post_input=a+b&tag_input=Go+Lang&order_input=1");
    }
}
