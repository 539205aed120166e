use crate::config::Config;
use crate::errors::BlogError;
use crate::helper::authorization;
use crate::helper::form_helpers::{self, FormErrors, TagForm, TokenForm, CSRF_FIELD};
use crate::helper::image_helpers::MediaStore;
use crate::helper::post_helpers::SaveOutcome;
use crate::helper::render_helpers::{base_context, notify_and_redirect, render};
use crate::helper::search_helpers::{self, TagSearchForm, TagSearchParams};
use crate::helper::tag_helpers;
use crate::middleware::Actor;
use crate::models::Tag;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfCookie, CsrfToken};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse};
use tera::{Context, Tera};
use url::form_urlencoded;

pub fn config_tags(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tag")
            .route("/create", web::get().to(show_tag_create_form))
            .route("/create", web::post().to(create_tag_action))
            .route("/list", web::get().to(tag_list))
            .route("/overview/{slug}", web::get().to(tag_overview))
            .route("/update/{slug}", web::get().to(show_tag_update_form))
            .route("/update/{slug}", web::post().to(update_tag_action))
            .route("/update/{slug}", web::put().to(update_tag_action))
            .route("/delete/{slug}", web::get().to(show_tag_delete_confirm))
            .route("/delete/{slug}", web::post().to(delete_tag_action))
            .route("/delete/{slug}", web::delete().to(delete_tag_action)),
    );
}

fn overview_url(slug: &str) -> String {
    format!("/tag/overview/{}", slug)
}

fn list_query_string(form: &TagSearchForm) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("name_input", &form.name_input)
        .append_pair("order_input", &form.order_input.to_string())
        .finish()
}

fn render_tag_form(tera: &Tera, mut ctx: Context, form: &TagForm, errors: &FormErrors, tag: Option<&Tag>) -> Result<HttpResponse, BlogError> {
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("tag", &tag);
    match tag {
        Some(tag) => ctx.insert("action", &format!("/tag/update/{}", tag.slug)),
        None => ctx.insert("action", "/tag/create"),
    }
    render(tera, "blog/tag_form.html", &ctx)
}

async fn show_tag_create_form(
    actor: Actor,
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let ctx = base_context(&actor, &session, token.get());
    render_tag_form(&tera, ctx, &TagForm::default(), &FormErrors::default(), None)
}

async fn create_tag_action(
    actor: Actor,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    store: web::Data<MediaStore>,
    config: web::Data<Config>,
    csrf: Option<CsrfCookie>,
    payload: Multipart,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let data = form_helpers::read_multipart(payload, config.max_upload_size_bytes()).await?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), &data.text(CSRF_FIELD))?;
    let form = TagForm::from_multipart(data);

    let (form, outcome) = web::block(move || -> Result<_, BlogError> {
        let conn = pool.get()?;
        let outcome = tag_helpers::create_tag(&conn, &store, &form)?;
        Ok((form, outcome))
    })
    .await??;

    match outcome {
        SaveOutcome::Saved(tag) => notify_and_redirect(
            &session,
            format!("{} tag was created successfully", tag.name),
            &overview_url(&tag.slug),
        ),
        SaveOutcome::Invalid(errors) => render_tag_form(&tera, base_context(&actor, &session, &csrf_token), &form, &errors, None),
    }
}

async fn tag_list(
    actor: Actor,
    session: Session,
    params: web::Query<TagSearchParams>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let (query, form) = search_helpers::build_tag_query(&params);
    let (tags, page) = tag_helpers::search_page(&conn, &query, params.page.as_deref())?;

    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("tags", &tags);
    ctx.insert("page", &page);
    ctx.insert("search_form", &form);
    ctx.insert("search_query", &list_query_string(&form));
    render(&tera, "blog/tag_list.html", &ctx)
}

async fn tag_overview(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = pool.get()?;
    let (tag, posts) = tag_helpers::overview(&conn, &slug)?;
    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("tag", &tag);
    ctx.insert("posts", &posts);
    render(&tera, "blog/tag_overview.html", &ctx)
}

async fn show_tag_update_form(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let tag = tag_helpers::fetch_tag(&conn, &slug)?;
    let ctx = base_context(&actor, &session, token.get());
    render_tag_form(&tera, ctx, &TagForm::from_tag(&tag), &FormErrors::default(), Some(&tag))
}

async fn update_tag_action(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    store: web::Data<MediaStore>,
    config: web::Data<Config>,
    csrf: Option<CsrfCookie>,
    payload: Multipart,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let tag = {
        let conn = pool.get()?;
        tag_helpers::fetch_tag(&conn, &slug)?
    };

    let data = form_helpers::read_multipart(payload, config.max_upload_size_bytes()).await?;
    let csrf_token = form_helpers::check_csrf(csrf.as_ref(), &data.text(CSRF_FIELD))?;
    let form = TagForm::from_multipart(data);

    let (form, tag, outcome) = web::block(move || -> Result<_, BlogError> {
        let mut conn = pool.get()?;
        let outcome = tag_helpers::update_tag(&mut conn, &store, &tag, &form)?;
        Ok((form, tag, outcome))
    })
    .await??;

    match outcome {
        SaveOutcome::Saved(updated) => notify_and_redirect(
            &session,
            format!("{} tag was edited successfully", updated.name),
            &overview_url(&updated.slug),
        ),
        SaveOutcome::Invalid(errors) => render_tag_form(&tera, base_context(&actor, &session, &csrf_token), &form, &errors, Some(&tag)),
    }
}

async fn show_tag_delete_confirm(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let conn = pool.get()?;
    let tag = tag_helpers::fetch_tag(&conn, &slug)?;
    let mut ctx = base_context(&actor, &session, token.get());
    ctx.insert("tag", &tag);
    render(&tera, "blog/tag_confirm_delete.html", &ctx)
}

async fn delete_tag_action(
    actor: Actor,
    session: Session,
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    store: web::Data<MediaStore>,
    _form: Csrf<web::Form<TokenForm>>,
) -> Result<HttpResponse, BlogError> {
    authorization::staff_only(&actor)?;
    let slug = slug.into_inner();
    web::block(move || -> Result<(), BlogError> {
        let conn = pool.get()?;
        let tag = tag_helpers::fetch_tag(&conn, &slug)?;
        tag_helpers::delete_tag(&conn, &store, &tag)
    })
    .await??;
    notify_and_redirect(&session, "Topic deleted", "/tag/list")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_links_repeat_the_filter() {
        let form = TagSearchForm { name_input: "go".into(), order_input: 2 };
        assert_eq!(list_query_string(&form), "name_input=go&order_input=2");
        assert_eq!(overview_url("go-lang"), "/tag/overview/go-lang");
    }
}
