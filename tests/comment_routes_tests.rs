#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{TestContext, CSRF_TOKEN};

fn insert_post(ctx: &TestContext, author_id: i64, published: bool) -> i64 {
    let conn = ctx.pool.get().unwrap();
    let publish = if published { Some("2021-03-01T10:00:00.000000Z") } else { None };
    conn.execute(
        "INSERT INTO posts (author_id, title, created_date, publish_date) VALUES (?1, 'Post', '2021-01-01T10:00:00.000000Z', ?2)",
        rusqlite::params![author_id, publish],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn insert_comment(ctx: &TestContext, post_id: i64, author_id: i64, text: &str) -> i64 {
    let conn = ctx.pool.get().unwrap();
    conn.execute(
        "INSERT INTO comments (post_id, author_id, created_date, text) VALUES (?1, ?2, '2021-04-01T00:00:00.000000Z', ?3)",
        rusqlite::params![post_id, author_id, text],
    )
    .unwrap();
    conn.last_insert_rowid()
}

#[actix_web::test]
async fn readers_comment_on_published_posts() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    ctx.create_user("reader", "pw", false);
    let post = insert_post(&ctx, ann, true);
    let app = test::init_service(ctx.app()).await;
    let uri = format!("/post/{}", post);

    let req = test::TestRequest::post()
        .uri(&uri)
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "Nice")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(common::location(&resp).starts_with("/accounts/login?next="));

    let session = login!(app, "reader");
    let req = test::TestRequest::post()
        .uri(&uri)
        .cookie(session.clone())
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "Nice")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(common::location(&resp), uri);
    let page = follow!(app, resp, session);
    assert!(page.contains("Comment posted successfully!"));
    assert!(page.contains("1 comment"));
    assert!(page.contains("Nice"));
}

#[actix_web::test]
async fn blank_comment_re_renders_the_post() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    let post = insert_post(&ctx, ann, true);
    let app = test::init_service(ctx.app()).await;
    let session = login!(app, "ann");

    let req = test::TestRequest::post()
        .uri(&format!("/post/{}", post))
        .cookie(session)
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "   ")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("This field is required."));
    assert!(page.contains(&format!("name=\"csrf_token\" value=\"{}\"", CSRF_TOKEN)));
    assert_eq!(ctx.count("SELECT COUNT(*) FROM comments"), 0);
}

#[actix_web::test]
async fn comments_need_a_matching_form_token() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    let post = insert_post(&ctx, ann, true);
    let app = test::init_service(ctx.app()).await;
    let session = login!(app, "ann");

    let req = test::TestRequest::post()
        .uri(&format!("/post/{}", post))
        .cookie(session.clone())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "No cookie")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!("/post/{}", post))
        .cookie(session)
        .cookie(common::csrf_cookie())
        .set_form([("text", "No token")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(ctx.count("SELECT COUNT(*) FROM comments"), 0);
}

#[actix_web::test]
async fn drafts_do_not_accept_comments() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    let draft = insert_post(&ctx, ann, false);
    let app = test::init_service(ctx.app()).await;
    let session = login!(app, "ann");

    let req = test::TestRequest::post()
        .uri(&format!("/post/{}", draft))
        .cookie(session)
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "Early")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.count("SELECT COUNT(*) FROM comments"), 0);
}

#[actix_web::test]
async fn comment_edit_is_author_only_and_delete_allows_staff() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    let reader = ctx.create_user("reader", "pw", false);
    ctx.create_user("other", "pw", false);
    let post = insert_post(&ctx, ann, true);
    let comment = insert_comment(&ctx, post, reader, "original");
    let app = test::init_service(ctx.app()).await;

    let other = login!(app, "other");
    let req = test::TestRequest::get().uri(&format!("/comment/update/{}", comment)).cookie(other.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    let req = test::TestRequest::post()
        .uri(&format!("/comment/delete/{}", comment))
        .cookie(other)
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN)])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // Staff may delete but not edit someone else's comment.
    let staff = login!(app, "ann");
    let req = test::TestRequest::get().uri(&format!("/comment/update/{}", comment)).cookie(staff.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let author = login!(app, "reader");
    let req = test::TestRequest::post()
        .uri(&format!("/comment/update/{}", comment))
        .cookie(author.clone())
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN), ("text", "revised")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(common::location(&resp), format!("/post/{}", post));
    let page = follow!(app, resp, author);
    assert!(page.contains("Comment was edited successfully!"));
    assert!(page.contains("revised"));
    assert!(page.contains("(edited)"));

    let req = test::TestRequest::get().uri(&format!("/comment/delete/{}", comment)).cookie(staff.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = test::TestRequest::post()
        .uri(&format!("/comment/delete/{}", comment))
        .cookie(staff.clone())
        .cookie(common::csrf_cookie())
        .set_form([("csrf_token", CSRF_TOKEN)])
        .to_request();
    let resp = test::call_service(&app, req).await;
    let page = follow!(app, resp, staff);
    assert!(page.contains("Comment deleted"));
    assert_eq!(ctx.count("SELECT COUNT(*) FROM comments"), 0);
}

#[actix_web::test]
async fn comment_list_pages_by_ten() {
    let ctx = TestContext::new();
    let ann = ctx.create_user("ann", "pw", true);
    let post = insert_post(&ctx, ann, true);
    for i in 0..11 {
        insert_comment(&ctx, post, ann, &format!("comment-{}", i));
    }
    let app = test::init_service(ctx.app()).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri(&format!("/post/{}", post)).to_request()).await;
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("11 comments"));
    assert!(page.contains("More comments"));

    let req = test::TestRequest::get().uri(&format!("/post/{}/comments?page=2", post)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert_eq!(page.matches("class=\"comment\"").count(), 1);

    let req = test::TestRequest::get().uri(&format!("/post/{}/comments?page=3", post)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
