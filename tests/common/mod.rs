#![allow(dead_code)]

use actix_session::Session;
use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{web, App, HttpResponse};
use amblog::config::{Config, WebConfig};
use amblog::helper::image_helpers::MediaStore;
use amblog::helper::render_helpers;
use amblog::middleware::{start_session, SessionUser};
use amblog::models::db_operations::users_db_operations;
use amblog::setup::db_setup;
use amblog::{routes, DbPool};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use tempfile::TempDir;
use tera::Tera;

pub const BOUNDARY: &str = "amblog-test-boundary";

/// Stands in for the token a form page would have issued.
pub const CSRF_TOKEN: &str = "testcsrftoken";

/// The cookie that pairs with `CSRF_TOKEN`.
pub fn csrf_cookie() -> Cookie<'static> {
    Cookie::new("__Host-Csrf-Token", CSRF_TOKEN)
}

/// A fresh database and media directory per test.
pub struct TestContext {
    _dir: TempDir,
    pub pool: DbPool,
    pub store: MediaStore,
    pub tera: Tera,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_dir = dir.path().join("db");
        let media_dir = dir.path().join("media");
        std::fs::create_dir_all(db_dir.join("blog")).unwrap();
        std::fs::create_dir_all(&media_dir).unwrap();

        let config = Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            database_path: db_dir.to_string_lossy().into_owned(),
            media_path: media_dir.to_string_lossy().into_owned(),
            allowed_origins: String::new(),
            log_level: "info".to_string(),
            session_secret_key: "ab".repeat(64),
            use_secure_cookies: false,
            max_upload_size_mb: 1,
        };

        let manager = SqliteConnectionManager::file(config.blog_db_path())
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(4).build(manager).unwrap();
        {
            let mut conn = pool.get().unwrap();
            db_setup::setup_blog_db(&mut conn).unwrap();
        }

        let tera = render_helpers::load_templates(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")).unwrap();

        TestContext { store: MediaStore::new(&media_dir), _dir: dir, pool, tera, config }
    }

    /// Inserts a user with a cheap bcrypt cost.
    pub fn create_user(&self, username: &str, password: &str, is_staff: bool) -> i64 {
        let conn = self.pool.get().unwrap();
        let hash = bcrypt::hash(password, 4).unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, is_staff) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, hash, is_staff],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn media_root(&self) -> &Path {
        self.store.root()
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.pool.get().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.tera.clone()))
            .app_data(web::Data::new(self.pool.clone()))
            .app_data(web::Data::new(self.store.clone()))
            .service(
                web::scope("")
                    .wrap(routes::session_middleware(Key::from(&[7u8; 64]), false))
                    .route("/__test/login/{username}", web::get().to(test_login))
                    .configure(routes::config_site),
            )
    }
}

/// Signs the user in without going through the login form.
async fn test_login(username: web::Path<String>, pool: web::Data<DbPool>, session: Session) -> HttpResponse {
    let conn = pool.get().unwrap();
    let user = users_db_operations::read_user_by_username(&conn, &username).unwrap().unwrap();
    start_session(&session, &SessionUser { id: user.id, username: user.username, is_staff: user.is_staff }).unwrap();
    HttpResponse::Ok().finish()
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == "id").map(|c| c.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

/// Encodes text fields and an optional `image` file part.
pub fn multipart(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content_type, bytes)) = image {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n", filename).as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Logs `$username` in through the test route and yields the session cookie.
macro_rules! login {
    ($app:expr, $username:expr) => {{
        let req = actix_web::test::TestRequest::get()
            .uri(&format!("/__test/login/{}", $username))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert!(resp.status().is_success());
        common::session_cookie(&resp).expect("session cookie")
    }};
}

/// Follows a redirect with `$cookie` and returns the rendered body.
macro_rules! follow {
    ($app:expr, $resp:expr, $cookie:expr) => {{
        let cookie = common::session_cookie(&$resp).unwrap_or_else(|| $cookie.clone());
        let req = actix_web::test::TestRequest::get()
            .uri(&common::location(&$resp))
            .cookie(cookie)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        String::from_utf8(actix_web::test::read_body(resp).await.to_vec()).unwrap()
    }};
}
