use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_staff INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login_time TEXT
        )",
        [],
    )?;

    println!("- Creating 'tags' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE CHECK(length(name) <= 100),
            slug TEXT NOT NULL UNIQUE,
            subheading TEXT NOT NULL,
            image TEXT,
            overview TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER,
            title TEXT NOT NULL UNIQUE CHECK(length(title) <= 100),
            subheading TEXT,
            image TEXT,
            created_date TEXT NOT NULL,
            publish_date TEXT,
            edited_date TEXT,
            text TEXT,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    println!("- Creating 'post_tags' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_tags (
            post_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (post_id, tag_id),
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )",
        [],
    )?;

    println!("- Creating 'comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL,
            author_id INTEGER,
            created_date TEXT NOT NULL,
            edited_date TEXT,
            text TEXT NOT NULL,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    println!("- Creating indexes...");
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_posts_publish_date ON posts(publish_date);
         CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
         CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(tag_id);
         CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_date);",
    )?;

    tx.commit()?;
    Ok(())
}
