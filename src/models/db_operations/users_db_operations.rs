use crate::models::db_operations::to_db_timestamp;
use crate::models::User;
use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Error as RusqliteError};

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

const USER_COLUMNS: &str = "id, username, is_staff, is_active, last_login_time";

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_staff: row.get(2)?,
        is_active: row.get(3)?,
        last_login_time: row.get(4)?,
    })
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    is_staff: bool,
) -> Result<i64, RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, is_staff) VALUES (?1, ?2, ?3)",
        params![username, hashed_password, is_staff],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<User>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let user_iter = stmt.query_map([], user_from_row)?;
    user_iter.collect()
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        user_from_row,
    ).optional()
}

pub fn user_exists(conn: &Connection, username: &str) -> Result<bool, RusqliteError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )
}

/// Returns the user when the password matches an active account.
pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Option<User> {
    let res: rusqlite::Result<String> = conn.query_row(
        "SELECT password_hash FROM users WHERE username = ?1 AND is_active = 1",
        [username],
        |row| row.get(0),
    );

    match res {
        Ok(hash) if verify(password, &hash).unwrap_or(false) => {
            read_user_by_username(conn, username).ok().flatten()
        }
        _ => None,
    }
}

pub fn update_last_login_time(conn: &Connection, username: &str) -> Result<(), RusqliteError> {
    let now = to_db_timestamp(&Utc::now());
    conn.execute("UPDATE users SET last_login_time = ?1 WHERE username = ?2", params![now, username])?;
    Ok(())
}

pub fn set_staff(conn: &Connection, username: &str, is_staff: bool) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE users SET is_staff = ?1 WHERE username = ?2", params![is_staff, username])
}

pub fn change_password(conn: &Connection, username: &str, new_password: &str) -> Result<usize, RusqliteError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )
}

/// Authored posts and comments keep existing with a NULL author.
pub fn delete_user(conn: &Connection, username: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM users WHERE username = ?1", [username])
}
