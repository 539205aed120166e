use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::ErrorCode;
use thiserror::Error;

pub mod comments_db_operations;
pub mod posts_db_operations;
pub mod tags_db_operations;
pub mod users_db_operations;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Constraint violation: {0}")]
    Conflict(String),
    #[error("Item not found in database: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(inner, msg) if inner.code == ErrorCode::ConstraintViolation => {
                DbError::Conflict(msg.clone().unwrap_or_else(|| inner.to_string()))
            }
            _ => DbError::Rusqlite(e),
        }
    }
}

/// Fixed-width UTC timestamp so that TEXT ordering is chronological ordering.
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let a = to_db_timestamp(&early);
        let b = to_db_timestamp(&late);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2020-01-02T03:04:05.000000Z");
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let conn = test_support::memory_db();
        conn.execute(
            "INSERT INTO tags (name, slug, subheading, overview) VALUES ('Rust', 'rust', '', '')",
            [],
        ).unwrap();
        let err = conn.execute(
            "INSERT INTO tags (name, slug, subheading, overview) VALUES ('Rust', 'rust-2', '', '')",
            [],
        ).unwrap_err();
        assert!(matches!(DbError::from(err), DbError::Conflict(_)));
    }
}
