use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use config;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub max_upload_size_mb: u64,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| config::ConfigError::Message(format!(
        "FATAL: Environment variable '{}' is not set in your .env file.", name
    )))
}

fn validate_secret_key(key: &str) -> Result<(), config::ConfigError> {
    // 128 hex characters decode to the 64 bytes a cookie signing key needs.
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
        ));
    }
    Ok(())
}

fn validate_absolute(name: &str, path: &str) -> Result<(), config::ConfigError> {
    if Path::new(path).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, path
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        validate_secret_key(&session_secret_key)?;
        validate_absolute("DATABASE_PATH", &database_path)?;
        validate_absolute("MEDIA_PATH", &media_path)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let max_upload_size_mb = match env::var("MAX_UPLOAD_SIZE_MB") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| config::ConfigError::Message(format!(
                "FATAL: 'MAX_UPLOAD_SIZE_MB' must be a whole number, got '{}'.", raw
            )))?,
            Err(_) => 10,
        };

        let builder = config::Config::builder()
            // Base settings (web host/port) live in the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("max_upload_size_mb", max_upload_size_mb as i64)?
            .build()?;

        builder.try_deserialize()
    }

    /// Full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("blog")
            .join("blog.db")
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_key_must_be_128_hex_chars() {
        assert!(validate_secret_key(&"ab".repeat(64)).is_ok());
        assert!(validate_secret_key(&"ab".repeat(63)).is_err());
        assert!(validate_secret_key(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(validate_absolute("MEDIA_PATH", "media").is_err());
        assert!(validate_absolute("MEDIA_PATH", "/var/lib/amblog/media").is_ok());
    }

    #[test]
    fn upload_limit_is_converted_to_bytes() {
        let config = Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 8080 },
            database_path: "/tmp/db".to_string(),
            media_path: "/tmp/media".to_string(),
            allowed_origins: String::new(),
            log_level: "info".to_string(),
            session_secret_key: "ab".repeat(64),
            use_secure_cookies: false,
            max_upload_size_mb: 2,
        };
        assert_eq!(config.max_upload_size_bytes(), 2 * 1024 * 1024);
        assert!(config.blog_db_path().ends_with("blog/blog.db"));
    }
}
