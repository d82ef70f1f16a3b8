//! # Settings
//!
//! Layered configuration: built-in defaults, then an optional `config.toml`
//! in the working directory, then environment variables. Environment keys use
//! `_` as the section separator, so `DATABASE_HOST` sets `database.host`
//! and `SERVER_OFFSET` sets `server.offset`. A `.env` file is loaded first
//! when present.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: String,
    /// Base URL of the browser client, used for OAuth redirects and CORS.
    pub client: String,
    /// The clinics' wall clock in minutes east of UTC. Slot cutoffs, the
    /// default queue day and analytics windows all read this clock.
    #[serde(default)]
    pub offset: i32,
}

impl Server {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Out-of-range offsets fall back to UTC.
    pub fn clock(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.clock()).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: "8080".into(),
            client: "http://localhost:3000".into(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// Full connection string. When empty the URL is assembled from the parts below.
    #[serde(default)]
    pub url: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub pool: u32,
}

impl Database {
    pub fn url(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: "clinic".into(),
            password: "password".into(),
            host: "localhost".into(),
            port: "5432".into(),
            database: "clinic".into(),
            pool: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    /// HMAC key for signing access tokens.
    pub secret: String,
    /// Token lifetime in hours.
    pub ttl: i64,
    /// Mark the session cookie `Secure`.
    pub secure: bool,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            secret: "change-me".into(),
            ttl: 24,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Google {
    pub id: String,
    pub secret: String,
    pub redirect: String,
}

impl Default for Google {
    fn default() -> Self {
        Self {
            id: String::new(),
            secret: String::new(),
            redirect: "http://localhost:8080/api/auth/google/callback".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
    pub google: Google,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", "8080")?
            .set_default("server.client", "http://localhost:3000")?
            .set_default("server.offset", 0)?
            .set_default("database.url", "")?
            .set_default("database.user", "clinic")?
            .set_default("database.password", "password")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", "5432")?
            .set_default("database.database", "clinic")?
            .set_default("database.pool", 10)?
            .set_default("auth.secret", "change-me")?
            .set_default("auth.ttl", 24)?
            .set_default("auth.secure", false)?
            .set_default("google.id", "")?
            .set_default("google.secret", "")?
            .set_default(
                "google.redirect",
                "http://localhost:8080/api/auth/google/callback",
            )?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().separator("_"))
            .build()?;

        config.try_deserialize()
    }

    /// Google sign-in is only offered when both credentials are configured.
    pub fn google_enabled(&self) -> bool {
        !self.google.id.is_empty() && !self.google.secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::set_var;

    #[test]
    fn test_settings() {
        set_var("DATABASE_USER", "test_user_2");
        set_var("AUTH_TTL", "12");
        set_var("GOOGLE_ID", "client-3");
        let settings = Settings::new().unwrap_or_default();
        println!("Settings = {:?}", settings);
        assert_eq!(settings.database.user, "test_user_2");
        assert_eq!(settings.auth.ttl, 12);
        assert_eq!(settings.google.id, "client-3");
    }

    #[test]
    fn test_explicit_url_wins() {
        let database = Database {
            url: "postgres://elsewhere/db".into(),
            ..Database::default()
        };
        assert_eq!(database.url(), "postgres://elsewhere/db");
        assert_eq!(Server::default().addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_clinic_clock() {
        let ist = Server {
            offset: 330,
            ..Server::default()
        };
        assert_eq!(ist.clock().local_minus_utc(), 330 * 60);
        let drift = ist.now() - Utc::now().naive_utc();
        assert!((drift - chrono::Duration::minutes(330)).num_seconds().abs() < 5);

        let broken = Server {
            offset: 24 * 60,
            ..Server::default()
        };
        assert_eq!(broken.clock().local_minus_utc(), 0);
    }
}
