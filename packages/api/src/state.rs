//! Shared handler state.

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;

use crate::auth::TokenKeys;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub keys: TokenKeys,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        let keys = TokenKeys::new(&settings.auth.secret, settings.auth.ttl);
        Self {
            pool,
            settings: Arc::new(settings),
            keys,
        }
    }

    /// Current wall-clock time at the clinics.
    pub fn now(&self) -> NaiveDateTime {
        self.settings.server.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.settings.server.today()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
