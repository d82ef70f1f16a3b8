use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::response::{ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/db", get(readiness))
}

async fn liveness() -> ApiResult<Health> {
    ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn readiness(State(state): State<AppState>) -> ApiResult<Health> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
