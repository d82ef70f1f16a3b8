use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use domain::Role;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::models::analytics::{self, AdminAnalytics, ClinicAnalytics, DoctorAnalytics};
use crate::response::{ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clinic", get(clinic))
        .route("/doctor", get(doctor))
        .route("/admin", get(admin))
}

async fn clinic(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WindowQuery>,
) -> ApiResult<ClinicAnalytics> {
    auth.authorize(&[Role::ClinicAdmin])?;
    let clinic_id = auth.require_clinic_id()?;
    let days = analytics::window(query.days);
    ok(analytics::clinic(&state.pool, clinic_id, state.today(), days).await?)
}

async fn doctor(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WindowQuery>,
) -> ApiResult<DoctorAnalytics> {
    auth.authorize(&[Role::Doctor])?;
    let doctor_id = auth.require_doctor_id()?;
    let days = analytics::window(query.days);
    ok(analytics::doctor(&state.pool, doctor_id, state.today(), days).await?)
}

async fn admin(State(state): State<AppState>, auth: AuthUser) -> ApiResult<AdminAnalytics> {
    auth.authorize(&[Role::Admin])?;
    ok(analytics::admin(&state.pool).await?)
}
