use axum::extract::{Path, State};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use domain::Role;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Device, NewDevice};
use crate::response::{created, done, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", delete(remove))
        .route("/{id}/sync", patch(sync))
}

fn patient_id(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::Patient])?;
    auth.require_patient_id()
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Device>> {
    ok(Device::for_patient(&state.pool, patient_id(&auth)?).await?)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewDevice>,
) -> Created<Device> {
    let patient_id = patient_id(&auth)?;
    body.validate().map_err(ApiError::BadRequest)?;
    let device = Device::create(&state.pool, patient_id, &body).await?;
    created(device, "Device paired")
}

async fn sync(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Device> {
    let device = Device::mark_synced(&state.pool, id, patient_id(&auth)?)
        .await?
        .ok_or_else(|| ApiError::not_found("Device"))?;
    ok_with(device, "Device synced")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !Device::delete(&state.pool, id, patient_id(&auth)?).await? {
        return Err(ApiError::not_found("Device"));
    }
    done("Device removed")
}
