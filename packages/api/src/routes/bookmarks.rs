use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use domain::Role;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Bookmark, Doctor};
use crate::response::{done, ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddBookmark {
    pub doctor_id: Uuid,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(add))
        .route("/{doctor_id}", delete(remove))
}

fn patient_id(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::Patient])?;
    auth.require_patient_id()
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Bookmark>> {
    ok(Bookmark::for_patient(&state.pool, patient_id(&auth)?).await?)
}

async fn add(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddBookmark>,
) -> ApiResult<()> {
    let patient_id = patient_id(&auth)?;
    if Doctor::find_row(&state.pool, body.doctor_id).await?.is_none() {
        return Err(ApiError::not_found("Doctor"));
    }
    if Bookmark::add(&state.pool, patient_id, body.doctor_id).await? {
        done("Doctor bookmarked")
    } else {
        done("Doctor already bookmarked")
    }
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<()> {
    if !Bookmark::remove(&state.pool, patient_id(&auth)?, doctor_id).await? {
        return Err(ApiError::not_found("Bookmark"));
    }
    done("Bookmark removed")
}
