use axum::extract::{Path, State};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use domain::Role;
use serde::Deserialize;
use uuid::Uuid;

use super::required;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{parse_repeat, Reminder, ReminderInput};
use crate::response::{created, done, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DoneUpdate {
    #[serde(default = "yes")]
    pub is_done: bool,
}

fn yes() -> bool {
    true
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
        .route("/{id}/done", patch(mark_done))
}

fn patient_id(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::Patient])?;
    auth.require_patient_id()
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Reminder>> {
    ok(Reminder::for_patient(&state.pool, patient_id(&auth)?).await?)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ReminderInput>,
) -> Created<Reminder> {
    let patient_id = patient_id(&auth)?;
    let title = required("title", body.title.as_deref().unwrap_or_default())?;
    let remind_at = body
        .remind_at
        .ok_or_else(|| ApiError::bad_request("remind_at is required"))?;
    let repeat = parse_repeat(body.repeat.as_deref().unwrap_or("none")).map_err(ApiError::BadRequest)?;

    let reminder = Reminder::create(
        &state.pool,
        patient_id,
        title,
        remind_at,
        &repeat,
        body.description.as_deref(),
    )
    .await?;
    created(reminder, "Reminder created")
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReminderInput>,
) -> ApiResult<Reminder> {
    let patient_id = patient_id(&auth)?;
    if let Some(title) = body.title.as_deref() {
        required("title", title)?;
    }
    let repeat = body
        .repeat
        .as_deref()
        .map(parse_repeat)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let reminder = Reminder::update(&state.pool, id, patient_id, &body, repeat.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder"))?;
    ok_with(reminder, "Reminder updated")
}

async fn mark_done(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<DoneUpdate>>,
) -> ApiResult<Reminder> {
    let patient_id = patient_id(&auth)?;
    let is_done = body.map_or(true, |Json(b)| b.is_done);
    let reminder = Reminder::set_done(&state.pool, id, patient_id, is_done)
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder"))?;
    ok(reminder)
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !Reminder::delete(&state.pool, id, patient_id(&auth)?).await? {
        return Err(ApiError::not_found("Reminder"));
    }
    done("Reminder deleted")
}
