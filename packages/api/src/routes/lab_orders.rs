//! Lab orders: doctors request tests, the clinic lab works the queue and
//! records results, patients follow along.

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use domain::{LabOrderStatus, Lifecycle, Role};
use serde::Deserialize;
use uuid::Uuid;

use super::patients::ensure_treating;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{LabOrder, LabOrderDetails, LabOrderOwner, LabResult, NewLabOrder};
use crate::response::{created, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

/// Clinic roles that see the lab queue.
const QUEUE: &[Role] = &[Role::Lab, Role::ClinicAdmin, Role::Nurse];

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(queue).post(create))
        .route("/me", get(mine))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/result", put(record_result))
}

fn can_access(auth: &AuthUser, order: &LabOrder) -> bool {
    match auth.role {
        Role::Patient => auth.patient_id == Some(order.patient_id),
        Role::Doctor => auth.doctor_id == Some(order.doctor_id),
        Role::Admin => true,
        _ => auth.clinic_id.is_some() && auth.clinic_id == order.clinic_id,
    }
}

async fn load_accessible(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<LabOrder, ApiError> {
    LabOrder::find_row(&state.pool, id)
        .await?
        .filter(|order| can_access(auth, order))
        .ok_or_else(|| ApiError::not_found("Lab order"))
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewLabOrder>,
) -> Created<LabOrder> {
    auth.authorize(&[Role::Doctor])?;
    let doctor_id = auth.require_doctor_id()?;
    ensure_treating(&state.pool, &auth, body.patient_id).await?;
    let order = LabOrder::create(&state.pool, doctor_id, auth.clinic_id, &body).await?;
    created(order, "Lab order created")
}

async fn queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Vec<LabOrderDetails>> {
    auth.authorize(QUEUE)?;
    let clinic_id = auth.require_clinic_id()?;
    let status = query
        .status
        .as_deref()
        .map(LabOrderStatus::parse)
        .transpose()?;
    ok(LabOrder::list(&state.pool, LabOrderOwner::Clinic(clinic_id), status).await?)
}

async fn mine(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<LabOrderDetails>> {
    let owner = match auth.role {
        Role::Patient => LabOrderOwner::Patient(auth.require_patient_id()?),
        Role::Doctor => LabOrderOwner::Doctor(auth.require_doctor_id()?),
        _ => return Err(ApiError::forbidden("Access denied")),
    };
    ok(LabOrder::list(&state.pool, owner, None).await?)
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<LabOrderDetails> {
    load_accessible(&state, &auth, id).await?;
    let details = LabOrder::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lab order"))?;
    ok(details)
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<LabOrder> {
    let to = LabOrderStatus::parse(&body.status)?;
    match auth.role {
        Role::Lab => {}
        Role::Doctor if to == LabOrderStatus::Cancelled => {}
        Role::Doctor => return Err(ApiError::forbidden("Doctors can only cancel lab orders")),
        _ => return Err(ApiError::forbidden("Access denied")),
    }
    let order = load_accessible(&state, &auth, id).await?;
    let updated = LabOrder::transition(&state.pool, &order, to).await?;
    ok_with(updated, format!("Lab order marked {to}"))
}

async fn record_result(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<LabResult>,
) -> ApiResult<LabOrder> {
    auth.authorize(&[Role::Lab])?;
    let order = load_accessible(&state, &auth, id).await?;
    let updated = LabOrder::record_result(&state.pool, &order, &body).await?;
    tracing::info!(lab_order_id = %id, by = %auth.id, "lab result recorded");
    ok_with(updated, "Result recorded")
}
