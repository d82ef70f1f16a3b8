//! Documents a patient keeps on file. Patients manage their own; doctors and
//! clinic staff can read the documents of patients in their care.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use domain::Role;
use uuid::Uuid;

use super::patients::ensure_can_view;
use super::required;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{NewDocument, PatientDocument};
use crate::response::{created, done, ok, ApiResult, Created};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/patient/{patient_id}", get(for_patient))
        .route("/{id}", get(show).delete(remove))
}

fn patient_id(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::Patient])?;
    auth.require_patient_id()
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<PatientDocument>> {
    ok(PatientDocument::for_patient(&state.pool, patient_id(&auth)?).await?)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewDocument>,
) -> Created<PatientDocument> {
    let patient_id = patient_id(&auth)?;
    required("title", &body.title)?;
    required("file_url", &body.file_url)?;
    let document_type = body.document_type().map_err(ApiError::BadRequest)?;

    let document = PatientDocument::create(&state.pool, patient_id, &body, &document_type).await?;
    created(document, "Document uploaded")
}

async fn for_patient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Vec<PatientDocument>> {
    ensure_can_view(&state.pool, &auth, patient_id).await?;
    ok(PatientDocument::for_patient(&state.pool, patient_id).await?)
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<PatientDocument> {
    let document = PatientDocument::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document"))?;
    ensure_can_view(&state.pool, &auth, document.patient_id)
        .await
        .map_err(|_| ApiError::not_found("Document"))?;
    ok(document)
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !PatientDocument::delete(&state.pool, id, patient_id(&auth)?).await? {
        return Err(ApiError::not_found("Document"));
    }
    done("Document deleted")
}
