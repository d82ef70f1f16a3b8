//! Clinic admins manage the accounts of their receptionists, nurses, lab
//! technicians and pharmacists.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use domain::Role;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::validate_email;
use super::required;
use crate::auth::{check_strength, hash_password, AuthUser};
use crate::error::ApiError;
use crate::models::{NewUser, Staff, StaffMember, UpdateStaff, User};
use crate::response::{created, done, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub department: Option<String>,
    pub shift: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Parse a role that staff accounts may hold.
pub fn staff_role(value: &str) -> Result<Role, ApiError> {
    let role: Role = value.parse()?;
    if role.is_staff() {
        Ok(role)
    } else {
        Err(ApiError::bad_request(format!(
            "'{}' is not a staff role",
            role.as_str()
        )))
    }
}

fn clinic_of(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::ClinicAdmin])?;
    auth.require_clinic_id()
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<StaffMember>> {
    let clinic_id = clinic_of(&auth)?;
    let role = query.role.as_deref().map(staff_role).transpose()?;
    ok(Staff::list(&state.pool, clinic_id, role).await?)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateStaffRequest>,
) -> Created<StaffMember> {
    let clinic_id = clinic_of(&auth)?;
    let role = staff_role(&body.role)?;
    let name = required("name", &body.name)?;
    validate_email(&body.email)?;
    check_strength(&body.password).map_err(ApiError::BadRequest)?;
    let password_hash = hash_password(&body.password).map_err(ApiError::Internal)?;

    let mut tx = state.pool.begin().await?;
    let user = User::create(
        &mut *tx,
        &NewUser {
            email: body.email.clone(),
            name: name.to_string(),
            phone: body.phone.clone(),
            role,
            password_hash,
        },
    )
    .await?;
    let staff = Staff::create(
        &mut *tx,
        user.id,
        clinic_id,
        role,
        body.department.as_deref(),
        body.shift.as_deref(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(staff_id = %staff.id, %clinic_id, role = role.as_str(), "staff account created");
    let member = Staff::find(&state.pool, staff.id, clinic_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Staff member"))?;
    created(member, "Staff member created")
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StaffMember> {
    let clinic_id = clinic_of(&auth)?;
    let member = Staff::find(&state.pool, id, clinic_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Staff member"))?;
    ok(member)
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStaff>,
) -> ApiResult<StaffMember> {
    let clinic_id = clinic_of(&auth)?;
    if let Some(name) = body.name.as_deref() {
        required("name", name)?;
    }
    let member = Staff::update(&state.pool, id, clinic_id, &body)
        .await?
        .ok_or_else(|| ApiError::not_found("Staff member"))?;
    ok_with(member, "Staff member updated")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let clinic_id = clinic_of(&auth)?;
    if !Staff::deactivate(&state.pool, id, clinic_id).await? {
        return Err(ApiError::not_found("Staff member"));
    }
    tracing::info!(staff_id = %id, %clinic_id, "staff account deactivated");
    done("Staff member deleted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_roles() {
        assert_eq!(staff_role("lab").unwrap(), Role::Lab);
        assert_eq!(staff_role("Receptionist").unwrap(), Role::Receptionist);
        assert!(staff_role("doctor").is_err());
        assert!(staff_role("admin").is_err());
        assert!(staff_role("janitor").is_err());
    }
}
