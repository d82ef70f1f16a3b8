//! Pharmacy catalogue. Reads are public; pharmacy staff manage their own
//! clinic's medicines and admins manage all of them.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use domain::pricing::validate_price;
use domain::{Pagination, Role};
use uuid::Uuid;

use super::required;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Medicine, MedicineFilter, MedicineInput};
use crate::response::{created, done, ok, ok_with, ApiResult, Created, Page};
use crate::state::AppState;

const MANAGERS: &[Role] = &[Role::Pharmacy, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/categories", get(categories))
        .route("/{id}", get(show).put(update).delete(remove))
}

fn validate_stock(stock: Option<i32>) -> Result<(), ApiError> {
    match stock {
        Some(stock) if stock < 0 => Err(ApiError::bad_request("Stock cannot be negative")),
        _ => Ok(()),
    }
}

/// Pharmacy staff may only touch medicines stocked by their clinic.
async fn load_managed(state: &AppState, auth: &AuthUser, id: Uuid) -> Result<Medicine, ApiError> {
    auth.authorize(MANAGERS)?;
    let medicine = Medicine::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medicine"))?;
    if auth.is(Role::Pharmacy) && medicine.clinic_id != auth.clinic_id {
        return Err(ApiError::forbidden("Medicine belongs to another clinic"));
    }
    Ok(medicine)
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<MedicineFilter>,
) -> ApiResult<Page<Medicine>> {
    let (items, total) = Medicine::list(&state.pool, &filter).await?;
    ok(Page::new(items, total, Pagination::new(filter.page, filter.limit)))
}

async fn categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    ok(Medicine::categories(&state.pool).await?)
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Medicine> {
    let medicine = Medicine::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medicine"))?;
    ok(medicine)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<MedicineInput>,
) -> Created<Medicine> {
    auth.authorize(MANAGERS)?;
    let name = required("name", body.name.as_deref().unwrap_or_default())?;
    let price = body
        .price
        .ok_or_else(|| ApiError::bad_request("price is required"))?;
    let price = validate_price(price)?;
    validate_stock(body.stock)?;

    let clinic_id = match auth.role {
        Role::Pharmacy => Some(auth.require_clinic_id()?),
        _ => None,
    };
    let medicine = Medicine::create(&state.pool, clinic_id, name, price, &body).await?;
    created(medicine, "Medicine added")
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MedicineInput>,
) -> ApiResult<Medicine> {
    load_managed(&state, &auth, id).await?;
    if let Some(name) = body.name.as_deref() {
        required("name", name)?;
    }
    let price = body.price.map(validate_price).transpose()?;
    validate_stock(body.stock)?;

    let medicine = Medicine::update(&state.pool, id, price, &body)
        .await?
        .ok_or_else(|| ApiError::not_found("Medicine"))?;
    ok_with(medicine, "Medicine updated")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    load_managed(&state, &auth, id).await?;
    if !Medicine::deactivate(&state.pool, id).await? {
        return Err(ApiError::not_found("Medicine"));
    }
    tracing::info!(medicine_id = %id, by = %auth.id, "medicine withdrawn");
    done("Medicine deleted")
}
