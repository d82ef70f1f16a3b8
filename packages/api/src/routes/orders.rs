//! Pharmacy orders. Patients check out their cart and may cancel their own
//! orders; pharmacy staff and admins see every order and move them along.

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use domain::{Lifecycle, OrderStatus, Role};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Checkout, Order, OrderDetails};
use crate::response::{created, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

const DESK: &[Role] = &[Role::Pharmacy, Role::Admin];

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(checkout))
        .route("/me", get(mine))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(update_status))
}

async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<Checkout>>,
) -> Created<OrderDetails> {
    auth.authorize(&[Role::Patient])?;
    let patient_id = auth.require_patient_id()?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let details = Order::checkout(&state.pool, patient_id, &body).await?;
    created(details, "Order placed")
}

async fn mine(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<OrderDetails>> {
    auth.authorize(&[Role::Patient])?;
    ok(Order::for_patient(&state.pool, auth.require_patient_id()?).await?)
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<OrderDetails>> {
    auth.authorize(DESK)?;
    let status = query.status.as_deref().map(OrderStatus::parse).transpose()?;
    ok(Order::list(&state.pool, status).await?)
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    let details = Order::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))?;
    let visible = DESK.contains(&auth.role) || auth.patient_id == Some(details.order.patient_id);
    if !visible {
        return Err(ApiError::not_found("Order"));
    }
    ok(details)
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Order> {
    let to = OrderStatus::parse(&body.status)?;
    if auth.is(Role::Patient) {
        let order = Order::find_row(&state.pool, id)
            .await?
            .filter(|o| auth.patient_id == Some(o.patient_id))
            .ok_or_else(|| ApiError::not_found("Order"))?;
        if to != OrderStatus::Cancelled {
            return Err(ApiError::forbidden("Patients can only cancel orders"));
        }
        let updated = Order::transition(&state.pool, order.id, to).await?;
        return ok_with(updated, "Order cancelled");
    }

    auth.authorize(DESK)?;
    let updated = Order::transition(&state.pool, id, to).await?;
    ok_with(updated, format!("Order marked {}", to.as_str()))
}
