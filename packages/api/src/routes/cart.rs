use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use domain::Role;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Cart;
use crate::response::{ok, ok_with, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub medicine_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/items", post(add))
        .route("/items/{medicine_id}", put(set_quantity).delete(remove))
}

fn patient_id(auth: &AuthUser) -> Result<Uuid, ApiError> {
    auth.authorize(&[Role::Patient])?;
    auth.require_patient_id()
}

async fn show(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Cart> {
    ok(Cart::load(&state.pool, patient_id(&auth)?).await?)
}

async fn add(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddItem>,
) -> ApiResult<Cart> {
    let cart = Cart::add(&state.pool, patient_id(&auth)?, body.medicine_id, body.quantity).await?;
    ok_with(cart, "Added to cart")
}

async fn set_quantity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(medicine_id): Path<Uuid>,
    Json(body): Json<SetQuantity>,
) -> ApiResult<Cart> {
    let cart = Cart::set_quantity(&state.pool, patient_id(&auth)?, medicine_id, body.quantity).await?;
    ok_with(cart, "Cart updated")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(medicine_id): Path<Uuid>,
) -> ApiResult<Cart> {
    let patient_id = patient_id(&auth)?;
    if !Cart::remove(&state.pool, patient_id, medicine_id).await? {
        return Err(ApiError::not_found("Cart item"));
    }
    ok_with(Cart::load(&state.pool, patient_id).await?, "Removed from cart")
}

async fn clear(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Cart> {
    let patient_id = patient_id(&auth)?;
    Cart::clear(&state.pool, patient_id).await?;
    ok_with(Cart::new(Vec::new()), "Cart cleared")
}
