//! # HTTP routes
//!
//! Every resource module exposes `router() -> Router<AppState>`; [`router`]
//! nests them under their prefixes. Handlers take the [`AuthUser`]
//! extractor where authentication is required, check roles with
//! [`AuthUser::authorize`] and answer with the
//! [`ApiResponse`](crate::response::ApiResponse) envelope.
//!
//! [`AuthUser`]: crate::auth::AuthUser
//! [`AuthUser::authorize`]: crate::auth::AuthUser::authorize

use axum::Router;
use chrono::NaiveDate;
use domain::Role;

use crate::error::ApiError;
use crate::state::AppState;

mod analytics;
mod appointments;
pub mod auth;
mod bookmarks;
mod cart;
mod clinics;
mod devices;
mod doctors;
mod documents;
mod health;
mod lab_orders;
mod medicines;
mod orders;
mod patients;
mod prescriptions;
mod reminders;
mod staff;

/// Roles that work the front desk and floor of a clinic.
pub(crate) const CLINIC_DESK: &[Role] = &[Role::ClinicAdmin, Role::Receptionist, Role::Nurse];

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/patients", patients::router())
        .nest("/doctors", doctors::router())
        .nest("/clinics", clinics::router())
        .nest("/appointments", appointments::router())
        .nest("/prescriptions", prescriptions::router())
        .nest("/lab-orders", lab_orders::router())
        .nest("/medicines", medicines::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/staff", staff::router())
        .nest("/analytics", analytics::router())
        .nest("/documents", documents::router())
        .nest("/reminders", reminders::router())
        .nest("/bookmarks", bookmarks::router())
        .nest("/devices", devices::router())
        .nest("/health", health::router())
}

/// Parse a `YYYY-MM-DD` query value.
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("invalid date: {value}, expected YYYY-MM-DD")))
}

/// Reject blank required text fields.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ApiError::bad_request(format!("{field} is required")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2030-01-07").unwrap(),
            NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
        );
        assert!(parse_date("07/01/2030").is_err());
    }

    #[test]
    fn test_required() {
        assert_eq!(required("name", "  Ana ").unwrap(), "Ana");
        assert!(required("name", "   ").is_err());
    }
}
