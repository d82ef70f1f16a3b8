//! # API crate: the clinic management REST backend
//!
//! Everything the server binary needs except process setup: configuration,
//! the database pool, authentication, persistence models and the axum
//! routes. The `web` binary builds an [`AppState`], wraps [`app`] in the
//! session, CORS and trace layers and serves it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Access tokens, password hashing, Google OAuth, session helpers and the [`AuthUser`](auth::AuthUser) extractor |
//! | [`db`] | PostgreSQL pool construction and housekeeping queries |
//! | [`error`] | [`ApiError`](error::ApiError) and its mapping to status codes |
//! | [`models`] | Row types and the SQL behind every resource |
//! | [`response`] | The `{success, data, message}` envelope and pagination wrapper |
//! | [`routes`] | One router per resource, nested under `/api` |
//! | [`settings`] | Layered configuration from defaults, `config.toml` and the environment |
//! | [`state`] | [`AppState`] shared by every handler |
//!
//! Business rules that need no database (status lifecycles, slot
//! arithmetic, pricing, pagination) live in the `domain` crate.

use axum::Router;

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod response;
pub mod routes;
pub mod settings;
pub mod state;

pub use error::ApiError;
pub use settings::Settings;
pub use state::AppState;

/// The full HTTP application with every route under `/api`.
pub fn app(state: AppState) -> Router {
    Router::new().nest("/api", routes::router().with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    fn test_app() -> Router {
        let settings = Settings::default();
        let pool = db::connect_lazy(&settings.database).unwrap();
        app(AppState::new(pool, settings)).layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = test_app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_protected_route_without_credentials() {
        let response = test_app()
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Authentication required");
    }

    #[tokio::test]
    async fn test_bad_bearer_token() {
        let response = test_app()
            .oneshot(
                Request::get("/api/appointments/me")
                    .header(header::AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let body = serde_json::json!({
            "name": "Asha",
            "email": "not-an-email",
            "password": "long enough",
        });
        let response = test_app()
            .oneshot(
                Request::post("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_register_rejects_staff_role() {
        let body = serde_json::json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "long enough",
            "role": "nurse",
        });
        let response = test_app()
            .oneshot(
                Request::post("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_expired_token() {
        let expired = auth::TokenKeys::new(&Settings::default().auth.secret, 1)
            .issue_at(
                uuid::Uuid::new_v4(),
                domain::Role::Doctor,
                chrono::Utc::now() - chrono::Duration::hours(2),
            )
            .unwrap();

        let response = test_app()
            .oneshot(
                Request::get("/api/prescriptions/me")
                    .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Token expired");
    }

    fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_doctor_writes_only_for_own_patients(pool: sqlx::PgPool) {
        let clinic = models::fixtures::clinic(&pool, "riverside").await;
        let doctor = models::fixtures::doctor(&pool, Some(clinic.id), "dr-rao").await;
        let stranger = models::fixtures::patient(&pool, "stranger").await;
        let regular = models::fixtures::patient(&pool, "regular").await;
        models::Appointment::create(
            &pool,
            regular.id,
            Some(clinic.id),
            &models::NewAppointment {
                doctor_id: doctor.id,
                appointment_date: chrono::NaiveDate::from_ymd_opt(2031, 3, 3).unwrap(),
                appointment_time: "10:00 AM".into(),
                reason: None,
                patient_id: None,
            },
            "10:00 AM",
        )
        .await
        .unwrap();

        let state = AppState::new(pool.clone(), Settings::default());
        let token = state.keys.issue(doctor.user_id, domain::Role::Doctor).unwrap();
        let router = app(state).layer(SessionManagerLayer::new(MemoryStore::default()));

        let prescription = |patient_id: uuid::Uuid| {
            serde_json::json!({"patient_id": patient_id, "diagnosis": "Migraine"})
        };
        let lab_order = |patient_id: uuid::Uuid| {
            serde_json::json!({"patient_id": patient_id, "test_name": "MRI"})
        };

        for (uri, body) in [
            ("/api/prescriptions", prescription(stranger.id)),
            ("/api/lab-orders", lab_order(stranger.id)),
        ] {
            let response = router
                .clone()
                .oneshot(post_json(uri, &token, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(json_body(response).await["message"], "Patient is not under your care");
        }

        for (uri, body) in [
            ("/api/prescriptions", prescription(regular.id)),
            ("/api/lab-orders", lab_order(regular.id)),
        ] {
            let response = router
                .clone()
                .oneshot(post_json(uri, &token, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED, "{uri}");
        }

        let (written,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM prescriptions WHERE patient_id = $1")
                .bind(stranger.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(written, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_deactivated_account_is_refused(pool: sqlx::PgPool) {
        let patient = models::fixtures::patient(&pool, "asha").await;
        let state = AppState::new(pool.clone(), Settings::default());
        let token = state.keys.issue(patient.user_id, domain::Role::Patient).unwrap();
        models::Patient::deactivate(&pool, patient.id).await.unwrap();

        let response = app(state)
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .oneshot(
                Request::get("/api/patients/me")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
