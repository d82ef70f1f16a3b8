//! Registration, login, logout, profile and Google sign-in start.
//!
//! Successful login and registration return the access token in the body and
//! also keep it in the session so cookie-only browser requests authenticate.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use domain::Role;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use super::required;
use crate::auth::{
    check_strength, clear_session, hash_password, store_token, verify_password, AuthUser,
    GoogleOAuth,
};
use crate::error::ApiError;
use crate::models::{Clinic, Doctor, DoctorInput, NewUser, Patient, User, UserInfo};
use crate::response::{created, done, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    /// Name of the clinic a clinic admin registers with.
    pub clinic_name: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: UserInfo,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
        .route("/google", get(google_start))
        .route("/google/callback", get(google_callback))
}

/// Basic shape check; the unique index decides whether the address is taken.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(())
        }
        _ => Err(ApiError::bad_request("A valid email address is required")),
    }
}

/// Parse the requested role, defaulting to patient, and refuse staff roles.
pub fn registration_role(role: Option<&str>) -> Result<Role, ApiError> {
    let role: Role = role.unwrap_or("patient").parse()?;
    if !role.self_registrable() {
        return Err(ApiError::forbidden(format!(
            "Role '{role}' cannot self-register"
        )));
    }
    Ok(role)
}

async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Created<AuthResponse> {
    let name = required("name", &body.name)?;
    validate_email(&body.email)?;
    check_strength(&body.password).map_err(ApiError::BadRequest)?;
    let role = registration_role(body.role.as_deref())?;
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

    match role {
        Role::Patient => {
            Patient::ensure_for_user(&mut *tx, user.id).await?;
        }
        Role::Doctor => {
            let input = DoctorInput {
                specialization: body.specialization.clone(),
                ..DoctorInput::default()
            };
            let schedule = input.schedule(None)?;
            Doctor::create(&mut *tx, user.id, None, &input, &schedule).await?;
        }
        Role::ClinicAdmin => {
            let clinic_name = body
                .clinic_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .unwrap_or_else(|| format!("{name}'s Clinic"));
            Clinic::create(&mut *tx, user.id, &clinic_name).await?;
        }
        _ => {}
    }
    tx.commit().await?;

    let token = state.keys.issue(user.id, role)?;
    store_token(&session, &token).await?;
    tracing::info!(user_id = %user.id, %role, "account registered");

    created(
        AuthResponse {
            token,
            user: user.to_info(),
        },
        "Registration successful",
    )
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let invalid = || ApiError::InvalidCredentials;

    let user = User::find_by_email(&state.pool, &body.email)
        .await?
        .ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&body.password, hash).map_err(ApiError::Internal)? {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let token = state.keys.issue(user.id, user.role()?)?;
    store_token(&session, &token).await?;

    ok_with(
        AuthResponse {
            token,
            user: user.to_info(),
        },
        "Login successful",
    )
}

async fn logout(session: Session) -> ApiResult<()> {
    clear_session(&session).await?;
    done("Logged out")
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Me> {
    let user = User::find_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    ok(Me {
        user: user.to_info(),
        patient_id: auth.patient_id,
        doctor_id: auth.doctor_id,
        clinic_id: auth.clinic_id,
    })
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    let user = User::find_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    // Accounts created through Google have no password yet and may set one.
    if let Some(hash) = user.password_hash.as_deref() {
        let current = body.current_password.as_deref().unwrap_or_default();
        if !verify_password(current, hash).map_err(ApiError::Internal)? {
            return Err(ApiError::bad_request("Current password is incorrect"));
        }
    }
    check_strength(&body.new_password).map_err(ApiError::BadRequest)?;

    let hash = hash_password(&body.new_password).map_err(ApiError::Internal)?;
    User::update_password(&state.pool, user.id, &hash).await?;
    done("Password updated")
}

async fn google_start(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let oauth = GoogleOAuth::new(&state.settings).map_err(ApiError::NotFound)?;
    let url = oauth
        .generate_auth_url(&state.pool)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish Google sign-in and send the browser back to the client.
///
/// Failures never surface as JSON: the browser lands on the client's login
/// page with an `error` code instead.
async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<GoogleCallback>,
) -> Redirect {
    let client = state.settings.server.client.as_str();

    if let Some(error) = params.error.as_deref() {
        tracing::warn!("Google consent refused: {}", error);
        return client_redirect(client, "login?error=access_denied");
    }
    let Some(code) = params.code.as_deref() else {
        tracing::error!("Google callback missing code");
        return client_redirect(client, "login?error=missing_code");
    };
    let Some(csrf_state) = params.state.as_deref() else {
        tracing::error!("Google callback missing state");
        return client_redirect(client, "login?error=missing_state");
    };

    let oauth = match GoogleOAuth::new(&state.settings) {
        Ok(oauth) => oauth,
        Err(e) => {
            tracing::error!("Failed to create Google OAuth: {}", e);
            return client_redirect(client, "login?error=config_error");
        }
    };
    let user = match oauth.exchange_code(&state.pool, code, csrf_state).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Google OAuth exchange error: {}", e);
            return client_redirect(client, "login?error=oauth_error");
        }
    };
    if !user.is_active {
        return client_redirect(client, "login?error=account_disabled");
    }

    let token = match user
        .role()
        .map_err(ApiError::from)
        .and_then(|role| state.keys.issue(user.id, role).map_err(ApiError::from))
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            return client_redirect(client, "login?error=token_error");
        }
    };
    if let Err(e) = store_token(&session, &token).await {
        tracing::error!("Failed to save session: {}", e);
        return client_redirect(client, "login?error=session_error");
    }

    client_redirect(client, &format!("auth/success?token={token}"))
}

/// Redirect to `path` on the browser client.
pub fn client_redirect(client: &str, path: &str) -> Redirect {
    Redirect::to(&format!("{}/{}", client.trim_end_matches('/'), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ana.example.com").is_err());
    }

    #[test]
    fn test_client_redirect() {
        let redirect = client_redirect("http://localhost:3000/", "login?error=oauth_error");
        let response = axum::response::IntoResponse::into_response(redirect);
        assert_eq!(
            response.headers()["location"],
            "http://localhost:3000/login?error=oauth_error"
        );
    }

    #[test]
    fn test_registration_role() {
        assert_eq!(registration_role(None).unwrap(), Role::Patient);
        assert_eq!(registration_role(Some("clinic-admin")).unwrap(), Role::ClinicAdmin);
        assert!(registration_role(Some("nurse")).is_err());
        assert!(registration_role(Some("admin")).is_err());
        assert!(registration_role(Some("wizard")).is_err());
    }
}
