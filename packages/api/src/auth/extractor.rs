//! # Authenticated caller
//!
//! [`AuthUser`] is an axum extractor. It reads the access token from the
//! `Authorization: Bearer` header or, for browser clients, from the session,
//! verifies it, loads the user and resolves the profile ids that belong to the
//! user's role:
//!
//! | Role | `patient_id` | `doctor_id` | `clinic_id` |
//! |------|--------------|-------------|-------------|
//! | patient | own patient row | | |
//! | doctor | | own doctor row | doctor's clinic |
//! | clinic_admin | | | owned clinic |
//! | receptionist, nurse, lab, pharmacy | | | staff row's clinic |
//!
//! Handlers then call [`AuthUser::authorize`] with the roles allowed on the
//! endpoint and the `require_*` accessors for the ids they need.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use domain::Role;
use sqlx::{FromRow, PgPool};
use tower_sessions::Session;
use uuid::Uuid;

use super::session::session_token;
use crate::error::ApiError;
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
}

/// Every profile id linked to a user, before role scoping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ProfileIds {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub doctor_clinic_id: Option<Uuid>,
    pub owned_clinic_id: Option<Uuid>,
    pub staff_clinic_id: Option<Uuid>,
}

impl ProfileIds {
    pub async fn load(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT
                (SELECT id FROM patients WHERE user_id = $1) AS patient_id,
                (SELECT id FROM doctors WHERE user_id = $1) AS doctor_id,
                (SELECT clinic_id FROM doctors WHERE user_id = $1) AS doctor_clinic_id,
                (SELECT id FROM clinics WHERE user_id = $1) AS owned_clinic_id,
                (SELECT clinic_id FROM staff WHERE user_id = $1) AS staff_clinic_id
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Keep only the ids the role is entitled to.
    pub fn scoped(self, role: Role) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match role {
            Role::Patient => (self.patient_id, None, None),
            Role::Doctor => (None, self.doctor_id, self.doctor_clinic_id),
            Role::ClinicAdmin => (None, None, self.owned_clinic_id),
            Role::Receptionist | Role::Nurse | Role::Lab | Role::Pharmacy => {
                (None, None, self.staff_clinic_id)
            }
            Role::Admin => (None, None, None),
        }
    }
}

impl AuthUser {
    pub fn from_user(user: &User, role: Role, ids: ProfileIds) -> Self {
        let (patient_id, doctor_id, clinic_id) = ids.scoped(role);
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role,
            patient_id,
            doctor_id,
            clinic_id,
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// 403 unless the caller's role is one of `roles`.
    pub fn authorize(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Access denied: role '{}' is not permitted",
                self.role
            )))
        }
    }

    pub fn require_patient_id(&self) -> Result<Uuid, ApiError> {
        self.patient_id
            .ok_or_else(|| ApiError::forbidden("Patient profile required"))
    }

    pub fn require_doctor_id(&self) -> Result<Uuid, ApiError> {
        self.doctor_id
            .ok_or_else(|| ApiError::forbidden("Doctor profile required"))
    }

    pub fn require_clinic_id(&self) -> Result<Uuid, ApiError> {
        self.clinic_id
            .ok_or_else(|| ApiError::forbidden("Clinic association required"))
    }
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = match bearer_token(&parts.headers) {
            Some(token) => token.to_string(),
            None => {
                let session = parts
                    .extensions
                    .get::<Session>()
                    .ok_or(ApiError::Unauthenticated)?;
                session_token(session)
                    .await?
                    .ok_or(ApiError::Unauthenticated)?
            }
        };

        let claims = state.keys.verify(&token)?;
        let user = User::find_by_id(&state.pool, claims.sub)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        if !user.is_active {
            return Err(ApiError::forbidden("Account is disabled"));
        }
        let role = user.role()?;
        let ids = ProfileIds::load(&state.pool, user.id).await?;

        Ok(Self::from_user(&user, role, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::StatusCode;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "x@example.com".into(),
            name: "X".into(),
            role,
            patient_id: None,
            doctor_id: None,
            clinic_id: None,
        }
    }

    #[test]
    fn test_authorize() {
        let nurse = caller(Role::Nurse);
        assert!(nurse.authorize(&[Role::Nurse, Role::Doctor]).is_ok());
        let err = nurse.authorize(&[Role::Doctor]).unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_admin_is_not_implicit() {
        assert!(caller(Role::Admin).authorize(&[Role::ClinicAdmin]).is_err());
    }

    #[test]
    fn test_missing_profile_is_forbidden() {
        let err = caller(Role::Patient).require_patient_id().unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_ids_scoped_by_role() {
        let clinic = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let ids = ProfileIds {
            patient_id: Some(Uuid::new_v4()),
            doctor_id: Some(doctor),
            doctor_clinic_id: Some(clinic),
            owned_clinic_id: None,
            staff_clinic_id: None,
        };
        assert_eq!(ids.scoped(Role::Doctor), (None, Some(doctor), Some(clinic)));
        assert_eq!(ids.scoped(Role::Lab), (None, None, None));
        assert_eq!(ids.scoped(Role::Patient).0, ids.patient_id);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  tok "));
        assert_eq!(bearer_token(&headers), Some("tok"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
