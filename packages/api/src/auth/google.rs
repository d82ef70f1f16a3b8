//! # Google sign-in
//!
//! Authorization Code flow with PKCE.
//!
//! 1. [`GoogleOAuth::generate_auth_url`] builds the consent URL for the
//!    `openid email profile` scopes and stores the CSRF state with its PKCE
//!    verifier in `oauth_states` for ten minutes.
//! 2. [`GoogleOAuth::exchange_code`] runs on the callback. It consumes the
//!    state row (one `DELETE ... RETURNING` validates state and expiry), trades
//!    the code for an access token, reads the userinfo endpoint and then finds
//!    or creates the account by email. New accounts are patients.
//!
//! A patient profile row is created for patient accounts as a best-effort
//! follow-up: if that insert fails the sign-in still succeeds and the failure
//! is logged.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;

use super::config::OAuthConfig;
use crate::models::{Patient, User};
use crate::settings::Settings;
use domain::Role;

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google user info from API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleUser {
    fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google OAuth handler.
pub struct GoogleOAuth {
    config: OAuthConfig,
}

impl GoogleOAuth {
    pub fn new(settings: &Settings) -> Result<Self, String> {
        let config = OAuthConfig::google(settings)?;
        Ok(Self { config })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Build the consent URL and remember its state. Returns the URL.
    pub async fn generate_auth_url(&self, pool: &PgPool) -> Result<String, String> {
        let client = self.create_client();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at)
            VALUES ($1, 'google', $2, NOW() + INTERVAL '10 minutes')
            "#,
        )
        .bind(csrf_state.secret())
        .bind(pkce_verifier.secret())
        .execute(pool)
        .await
        .map_err(|e| e.to_string())?;

        Ok(auth_url.to_string())
    }

    /// Exchange authorization code for tokens and resolve the local account.
    pub async fn exchange_code(
        &self,
        pool: &PgPool,
        code: &str,
        state: &str,
    ) -> Result<User, String> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM oauth_states
            WHERE state = $1 AND provider = 'google' AND expires_at > NOW()
            RETURNING pkce_verifier
            "#,
        )
        .bind(state)
        .fetch_optional(pool)
        .await
        .map_err(|e| e.to_string())?;

        let pkce_verifier = row.ok_or("Invalid or expired OAuth state")?.0;

        // Token endpoint must not follow redirects.
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| e.to_string())?;

        let token_result = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&http_client)
            .await
            .map_err(|e| format!("Token exchange failed: {}", e))?;

        let google_user: GoogleUser = Client::new()
            .get(USERINFO_URL)
            .bearer_auth(token_result.access_token().secret())
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        let user = User::upsert_google(
            pool,
            &google_user.email,
            google_user.display_name(),
            google_user.picture.as_deref(),
            &google_user.id,
        )
        .await
        .map_err(|e| e.to_string())?;

        if matches!(user.role(), Ok(Role::Patient)) {
            if let Err(e) = Patient::ensure_for_user(pool, user.id).await {
                tracing::warn!(user_id = %user.id, "could not create patient profile: {}", e);
            }
        }

        tracing::info!(user_id = %user.id, "google sign-in");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let user = GoogleUser {
            id: "1".into(),
            email: "sam.lee@example.com".into(),
            name: None,
            picture: None,
        };
        assert_eq!(user.display_name(), "sam.lee");

        let named = GoogleUser {
            name: Some(" Sam Lee ".into()),
            ..user
        };
        assert_eq!(named.display_name(), "Sam Lee");
    }

    #[test]
    fn test_requires_configuration() {
        assert!(GoogleOAuth::new(&Settings::default()).is_err());
    }
}
