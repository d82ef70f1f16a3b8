//! OAuth provider configuration.

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

use crate::settings::Settings;

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

impl OAuthConfig {
    /// Google OAuth config from the `google` settings section.
    pub fn google(settings: &Settings) -> Result<Self, String> {
        if !settings.google_enabled() {
            return Err("Google sign-in is not configured".to_string());
        }

        Ok(Self {
            client_id: ClientId::new(settings.google.id.clone()),
            client_secret: ClientSecret::new(settings.google.secret.clone()),
            auth_url: AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())
                .map_err(|e| e.to_string())?,
            token_url: TokenUrl::new("https://oauth2.googleapis.com/token".to_string())
                .map_err(|e| e.to_string())?,
            redirect_url: RedirectUrl::new(settings.google.redirect.clone())
                .map_err(|e| e.to_string())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        let settings = Settings::default();
        assert!(OAuthConfig::google(&settings).is_err());
    }

    #[test]
    fn test_uses_configured_redirect() {
        let mut settings = Settings::default();
        settings.google.id = "id".into();
        settings.google.secret = "secret".into();
        settings.google.redirect = "https://clinic.example/api/auth/google/callback".into();
        let config = OAuthConfig::google(&settings).unwrap();
        assert_eq!(
            config.redirect_url.as_str(),
            "https://clinic.example/api/auth/google/callback"
        );
        assert_eq!(config.client_id.as_str(), "id");
    }

    #[test]
    fn test_rejects_bad_redirect() {
        let mut settings = Settings::default();
        settings.google.id = "id".into();
        settings.google.secret = "secret".into();
        settings.google.redirect = "not a url".into();
        assert!(OAuthConfig::google(&settings).is_err());
    }
}
