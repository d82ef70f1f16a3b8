//! Authentication: access tokens, passwords, sessions, Google sign-in and
//! the [`AuthUser`] extractor.

mod config;
mod extractor;
mod google;
mod jwt;
mod password;
mod session;

pub use config::OAuthConfig;
pub use extractor::{bearer_token, AuthUser, ProfileIds};
pub use google::GoogleOAuth;
pub use jwt::{Claims, TokenError, TokenKeys};
pub use password::{check_strength, hash_password, verify_password, MIN_PASSWORD_LEN};
pub use session::{clear as clear_session, session_token, store_token, SESSION_TOKEN_KEY};
