//! # Database access
//!
//! The PostgreSQL pool is created once by the server binary from
//! [`Settings::database`](crate::settings::Settings) and shared through
//! [`AppState`](crate::state::AppState). Model functions borrow it (or a
//! transaction) per call.
//!
//! - [`connect`] opens the pool eagerly and fails fast when the database is down.
//! - [`connect_lazy`] defers the first connection, used by router tests.

mod pool;

pub use pool::{connect, connect_lazy, purge_expired_oauth_states};
