//! # API Module
//!
//! HTTP endpoints of the Discover Now backend.
//!
//! ## Endpoints
//!
//! - [`login`] - `GET /api/v1/login`. Starts a fresh authorization for the
//!   caller's browser session and answers with the Spotify authorization URL.
//!   The response refreshes the session cookie.
//! - [`playlist`] - `GET /api/v1/playlist?code=..&state=..`. Called by the
//!   frontend with the query string Spotify redirected to. Verifies the
//!   `state` against the session cookie, exchanges the code and answers with
//!   the URI of a new playlist, or the one already cached in the session.
//! - [`health`] - `GET /health`. Status and version for load balancers.
//!
//! ## State
//!
//! Handlers share an [`AppState`] holding the login/callback flow and the
//! cookie store. It is built once at startup and never mutated; the session
//! itself travels in the cookie, so requests share nothing else.

mod health;
mod login;
mod playlist;

use crate::management::{AuthFlow, CookieStore};

pub use health::health;
pub use login::login;
pub use playlist::playlist;

/// Shared state for the API handlers.
pub struct AppState<A, G> {
    pub flow: AuthFlow<A, G>,
    pub store: CookieStore,
}

// Manual Clone: avoid derive adding `A: Clone, G: Clone` bounds.
impl<A, G> Clone for AppState<A, G> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            store: self.store.clone(),
        }
    }
}

impl<A, G> AppState<A, G> {
    pub fn new(flow: AuthFlow<A, G>, store: CookieStore) -> Self {
        Self { flow, store }
    }
}
