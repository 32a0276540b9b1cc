//! Collaborator traits.
//!
//! The login and callback flow only talks to the outside world through
//! these two traits, so it can be driven by fakes in tests. The Spotify
//! implementations live in [`crate::spotify`].

use std::future::Future;

use crate::{
    error::ProviderError,
    types::{CallbackParams, Playlist, Token, Track},
};

/// Identity-provider authorization client.
pub trait Authenticator: Send + Sync + 'static {
    /// URL the browser is sent to, carrying `state` as the anti-CSRF value.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchanges the callback's authorization code for credentials.
    ///
    /// Implementations must check that the `state` echoed in `callback`
    /// equals `state` and fail otherwise, and must fail when the provider
    /// reported an error instead of a code.
    fn exchange_code(
        &self,
        state: &str,
        callback: &CallbackParams,
    ) -> impl Future<Output = Result<Token, ProviderError>> + Send;
}

/// Playlist generator.
///
/// Neither method is idempotent from the caller's point of view:
/// `create_playlist` makes a new playlist on every successful call.
pub trait PlaylistGenerator: Send + Sync + 'static {
    /// Picks up to `max_items` tracks for the authenticated user.
    fn generate(
        &self,
        token: &Token,
        max_items: usize,
    ) -> impl Future<Output = Result<Vec<Track>, ProviderError>> + Send;

    fn create_playlist(
        &self,
        token: &Token,
        name: &str,
        tracks: &[Track],
    ) -> impl Future<Output = Result<Playlist, ProviderError>> + Send;
}
