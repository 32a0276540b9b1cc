//! Spotify implementations of the collaborator traits.
//!
//! - [`SpotifyAuthenticator`] builds the authorization URL and exchanges
//!   codes at the accounts service.
//! - [`SpotifyGenerator`] picks tracks from the user's listening history and
//!   writes them to a new playlist through the Web API.
//!
//! Both share one [`reqwest::Client`] built by [`http_client`], whose timeout
//! bounds every request. Nothing here retries: creating a playlist twice
//! would leave a duplicate on the user's account.

pub mod auth;
pub mod playlist;

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::ProviderError;

pub use auth::SpotifyAuthenticator;
pub use playlist::SpotifyGenerator;

/// Longest upstream error body kept for the log.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client shared by the Spotify collaborators.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Decodes a JSON body, turning non-2xx answers into [`ProviderError::Upstream`].
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}

pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ProviderError::Upstream { status, body })
}
