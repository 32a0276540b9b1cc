use chrono::Utc;
use reqwest::Client;
use url::Url;

use crate::{
    config::{Settings, SpotifySettings},
    error::ProviderError,
    management::states_match,
    provider::Authenticator,
    spotify::read_json,
    types::{CallbackParams, Token, TokenResponse},
};

/// Authorization-code client for the Spotify accounts service.
///
/// Uses the confidential-client variant of the flow: the client secret is
/// sent with HTTP basic authentication when exchanging the code.
#[derive(Debug, Clone)]
pub struct SpotifyAuthenticator {
    client: Client,
    spotify: SpotifySettings,
    redirect_uri: String,
}

impl SpotifyAuthenticator {
    pub fn new(client: Client, spotify: SpotifySettings, redirect_uri: impl Into<String>) -> Self {
        Self {
            client,
            spotify,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(
            client,
            settings.spotify.clone(),
            settings.redirect_uri.clone(),
        )
    }

    fn authorize_url_with(&self, state: &str) -> Url {
        let mut url = self.spotify.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.spotify.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.spotify.scope)
            .append_pair("state", state);
        url
    }
}

impl Authenticator for SpotifyAuthenticator {
    fn authorize_url(&self, state: &str) -> String {
        self.authorize_url_with(state).into()
    }

    async fn exchange_code(
        &self,
        state: &str,
        callback: &CallbackParams,
    ) -> Result<Token, ProviderError> {
        if let Some(error) = &callback.error {
            return Err(ProviderError::Denied(error.clone()));
        }

        let echoed = callback.state.as_deref().unwrap_or_default();
        if !states_match(state, echoed) {
            return Err(ProviderError::StateMismatch);
        }

        let code = match callback.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => return Err(ProviderError::MissingCode),
        };

        let res = self
            .client
            .post(self.spotify.token_url.clone())
            .basic_auth(&self.spotify.client_id, Some(&self.spotify.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let json: TokenResponse = read_json(res).await?;

        Ok(Token {
            access_token: json.access_token,
            refresh_token: json.refresh_token,
            scope: json.scope,
            expires_in: json.expires_in,
            obtained_at: Utc::now().timestamp() as u64,
        })
    }
}
