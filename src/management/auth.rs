use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    config::Settings,
    error::{FlowError, ProviderError},
    info,
    management::{
        session::{IDENTITY_KEY, RESULT_KEY, SessionRecord, TIMESTAMP_KEY},
        state::{StateKey, states_match},
    },
    provider::{Authenticator, PlaylistGenerator},
    success,
    types::{CallbackParams, Playlist, Token},
    utils,
};

/// Outcome of a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// The session already held a playlist; nothing was called and nothing
    /// needs saving.
    Cached(String),
    /// A new playlist was created and recorded in `session`, which must be
    /// saved.
    Created { session: SessionRecord, uri: String },
}

impl Authorization {
    pub fn uri(&self) -> &str {
        match self {
            Self::Cached(uri) => uri,
            Self::Created { uri, .. } => uri,
        }
    }
}

/// The stateless login/callback protocol.
///
/// `login` stamps a session with a new identity and timestamp and hands out
/// an authorization URL whose `state` is an HMAC over both. `authorize`
/// recomputes that HMAC from the session the callback arrives with, so a
/// callback is only honoured for the browser session that started it.
pub struct AuthFlow<A, G> {
    authenticator: Arc<A>,
    generator: Arc<G>,
    state_key: StateKey,
    playlist_limit: usize,
    upstream_timeout: Duration,
    request_timeout: Duration,
}

// Manual Clone: avoid derive adding `A: Clone, G: Clone` bounds.
impl<A, G> Clone for AuthFlow<A, G> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
            generator: self.generator.clone(),
            state_key: self.state_key.clone(),
            playlist_limit: self.playlist_limit,
            upstream_timeout: self.upstream_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

impl<A: Authenticator, G: PlaylistGenerator> AuthFlow<A, G> {
    /// `upstream_timeout` bounds each call to a collaborator and
    /// `request_timeout` bounds a whole [`AuthFlow::authorize`].
    pub fn new(
        authenticator: Arc<A>,
        generator: Arc<G>,
        state_key: StateKey,
        playlist_limit: usize,
        upstream_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            authenticator,
            generator,
            state_key,
            playlist_limit,
            upstream_timeout,
            request_timeout,
        }
    }

    pub fn from_settings(settings: &Settings, authenticator: Arc<A>, generator: Arc<G>) -> Self {
        Self::new(
            authenticator,
            generator,
            StateKey::new(settings.secrets.hash_key.clone()),
            settings.playlist_limit,
            settings.upstream_timeout,
            settings.request_timeout,
        )
    }

    /// Starts a fresh authorization for `session`.
    ///
    /// Returns the updated record and the authorization URL. Every fallible
    /// step runs before the record is touched, so on error the caller has
    /// nothing to save.
    pub fn login(&self, mut session: SessionRecord) -> Result<(SessionRecord, String), FlowError> {
        let identity = utils::generate_identity().map_err(FlowError::Randomness)?;
        let timestamp = utils::timestamp_now();
        let state = self.state_key.derive(&identity, &timestamp)?;

        session.insert(IDENTITY_KEY, identity);
        session.insert(TIMESTAMP_KEY, timestamp);
        session.remove(RESULT_KEY);

        Ok((session, self.authenticator.authorize_url(&state)))
    }

    /// Completes the authorization started by [`AuthFlow::login`].
    ///
    /// A session that already carries a playlist short-circuits to it. Any
    /// other session must hold an identity and timestamp whose state token
    /// matches the callback's `state`; only then is the code exchanged and a
    /// playlist generated.
    ///
    /// The whole callback shares one deadline on top of the per-call
    /// bounds; running past it yields [`FlowError::Timeout`].
    pub async fn authorize(
        &self,
        session: SessionRecord,
        callback: &CallbackParams,
    ) -> Result<Authorization, FlowError> {
        tokio::time::timeout(self.request_timeout, self.complete(session, callback))
            .await
            .map_err(|_| FlowError::Timeout("callback"))?
    }

    async fn complete(
        &self,
        mut session: SessionRecord,
        callback: &CallbackParams,
    ) -> Result<Authorization, FlowError> {
        if let Some(uri) = session.result() {
            return Ok(Authorization::Cached(uri.to_string()));
        }

        let (Some(identity), Some(timestamp)) = (session.identity(), session.timestamp()) else {
            return Err(FlowError::Unauthorized("session has no identity or timestamp"));
        };
        let Some(supplied) = callback.state.as_deref() else {
            return Err(FlowError::Unauthorized("callback has no state"));
        };

        let expected = self.state_key.derive(identity, timestamp)?;
        if !states_match(&expected, supplied) {
            return Err(FlowError::StateMismatch);
        }

        let token = self
            .bounded(
                "token exchange",
                self.authenticator.exchange_code(&expected, callback),
            )
            .await?
            .map_err(FlowError::Exchange)?;

        let playlist = self.build_playlist(&token).await?;
        success!("Playlist {} created", playlist.uri);

        session.insert(RESULT_KEY, playlist.uri.clone());
        Ok(Authorization::Created {
            session,
            uri: playlist.uri,
        })
    }

    async fn build_playlist(&self, token: &Token) -> Result<Playlist, FlowError> {
        let tracks = self
            .bounded(
                "playlist generation",
                self.generator.generate(token, self.playlist_limit),
            )
            .await?
            .map_err(FlowError::Generate)?;
        if tracks.is_empty() {
            return Err(FlowError::Generate(ProviderError::Unexpected(
                "generator returned no tracks".into(),
            )));
        }
        info!("Generated {} tracks", tracks.len());

        let name = utils::playlist_name();
        self.bounded(
            "playlist creation",
            self.generator.create_playlist(token, &name, &tracks),
        )
        .await?
        .map_err(FlowError::Generate)
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, FlowError> {
        tokio::time::timeout(self.upstream_timeout, fut)
            .await
            .map_err(|_| FlowError::Timeout(what))
    }
}
