#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use discover_now::{
    api::AppState,
    config::Settings,
    error::ProviderError,
    management::{AuthFlow, CookieStore, StateKey},
    provider::{Authenticator, PlaylistGenerator},
    types::{CallbackParams, Playlist, Token, Track},
};

pub const HASH_KEY: &str = "00112233445566778899aabbccddeeff";
pub const FRONTEND: &str = "https://discover.example.com";
pub const VALID_CODE: &str = "valid-code";

/// How long each step of a [`GeneratorMode::Sluggish`] generator takes.
pub const SLUGGISH_STEP: Duration = Duration::from_millis(200);

pub fn test_env() -> HashMap<&'static str, String> {
    HashMap::from([
        ("FRONTEND_URI", FRONTEND.to_string()),
        ("PORT", "8080".to_string()),
        ("DISCOVER_HASH", HASH_KEY.to_string()),
        ("DISCOVER_AUTH", "ffeeddccbbaa99887766554433221100".to_string()),
        ("DISCOVER_CRYPT", "ab".repeat(32)),
        ("SPOTIFY_API_AUTH_CLIENT_ID", "client".to_string()),
        ("SPOTIFY_API_AUTH_CLIENT_SECRET", "secret".to_string()),
        ("UPSTREAM_TIMEOUT_SECS", "2".to_string()),
        ("PLAYLIST_LIMIT", "5".to_string()),
    ])
}

pub fn test_settings() -> Settings {
    let env = test_env();
    Settings::from_lookup(|key| env.get(key).cloned()).expect("test settings are valid")
}

pub fn test_store() -> CookieStore {
    CookieStore::from_settings(&test_settings()).expect("test keys are valid")
}

pub fn token() -> Token {
    Token {
        access_token: "access".into(),
        refresh_token: Some("refresh".into()),
        scope: "user-top-read".into(),
        expires_in: 3600,
        obtained_at: 0,
    }
}

/// Authorization client that accepts [`VALID_CODE`] and counts exchanges.
#[derive(Default)]
pub struct FakeAuthenticator {
    pub exchanges: AtomicUsize,
}

impl FakeAuthenticator {
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

impl Authenticator for FakeAuthenticator {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://accounts.example.com/authorize?client_id=client&response_type=code&state={state}")
    }

    async fn exchange_code(
        &self,
        state: &str,
        callback: &CallbackParams,
    ) -> Result<Token, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if callback.state.as_deref() != Some(state) {
            return Err(ProviderError::StateMismatch);
        }
        match callback.code.as_deref() {
            Some(VALID_CODE) => Ok(token()),
            Some(_) => Err(ProviderError::Denied("invalid_grant".into())),
            None => Err(ProviderError::MissingCode),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeneratorMode {
    #[default]
    Ok,
    Empty,
    Fail,
    Slow,
    /// Every step finishes, but only after [`SLUGGISH_STEP`].
    Sluggish,
    Panic,
}

/// Playlist generator that counts calls and numbers created playlists.
#[derive(Default)]
pub struct FakeGenerator {
    pub mode: GeneratorMode,
    pub generated: AtomicUsize,
    pub created: AtomicUsize,
}

impl FakeGenerator {
    pub fn with_mode(mode: GeneratorMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl PlaylistGenerator for FakeGenerator {
    async fn generate(&self, _token: &Token, max_items: usize) -> Result<Vec<Track>, ProviderError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            GeneratorMode::Ok => Ok((0..max_items)
                .map(|n| Track {
                    id: format!("t{n}"),
                    name: format!("Track {n}"),
                    uri: format!("spotify:track:t{n}"),
                })
                .collect()),
            GeneratorMode::Empty => Ok(Vec::new()),
            GeneratorMode::Fail => Err(ProviderError::Unexpected("recommendations unavailable".into())),
            GeneratorMode::Slow => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            GeneratorMode::Sluggish => {
                tokio::time::sleep(SLUGGISH_STEP).await;
                Ok(vec![Track {
                    id: "t0".into(),
                    name: "Track 0".into(),
                    uri: "spotify:track:t0".into(),
                }])
            }
            GeneratorMode::Panic => panic!("generator exploded"),
        }
    }

    async fn create_playlist(
        &self,
        _token: &Token,
        name: &str,
        _tracks: &[Track],
    ) -> Result<Playlist, ProviderError> {
        if self.mode == GeneratorMode::Sluggish {
            tokio::time::sleep(SLUGGISH_STEP).await;
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Playlist {
            id: format!("pl{n}"),
            name: name.to_string(),
            uri: format!("spotify:playlist:pl{n}"),
        })
    }
}

pub struct Harness {
    pub authenticator: Arc<FakeAuthenticator>,
    pub generator: Arc<FakeGenerator>,
    pub flow: AuthFlow<FakeAuthenticator, FakeGenerator>,
}

pub fn harness(mode: GeneratorMode) -> Harness {
    harness_with_timeout(mode, Duration::from_secs(2))
}

pub fn harness_with_timeout(mode: GeneratorMode, timeout: Duration) -> Harness {
    harness_with_timeouts(mode, timeout, Duration::from_secs(10))
}

/// Harness with separate per-call and whole-callback deadlines.
pub fn harness_with_timeouts(mode: GeneratorMode, upstream: Duration, request: Duration) -> Harness {
    let authenticator = Arc::new(FakeAuthenticator::default());
    let generator = Arc::new(FakeGenerator::with_mode(mode));
    let flow = AuthFlow::new(
        authenticator.clone(),
        generator.clone(),
        StateKey::new(hex_key(HASH_KEY)),
        5,
        upstream,
        request,
    );
    Harness {
        authenticator,
        generator,
        flow,
    }
}

pub fn app_state(harness: &Harness) -> AppState<FakeAuthenticator, FakeGenerator> {
    AppState::new(harness.flow.clone(), test_store())
}

pub fn hex_key(key: &str) -> Vec<u8> {
    hex::decode(key).expect("valid hex")
}

/// Pulls the `state` query parameter out of an authorization URL.
pub fn state_from_url(url: &str) -> String {
    url::Url::parse(url)
        .expect("authorization url parses")
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("authorization url carries state")
}
