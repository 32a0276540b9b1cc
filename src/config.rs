//! Configuration management for the Discover Now backend.
//!
//! This module handles loading configuration values from environment
//! variables and `.env` files, and turns them into one immutable
//! [`Settings`] value that is built once at startup and handed to the
//! server. Request handling never reads the environment directly.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)
//!
//! Secrets are loaded fail-closed: a deployment with a missing or malformed
//! key refuses to start instead of running with a weak or default one.

use std::{fmt, io, net::SocketAddr, path::PathBuf, time::Duration};

use url::Url;

use crate::{error::ConfigError, warning};

/// Name of the session cookie.
pub const SESSION_NAME: &str = "discover_now";

/// Path appended to the frontend URI to form the OAuth redirect URI.
pub const REDIRECT_PATH: &str = "/results";

/// Required length of the session encryption key (AES-256).
pub const CRYPT_KEY_LEN: usize = 32;

const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_SCOPE: &str = "user-top-read playlist-modify-public playlist-modify-private";
const DEFAULT_PLAYLIST_LIMIT: usize = 30;
const MAX_PLAYLIST_LIMIT: usize = 100;
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads environment variables from a `.env` file.
///
/// Looks for `.env` in the working directory first and falls back to the
/// platform-specific local data directory under `discover-now/.env`:
/// - Linux: `~/.local/share/discover-now/.env`
/// - macOS: `~/Library/Application Support/discover-now/.env`
/// - Windows: `%LOCALAPPDATA%/discover-now/.env`
///
/// Variables already present in the environment are never overridden, and a
/// missing file is not an error: container deployments usually provide the
/// environment directly. A file that exists but cannot be read or parsed is
/// reported with a warning.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(_) => return,
        Err(e) => {
            if let Some(problem) = env_file_problem(&e) {
                warning!("Ignoring .env in working directory: {}", problem);
            }
        }
    }

    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("discover-now/.env");
    if let Err(e) = dotenv::from_path(&path) {
        if let Some(problem) = env_file_problem(&e) {
            warning!("Ignoring {}: {}", path.display(), problem);
        }
    }
}

/// Describes why an existing `.env` file was not loaded, or `None` when
/// there simply was no file. Parse errors report the position only, since
/// the offending line may hold a secret.
fn env_file_problem(err: &dotenv::Error) -> Option<String> {
    match err {
        dotenv::Error::Io(e) if e.kind() == io::ErrorKind::NotFound => None,
        dotenv::Error::Io(e) => Some(format!("cannot read file: {e}")),
        dotenv::Error::LineParse(_, index) => Some(format!("parse error at index {index}")),
        _ => Some("cannot load file".to_string()),
    }
}

/// The three secret byte-strings the server needs.
///
/// Held for the process lifetime and never logged: the `Debug` impl only
/// prints key lengths.
#[derive(Clone)]
pub struct Secrets {
    /// HMAC key for state tokens (`DISCOVER_HASH`).
    pub hash_key: Vec<u8>,
    /// HMAC key authenticating session cookies (`DISCOVER_AUTH`).
    pub session_auth_key: Vec<u8>,
    /// AES-256 key encrypting session cookies (`DISCOVER_CRYPT`).
    pub session_crypt_key: Vec<u8>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("hash_key", &format_args!("<{} bytes>", self.hash_key.len()))
            .field(
                "session_auth_key",
                &format_args!("<{} bytes>", self.session_auth_key.len()),
            )
            .field(
                "session_crypt_key",
                &format_args!("<{} bytes>", self.session_crypt_key.len()),
            )
            .finish()
    }
}

impl Secrets {
    /// Reads and hex-decodes `DISCOVER_HASH`, `DISCOVER_AUTH` and
    /// `DISCOVER_CRYPT` through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any secret is absent, not valid hex, empty
    /// after decoding, or (for the encryption key) not exactly
    /// [`CRYPT_KEY_LEN`] bytes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hash_key = decode_secret(&lookup, "DISCOVER_HASH")?;
        let session_auth_key = decode_secret(&lookup, "DISCOVER_AUTH")?;
        let session_crypt_key = decode_secret(&lookup, "DISCOVER_CRYPT")?;

        if session_crypt_key.len() != CRYPT_KEY_LEN {
            return Err(ConfigError::Invalid {
                var: "DISCOVER_CRYPT",
                reason: format!(
                    "must decode to {CRYPT_KEY_LEN} bytes, got {}",
                    session_crypt_key.len()
                ),
            });
        }

        Ok(Self {
            hash_key,
            session_auth_key,
            session_crypt_key,
        })
    }
}

fn decode_secret<F>(lookup: &F, var: &'static str) -> Result<Vec<u8>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var).ok_or(ConfigError::Missing(var))?;
    // The hex error's Display quotes the offending character.
    let bytes = hex::decode(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: match e {
            hex::FromHexError::OddLength => "odd number of hex digits".into(),
            _ => "not valid hex".into(),
        },
    })?;
    if bytes.is_empty() {
        return Err(ConfigError::Missing(var));
    }
    Ok(bytes)
}

/// Spotify application credentials and endpoints.
#[derive(Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub api_url: String,
    pub scope: String,
}

impl fmt::Debug for SpotifySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifySettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("api_url", &self.api_url)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Immutable process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Origin of the browser frontend, without a trailing slash.
    pub frontend_uri: String,
    /// Where the identity provider sends the browser back to.
    pub redirect_uri: String,
    pub port: u16,
    pub secrets: Secrets,
    pub spotify: SpotifySettings,
    /// Number of tracks put in a generated playlist.
    pub playlist_limit: usize,
    /// Upper bound for every call to Spotify.
    pub upstream_timeout: Duration,
    /// Upper bound for a whole callback, across all of its Spotify calls.
    pub request_timeout: Duration,
    pub static_dir: PathBuf,
    pub index_file: PathBuf,
    pub session_name: String,
    /// Whether the session cookie carries the `Secure` attribute.
    pub secure_cookies: bool,
}

impl Settings {
    /// Builds the settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any missing required variable or any
    /// value that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the settings from an arbitrary key/value lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let frontend_uri = lookup("FRONTEND_URI").ok_or(ConfigError::Missing("FRONTEND_URI"))?;
        let frontend_uri = frontend_uri.trim().trim_end_matches('/').to_string();
        let frontend = parse_url("FRONTEND_URI", &frontend_uri)?;
        if !frontend.has_host() {
            return Err(ConfigError::Invalid {
                var: "FRONTEND_URI",
                reason: "must be an absolute http(s) URL".into(),
            });
        }

        let secrets = Secrets::from_lookup(&lookup)?;

        let port = lookup("PORT").ok_or(ConfigError::Missing("PORT"))?;
        let port = port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
            var: "PORT",
            reason: e.to_string(),
        })?;

        let spotify = SpotifySettings {
            client_id: lookup("SPOTIFY_API_AUTH_CLIENT_ID")
                .ok_or(ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_ID"))?,
            client_secret: lookup("SPOTIFY_API_AUTH_CLIENT_SECRET")
                .ok_or(ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_SECRET"))?,
            auth_url: parse_url(
                "SPOTIFY_API_AUTH_URL",
                &lookup("SPOTIFY_API_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.into()),
            )?,
            token_url: parse_url(
                "SPOTIFY_API_TOKEN_URL",
                &lookup("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            )?,
            api_url: lookup("SPOTIFY_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.into())
                .trim_end_matches('/')
                .to_string(),
            scope: lookup("SPOTIFY_API_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.into()),
        };

        let playlist_limit = match lookup("PLAYLIST_LIMIT") {
            Some(raw) => {
                let limit = raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                    var: "PLAYLIST_LIMIT",
                    reason: e.to_string(),
                })?;
                if !(1..=MAX_PLAYLIST_LIMIT).contains(&limit) {
                    return Err(ConfigError::Invalid {
                        var: "PLAYLIST_LIMIT",
                        reason: format!("must be between 1 and {MAX_PLAYLIST_LIMIT}"),
                    });
                }
                limit
            }
            None => DEFAULT_PLAYLIST_LIMIT,
        };

        let upstream_timeout =
            parse_secs("UPSTREAM_TIMEOUT_SECS", lookup("UPSTREAM_TIMEOUT_SECS"))?
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT);
        let request_timeout = parse_secs("REQUEST_TIMEOUT_SECS", lookup("REQUEST_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            redirect_uri: format!("{frontend_uri}{REDIRECT_PATH}"),
            frontend_uri,
            port,
            secrets,
            spotify,
            playlist_limit,
            upstream_timeout,
            request_timeout,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            index_file: lookup("INDEX_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("index.html")),
            session_name: SESSION_NAME.to_string(),
            secure_cookies: true,
        })
    }

    /// The address the server binds to: all interfaces on [`Settings::port`].
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// The frontend origin (`scheme://host[:port]`) allowed by CORS.
    pub fn frontend_origin(&self) -> String {
        match Url::parse(&self.frontend_uri) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.frontend_uri.clone(),
        }
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_secs(var: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Some(Duration::from_secs(secs)))
}
