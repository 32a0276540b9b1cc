use std::{collections::BTreeMap, fmt};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{config::Settings, error::SessionError};

type HmacSha256 = Hmac<Sha256>;

/// Current schema version of [`SessionRecord`].
pub const SESSION_VERSION: u8 = 1;

/// Per-login random identity.
pub const IDENTITY_KEY: &str = "id";
/// Per-login creation time.
pub const TIMESTAMP_KEY: &str = "time";
/// Cached playlist URI written by a successful callback.
pub const RESULT_KEY: &str = "playlist";

/// Browsers drop cookies above this size.
pub const MAX_COOKIE_LEN: usize = 4096;

const NONCE_LEN: usize = 12;

/// Key/value record carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "v")]
    version: u8,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            version: SESSION_VERSION,
            values: BTreeMap::new(),
        }
    }
}

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn identity(&self) -> Option<&str> {
        self.get(IDENTITY_KEY)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP_KEY)
    }

    pub fn result(&self) -> Option<&str> {
        self.get(RESULT_KEY)
    }
}

/// Stores [`SessionRecord`]s in an encrypted, authenticated cookie.
///
/// The cookie value is `base64url(nonce || ciphertext) "." base64url(tag)`:
/// the record is serialized as JSON, sealed with AES-256-GCM (the cookie
/// name is bound as associated data) and then tagged with HMAC-SHA256 over
/// `name|payload` using a separate key. The tag is checked in constant time
/// before anything is decrypted.
#[derive(Clone)]
pub struct CookieStore {
    name: String,
    mac: HmacSha256,
    cipher: Aes256Gcm,
    secure: bool,
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("name", &self.name)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl CookieStore {
    /// Creates a store for the cookie `name`.
    ///
    /// `crypt_key` must be 32 bytes; `auth_key` must not be empty.
    pub fn new(
        name: impl Into<String>,
        auth_key: &[u8],
        crypt_key: &[u8],
    ) -> Result<Self, SessionError> {
        if auth_key.is_empty() {
            return Err(SessionError::InvalidKey("authentication key is empty"));
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(auth_key)
            .map_err(|_| SessionError::InvalidKey("authentication key"))?;
        let cipher = Aes256Gcm::new_from_slice(crypt_key)
            .map_err(|_| SessionError::InvalidKey("encryption key must be 32 bytes"))?;

        Ok(Self {
            name: name.into(),
            mac,
            cipher,
            secure: true,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        let store = Self::new(
            settings.session_name.clone(),
            &settings.secrets.session_auth_key,
            &settings.secrets.session_crypt_key,
        )?;
        Ok(store.with_secure(settings.secure_cookies))
    }

    /// Toggles the `Secure` cookie attribute.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the session from the request cookies.
    ///
    /// Absent, tampered, undecryptable and outdated cookies all give an
    /// empty record; callers cannot tell them apart.
    pub fn get(&self, jar: &CookieJar) -> SessionRecord {
        jar.get(&self.name)
            .and_then(|cookie| self.decode(cookie.value()))
            .unwrap_or_default()
    }

    /// Writes `record` into the response cookies, replacing the whole cookie.
    pub fn save(&self, jar: CookieJar, record: &SessionRecord) -> Result<CookieJar, SessionError> {
        let value = self.encode(record)?;
        let cookie = Cookie::build((self.name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .build();
        Ok(jar.add(cookie))
    }

    pub fn encode(&self, record: &SessionRecord) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(record)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        let payload = URL_SAFE_NO_PAD.encode(sealed);

        let tag = self.tag(&payload).finalize().into_bytes();
        let value = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag));

        if value.len() + self.name.len() + 1 > MAX_COOKIE_LEN {
            return Err(SessionError::TooLarge(value.len()));
        }
        Ok(value)
    }

    pub fn decode(&self, value: &str) -> Option<SessionRecord> {
        let (payload, tag) = value.split_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
        self.tag(payload).verify_slice(&tag).ok()?;

        let sealed = URL_SAFE_NO_PAD.decode(payload).ok()?;
        if sealed.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.name.as_bytes(),
                },
            )
            .ok()?;

        let record: SessionRecord = serde_json::from_slice(&plaintext).ok()?;
        (record.version == SESSION_VERSION).then_some(record)
    }

    fn tag(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(self.name.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        mac
    }
}
