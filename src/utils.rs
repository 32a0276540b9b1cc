use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use rand::{TryRngCore, rngs::OsRng, seq::IndexedRandom};

use crate::types::Track;

/// Bytes of entropy in a session identity (128 bits).
pub const IDENTITY_BYTES: usize = 16;

/// Bytes in a secret generated by `keygen`.
pub const SECRET_BYTES: usize = 32;

const PLAYLIST_PREFIX: &str = "Discover Now: ";

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "cosmic", "crimson", "curious",
    "dusty", "eager", "electric", "fancy", "gentle", "golden", "hidden", "hollow", "humble",
    "icy", "jolly", "lively", "lucky", "mellow", "misty", "nimble", "quiet", "rapid", "restless",
    "rusty", "silent", "silver", "sleepy", "smooth", "solar", "stormy", "sunny", "swift", "velvet",
    "wild",
];

const ANIMALS: &[&str] = &[
    "badger", "beaver", "bison", "cobra", "condor", "coyote", "crane", "dingo", "falcon", "ferret",
    "gecko", "heron", "ibis", "jackal", "koala", "lemur", "lynx", "magpie", "marten", "moose",
    "narwhal", "ocelot", "otter", "panda", "pelican", "puffin", "quail", "raven", "salmon",
    "stoat", "tapir", "toucan", "walrus", "weasel", "wombat", "yak", "zebra",
];

/// Fills `len` bytes from the operating system's CSPRNG and hex-encodes them.
pub fn random_hex(len: usize) -> Result<String, String> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| e.to_string())?;
    Ok(hex::encode(bytes))
}

/// A fresh, unguessable session identity.
pub fn generate_identity() -> Result<String, String> {
    random_hex(IDENTITY_BYTES)
}

/// Current wall-clock time as RFC 3339 with nanosecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// A random `adjective-adjective-animal` slug.
pub fn playlist_slug() -> String {
    let mut rng = rand::rng();
    let first = ADJECTIVES.choose(&mut rng).copied().unwrap_or("fresh");
    let second = ADJECTIVES.choose(&mut rng).copied().unwrap_or("new");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("finch");
    format!("{first}-{second}-{animal}")
}

/// Name for a newly generated playlist, e.g. `Discover Now: quiet-amber-heron`.
pub fn playlist_name() -> String {
    format!("{PLAYLIST_PREFIX}{}", playlist_slug())
}

/// Removes tracks with a repeated URI, keeping the first occurrence.
pub fn remove_duplicate_tracks(tracks: &mut Vec<Track>) {
    let mut seen = HashSet::new();
    tracks.retain(|track| seen.insert(track.uri.clone()));
}
