//! Discover Now backend library
//!
//! This library brokers the Spotify authorization-code flow for a browser
//! frontend and turns the authorized callback into a freshly generated
//! discovery playlist. The callback is bound to the browser session that
//! started the flow without keeping any per-request state on the server: the
//! anti-CSRF `state` value is an HMAC over fields stored in an encrypted,
//! authenticated session cookie, and is simply re-derived when the identity
//! provider redirects back.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the login, playlist and health endpoints
//! - `config` - Environment loading and the immutable [`config::Settings`]
//! - `error` - Error types shared by the session store, providers and flow
//! - `management` - Session cookies, state tokens and the login/callback flow
//! - `provider` - Collaborator traits for the identity provider and generator
//! - `server` - Router assembly and the HTTP server loop
//! - `spotify` - Spotify implementations of the collaborator traits
//! - `types` - Data structures and wire types
//! - `utils` - Randomness, timestamps and playlist naming helpers
//!
//! # Example
//!
//! ```
//! use discover_now::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> discover_now::Res<()> {
//!     config::load_env();
//!     let settings = config::Settings::from_env()?;
//!     server::start_api_server(settings).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod management;
pub mod provider;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Provides a standard error handling pattern for the top-level startup
/// path using a boxed dynamic error trait object. Request handling uses the
/// typed errors from [`error`] instead.
///
/// # Type Parameters
///
/// - `T` - The success type returned on successful operations
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Creates a formatted output line with a distinctive blue "o" indicator
/// followed by the provided message. Used for request logging and general
/// status updates.
///
/// # Example
///
/// ```
/// info!("Listening on {}", addr);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Playlist {} created", uri);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Terminates the process with exit code 1 right after printing. Only used
/// while starting up, where a misconfigured deployment must not go on to
/// serve traffic. Never call this from a request handler.
///
/// # Example
///
/// ```
/// error!("Invalid configuration: {}", e);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for failures that end a single request (rejected callbacks,
/// upstream errors) but leave the process running. The message is only
/// written to the server log, never returned to the caller.
///
/// # Example
///
/// ```
/// warning!("Token exchange failed: {}", e);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
