mod auth;
mod session;
mod state;

pub use auth::AuthFlow;
pub use auth::Authorization;
pub use session::CookieStore;
pub use session::IDENTITY_KEY;
pub use session::MAX_COOKIE_LEN;
pub use session::RESULT_KEY;
pub use session::SESSION_VERSION;
pub use session::SessionRecord;
pub use session::TIMESTAMP_KEY;
pub use state::StateKey;
pub use state::derive_state;
pub use state::states_match;
