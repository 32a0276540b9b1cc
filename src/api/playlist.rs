use axum::{
    Json,
    extract::{Query, State},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    api::AppState,
    error::FlowError,
    management::Authorization,
    provider::{Authenticator, PlaylistGenerator},
    types::{CallbackParams, PlaylistResponse},
};

/// Answers with the session's playlist URI, creating the playlist on the
/// first authorized call. Later calls return the cached URI unchanged.
pub async fn playlist<A: Authenticator, G: PlaylistGenerator>(
    State(state): State<AppState<A, G>>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<PlaylistResponse>), FlowError> {
    let session = state.store.get(&jar);

    match state.flow.authorize(session, &params).await? {
        Authorization::Cached(uri) => Ok((jar, Json(PlaylistResponse { uri }))),
        Authorization::Created { session, uri } => {
            let jar = state.store.save(jar, &session)?;
            Ok((jar, Json(PlaylistResponse { uri })))
        }
    }
}
