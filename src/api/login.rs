use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    api::AppState,
    error::FlowError,
    provider::{Authenticator, PlaylistGenerator},
    types::LoginResponse,
};

pub async fn login<A: Authenticator, G: PlaylistGenerator>(
    State(state): State<AppState<A, G>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LoginResponse>), FlowError> {
    let session = state.store.get(&jar);
    let (session, url) = state.flow.login(session)?;
    let jar = state.store.save(jar, &session)?;

    Ok((jar, Json(LoginResponse { url })))
}
