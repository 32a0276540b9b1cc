use std::{any::Any, sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header::InvalidHeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
};

use crate::{
    Res,
    api::{self, AppState},
    config::Settings,
    info,
    management::{AuthFlow, CookieStore},
    provider::{Authenticator, PlaylistGenerator},
    spotify::{self, SpotifyAuthenticator, SpotifyGenerator},
    warning,
};

/// Assembles the application router.
///
/// `/api/v1` carries the login and playlist endpoints, `/static` serves the
/// frontend assets and every other path falls back to the frontend's
/// `index.html`. Cross-origin requests are only allowed from the configured
/// frontend origin, and a panicking handler yields a 500 for that request
/// alone.
pub fn router<A, G>(state: AppState<A, G>, settings: &Settings) -> Result<Router, InvalidHeaderValue>
where
    A: Authenticator,
    G: PlaylistGenerator,
{
    let origin = HeaderValue::from_str(&settings.frontend_origin())?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET])
        .allow_credentials(true);

    let api = Router::new()
        .route("/login", get(api::login::<A, G>))
        .route("/playlist", get(api::playlist::<A, G>))
        .with_state(state);

    Ok(Router::new()
        .nest("/api/v1", api)
        .route("/health", get(api::health))
        .nest_service("/static", ServeDir::new(&settings.static_dir))
        .fallback_service(ServeFile::new(&settings.index_file))
        .layer(cors)
        .layer(middleware::from_fn(log_request))
        .layer(CatchPanicLayer::custom(handle_panic)))
}

/// Wires the Spotify collaborators into the router and serves it until
/// Ctrl-C.
pub async fn start_api_server(settings: Settings) -> Res<()> {
    let client = spotify::http_client(settings.upstream_timeout)?;
    let authenticator = Arc::new(SpotifyAuthenticator::from_settings(client.clone(), &settings));
    let generator = Arc::new(SpotifyGenerator::from_settings(client, &settings));

    let flow = AuthFlow::from_settings(&settings, authenticator, generator);
    let store = CookieStore::from_settings(&settings)?;
    let app = router(AppState::new(flow, store), &settings)?;

    let addr = settings.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {} for {}", addr, settings.frontend_uri);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warning!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// Logs the path only: query strings carry the OAuth code and state.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    warning!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
