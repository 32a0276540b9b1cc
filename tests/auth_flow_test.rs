mod common;

use std::time::{Duration, Instant};

use common::{
    GeneratorMode, SLUGGISH_STEP, VALID_CODE, harness, harness_with_timeout, harness_with_timeouts,
    state_from_url,
};
use discover_now::{
    error::{FlowError, ProviderError},
    management::{
        Authorization, IDENTITY_KEY, RESULT_KEY, SessionRecord, TIMESTAMP_KEY, derive_state,
    },
    types::CallbackParams,
};

fn callback(state: &str, code: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.to_string()),
        state: Some(state.to_string()),
        error: None,
    }
}

fn created(outcome: Authorization) -> (SessionRecord, String) {
    match outcome {
        Authorization::Created { session, uri } => (session, uri),
        Authorization::Cached(uri) => panic!("expected a new playlist, got cached {uri}"),
    }
}

#[test]
fn test_login_stamps_fresh_session() {
    let h = harness(GeneratorMode::Ok);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

    let identity = session.identity().unwrap();
    let timestamp = session.timestamp().unwrap();
    assert_eq!(identity.len(), 32);
    assert!(identity.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert_eq!(session.result(), None);

    let expected = derive_state(identity, timestamp, &common::hex_key(common::HASH_KEY)).unwrap();
    assert_eq!(state_from_url(&url), expected);
}

#[test]
fn test_each_login_gets_new_identity_and_state() {
    let h = harness(GeneratorMode::Ok);
    let (first, first_url) = h.flow.login(SessionRecord::new()).unwrap();
    let (second, second_url) = h.flow.login(first.clone()).unwrap();

    assert_ne!(first.identity(), second.identity());
    assert_ne!(state_from_url(&first_url), state_from_url(&second_url));
}

#[test]
fn test_login_clears_cached_result() {
    let h = harness(GeneratorMode::Ok);
    let mut stale = SessionRecord::new();
    stale.insert(IDENTITY_KEY, "old");
    stale.insert(TIMESTAMP_KEY, "old-time");
    stale.insert(RESULT_KEY, "spotify:playlist:old");

    let (session, _) = h.flow.login(stale).unwrap();
    assert_eq!(session.result(), None);
    assert_ne!(session.identity(), Some("old"));
}

#[tokio::test]
async fn test_matching_state_creates_playlist() {
    let h = harness(GeneratorMode::Ok);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();
    let state = state_from_url(&url);

    let outcome = h
        .flow
        .authorize(session, &callback(&state, VALID_CODE))
        .await
        .unwrap();
    let (session, uri) = created(outcome);

    assert_eq!(uri, "spotify:playlist:pl1");
    assert_eq!(session.result(), Some("spotify:playlist:pl1"));
    assert_eq!(h.authenticator.exchanges(), 1);
    assert_eq!(h.generator.generated(), 1);
    assert_eq!(h.generator.created(), 1);
}

#[tokio::test]
async fn test_callback_is_idempotent_per_session() {
    let h = harness(GeneratorMode::Ok);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();
    let params = callback(&state_from_url(&url), VALID_CODE);

    let (session, uri) = created(h.flow.authorize(session, &params).await.unwrap());

    for _ in 0..2 {
        let again = h.flow.authorize(session.clone(), &params).await.unwrap();
        assert_eq!(again, Authorization::Cached(uri.clone()));
    }

    // A cached session answers even without a valid state.
    let garbage = h
        .flow
        .authorize(session, &CallbackParams::default())
        .await
        .unwrap();
    assert_eq!(garbage.uri(), uri);

    assert_eq!(h.authenticator.exchanges(), 1);
    assert_eq!(h.generator.generated(), 1);
    assert_eq!(h.generator.created(), 1);
}

#[tokio::test]
async fn test_new_login_invalidates_old_state() {
    let h = harness(GeneratorMode::Ok);
    let (session, old_url) = h.flow.login(SessionRecord::new()).unwrap();
    let old_state = state_from_url(&old_url);
    let (session, _) = created(
        h.flow
            .authorize(session, &callback(&old_state, VALID_CODE))
            .await
            .unwrap(),
    );
    assert!(session.result().is_some());

    let (session, _) = h.flow.login(session).unwrap();
    assert_eq!(session.result(), None);

    let err = h
        .flow
        .authorize(session, &callback(&old_state, VALID_CODE))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::StateMismatch));
    assert_eq!(h.authenticator.exchanges(), 1);
    assert_eq!(h.generator.generated(), 1);
}

#[tokio::test]
async fn test_session_without_identity_or_timestamp_is_rejected() {
    let h = harness(GeneratorMode::Ok);

    let mut only_identity = SessionRecord::new();
    only_identity.insert(IDENTITY_KEY, "abc");
    let mut only_timestamp = SessionRecord::new();
    only_timestamp.insert(TIMESTAMP_KEY, "2024-01-01T00:00:00Z");

    for session in [SessionRecord::new(), only_identity, only_timestamp] {
        let err = h
            .flow
            .authorize(session, &callback("anything", VALID_CODE))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Unauthorized(_)));
    }

    assert_eq!(h.authenticator.exchanges(), 0);
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_mismatched_or_missing_state_is_rejected() {
    let h = harness(GeneratorMode::Ok);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();
    let state = state_from_url(&url);

    let forged = derive_state(
        session.identity().unwrap(),
        session.timestamp().unwrap(),
        b"attacker-chosen-key",
    )
    .unwrap();
    let err = h
        .flow
        .authorize(session.clone(), &callback(&forged, VALID_CODE))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::StateMismatch));

    let tampered = format!("{}A", &state[..state.len() - 1]);
    let tampered = if tampered == state {
        format!("{}B", &state[..state.len() - 1])
    } else {
        tampered
    };
    let err = h
        .flow
        .authorize(session.clone(), &callback(&tampered, VALID_CODE))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::StateMismatch));

    let no_state = CallbackParams {
        code: Some(VALID_CODE.into()),
        state: None,
        error: None,
    };
    let err = h.flow.authorize(session, &no_state).await.unwrap_err();
    assert!(matches!(err, FlowError::Unauthorized(_)));

    assert_eq!(h.authenticator.exchanges(), 0);
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_exchange_failure_stops_before_generation() {
    let h = harness(GeneratorMode::Ok);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

    let err = h
        .flow
        .authorize(session, &callback(&state_from_url(&url), "expired-code"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Exchange(ProviderError::Denied(_))));
    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(h.authenticator.exchanges(), 1);
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_generation_failure_is_reported_once() {
    for mode in [GeneratorMode::Fail, GeneratorMode::Empty] {
        let h = harness(mode);
        let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

        let err = h
            .flow
            .authorize(session, &callback(&state_from_url(&url), VALID_CODE))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Generate(_)));
        assert_eq!(h.generator.generated(), 1);
        assert_eq!(h.generator.created(), 0);
    }
}

#[tokio::test]
async fn test_slow_generator_times_out() {
    let h = harness_with_timeout(GeneratorMode::Slow, Duration::from_millis(50));
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

    let err = h
        .flow
        .authorize(session, &callback(&state_from_url(&url), VALID_CODE))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Timeout(_)));
    assert_eq!(err.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(h.generator.created(), 0);
}

#[tokio::test]
async fn test_callback_deadline_covers_all_steps() {
    // Each step fits the per-call bound; together they overrun the callback deadline.
    let upstream = SLUGGISH_STEP + Duration::from_millis(150);
    let request = SLUGGISH_STEP + Duration::from_millis(100);
    let h = harness_with_timeouts(GeneratorMode::Sluggish, upstream, request);
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

    let started = Instant::now();
    let err = h
        .flow
        .authorize(session, &callback(&state_from_url(&url), VALID_CODE))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, FlowError::Timeout("callback")), "{err:?}");
    assert_eq!(err.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed < SLUGGISH_STEP * 2, "ran for {elapsed:?}");
    assert_eq!(h.generator.generated(), 1);
    assert_eq!(h.generator.created(), 0);
}

#[tokio::test]
async fn test_callback_within_deadline_succeeds() {
    let h = harness_with_timeouts(
        GeneratorMode::Sluggish,
        SLUGGISH_STEP * 2,
        SLUGGISH_STEP * 5,
    );
    let (session, url) = h.flow.login(SessionRecord::new()).unwrap();

    let outcome = h
        .flow
        .authorize(session, &callback(&state_from_url(&url), VALID_CODE))
        .await
        .unwrap();
    assert_eq!(outcome.uri(), "spotify:playlist:pl1");
}
