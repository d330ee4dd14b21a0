use axum::{
    body::Bytes,
    extract::State,
    http::{Method, header},
    response::{IntoResponse, Response},
};
use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, error};

use skill_types::api::{TYPE_SIMPLE_UTTERANCE, WebhookRequest, WebhookResponse};

use crate::{AppState, WebhookError};

/// Voice platform webhook: reports how many messages wait for the user and,
/// on the first turn of a session, the local time.
pub async fn webhook(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Response, WebhookError> {
    if method != Method::POST {
        debug!(%method, "got request with bad method");
        return Err(WebhookError::BadMethod);
    }

    let req: WebhookRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!("cannot decode request JSON body: {}", e);
        WebhookError::MalformedBody
    })?;

    if req.request.kind != TYPE_SIMPLE_UTTERANCE {
        debug!(kind = %req.request.kind, "unsupported request type");
        return Err(WebhookError::UnsupportedType);
    }

    // Run the blocking store query off the async runtime
    let db = state.clone();
    let user_id = req.user_id().to_string();
    let messages = tokio::task::spawn_blocking(move || db.store.list_messages(&user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            WebhookError::StoreUnavailable
        })?
        .map_err(|e| {
            error!(user_id = %req.user_id(), "cannot load messages for user: {}", e);
            WebhookError::StoreUnavailable
        })?;

    let clock = if req.session.new {
        Some(resolve_timezone(&req.timezone)?.clock_now())
    } else {
        None
    };

    let text = compose_text(messages.len(), clock);

    let body = serde_json::to_vec(&WebhookResponse::say(text)).map_err(|e| {
        error!("error encoding response: {}", e);
        WebhookError::SerializationFailure
    })?;

    debug!("sending HTTP 200 response");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Named(Tz),
    /// The server's own zone.
    Local,
}

impl Zone {
    /// Current (hour, minute) in this zone.
    fn clock_now(self) -> (u32, u32) {
        match self {
            Self::Named(tz) => {
                let now = Utc::now().with_timezone(&tz);
                (now.hour(), now.minute())
            }
            Self::Local => {
                let now = Local::now();
                (now.hour(), now.minute())
            }
        }
    }
}

/// Empty means UTC and `Local` the server's zone; anything else must be an
/// IANA zone name.
fn resolve_timezone(name: &str) -> Result<Zone, WebhookError> {
    match name {
        "" => Ok(Zone::Named(Tz::UTC)),
        "Local" => Ok(Zone::Local),
        _ => name.parse::<Tz>().map(Zone::Named).map_err(|e| {
            debug!(timezone = %name, "cannot parse timezone: {}", e);
            WebhookError::InvalidTimezone
        }),
    }
}

/// Spoken reply for `count` waiting messages, prefixed with the time when
/// `clock` (hour, minute) is given.
pub fn compose_text(count: usize, clock: Option<(u32, u32)>) -> String {
    let text = if count == 0 {
        "Для вас нет новых сообщений.".to_string()
    } else {
        format!("Для вас {} новых сообщений.", count)
    };

    match clock {
        Some((hour, minute)) => format!("Точное время {} часов, {} минут. {}", hour, minute, text),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use skill_db::models::{MessageRow, MessageSummary, NewMessage};
    use skill_db::{Store, StoreError};

    use crate::test_support::{app_with, fresh_store, post, send};

    struct FailingStore;

    impl Store for FailingStore {
        fn bootstrap(&self) -> Result<(), StoreError> {
            Ok(())
        }
        fn find_recipient(&self, _: &str) -> Result<String, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn list_messages(&self, _: &str) -> Result<Vec<MessageSummary>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn get_message(&self, _: i64) -> Result<MessageRow, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn save_messages(&self, _: &[NewMessage]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn register_user(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    fn response_text(body: &[u8]) -> String {
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["version"], "1.0");
        json["response"]["text"].as_str().unwrap().to_string()
    }

    /// Splits "Точное время H часов, M минут. rest" into (H, M, rest).
    fn parse_clock(text: &str) -> (u32, u32, &str) {
        let rest = text.strip_prefix("Точное время ").unwrap();
        let (hour, rest) = rest.split_once(" часов, ").unwrap();
        let (minute, rest) = rest.split_once(" минут. ").unwrap();
        (hour.parse().unwrap(), minute.parse().unwrap(), rest)
    }

    #[tokio::test]
    async fn non_post_methods_are_rejected() {
        for method in ["GET", "PUT", "DELETE", "PATCH"] {
            let req = Request::builder()
                .method(method)
                .uri("/")
                .body(Body::empty())
                .unwrap();

            let (status, _, body) = send(app_with(fresh_store()), req).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_internal_error() {
        for body in ["", "not json", "[1, 2]", r#"{"request": 5}"#] {
            let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{:?}", body);
            assert!(resp.is_empty());
        }
    }

    #[tokio::test]
    async fn unsupported_type_is_unprocessable() {
        let body = r#"{"request": {"type": "idunno", "command": "do something"}, "version": "1.0"}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resp.is_empty());
    }

    #[tokio::test]
    async fn empty_inbox_existing_session() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":false},"version":"1.0"}"#;
        let (status, headers, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(response_text(&resp), "Для вас нет новых сообщений.");
    }

    #[tokio::test]
    async fn counts_waiting_messages() {
        let store = fresh_store();
        store.register_user("alice-id", "alice").unwrap();
        store.register_user("bob-id", "bob").unwrap();
        store
            .save_messages(&[
                NewMessage::now("alice-id", "bob-id", "hi"),
                NewMessage::now("alice-id", "bob-id", "are you there?"),
                NewMessage::now("bob-id", "alice-id", "yes"),
            ])
            .unwrap();

        let body = r#"{"request":{"type":"SimpleUtterance","command":""},"session":{"new":false,"user":{"user_id":"bob-id"}}}"#;
        let (status, _, resp) = send(app_with(store), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_text(&resp), "Для вас 2 новых сообщений.");
    }

    #[tokio::test]
    async fn new_session_speaks_local_time() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":true},"timezone":"Europe/Moscow","version":"1.0"}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        let text = response_text(&resp);
        let (hour, minute, rest) = parse_clock(&text);
        assert!(hour < 24);
        assert!(minute < 60);
        assert_eq!(rest, "Для вас нет новых сообщений.");
    }

    #[tokio::test]
    async fn new_session_without_timezone_uses_utc() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":true}}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        let text = response_text(&resp);
        let (hour, _, _) = parse_clock(&text);
        // Tolerate the hour rolling over between the request and this check
        let now = Utc::now().hour();
        assert!(hour == now || (hour + 1) % 24 == now);
    }

    #[tokio::test]
    async fn new_session_in_server_local_zone() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":true},"timezone":"Local"}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        let text = response_text(&resp);
        let (hour, _, rest) = parse_clock(&text);
        let now = Local::now().hour();
        assert!(hour == now || (hour + 1) % 24 == now);
        assert_eq!(rest, "Для вас нет новых сообщений.");
    }

    #[tokio::test]
    async fn new_session_with_unknown_timezone_is_bad_request() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":true},"timezone":"Mars/Olympus_Mons"}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp.is_empty());
    }

    #[tokio::test]
    async fn timezone_is_ignored_for_existing_session() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"},"session":{"new":false},"timezone":"garbage"}"#;
        let (status, _, resp) = send(app_with(fresh_store()), post(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_text(&resp), "Для вас нет новых сообщений.");
    }

    #[tokio::test]
    async fn store_failure_aborts_with_internal_error() {
        let body = r#"{"request":{"type":"SimpleUtterance","command":"x"}}"#;
        let (status, _, resp) = send(app_with(FailingStore), post(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.is_empty());
    }

    #[test]
    fn compose_text_variants() {
        assert_eq!(compose_text(0, None), "Для вас нет новых сообщений.");
        assert_eq!(compose_text(5, None), "Для вас 5 новых сообщений.");
        assert_eq!(
            compose_text(1, Some((9, 5))),
            "Точное время 9 часов, 5 минут. Для вас 1 новых сообщений."
        );
    }

    #[test]
    fn resolve_timezone_names() {
        assert_eq!(resolve_timezone("").unwrap(), Zone::Named(Tz::UTC));
        assert_eq!(resolve_timezone("Local").unwrap(), Zone::Local);
        assert_eq!(resolve_timezone("Europe/Moscow").unwrap(), Zone::Named(Tz::Europe__Moscow));
        assert!(matches!(resolve_timezone("local"), Err(WebhookError::InvalidTimezone)));
        assert!(matches!(resolve_timezone("Nowhere/Town"), Err(WebhookError::InvalidTimezone)));
    }
}
