//! User-facing app control, build log and live log streams.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt, stream};
use spacehub_lifecycle::AppView;
use spacehub_logs::{LogKind, LogStream};
use spacehub_state::Identity;
use tracing::debug;

use crate::ApiState;
use crate::response::{ApiResponse, Caller, lifecycle_error, relay_error};

/// GET /api/v1/spaces/:id/app
pub async fn get_app(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.lifecycle.get(&user, space_id) {
        Ok(view) => ApiResponse::ok(view).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// POST /api/v1/spaces/:id/app/restart
pub async fn restart(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.lifecycle.restart(&user, space_id).await {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// POST /api/v1/spaces/:id/app/pause
pub async fn pause(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.lifecycle.pause(&user, space_id).await {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// POST /api/v1/spaces/:id/app/resume
pub async fn resume(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.lifecycle.resume(&user, space_id).await {
        Ok(app) => ApiResponse::ok(AppView::from(&app)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// GET /api/v1/spaces/:id/app/buildlog
pub async fn build_log(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> impl IntoResponse {
    match state.lifecycle.build_log(&user, space_id) {
        Ok(log) => ApiResponse::ok(log).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// GET /api/v1/spaces/:id/app/buildlog/realtime
pub async fn build_log_realtime(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> Response {
    follow(&state, &user, space_id, LogKind::Build).await
}

/// GET /api/v1/spaces/:id/app/spacelog/realtime
pub async fn service_log_realtime(
    State(state): State<ApiState>,
    Caller(user): Caller,
    Path(space_id): Path<Identity>,
) -> Response {
    follow(&state, &user, space_id, LogKind::Service).await
}

async fn follow(state: &ApiState, user: &str, space_id: Identity, kind: LogKind) -> Response {
    let app = match state.lifecycle.app(user, space_id) {
        Ok(app) => app,
        Err(e) => return lifecycle_error(e),
    };
    match state.relay.open(&app, kind).await {
        Ok(logs) => {
            debug!(space_id, %user, %kind, "log stream opened");
            Sse::new(sse_events(logs))
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(e) => relay_error(e),
    }
}

/// One SSE event per relayed chunk. A relay failure becomes a final
/// `error` event.
fn sse_events(logs: LogStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some((logs, Utf8Carry::default())), |state| async move {
        let (mut logs, mut text) = state?;
        loop {
            match logs.next().await {
                Some(Ok(bytes)) => {
                    let data = text.push(&bytes);
                    if !data.is_empty() {
                        return Some((Ok(log_event(&data)), Some((logs, text))));
                    }
                }
                Some(Err(e)) => {
                    let event = Event::default().event("error").data(e.to_string());
                    return Some((Ok(event), None));
                }
                None => return text.finish().map(|tail| (Ok(log_event(&tail)), None)),
            }
        }
    })
}

fn log_event(text: &str) -> Event {
    Event::default().data(text.replace('\r', ""))
}

/// UTF-8 decoding across chunk boundaries. A character cut at the end of
/// one chunk is held back and completed by the next.
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    return text;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            return text;
                        }
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Whatever is still held back once the source has ended.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::StatusCode;
    use axum::routing::get;
    use spacehub_state::AppStatus;

    use crate::test_support::{TestApi, read_json};

    #[tokio::test]
    async fn get_app_hides_private_spaces() {
        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        api.app_at(space_id, AppStatus::Serving);

        let resp = get_app(
            State(api.state.clone()),
            Caller("alice".into()),
            Path(space_id),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["data"]["status"], "serving");

        let resp = get_app(State(api.state), Caller("mallory".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pause_then_resume() {
        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        api.app_at(space_id, AppStatus::Serving);

        let resp = pause(State(api.state.clone()), Caller("alice".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // Pausing twice is a status conflict.
        let resp = pause(State(api.state.clone()), Caller("alice".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = resume(State(api.state), Caller("alice".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["data"]["status"], "resuming");
    }

    #[tokio::test]
    async fn restart_is_throttled() {
        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        api.app_at(space_id, AppStatus::Serving);

        let resp = restart(State(api.state.clone()), Caller("alice".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = restart(State(api.state), Caller("alice".into()), Path(space_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn service_log_needs_serving_app() {
        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        api.app_at(space_id, AppStatus::Building);

        let resp =
            service_log_realtime(State(api.state), Caller("alice".into()), Path(space_id)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unreachable_log_source_is_bad_gateway() {
        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        let mut app = api.app_at(space_id, AppStatus::Building);
        // Nothing listens on port 9 on loopback.
        app.build_log_url = Some("http://127.0.0.1:9/log".to_string());
        api.state.store.save(&mut app).unwrap();

        let resp =
            build_log_realtime(State(api.state), Caller("alice".into()), Path(space_id)).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn split_characters_are_carried_to_the_next_chunk() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.push(b"caf\xc3"), "caf");
        assert_eq!(carry.push(b"\xa9\n"), "\u{e9}\n");
        assert_eq!(carry.finish(), None);

        // Invalid bytes mid-chunk are replaced, a truncated tail is flushed.
        assert_eq!(carry.push(b"a\xffb\xe2\x82"), "a\u{fffd}b");
        assert_eq!(carry.finish(), Some("\u{fffd}".to_string()));
    }

    /// Rebuild the text carried by the `data:` lines of an SSE body.
    fn sse_text(body: &str) -> String {
        body.split("\n\n")
            .map(|block| {
                block
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|data| data.strip_prefix(' ').unwrap_or(data))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect()
    }

    #[tokio::test]
    async fn build_log_keeps_characters_split_across_chunks() {
        let upstream = Router::new().route(
            "/build",
            get(|| async {
                let chunks: [&'static [u8]; 2] = [b"caf\xc3", b"\xa9\n"];
                let body = stream::iter(chunks).then(|chunk| async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, std::io::Error>(Bytes::from_static(chunk))
                });
                Body::from_stream(body)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let api = TestApi::new();
        let space_id = api.space("alice", "alice");
        let mut app = api.app_at(space_id, AppStatus::Building);
        app.build_log_url = Some(format!("http://{addr}/build"));
        api.state.store.save(&mut app).unwrap();

        let resp =
            build_log_realtime(State(api.state), Caller("alice".into()), Path(space_id)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = sse_text(&String::from_utf8(bytes.to_vec()).unwrap());
        assert!(text.contains("caf\u{e9}"), "{text:?}");
        assert!(!text.contains(char::REPLACEMENT_CHARACTER), "{text:?}");
    }
}
