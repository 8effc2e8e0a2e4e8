//! Inbound notification endpoint
//!
//! The archive posts a JSON body when a download batch completes. Every
//! request is answered `200` so the sender never enters a retry loop;
//! whether a run was actually scheduled is reported in the body.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
struct Notification {
    /// External ids of the affected videos; an empty or absent list is a
    /// generic "something changed" signal.
    #[serde(default)]
    video_ids: Vec<String>,
}

#[derive(Serialize)]
struct NotifyResponse {
    status: &'static str,
}

async fn notify(State(state): State<AppState>, body: Bytes) -> Json<NotifyResponse> {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "ignoring undecodable notification body");
            return Json(NotifyResponse { status: "ignored" });
        }
    };
    if !payload.is_object() {
        warn!("ignoring non-object notification payload");
        return Json(NotifyResponse { status: "ignored" });
    }

    let notification: Notification = serde_json::from_value(payload).unwrap_or(Notification {
        video_ids: Vec::new(),
    });
    let scheduled = state.scheduler.request_run();
    info!(
        videos = notification.video_ids.len(),
        scheduled = scheduled,
        "notification accepted"
    );
    Json(NotifyResponse { status: "accepted" })
}

// The inbound contract promises 404 for anything but POST on this path,
// not the default 405.
async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn router() -> Router<AppState> {
    Router::new().route("/notify", post(notify).fallback(not_found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::scheduler::ListenerPhase;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        crate::api::create_router(state)
    }

    fn post_notify(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/notify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_notification_schedules_a_run() {
        let state = test_state();
        let scheduler = state.scheduler.clone();

        let response = app(state)
            .oneshot(post_notify(r#"{"video_ids": ["dQw4w9WgXcQ"]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(scheduler.phase(), ListenerPhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_object_is_a_generic_trigger() {
        let state = test_state();
        let scheduler = state.scheduler.clone();

        let response = app(state).oneshot(post_notify("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(scheduler.phase(), ListenerPhase::Idle);
    }

    #[tokio::test]
    async fn test_malformed_body_is_acknowledged_without_a_run() {
        let state = test_state();
        let scheduler = state.scheduler.clone();

        let response = app(state).oneshot(post_notify("not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(scheduler.phase(), ListenerPhase::Idle);
    }

    #[tokio::test]
    async fn test_non_object_json_is_acknowledged_without_a_run() {
        let state = test_state();
        let scheduler = state.scheduler.clone();

        let response = app(state).oneshot(post_notify(r#"[1, 2, 3]"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(scheduler.phase(), ListenerPhase::Idle);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let state = test_state();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/something-else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_methods_on_notify_are_not_found() {
        let state = test_state();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/notify")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
