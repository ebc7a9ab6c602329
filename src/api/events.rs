use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_core::stream::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    error::ApiResult,
    events::{LiveSession, ServerEvent},
    main_lib::AppState,
};

/// One SSE live session. Subscriptions are registered on open and removed
/// when the client goes away and the response stream is dropped.
async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = LiveSession::open(state.event_bus.clone(), tx);

    let frames = tokio_stream::StreamExt::map(UnboundedReceiverStream::new(rx), move |frame| {
        // The session rides along with the stream; dropping the stream tears
        // the subscriptions down.
        let _session = &session;
        Ok::<_, Infallible>(SseEvent::default().event(frame.event).data(frame.data))
    });
    let handshake = futures::stream::once(futures::future::ready(Ok::<_, Infallible>(
        SseEvent::default().comment("connected"),
    )));
    let stream = futures::StreamExt::chain(handshake, frames);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[derive(Deserialize)]
pub struct TriggerEventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Demo escape hatch: fans out an arbitrary event type to whatever is
/// subscribed, possibly nothing. No validation of the type on purpose.
async fn trigger_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TriggerEventBody>,
) -> ApiResult<StatusCode> {
    state
        .event_bus
        .publish(ServerEvent::new(body.event_type, body.payload));
    Ok(StatusCode::ACCEPTED)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/stream", get(stream_events))
        .route("/events/trigger", post(trigger_event))
}
