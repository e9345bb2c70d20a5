use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

use threadline::{wire_payload, ChunkStream, StreamChunk};

use super::SendMessageRequest;
use crate::{error::ApiResult, state::AppState};

/// Stream a turn in an existing (or client-named) thread using Server-Sent Events
pub async fn stream_in_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = req.into_chat_request(Some(thread_id), state.config.default_model())?;
    let chunks = state.session.respond_streaming(request).await?;
    Ok(Sse::new(sse_events(chunks)).keep_alive(KeepAlive::default()))
}

/// Stream the first turn of a new thread
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = req.into_chat_request(None, state.config.default_model())?;
    let chunks = state.session.respond_streaming(request).await?;
    Ok(Sse::new(sse_events(chunks)).keep_alive(KeepAlive::default()))
}

/// One `data` event per chunk, then a bare `done` event.
///
/// Dropping the returned stream drops the receiver, which the coordinator
/// treats as a client disconnect.
pub fn sse_events(chunks: ChunkStream) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(chunks.into_inner())
        .map(|chunk| Ok::<Event, Infallible>(data_event(&chunk)))
        .chain(stream::once(async {
            Ok::<Event, Infallible>(Event::default().event("done"))
        }))
}

fn data_event(chunk: &StreamChunk) -> Event {
    let payload = wire_payload(chunk);
    Event::default()
        .event("data")
        .json_data(&payload)
        .unwrap_or_else(|_| Event::default().event("data").data(payload.to_string()))
}
