use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::{AppState, PreSerializedEvent};

pub async fn board_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        // Subscribe before reading the current state so no publication slips between the two.
        let rx = state.event_tx.subscribe();
        let current = state.live_board.read().await.event.clone();
        let mut last_sent = 0;
        if let Some(event) = current {
            last_sent = event.seq;
            if let Some(sse) = to_sse_event(&event) {
                yield Ok(sse);
            }
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    if event.seq <= last_sent {
                        continue;
                    }
                    last_sent = event.seq;
                    if let Some(sse) = to_sse_event(&event) {
                        yield Ok(sse);
                    }
                }
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; replaying current state"
                    );
                    let current = state.live_board.read().await.event.clone();
                    if let Some(event) = current {
                        last_sent = event.seq;
                        if let Some(sse) = to_sse_event(&event) {
                            yield Ok(sse);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &PreSerializedEvent) -> Option<Event> {
    let Some(payload) = event_payload(event.json.as_ref()) else {
        warn!(
            seq = event.seq,
            event = event.name,
            "event payload is not valid utf-8; dropping SSE event"
        );
        return None;
    };
    Some(
        Event::default()
            .id(event.seq.to_string())
            .event(event.name)
            .data(payload),
    )
}

fn event_payload(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes.as_ref()).ok()
}
