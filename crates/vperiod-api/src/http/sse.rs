//! Server-sent event streaming of the peer event bus.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::{Stream, StreamExt, future};
use tracing::error;
use vperiod_events::{EventBus, EventEnvelope, EventId};

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::state::ApiState;

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send> {
    let last_id = parse_last_event_id(&headers);
    Sse::new(event_sse_stream(state.events.clone(), last_id)).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

pub(crate) fn parse_last_event_id(headers: &HeaderMap) -> Option<EventId> {
    headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok())
}

pub(crate) fn event_replay_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = EventEnvelope> + Send {
    stream! {
        let mut stream = bus.subscribe(since);
        while let Some(envelope) = stream.next().await {
            yield envelope;
        }
    }
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    event_replay_stream(bus, since).filter_map(|envelope| {
        future::ready(match serde_json::to_string(&envelope) {
            Ok(payload) => Some(Ok(sse::Event::default()
                .id(envelope.id.to_string())
                .event(envelope.event.kind())
                .data(payload))),
            Err(err) => {
                error!(error = %err, "failed to serialise SSE event payload");
                None
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use vperiod_events::Event;

    #[test]
    fn last_event_id_is_parsed_leniently() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_last_event_id(&headers), None);
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static(" 7 "));
        assert_eq!(parse_last_event_id(&headers), Some(7));
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static("dummy-1"));
        assert_eq!(parse_last_event_id(&headers), None);
    }

    #[tokio::test]
    async fn replay_resumes_after_last_event_id() {
        let bus = EventBus::with_capacity(8);
        for tick in 1..=3 {
            bus.publish(Event::ValidityPeriodAdvanced {
                chaincode_id: "cc".into(),
                value: tick * 37,
                tick: tick.unsigned_abs(),
                height: tick.unsigned_abs() + 1,
            })
            .expect("publish");
        }
        let first = bus.last_event_id().expect("id") - 2;
        let mut stream = Box::pin(event_replay_stream(bus, Some(first)));
        let next = stream.next().await.expect("replayed");
        assert_eq!(next.id, first + 1);
        assert!(matches!(
            next.event,
            Event::ValidityPeriodAdvanced { tick: 2, .. }
        ));
    }
}
