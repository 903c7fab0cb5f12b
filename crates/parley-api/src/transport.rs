//! Server-push encoding of a turn's fragments.

use axum::{
    http::{header, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures::StreamExt;
use parley_turn::TurnHandle;
use parley_types::StreamFragment;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;

/// One `data: {json}` event per fragment
pub fn fragment_event(fragment: &StreamFragment) -> Result<Event, axum::Error> {
    Event::default().json_data(fragment)
}

/// Stream a turn's fragments to the client in the order produced.
///
/// The body owns a drop guard for the turn, so when the client disconnects
/// and the body is dropped the turn is cancelled.
pub fn sse_response(handle: TurnHandle) -> Response {
    let TurnHandle {
        fragments,
        cancellation,
    } = handle;
    let guard = cancellation.drop_guard();

    let events = async_stream::stream! {
        let _guard = guard;
        let mut fragments = ReceiverStream::new(fragments);

        while let Some(fragment) = fragments.next().await {
            match fragment_event(&fragment) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode fragment");
                    break;
                }
            }
        }
    };

    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(events),
    )
        .into_response()
}
