//! Server-sent event feeds for the admin dashboard.

use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::realtime::{Feed, RealtimeEvent};

use super::AppState;

const KEEP_ALIVE_SECS: u64 = 15;

/// Turns a bus subscription into SSE frames for one feed.
///
/// Ends when the bus is dropped. A lagging subscriber skips what it missed.
fn feed_stream(
    rx: broadcast::Receiver<RealtimeEvent>,
    feed: Feed,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.feed() == feed => {
                    let frame = Event::default().event(event.name()).json_data(&event);
                    return Some((frame, rx));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(?feed, skipped, "realtime subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

fn sse_for(
    state: &AppState,
    feed: Feed,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(?feed, "realtime subscriber connected");
    Sse::new(feed_stream(state.events.subscribe(), feed))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
}

/// GET /api/v1/realtime/orders: order and delivery status changes.
pub(super) async fn order_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    sse_for(&state, Feed::Orders)
}

/// GET /api/v1/realtime/drivers: driver GPS pings.
pub(super) async fn driver_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    sse_for(&state, Feed::Drivers)
}
