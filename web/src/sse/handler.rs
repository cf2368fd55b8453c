use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{Extensions, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use log::*;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Header browsers send on reconnect with the id of the last event they saw.
const LAST_EVENT_ID: &str = "last-event-id";

/// Stops reverse proxies such as nginx from buffering the event stream.
const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// SSE handler that subscribes the caller to the channel named by the request
/// path and streams every message published to it until either side hangs up.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, Error> {
    let last_event_id = headers
        .get(LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let name = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    debug!("Establishing SSE connection from {name:?} on channel {channel}");

    let mut subscription = app_state
        .sse_server
        .subscribe(&channel, &name, last_event_id)
        .await?;
    let retry = subscription.retry();

    // Dropping the stream, whether the peer went away or the server shut the
    // client down, drops the subscription and unregisters the client.
    let stream = stream! {
        while let Some(message) = subscription.recv().await {
            yield Ok::<Event, Infallible>(message.to_event(retry));
        }

        debug!(
            "SSE stream ended for client {} on channel {}",
            subscription.client().id(),
            subscription.client().channel()
        );
    };

    Ok((
        [(X_ACCEL_BUFFERING, "no")],
        Sse::new(stream).keep_alive(KeepAlive::new().interval(app_state.config.keep_alive())),
    ))
}
