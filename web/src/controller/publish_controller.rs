use crate::controller::ApiResponse;
use crate::params::publish::PublishParams;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use sse::ErrorKind;

use log::*;

#[derive(Debug, Serialize)]
pub(crate) struct PublishResponse {
    deliveries: usize,
}

/// POST publish a message to every subscriber of one channel
pub async fn publish(
    State(app_state): State<AppState>,
    Path(channel): Path<String>,
    Json(params): Json<PublishParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Publish to channel {channel}: {params:?}");

    send(&app_state, &channel, params).await
}

/// POST publish a message to every subscriber of every channel
pub async fn publish_all(
    State(app_state): State<AppState>,
    Json(params): Json<PublishParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Publish to all channels: {params:?}");

    send(&app_state, "", params).await
}

async fn send(
    app_state: &AppState,
    channel: &str,
    params: PublishParams,
) -> Result<impl IntoResponse, Error> {
    let sse_server = app_state.sse_server_ref();
    if sse_server.is_shutdown() {
        return Err(ErrorKind::ServerClosed.into());
    }

    let deliveries = sse_server.publish(channel, params.into_message()).await;
    debug!("Message delivered to {deliveries} client(s)");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            PublishResponse { deliveries },
        )),
    ))
}
