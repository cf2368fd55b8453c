use crate::controller::ApiResponse;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ChannelSummary {
    name: String,
    clients: usize,
    last_event_id: String,
}

/// GET all channels with their current subscriber counts
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    let sse_server = app_state.sse_server_ref();

    let mut channels = Vec::new();
    for name in sse_server.channels() {
        // The channel may have been closed since the names were listed.
        if let Some(channel) = sse_server.channel(&name) {
            channels.push(ChannelSummary {
                name,
                clients: channel.client_count().await,
                last_event_id: channel.last_event_id(),
            });
        }
    }

    Json(ApiResponse::new(StatusCode::OK.into(), channels))
}
