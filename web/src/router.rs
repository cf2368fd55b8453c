use crate::{
    controller::{channel_controller, health_check_controller, publish_controller},
    sse::handler::sse_handler,
    AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(event_routes(app_state.clone()))
        .merge(channel_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

// GET subscribes to a channel, POST publishes to it. POST without a channel
// publishes to every channel.
fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", post(publish_controller::publish_all))
        .route(
            "/events/{*channel}",
            get(sse_handler).post(publish_controller::publish),
        )
        .with_state(app_state)
}

fn channel_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/channels", get(channel_controller::index))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use futures_util::StreamExt;
    use service::config::Config;
    use sse::{Client, ClientEvents, Message, Options, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tower::ServiceExt;

    #[derive(Default)]
    struct CountingEvents {
        connected: AtomicUsize,
        disconnected: AtomicUsize,
    }

    impl ClientEvents for CountingEvents {
        fn on_connect(&self, _client: &Client) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_disconnect(&self, _client: &Client) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_app() -> (Router, Arc<Server>, Arc<CountingEvents>) {
        test_app_with(Options::default())
    }

    fn test_app_with(options: Options) -> (Router, Arc<Server>, Arc<CountingEvents>) {
        let events = Arc::new(CountingEvents::default());
        let server = Arc::new(Server::new(options.with_events(events.clone())));
        let app_state = AppState::with_server(Config::default(), &server);
        (define_routes(app_state), server, events)
    }

    async fn subscribe(app: &Router, uri: &str, last_event_id: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(id) = last_event_id {
            request = request.header("last-event-id", id);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(app: &Router, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn next_chunk(response: &mut axum::body::BodyDataStream) -> Bytes {
        timeout(Duration::from_secs(1), response.next())
            .await
            .expect("event did not arrive in time")
            .expect("stream ended")
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let mut body = response.into_body().into_data_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until(check: impl Fn() -> bool) {
        timeout(Duration::from_secs(1), async {
            while !check() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let (app, _server, _events) = test_app();

        let response = subscribe(&app, "/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_message() {
        let (app, server, events) = test_app();

        let response = subscribe(&app, "/events/news", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert_eq!(events.connected.load(Ordering::SeqCst), 1);

        let mut body = response.into_body().into_data_stream();
        let published = post_json(&app, "/events/news", r#"{"id":"5","data":"hello"}"#).await;
        assert_eq!(published.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(published).await["data"]["deliveries"], 1);

        let chunk = next_chunk(&mut body).await;
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("id:"), "missing id line in {text:?}");
        assert!(text.contains("hello"), "missing payload in {text:?}");

        let client = server.channel("news").unwrap().clients().await.remove(0);
        assert_eq!(client.last_event_id(), "5");
    }

    #[tokio::test]
    async fn test_event_is_framed_with_event_name_retry_and_one_data_line_per_payload_line() {
        let (app, server, _events) =
            test_app_with(Options::default().with_retry(Some(Duration::from_millis(1500))));
        let mut body = subscribe(&app, "/events/ticks", None)
            .await
            .into_body()
            .into_data_stream();

        let delivered = server
            .publish("ticks", Message::new("7", "a\r\nb").with_event("tick"))
            .await;
        assert_eq!(delivered, 1);

        let chunk = next_chunk(&mut body).await;
        assert_eq!(
            String::from_utf8_lossy(&chunk),
            "id: 7\ndata: a\ndata: b\nevent: tick\nretry: 1500\n\n"
        );
    }

    #[tokio::test]
    async fn test_last_event_id_header_is_kept() {
        let (app, server, _events) = test_app();

        let _response = subscribe(&app, "/events/news", Some("17")).await;

        let client = server.channel("news").unwrap().clients().await.remove(0);
        assert_eq!(client.last_event_id(), "17");
    }

    #[tokio::test]
    async fn test_closing_the_connection_unregisters_once() {
        let (app, server, events) = test_app();

        let response = subscribe(&app, "/events/asd", None).await;
        assert_eq!(events.connected.load(Ordering::SeqCst), 1);

        drop(response);
        wait_until(|| events.disconnected.load(Ordering::SeqCst) == 1).await;

        assert_eq!(server.channel("asd").unwrap().client_count().await, 0);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(events.disconnected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_all_reaches_every_channel() {
        let (app, server, _events) = test_app();
        let mut bodies = Vec::new();
        for uri in ["/events/CH-1", "/events/CH-2", "/events/CH-2"] {
            bodies.push(subscribe(&app, uri, None).await.into_body().into_data_stream());
        }

        let published = post_json(&app, "/events", r#"{"event":"notice","data":"hi"}"#).await;
        assert_eq!(json_body(published).await["data"]["deliveries"], 3);

        for body in &mut bodies {
            let chunk = next_chunk(body).await;
            assert!(String::from_utf8_lossy(&chunk).contains("notice"));
        }
        assert_eq!(server.client_count().await, 3);
    }

    #[tokio::test]
    async fn test_publish_to_unknown_channel_delivers_nothing() {
        let (app, server, _events) = test_app();

        let published = post_json(&app, "/events/nobody", r#"{"data":"x"}"#).await;

        assert_eq!(published.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(published).await["data"]["deliveries"], 0);
        assert!(!server.has_channel("nobody"));
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams_and_refuses_new_subscribers() {
        let (app, server, events) = test_app();
        let mut body = subscribe(&app, "/events/news", None)
            .await
            .into_body()
            .into_data_stream();

        server.shutdown().await;

        let ended = timeout(Duration::from_secs(1), body.next())
            .await
            .expect("stream should end after shutdown");
        assert!(ended.is_none());
        assert_eq!(events.disconnected.load(Ordering::SeqCst), 1);

        let response = subscribe(&app, "/events/news", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let published = post_json(&app, "/events/news", r#"{"data":"late"}"#).await;
        assert_eq!(published.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(server.publish("news", Message::simple("late")).await, 0);
    }

    #[tokio::test]
    async fn test_channels_lists_subscriber_counts() {
        let (app, server, _events) = test_app();
        server.add_channel("empty").unwrap();
        let _subscriber = subscribe(&app, "/events/busy", None).await;
        server.publish("busy", Message::new("3", "x")).await;

        let response = subscribe(&app, "/channels", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(
            body["data"],
            serde_json::json!([
                {"name": "busy", "clients": 1, "last_event_id": "3"},
                {"name": "empty", "clients": 0, "last_event_id": ""},
            ])
        );
    }
}
