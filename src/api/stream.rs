use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::ApiState;

/// Streams supervisor events, one JSON object per SSE `data` line, with the
/// event kind as the SSE event name.
pub async fn sse_handler(State(state): State<ApiState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.supervisor.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_value(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Dropping unserializable event: {}", e);
                            continue;
                        }
                    };
                    let kind = json["event"].as_str().unwrap_or("message").to_string();
                    yield Ok(Event::default().event(kind).data(json.to_string()));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("Supervisor event channel closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10)).text("keep-alive"))
}
