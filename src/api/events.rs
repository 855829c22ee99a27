//! Push channels for change notifications.
//!
//! Both channels carry the same JSON encoding of [`Notification`]. A client
//! that falls behind skips the dropped events and is expected to refetch.

use std::convert::Infallible;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::AppState;
use crate::models::Notification;
use crate::notify::{Delivery, Subscription};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub project_id: Option<i64>,
}

fn subscribe(state: &AppState, query: &EventsQuery) -> Subscription {
    match query.project_id {
        Some(id) => state.bus().subscribe_project(id),
        None => state.bus().subscribe(),
    }
}

/// Next notification, or `None` once the bus is gone.
async fn next_notification(subscription: &mut Subscription) -> Option<Notification> {
    loop {
        match subscription.recv().await? {
            Delivery::Notification(notification) => return Some(notification),
            Delivery::Lagged(missed) => {
                tracing::warn!(missed, project_id = ?subscription.project_id(), "subscriber lagged");
            }
        }
    }
}

/// Buffered notifications published after `last_event_id`, filtered like the live stream.
///
/// An id that is no longer buffered replays nothing; the client's refetch on
/// the next live event covers the gap.
async fn replay_after(state: &AppState, query: &EventsQuery, last_event_id: &str) -> Vec<Notification> {
    let history = state.bus().recent(usize::MAX).await;
    let Some(position) = history
        .iter()
        .position(|n| n.id.to_string() == last_event_id)
    else {
        return Vec::new();
    };
    history
        .into_iter()
        .skip(position + 1)
        .filter(|n| query.project_id.map_or(true, |id| n.project_id() == id))
        .collect()
}

fn to_event(notification: &Notification) -> Option<Event> {
    match Event::default()
        .event(notification.kind.as_str())
        .id(notification.id.to_string())
        .json_data(notification)
    {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode notification");
            None
        }
    }
}

pub async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the buffer so nothing falls in between.
    let subscription = subscribe(&state, &query);

    let last_event_id = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok());
    let replay = match last_event_id {
        Some(id) => replay_after(&state, &query, id).await,
        None => Vec::new(),
    };
    tracing::debug!(
        project_id = ?query.project_id,
        replayed = replay.len(),
        "sse subscriber connected"
    );

    let replayed = stream::iter(replay.iter().filter_map(to_event).map(Ok).collect::<Vec<_>>());
    let live = stream::unfold(subscription, |mut subscription| async move {
        loop {
            let notification = next_notification(&mut subscription).await?;
            if let Some(event) = to_event(&notification) {
                return Some((Ok(event), subscription));
            }
        }
    });

    Sse::new(replayed.chain(live)).keep_alive(KeepAlive::default())
}

pub async fn websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let subscription = subscribe(&state, &query);
    ws.on_upgrade(move |socket| forward_to_socket(socket, subscription))
}

async fn forward_to_socket(mut socket: WebSocket, mut subscription: Subscription) {
    tracing::debug!(project_id = ?subscription.project_id(), "websocket subscriber connected");
    loop {
        tokio::select! {
            notification = next_notification(&mut subscription) => {
                let Some(notification) = notification else { break };
                let text = match serde_json::to_string(&notification) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode notification");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                // Inbound frames carry nothing; pings are answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("websocket subscriber disconnected");
}
