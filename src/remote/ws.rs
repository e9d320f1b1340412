//! Optional push channel: a WebSocket the server uses to notify the
//! agent of remote changes immediately instead of waiting for the next
//! `poll_changes` tick (spec.md §4.2). Purely an optimization — the
//! coordinator must work correctly with this channel absent or dropped.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::RemoteChange;
use crate::error::SyncError;

/// A live connection to the server's change-notification endpoint.
/// Reconnection and backoff are the caller's responsibility (the
/// coordinator treats a dropped `ChangeStream` the same as falling back
/// to polling).
pub struct ChangeStream {
	rx: mpsc::Receiver<RemoteChange>,
}

impl ChangeStream {
	/// Connects to `ws_url` and spawns a background task translating
	/// inbound text frames (one JSON `RemoteChange` per frame) into the
	/// returned channel. The task exits, closing the channel, on any
	/// socket error or a server-initiated close frame.
	pub async fn connect(ws_url: &str, auth_token: &str) -> Result<Self, SyncError> {
		let mut request = ws_url
			.into_client_request()
			.map_err(|e| SyncError::Configuration { message: format!("invalid websocket URL: {}", e) })?;
		let auth_value = HeaderValue::from_str(&format!("Bearer {}", auth_token))
			.map_err(|e| SyncError::Configuration { message: format!("invalid auth token: {}", e) })?;
		request.headers_mut().insert("Authorization", auth_value);

		let (stream, _response) = tokio_tungstenite::connect_async(request).await.map_err(|e| {
			SyncError::NetworkTransient { message: format!("websocket connect failed: {}", e), source: None }
		})?;

		let (mut write, mut read) = stream.split();
		let (tx, rx) = mpsc::channel(256);

		tokio::spawn(async move {
			while let Some(msg) = read.next().await {
				match msg {
					Ok(Message::Text(text)) => match serde_json::from_str::<RemoteChange>(&text) {
						Ok(change) => {
							if tx.send(change).await.is_err() {
								break;
							}
						}
						Err(_) => continue,
					},
					Ok(Message::Ping(payload)) => {
						if write.send(Message::Pong(payload)).await.is_err() {
							break;
						}
					}
					Ok(Message::Close(_)) | Err(_) => break,
					Ok(_) => continue,
				}
			}
		});

		Ok(ChangeStream { rx })
	}

	/// Awaits the next pushed change. Returns `None` once the
	/// connection has dropped and will never yield another value.
	pub async fn next_change(&mut self) -> Option<RemoteChange> {
		self.rx.recv().await
	}
}

use tokio_tungstenite::tungstenite::client::IntoClientRequest;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_change_roundtrips_through_json() {
		let change = RemoteChange { path: "a/b.txt".to_string(), version: 3, deleted: false };
		let encoded = serde_json::to_string(&change).unwrap();
		let decoded: RemoteChange = serde_json::from_str(&encoded).unwrap();
		assert_eq!(decoded.path, "a/b.txt");
		assert_eq!(decoded.version, 3);
	}
}

// vim: ts=4
