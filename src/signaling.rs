use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One frame on a participant's signaling channel.
///
/// `data` is opaque to the transport: SDP JSON for `offer`/`answer`,
/// ICE candidate JSON for `candidate`. `room_id` is informational on
/// server-to-client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    pub event: SignalEvent,
    pub data: String,
    #[serde(rename = "roomId", default)]
    pub room_id: String,
}

/// The signaling events spoken on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalEvent {
    Offer,
    Answer,
    Candidate,
    /// Any event name we do not know; the session loop ignores these.
    #[serde(other)]
    Unknown,
}

/// Outbound half of a signaling channel.
///
/// Both the renegotiator and the ICE candidate callback write to the same
/// participant, from different tasks; implementations must serialize
/// concurrent `send_json` calls so frames never interleave.
#[async_trait]
pub trait SignalWriter: Send + Sync {
    async fn send_json(&self, message: &SignalingMessage) -> Result<()>;
}

/// Write half of a participant's WebSocket, safe under contention.
pub struct SocketWriter {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl SocketWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl SignalWriter for SocketWriter {
    async fn send_json(&self, message: &SignalingMessage) -> Result<()> {
        let frame = serde_json::to_string(message)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame.into())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let message = SignalingMessage {
            event: SignalEvent::Candidate,
            data: "{\"candidate\":\"foo\"}".to_string(),
            room_id: "room-1".to_string(),
        };

        let encoded = serde_json::to_string(&message).unwrap();
        assert!(encoded.contains("\"event\":\"candidate\""));
        assert!(encoded.contains("\"roomId\":\"room-1\""));

        let decoded: SignalingMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_unknown_event_is_tolerated() {
        let decoded: SignalingMessage =
            serde_json::from_str(r#"{"event":"ping","data":"","roomId":""}"#).unwrap();
        assert_eq!(decoded.event, SignalEvent::Unknown);
    }

    #[test]
    fn test_room_id_defaults_when_absent() {
        let decoded: SignalingMessage =
            serde_json::from_str(r#"{"event":"answer","data":"{}"}"#).unwrap();
        assert_eq!(decoded.event, SignalEvent::Answer);
        assert!(decoded.room_id.is_empty());
    }
}
