use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use crate::id_types::{RoomId, TrackId};
use crate::metrics::SFU_ACTIVE_SESSIONS;
use crate::signaling::SignalWriter;

/// One connected participant as seen by the room: its peer connection plus
/// the write half of its signaling channel. The `id` exists only for logs.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub pc: Arc<RTCPeerConnection>,
    pub signal: Arc<dyn SignalWriter>,
}

/// Everything the reconciler sweeps, behind the room's single writer lock.
pub(crate) struct RoomState {
    /// Live sessions, in join order. Pruned by the reconciler when a peer
    /// connection reaches `Closed`.
    pub sessions: Vec<SessionHandle>,
    /// The forwarded tracks of this room, keyed by ingress track id. Every
    /// session is expected to hold one sender per entry, minus its own
    /// uplinks.
    pub track_locals: HashMap<TrackId, Arc<TrackLocalStaticRTP>>,
}

/// A conference room. Created lazily on first join and kept for the life of
/// the process.
pub struct Room {
    pub id: RoomId,
    pub(crate) state: Mutex<RoomState>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Room {
            id,
            state: Mutex::new(RoomState {
                sessions: Vec::new(),
                track_locals: HashMap::new(),
            }),
        }
    }

    /// Append a session. Callers must follow up with a renegotiation pass so
    /// the newcomer receives the room's current track set.
    pub async fn insert_session(&self, session: SessionHandle) {
        let mut state = self.state.lock().await;
        state.sessions.push(session);
        SFU_ACTIVE_SESSIONS.inc();
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn track_count(&self) -> usize {
        self.state.lock().await.track_locals.len()
    }
}
