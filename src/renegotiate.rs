use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_local::TrackLocal;

use crate::id_types::TrackId;
use crate::metrics::{SFU_ACTIVE_SESSIONS, SFU_RENEGOTIATION_PASSES_TOTAL};
use crate::room::Room;
use crate::sfu::Sfu;
use crate::signaling::{SignalEvent, SignalingMessage};

/// How many reconciliation passes to run inline before yielding.
const MAX_SYNC_ATTEMPTS: usize = 25;

/// How long to back off before re-entering reconciliation once the inline
/// attempts are exhausted.
const SYNC_RETRY_DELAY: Duration = Duration::from_secs(3);

impl Sfu {
    /// Bring every session in `room` into agreement with the room's track
    /// set and send each one a fresh offer.
    ///
    /// A single pass can be invalidated mid-sweep: a peer connection turns
    /// up closed, a sender mutation is rejected by a transient signaling
    /// state, an offer fails to build. Those all read as "try again", and
    /// the loop here retries the whole pass up to [`MAX_SYNC_ATTEMPTS`]
    /// times. If the room is still dirty after that, a deferred task
    /// re-enters after [`SYNC_RETRY_DELAY`] so ICE and signaling state can
    /// settle without starving the rest of the process.
    ///
    /// Renegotiation cannot overlap itself on one peer connection; passes
    /// for a room are serialized by the room's writer lock.
    pub async fn signal_peer_connections(&self, room: &Arc<Room>) {
        for attempt in 0..=MAX_SYNC_ATTEMPTS {
            if attempt == MAX_SYNC_ATTEMPTS {
                warn!(
                    room = %room.id,
                    attempts = MAX_SYNC_ATTEMPTS,
                    "reconciliation did not settle, deferring retry"
                );
                defer_renegotiation(self.clone(), room.clone());
                break;
            }

            if !self.attempt_sync(room).await {
                break;
            }
        }

        // Freshly attached senders show nothing until the next keyframe.
        self.dispatch_key_frame().await;
    }

    /// One reconciliation sweep over the room. Returns `true` when the pass
    /// must be retried.
    async fn attempt_sync(&self, room: &Arc<Room>) -> bool {
        SFU_RENEGOTIATION_PASSES_TOTAL.inc();
        let mut state = room.state.lock().await;

        let mut i = 0;
        while i < state.sessions.len() {
            let session = state.sessions[i].clone();

            // A closed session invalidates the index walk; drop it and
            // restart the whole pass.
            if session.pc.connection_state() == RTCPeerConnectionState::Closed {
                info!(room = %room.id, session = %session.id, "pruning closed session");
                state.sessions.remove(i);
                SFU_ACTIVE_SESSIONS.dec();
                return true;
            }

            // Map of sender ids this session already carries. Senders whose
            // track left the room are detached.
            let mut existing: HashSet<TrackId> = HashSet::new();
            for sender in session.pc.get_senders().await {
                let Some(track) = sender.track().await else {
                    continue;
                };
                let track_id = TrackId::from(track.id());
                existing.insert(track_id.clone());

                if !state.track_locals.contains_key(&track_id) {
                    if session.pc.remove_track(&sender).await.is_err() {
                        return true;
                    }
                    debug!(room = %room.id, session = %session.id, track = %track_id, "sender detached");
                }
            }

            // The session's own uplinks surface as its receivers; counting
            // them as existing keeps a participant from being offered its
            // own media back.
            for receiver in session.pc.get_receivers().await {
                if let Some(track) = receiver.track().await {
                    existing.insert(TrackId::from(track.id().as_str()));
                }
            }

            // Attach whatever the room carries that this session lacks.
            for (track_id, local) in state.track_locals.iter() {
                if existing.contains(track_id) {
                    continue;
                }
                if session
                    .pc
                    .add_track(Arc::clone(local) as Arc<dyn TrackLocal + Send + Sync>)
                    .await
                    .is_err()
                {
                    return true;
                }
                debug!(room = %room.id, session = %session.id, track = %track_id, "sender attached");
            }

            // Unconditionally re-offer, whether or not the sender set moved.
            let offer = match session.pc.create_offer(None).await {
                Ok(offer) => offer,
                Err(_) => return true,
            };
            if session.pc.set_local_description(offer.clone()).await.is_err() {
                return true;
            }
            let data = match serde_json::to_string(&offer) {
                Ok(data) => data,
                Err(_) => return true,
            };
            let message = SignalingMessage {
                event: SignalEvent::Offer,
                data,
                room_id: room.id.to_string(),
            };
            if session.signal.send_json(&message).await.is_err() {
                return true;
            }
            debug!(room = %room.id, session = %session.id, "offer sent");

            i += 1;
        }

        false
    }
}

/// Re-enter reconciliation for `room` after the back-off delay.
fn defer_renegotiation(sfu: Sfu, room: Arc<Room>) {
    tokio::spawn(async move {
        time::sleep(SYNC_RETRY_DELAY).await;
        sfu.signal_peer_connections(&room).await;
    });
}
