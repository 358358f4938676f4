use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::id_types::{RoomId, TrackId};
use crate::metrics::SFU_ACTIVE_ROOMS;
use crate::room::Room;

/// Process-wide SFU state: the room registry.
///
/// Cloning is cheap; every session task, callback, and the keyframe ticker
/// hold their own copy. The registry itself is lock-free to read, and each
/// room carries its own writer lock, so reconciling one room never stalls
/// another.
#[derive(Clone, Default)]
pub struct Sfu {
    pub(crate) rooms: Arc<DashMap<RoomId, Arc<Room>>>,
}

impl Sfu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `room_id`, installing a fresh empty one on first
    /// reference. Concurrent callers always observe the same instance.
    pub fn get_or_create_room(&self, room_id: &RoomId) -> Arc<Room> {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                SFU_ACTIVE_ROOMS.inc();
                info!(room = %room_id, "room created");
                Arc::new(Room::new(room_id.clone()))
            })
            .clone()
    }

    /// Start forwarding an ingress track: build a local track mirroring the
    /// remote's codec, id and stream id, publish it in the room, then bring
    /// every session up to date.
    pub async fn add_track(
        &self,
        room: &Arc<Room>,
        remote: &TrackRemote,
    ) -> Arc<TrackLocalStaticRTP> {
        let local = Arc::new(TrackLocalStaticRTP::new(
            remote.codec().capability.clone(),
            remote.id(),
            remote.stream_id(),
        ));

        {
            let mut state = room.state.lock().await;
            state
                .track_locals
                .insert(TrackId::from(local.id()), local.clone());
        }

        info!(room = %room.id, track = %local.id(), "forwarding track");
        self.signal_peer_connections(room).await;
        local
    }

    /// Withdraw a forwarded track and reconcile; every other session drops
    /// its sender on the next pass.
    pub async fn remove_track(&self, room: &Arc<Room>, track_id: &str) {
        let removed = {
            let mut state = room.state.lock().await;
            state.track_locals.remove(&TrackId::from(track_id)).is_some()
        };

        if removed {
            info!(room = %room.id, track = %track_id, "track withdrawn");
        }
        self.signal_peer_connections(room).await;
    }
}
