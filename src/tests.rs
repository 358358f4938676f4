use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

use crate::id_types::{RoomId, TrackId};
use crate::media;
use crate::room::{Room, SessionHandle};
use crate::sfu::Sfu;
use crate::signaling::{SignalEvent, SignalWriter, SignalingMessage};

/// In-memory signaling writer that records everything sent to it.
#[derive(Default)]
pub(crate) struct CapturingWriter {
    pub sent: Mutex<Vec<SignalingMessage>>,
}

#[async_trait]
impl SignalWriter for CapturingWriter {
    async fn send_json(&self, message: &SignalingMessage) -> Result<()> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

impl CapturingWriter {
    pub(crate) async fn offer_count(&self) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.event == SignalEvent::Offer)
            .count()
    }
}

/// Join a room the way a real session does, minus the WebSocket: a fresh
/// peer connection with two receive-only transceivers and a capturing
/// signaling writer.
async fn join(room: &Arc<Room>) -> (Arc<RTCPeerConnection>, Arc<CapturingWriter>) {
    let api = media::build_api().unwrap();
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap(),
    );

    for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
        pc.add_transceiver_from_kind(
            kind,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .unwrap();
    }

    let writer = Arc::new(CapturingWriter::default());
    room.insert_session(SessionHandle {
        id: Uuid::new_v4(),
        pc: pc.clone(),
        signal: writer.clone(),
    })
    .await;
    (pc, writer)
}

/// Publish a synthetic VP8 track into the room's forwarded set, bypassing
/// the ingress path.
async fn publish_track(room: &Arc<Room>, track_id: &str) -> Arc<TrackLocalStaticRTP> {
    let local = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
        track_id.to_owned(),
        format!("stream-{}", track_id),
    ));
    let mut state = room.state.lock().await;
    state
        .track_locals
        .insert(TrackId::from(track_id), local.clone());
    local
}

async fn sender_track_ids(pc: &Arc<RTCPeerConnection>) -> Vec<String> {
    let mut ids = Vec::new();
    for sender in pc.get_senders().await {
        if let Some(track) = sender.track().await {
            ids.push(track.id().to_string());
        }
    }
    ids
}

#[tokio::test]
async fn test_registry_returns_one_instance_under_contention() {
    let sfu = Sfu::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sfu = sfu.clone();
        handles.push(tokio::spawn(async move {
            sfu.get_or_create_room(&RoomId::from("contended"))
        }));
    }

    let mut rooms = Vec::new();
    for handle in handles {
        rooms.push(handle.await.unwrap());
    }
    for room in &rooms[1..] {
        assert!(Arc::ptr_eq(&rooms[0], room));
    }
}

#[tokio::test]
async fn test_new_session_receives_unsolicited_offer() {
    let sfu = Sfu::new();
    let room = sfu.get_or_create_room(&RoomId::from("r-initial"));
    let (pc, writer) = join(&room).await;

    sfu.signal_peer_connections(&room).await;

    // The very first pass offers before any answer has ever been exchanged.
    let sent = writer.sent.lock().await;
    let offer = sent
        .iter()
        .find(|m| m.event == SignalEvent::Offer)
        .expect("no offer sent to new session");
    let decoded: serde_json::Value = serde_json::from_str(&offer.data).unwrap();
    assert_eq!(decoded["type"], "offer");
    assert!(decoded["sdp"].as_str().unwrap().contains("m="));
    drop(sent);

    assert!(pc.local_description().await.is_some());
}

#[tokio::test]
async fn test_closed_sessions_are_pruned() {
    let sfu = Sfu::new();
    let room = sfu.get_or_create_room(&RoomId::from("r-prune"));
    let (_pc_a, writer_a) = join(&room).await;
    let (pc_b, _writer_b) = join(&room).await;

    pc_b.close().await.unwrap();
    sfu.signal_peer_connections(&room).await;

    assert_eq!(room.session_count().await, 1);
    // The survivor was re-offered on the same reconciliation.
    assert!(writer_a.offer_count().await >= 1);
}

#[tokio::test]
async fn test_senders_follow_the_room_track_set() {
    let sfu = Sfu::new();
    let room = sfu.get_or_create_room(&RoomId::from("r-tracks"));
    let (pc, _writer) = join(&room).await;

    publish_track(&room, "cam-1").await;
    sfu.signal_peer_connections(&room).await;

    assert_eq!(sender_track_ids(&pc).await, vec!["cam-1".to_string()]);

    // Withdraw the track: the sender must be detached on the next pass.
    sfu.remove_track(&room, "cam-1").await;
    assert!(sender_track_ids(&pc).await.is_empty());
    assert_eq!(room.track_count().await, 0);
}

#[tokio::test]
async fn test_publish_storm_converges_to_full_fanout() {
    let sfu = Sfu::new();
    let room = sfu.get_or_create_room(&RoomId::from("r-storm"));

    let mut sessions = Vec::new();
    for _ in 0..10 {
        sessions.push(join(&room).await);
    }

    // Every participant publishes at once; each publication runs its own
    // reconciliation, all racing on the same room.
    let mut publishers = Vec::new();
    for i in 0..10 {
        let sfu = sfu.clone();
        let room = room.clone();
        publishers.push(tokio::spawn(async move {
            publish_track(&room, &format!("storm-{}", i)).await;
            sfu.signal_peer_connections(&room).await;
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    // Inline retries may spill into a deferred pass; poll until every
    // session carries one sender per published track.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(8);
    loop {
        let mut converged = true;
        for (pc, _) in &sessions {
            if sender_track_ids(pc).await.len() != 10 {
                converged = false;
                break;
            }
        }
        if converged {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sessions did not converge to the full sender set"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    for (_, writer) in &sessions {
        assert!(writer.offer_count().await >= 1);
    }
}

#[tokio::test]
async fn test_departure_cleans_up_for_the_remaining_sessions() {
    let sfu = Sfu::new();
    let room = sfu.get_or_create_room(&RoomId::from("r-depart"));
    let (pc_a, writer_a) = join(&room).await;
    let (pc_b, _writer_b) = join(&room).await;

    publish_track(&room, "cam-b").await;
    sfu.signal_peer_connections(&room).await;
    assert_eq!(sender_track_ids(&pc_a).await, vec!["cam-b".to_string()]);
    assert_eq!(sender_track_ids(&pc_b).await, vec!["cam-b".to_string()]);

    // The publisher leaves: its session is pruned, and once its track is
    // withdrawn the survivor drops the matching sender.
    pc_b.close().await.unwrap();
    sfu.remove_track(&room, "cam-b").await;

    assert_eq!(room.session_count().await, 1);
    assert!(sender_track_ids(&pc_a).await.is_empty());
    assert!(writer_a.offer_count().await >= 2);
}
