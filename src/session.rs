use std::sync::Arc;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;

use crate::forwarder;
use crate::id_types::RoomId;
use crate::media;
use crate::room::{Room, SessionHandle};
use crate::sfu::Sfu;
use crate::signaling::{SignalEvent, SignalWriter, SignalingMessage, SocketWriter};

/// `GET /websocket/{room_id}`: upgrade the request and run the session
/// until its channel or peer connection dies.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(sfu): State<Sfu>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, RoomId::from(room_id), sfu))
}

async fn handle_socket(socket: WebSocket, room_id: RoomId, sfu: Sfu) {
    let session_id = Uuid::new_v4();
    let (sink, stream) = socket.split();
    let signal: Arc<dyn SignalWriter> = Arc::new(SocketWriter::new(sink));

    match run_session(&sfu, &room_id, session_id, signal, stream).await {
        Ok(()) => info!(session = %session_id, room = %room_id, "session closed"),
        Err(err) => {
            info!(session = %session_id, room = %room_id, error = %err, "session terminated")
        }
    }
}

/// Create the participant's peer connection and hand it to [`drive_session`].
/// The peer connection is closed on every exit path past its creation;
/// dropping the socket halves closes the signaling channel, and the
/// reconciler prunes the session afterwards.
async fn run_session(
    sfu: &Sfu,
    room_id: &RoomId,
    session_id: Uuid,
    signal: Arc<dyn SignalWriter>,
    mut inbound: SplitStream<WebSocket>,
) -> Result<()> {
    let room = sfu.get_or_create_room(room_id);

    let api = media::build_api()?;
    let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);

    let result = drive_session(sfu, &room, session_id, signal, &mut inbound, &pc).await;

    if let Err(err) = pc.close().await {
        warn!(session = %session_id, error = %err, "failed to close peer connection");
    }
    result
}

/// Wire up the peer connection, register the session with its room, offer,
/// then drain inbound signaling until the channel ends.
async fn drive_session(
    sfu: &Sfu,
    room: &Arc<Room>,
    session_id: Uuid,
    signal: Arc<dyn SignalWriter>,
    inbound: &mut SplitStream<WebSocket>,
    pc: &Arc<RTCPeerConnection>,
) -> Result<()> {
    // Receive-only: participants publish to us, forwarding happens via
    // senders the reconciler attaches later.
    for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
        pc.add_transceiver_from_kind(
            kind,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await?;
    }

    register_ice_candidate_handler(pc, signal.clone(), room.id.clone());
    register_connection_state_handler(pc, sfu.clone(), room.clone(), session_id);
    register_track_handler(pc, sfu.clone(), room.clone(), session_id);

    room.insert_session(SessionHandle {
        id: session_id,
        pc: pc.clone(),
        signal,
    })
    .await;
    info!(session = %session_id, room = %room.id, "participant joined");

    // Offer straight away, before any answer exists; the newcomer needs the
    // room's current track set.
    sfu.signal_peer_connections(room).await;

    read_signaling(pc, inbound, session_id).await
}

/// Inbound half of the signaling channel: decode each text frame and apply
/// it to the peer connection. Any malformed or unappliable frame terminates
/// the session; unknown events are ignored.
async fn read_signaling(
    pc: &Arc<RTCPeerConnection>,
    inbound: &mut SplitStream<WebSocket>,
    session_id: Uuid,
) -> Result<()> {
    while let Some(frame) = inbound.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(()),
            _ => continue,
        };

        let message: SignalingMessage = serde_json::from_str(&text)?;
        match message.event {
            SignalEvent::Candidate => {
                let candidate: RTCIceCandidateInit = serde_json::from_str(&message.data)?;
                pc.add_ice_candidate(candidate).await?;
            }
            SignalEvent::Answer => {
                let answer: RTCSessionDescription = serde_json::from_str(&message.data)?;
                pc.set_remote_description(answer).await?;
            }
            SignalEvent::Offer | SignalEvent::Unknown => {
                debug!(session = %session_id, "ignoring unhandled signaling event");
            }
        }
    }
    Ok(())
}

/// Forward every locally gathered ICE candidate to the participant.
fn register_ice_candidate_handler(
    pc: &Arc<RTCPeerConnection>,
    signal: Arc<dyn SignalWriter>,
    room_id: RoomId,
) {
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let signal = signal.clone();
        let room_id = room_id.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else {
                return;
            };
            let init = match candidate.to_json() {
                Ok(init) => init,
                Err(err) => {
                    error!(error = %err, "failed to convert ICE candidate");
                    return;
                }
            };
            let data = match serde_json::to_string(&init) {
                Ok(data) => data,
                Err(err) => {
                    error!(error = %err, "failed to encode ICE candidate");
                    return;
                }
            };
            let message = SignalingMessage {
                event: SignalEvent::Candidate,
                data,
                room_id: room_id.to_string(),
            };
            if let Err(err) = signal.send_json(&message).await {
                warn!(room = %room_id, error = %err, "failed to deliver ICE candidate");
            }
        })
    }));
}

/// `Failed` gets the connection closed; `Closed` gets the session pruned on
/// the renegotiation pass this triggers. Invoked from library tasks, never
/// while the room lock is held.
fn register_connection_state_handler(
    pc: &Arc<RTCPeerConnection>,
    sfu: Sfu,
    room: Arc<Room>,
    session_id: Uuid,
) {
    let weak_pc = Arc::downgrade(pc);
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let weak_pc = weak_pc.clone();
        let sfu = sfu.clone();
        let room = room.clone();
        Box::pin(async move {
            info!(session = %session_id, state = %state, "peer connection state changed");
            match state {
                RTCPeerConnectionState::Failed => {
                    if let Some(pc) = weak_pc.upgrade() {
                        if let Err(err) = pc.close().await {
                            warn!(session = %session_id, error = %err, "failed to close peer connection");
                        }
                    }
                }
                RTCPeerConnectionState::Closed => {
                    sfu.signal_peer_connections(&room).await;
                }
                _ => {}
            }
        })
    }));
}

/// Publish each inbound track to the room and pump its packets until the
/// uplink ends, then withdraw the track. Withdrawal runs on every exit path
/// of the copy task.
fn register_track_handler(pc: &Arc<RTCPeerConnection>, sfu: Sfu, room: Arc<Room>, session_id: Uuid) {
    pc.on_track(Box::new(move |remote, _receiver, _transceiver| {
        let sfu = sfu.clone();
        let room = room.clone();
        Box::pin(async move {
            let kind = remote.kind().to_string();
            info!(session = %session_id, kind = %kind, track = %remote.id(), "ingress track started");

            let local = sfu.add_track(&room, &remote).await;
            tokio::spawn(async move {
                let forwarded = forwarder::copy_rtp(remote.as_ref(), &local, &kind).await;
                debug!(session = %session_id, track = %local.id(), packets = forwarded, "ingress track ended");
                sfu.remove_track(&room, local.id()).await;
            });
        })
    }));
}
