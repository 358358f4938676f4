use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::debug;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;

use crate::metrics::SFU_KEYFRAMES_REQUESTED_TOTAL;
use crate::room::Room;
use crate::sfu::Sfu;

/// Wall-clock cadence of the PLI ticker.
pub const KEYFRAME_INTERVAL: Duration = Duration::from_secs(3);

impl Sfu {
    /// Ask every ingress track in every room for a fresh keyframe by writing
    /// an RTCP Picture Loss Indication against its SSRC. Best effort; write
    /// failures are swallowed.
    pub async fn dispatch_key_frame(&self) {
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|entry| entry.value().clone()).collect();

        for room in rooms {
            let state = room.state.lock().await;
            for session in &state.sessions {
                for receiver in session.pc.get_receivers().await {
                    let Some(track) = receiver.track().await else {
                        continue;
                    };
                    let pli = PictureLossIndication {
                        sender_ssrc: 0,
                        media_ssrc: track.ssrc(),
                    };
                    match session.pc.write_rtcp(&[Box::new(pli)]).await {
                        Ok(_) => SFU_KEYFRAMES_REQUESTED_TOTAL.inc(),
                        Err(err) => {
                            debug!(session = %session.id, error = %err, "PLI write failed");
                        }
                    }
                }
            }
        }
    }

    /// Spawn the process-wide ticker that requests keyframes every
    /// [`KEYFRAME_INTERVAL`], independent of renegotiation activity.
    pub fn spawn_keyframe_ticker(&self) {
        let sfu = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(KEYFRAME_INTERVAL);
            loop {
                ticker.tick().await;
                sfu.dispatch_key_frame().await;
            }
        });
    }
}
