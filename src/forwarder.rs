use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;
use webrtc::Error;

use crate::metrics::SFU_PACKETS_FORWARDED_TOTAL;

/// SRTP already frames packets; one read never exceeds the Ethernet MTU.
pub const RTP_MTU: usize = 1500;

/// Source of raw RTP chunks. `TrackRemote` is the production impl; the seam
/// exists so the copy loop can be exercised without a live peer connection.
#[async_trait]
pub trait RtpIngress: Send + Sync {
    async fn read_chunk(&self, buf: &mut [u8]) -> Result<usize>;
}

#[async_trait]
impl RtpIngress for TrackRemote {
    async fn read_chunk(&self, buf: &mut [u8]) -> Result<usize> {
        let (pkt, _) = self.read(buf).await?;
        let n = pkt.marshal_to(buf)?;
        Ok(n)
    }
}

/// Copy RTP from an ingress track to the room's shared local track until the
/// ingress ends. No buffering, no reordering; loss recovery is the job of
/// the PLI dispatcher upstream.
///
/// A closed-pipe write means one subscriber detached mid-write and must not
/// end the shared track. Returns the number of packets forwarded.
pub async fn copy_rtp(ingress: &dyn RtpIngress, egress: &TrackLocalStaticRTP, kind: &str) -> u64 {
    let mut buf = vec![0u8; RTP_MTU];
    let mut forwarded = 0u64;

    loop {
        let n = match ingress.read_chunk(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                debug!(track = %egress.id(), error = %err, "ingress read ended");
                break;
            }
        };

        match egress.write(&buf[..n]).await {
            Ok(_) => {
                forwarded += 1;
                SFU_PACKETS_FORWARDED_TOTAL.with_label_values(&[kind]).inc();
            }
            Err(err) if err == Error::ErrClosedPipe => continue,
            Err(err) => {
                debug!(track = %egress.id(), error = %err, "egress write failed");
                break;
            }
        }
    }

    forwarded
}
