use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

lazy_static! {
    pub static ref SFU_ACTIVE_ROOMS: IntGauge =
        register_int_gauge!("sfu_active_rooms", "Number of rooms ever referenced").unwrap();
    pub static ref SFU_ACTIVE_SESSIONS: IntGauge =
        register_int_gauge!("sfu_active_sessions", "Number of currently connected participants")
            .unwrap();
    pub static ref SFU_PACKETS_FORWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sfu_packets_forwarded_total",
        "Total number of RTP packets forwarded",
        &["kind"] // "video" or "audio"
    )
    .unwrap();
    pub static ref SFU_KEYFRAMES_REQUESTED_TOTAL: IntCounter = register_int_counter!(
        "sfu_keyframes_requested_total",
        "Total number of PLIs (keyframe requests) sent to ingress tracks"
    )
    .unwrap();
    pub static ref SFU_RENEGOTIATION_PASSES_TOTAL: IntCounter = register_int_counter!(
        "sfu_renegotiation_passes_total",
        "Total number of room reconciliation passes"
    )
    .unwrap();
}

pub fn register_metrics() {
    // Force initialization of lazy_statics
    let _ = SFU_ACTIVE_ROOMS.get();
    let _ = SFU_ACTIVE_SESSIONS.get();
    let _ = SFU_PACKETS_FORWARDED_TOTAL
        .with_label_values(&["video"])
        .get();
    let _ = SFU_KEYFRAMES_REQUESTED_TOTAL.get();
    let _ = SFU_RENEGOTIATION_PASSES_TOTAL.get();
}
