use serde::Serialize;

use crate::flow::packet_ts;
use crate::models::Packet;

/// Scalar statistics over one admitted window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowStats {
    pub packet_count: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub avg_size: f64,
    pub duration_sec: f64,
    pub pps: f64,
}

impl WindowStats {
    pub fn from_packets(packets: &[Packet]) -> Self {
        if packets.is_empty() {
            return Self::default();
        }

        let sizes = packets.iter().map(|p| p.length as u64);
        let min_size = sizes.clone().min().unwrap_or(0);
        let max_size = sizes.clone().max().unwrap_or(0);
        let total: u64 = sizes.sum();

        let packet_count = packets.len() as u64;
        let duration_sec = match (packets.first(), packets.last()) {
            (Some(first), Some(last)) if packets.len() > 1 => packet_ts(last) - packet_ts(first),
            _ => 0.0,
        };
        let pps = if duration_sec > 0.0 {
            packet_count as f64 / duration_sec
        } else {
            0.0
        };

        Self {
            packet_count,
            min_size,
            max_size,
            avg_size: total as f64 / packet_count as f64,
            duration_sec,
            pps,
        }
    }
}
