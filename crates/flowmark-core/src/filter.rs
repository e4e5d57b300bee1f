use serde::Serialize;

use crate::models::{Layer, Packet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handshake {
    None,
    SynSeen,
    SynAckSeen,
    Established,
}

/// True once a pure SYN, a later pure SYN-ACK and a later pure ACK have been
/// seen in that order. Only the first handshake in the slice is tracked.
/// A SYN-ACK that arrives before any SYN is ignored.
pub fn handshake_completed(packets: &[Packet]) -> bool {
    let mut state = Handshake::None;

    for flags in packets.iter().filter_map(Packet::tcp_flags) {
        state = match state {
            Handshake::None if flags.is_syn_only() => Handshake::SynSeen,
            Handshake::SynSeen if flags.is_syn_ack() => Handshake::SynAckSeen,
            Handshake::SynAckSeen if flags.is_ack_only() => Handshake::Established,
            other => other,
        };
        if state == Handshake::Established {
            return true;
        }
    }
    false
}

pub fn is_encrypted(packets: &[Packet]) -> bool {
    packets.iter().any(|p| p.has_layer(Layer::Tls))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    NoHandshake,
    Encrypted,
}

pub fn admit(packets: &[Packet]) -> Admission {
    if !handshake_completed(packets) {
        Admission::NoHandshake
    } else if is_encrypted(packets) {
        Admission::Encrypted
    } else {
        Admission::Admitted
    }
}

/// Per-capture tally of what the segmenter and filter kept or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub flows: u64,
    pub flows_discarded_encrypted: u64,
    pub windows: u64,
    pub windows_encrypted: u64,
    pub windows_no_handshake: u64,
    pub windows_admitted: u64,
}

impl FilterStats {
    pub fn record(&mut self, admission: Admission) {
        self.windows += 1;
        match admission {
            Admission::Admitted => self.windows_admitted += 1,
            Admission::NoHandshake => self.windows_no_handshake += 1,
            Admission::Encrypted => self.windows_encrypted += 1,
        }
    }

    pub fn merge(&mut self, other: &FilterStats) {
        self.flows += other.flows;
        self.flows_discarded_encrypted += other.flows_discarded_encrypted;
        self.windows += other.windows;
        self.windows_encrypted += other.windows_encrypted;
        self.windows_no_handshake += other.windows_no_handshake;
        self.windows_admitted += other.windows_admitted;
    }
}
