use std::collections::HashMap;

use anyhow::Result;

use crate::models::{FlowKey, Layer, Packet};

/// Packets of one bidirectional TCP conversation, ascending by timestamp.
#[derive(Debug, Clone)]
pub struct Flow {
    pub key: FlowKey,
    pub packets: Vec<Packet>,
}

impl Flow {
    pub fn first_timestamp(&self) -> f64 {
        self.packets.first().map_or(0.0, packet_ts)
    }

    pub fn last_timestamp(&self) -> f64 {
        self.packets.last().map_or(0.0, packet_ts)
    }

    pub fn duration_minutes(&self) -> f64 {
        duration_minutes(&self.packets)
    }

    pub fn has_tls(&self) -> bool {
        self.packets.iter().any(|p| p.has_layer(Layer::Tls))
    }
}

/// Timestamp of a packet that made it into a flow. Flow membership requires
/// a timestamp, so the fallback is never observed.
pub(crate) fn packet_ts(pkt: &Packet) -> f64 {
    pkt.timestamp.unwrap_or(0.0)
}

/// Span between first and last packet in minutes; 0 for an empty slice.
pub fn duration_minutes(packets: &[Packet]) -> f64 {
    match (packets.first(), packets.last()) {
        (Some(first), Some(last)) => (packet_ts(last) - packet_ts(first)) / 60.0,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// FlowAssembler: groups packets by direction-normalized key
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FlowAssembler {
    index: HashMap<FlowKey, usize>,
    flows: Vec<Flow>,
    accepted: u64,
    skipped: u64,
}

impl FlowAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the packet to its flow. Packets without a timestamp or without
    /// IP+TCP layers are dropped and counted; returns whether it was kept.
    pub fn push(&mut self, pkt: Packet) -> bool {
        let key = match (pkt.timestamp, FlowKey::from_packet(&pkt)) {
            (Some(ts), Some(key)) if ts.is_finite() => key,
            _ => {
                self.skipped += 1;
                return false;
            }
        };

        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.flows.push(Flow { key, packets: Vec::new() });
                self.index.insert(key, self.flows.len() - 1);
                self.flows.len() - 1
            }
        };
        self.flows[slot].packets.push(pkt);
        self.accepted += 1;
        true
    }

    pub fn finalize(self) -> FlowTable {
        let mut flows = self.flows;
        for flow in &mut flows {
            // stable: packets sharing a timestamp keep their capture order
            flow.packets
                .sort_by(|a, b| packet_ts(a).total_cmp(&packet_ts(b)));
        }

        tracing::debug!(
            flows = flows.len(),
            packets = self.accepted,
            skipped = self.skipped,
            "flows assembled"
        );

        FlowTable {
            flows,
            packets: self.accepted,
            skipped: self.skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// FlowTable: finalized flows in first-seen order
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FlowTable {
    flows: Vec<Flow>,
    packets: u64,
    skipped: u64,
}

impl FlowTable {
    pub fn from_packets<I>(packets: I) -> Self
    where
        I: IntoIterator<Item = Packet>,
    {
        let mut assembler = FlowAssembler::new();
        for pkt in packets {
            assembler.push(pkt);
        }
        assembler.finalize()
    }

    /// Like [`FlowTable::from_packets`] but stops at the first source error.
    pub fn try_from_packets<I>(packets: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Packet>>,
    {
        let mut assembler = FlowAssembler::new();
        for pkt in packets {
            assembler.push(pkt?);
        }
        Ok(assembler.finalize())
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Packets assigned to some flow.
    pub fn packet_count(&self) -> u64 {
        self.packets
    }

    /// Packets dropped for a missing timestamp or missing IP/TCP layer.
    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }
}
