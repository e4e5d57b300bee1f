use crate::flow::{packet_ts, Flow};
use crate::models::{FlowKey, Layer, Packet};

/// Contiguous slice of a flow's packets.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub key: FlowKey,
    /// Position of this window within its flow, counting dropped windows.
    pub index: usize,
    pub packets: &'a [Packet],
}

impl<'a> Window<'a> {
    pub fn start(&self) -> f64 {
        self.packets.first().map_or(0.0, packet_ts)
    }

    pub fn end(&self) -> f64 {
        self.packets.last().map_or(0.0, packet_ts)
    }

    pub fn has_tls(&self) -> bool {
        self.packets.iter().any(|p| p.has_layer(Layer::Tls))
    }
}

/// Splits `packets` into windows spanning at most `window_secs`, each
/// measured from its own first packet. The slices partition the input in
/// order; an empty input yields no windows.
pub fn split_into_windows(packets: &[Packet], window_secs: f64) -> Vec<&[Packet]> {
    let mut windows = Vec::new();
    let Some(first) = packets.first() else {
        return windows;
    };

    let mut start = 0;
    let mut window_start = packet_ts(first);
    for (i, pkt) in packets.iter().enumerate().skip(1) {
        let ts = packet_ts(pkt);
        if ts - window_start > window_secs {
            windows.push(&packets[start..i]);
            start = i;
            window_start = ts;
        }
    }
    windows.push(&packets[start..]);
    windows
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentParams {
    pub window_minutes: f64,
    pub long_flow_minutes: f64,
}

#[derive(Debug, Default)]
pub struct Segmentation<'a> {
    /// Windows left for the handshake/encryption filter.
    pub windows: Vec<Window<'a>>,
    /// Short-flow windows dropped because they carried TLS.
    pub encrypted_windows: usize,
    /// Long flow dropped whole because it carried TLS.
    pub discarded: bool,
}

/// Short flows are windowed and each TLS-bearing window dropped. Long flows
/// are kept whole unless any packet carries TLS, in which case nothing is kept.
pub fn segment_flow<'a>(flow: &'a Flow, params: &SegmentParams) -> Segmentation<'a> {
    let mut seg = Segmentation::default();

    if flow.duration_minutes() < params.long_flow_minutes {
        let slices = split_into_windows(&flow.packets, params.window_minutes * 60.0);
        for (index, packets) in slices.into_iter().enumerate() {
            let window = Window { key: flow.key, index, packets };
            if window.has_tls() {
                seg.encrypted_windows += 1;
            } else {
                seg.windows.push(window);
            }
        }
    } else if flow.has_tls() {
        seg.discarded = true;
    } else {
        seg.windows.push(Window {
            key: flow.key,
            index: 0,
            packets: &flow.packets,
        });
    }

    seg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowTable;
    use crate::models::TcpFlags;
    use crate::testutil::*;

    const DEFAULTS: SegmentParams = SegmentParams {
        window_minutes: 30.0,
        long_flow_minutes: 30.0,
    };

    fn at(times: &[f64]) -> Vec<Packet> {
        times
            .iter()
            .map(|&t| client_pkt(t, TcpFlags::ACK, 100))
            .collect()
    }

    fn flow_of(packets: Vec<Packet>) -> Flow {
        FlowTable::from_packets(packets).flows()[0].clone()
    }

    #[test]
    fn test_windows_partition_flow() {
        let packets = at(&[0.0, 1.0, 2.5, 4.0, 4.1, 9.0, 9.5, 20.0, 21.0, 21.0, 40.0]);
        for window in [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 100.0] {
            let windows = split_into_windows(&packets, window);
            let rejoined: Vec<Packet> = windows.iter().flat_map(|w| w.iter().copied()).collect();
            assert_eq!(rejoined, packets, "window size {}", window);
            assert!(windows.iter().all(|w| !w.is_empty()));
            for w in &windows {
                assert!(packet_ts(w.last().unwrap()) - packet_ts(&w[0]) <= window);
            }
        }
    }

    #[test]
    fn test_window_measured_from_own_start() {
        let packets = at(&[0.0, 5.0, 10.0, 11.0, 16.0, 21.0]);
        let windows = split_into_windows(&packets, 10.0);
        let lens: Vec<usize> = windows.iter().map(|w| w.len()).collect();
        // 0..=10 | 11..=21
        assert_eq!(lens, vec![3, 3]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let packets = at(&[0.0, 1800.0, 1800.5]);
        let windows = split_into_windows(&packets, 1800.0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_into_windows(&[], 60.0).is_empty());
    }

    #[test]
    fn test_short_flow_single_window() {
        let mut packets = handshake(0.0);
        packets.extend(at(&[60.0, 600.0]));
        let flow = flow_of(packets);
        let seg = segment_flow(&flow, &DEFAULTS);
        assert_eq!(seg.windows.len(), 1);
        assert_eq!(seg.windows[0].packets.len(), 5);
        assert!(!seg.discarded);
    }

    #[test]
    fn test_long_flow_with_tls_discarded() {
        let mut packets = handshake(0.0);
        packets.push(tls_pkt(300.0, 200));
        packets.extend(at(&[2400.0]));
        let flow = flow_of(packets);
        let seg = segment_flow(&flow, &DEFAULTS);
        assert!(seg.discarded);
        assert!(seg.windows.is_empty());
    }

    #[test]
    fn test_long_plaintext_flow_kept_whole() {
        let mut packets = handshake(0.0);
        packets.extend(at(&[1000.0, 2400.0, 4000.0]));
        let flow = flow_of(packets);
        let seg = segment_flow(&flow, &DEFAULTS);
        assert_eq!(seg.windows.len(), 1);
        assert_eq!(seg.windows[0].packets.len(), 6);
        assert_eq!(seg.windows[0].start(), 0.0);
        assert_eq!(seg.windows[0].end(), 4000.0);
    }

    #[test]
    fn test_short_flow_drops_tls_windows() {
        let params = SegmentParams {
            window_minutes: 10.0,
            long_flow_minutes: 30.0,
        };
        let mut packets = handshake(0.0);
        packets.extend(handshake(660.0));
        packets.push(tls_pkt(700.0, 200));
        packets.extend(handshake(1320.0));
        let flow = flow_of(packets);

        let seg = segment_flow(&flow, &params);
        assert_eq!(seg.encrypted_windows, 1);
        let indices: Vec<usize> = seg.windows.iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
