// ---------------------------------------------------------------------------
// Packet builders
// ---------------------------------------------------------------------------

use std::fs::File;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use etherparse::PacketBuilder;

use crate::models::{IpLayer, Packet, TcpFlags, TcpLayer};

pub const CLIENT: [u8; 4] = [10, 0, 0, 2];
pub const SERVER: [u8; 4] = [10, 0, 0, 1];
pub const CLIENT_PORT: u16 = 51000;
pub const SERVER_PORT: u16 = 80;

/// Ethernet + IPv4 + TCP header bytes, no options.
pub const HEADER_LEN: u32 = 54;

pub fn tcp_packet(
    ts: f64,
    src: [u8; 4],
    src_port: u16,
    dst: [u8; 4],
    dst_port: u16,
    flags: u8,
    length: u32,
) -> Packet {
    Packet {
        timestamp: Some(ts),
        length,
        ip: Some(IpLayer {
            src: IpAddr::V4(Ipv4Addr::from(src)),
            dst: IpAddr::V4(Ipv4Addr::from(dst)),
        }),
        tcp: Some(TcpLayer {
            src_port,
            dst_port,
            flags: TcpFlags(flags),
        }),
        tls: false,
    }
}

pub fn client_pkt(ts: f64, flags: u8, length: u32) -> Packet {
    tcp_packet(ts, CLIENT, CLIENT_PORT, SERVER, SERVER_PORT, flags, length)
}

pub fn server_pkt(ts: f64, flags: u8, length: u32) -> Packet {
    tcp_packet(ts, SERVER, SERVER_PORT, CLIENT, CLIENT_PORT, flags, length)
}

pub fn tls_pkt(ts: f64, length: u32) -> Packet {
    let mut pkt = client_pkt(ts, TcpFlags::PSH | TcpFlags::ACK, length);
    pkt.tls = true;
    pkt
}

/// SYN, SYN-ACK, ACK starting at `t0`, 10 ms apart, 60-byte frames.
pub fn handshake(t0: f64) -> Vec<Packet> {
    vec![
        client_pkt(t0, TcpFlags::SYN, 60),
        server_pkt(t0 + 0.01, TcpFlags::SYN | TcpFlags::ACK, 60),
        client_pkt(t0 + 0.02, TcpFlags::ACK, 60),
    ]
}

// ---------------------------------------------------------------------------
// Synthetic legacy pcap files
// ---------------------------------------------------------------------------

pub struct FrameSpec {
    pub ts: f64,
    pub src: [u8; 4],
    pub src_port: u16,
    pub dst: [u8; 4],
    pub dst_port: u16,
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl FrameSpec {
    pub fn client(ts: f64, flags: u8, payload: Vec<u8>) -> Self {
        Self { ts, src: CLIENT, src_port: CLIENT_PORT, dst: SERVER, dst_port: SERVER_PORT, flags, payload }
    }

    pub fn server(ts: f64, flags: u8, payload: Vec<u8>) -> Self {
        Self { ts, src: SERVER, src_port: SERVER_PORT, dst: CLIENT, dst_port: CLIENT_PORT, flags, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 2], [2, 0, 0, 0, 0, 1])
            .ipv4(self.src, self.dst, 64)
            .tcp(self.src_port, self.dst_port, 1000, 64240);
        if self.flags & TcpFlags::SYN != 0 {
            builder = builder.syn();
        }
        if self.flags & TcpFlags::ACK != 0 {
            builder = builder.ack(1);
        }
        if self.flags & TcpFlags::PSH != 0 {
            builder = builder.psh();
        }
        if self.flags & TcpFlags::FIN != 0 {
            builder = builder.fin();
        }
        let mut out = Vec::with_capacity(builder.size(self.payload.len()));
        builder.write(&mut out, &self.payload).unwrap();
        out
    }
}

/// Payload that pads a frame to `frame_len` bytes on the wire.
pub fn padding(frame_len: u32) -> Vec<u8> {
    vec![b'a'; frame_len.saturating_sub(HEADER_LEN) as usize]
}

/// A TLS 1.2 application-data record header followed by filler.
pub fn tls_record(len: usize) -> Vec<u8> {
    let body = len.saturating_sub(5);
    let mut out = vec![0x17, 0x03, 0x03, (body >> 8) as u8, body as u8];
    out.resize(len, 0x42);
    out
}

/// One captured record: `data` is what was kept, `origlen` the wire length.
pub struct RawRecord {
    pub ts: f64,
    pub data: Vec<u8>,
    pub origlen: u32,
}

impl RawRecord {
    pub fn whole(ts: f64, data: Vec<u8>) -> Self {
        let origlen = data.len() as u32;
        Self { ts, data, origlen }
    }

    /// Keeps only the first `snaplen` bytes, as a capture with a snap length would.
    pub fn snapped(ts: f64, mut data: Vec<u8>, snaplen: usize) -> Self {
        let origlen = data.len() as u32;
        data.truncate(snaplen);
        Self { ts, data, origlen }
    }
}

/// Legacy little-endian pcap; `nanos` selects the nanosecond magic.
pub fn write_legacy(path: &Path, linktype: u32, nanos: bool, records: &[RawRecord]) {
    let magic: u32 = if nanos { 0xa1b23c4d } else { 0xa1b2c3d4 };
    let unit = if nanos { 1e9 } else { 1e6 };

    let mut out = Vec::new();
    // magic, v2.4, thiszone, sigfigs, snaplen, linktype
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&linktype.to_le_bytes());

    for rec in records {
        let secs = rec.ts.trunc() as u32;
        let frac = ((rec.ts.fract() * unit).round() as u32).min(unit as u32 - 1);
        out.extend_from_slice(&secs.to_le_bytes());
        out.extend_from_slice(&frac.to_le_bytes());
        out.extend_from_slice(&(rec.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&rec.origlen.to_le_bytes());
        out.extend_from_slice(&rec.data);
    }
    File::create(path).unwrap().write_all(&out).unwrap();
}

pub fn write_pcap(path: &Path, frames: &[FrameSpec]) {
    let records: Vec<RawRecord> = frames
        .iter()
        .map(|f| RawRecord::whole(f.ts, f.encode()))
        .collect();
    write_legacy(path, 1, false, &records);
}

// ---------------------------------------------------------------------------
// Synthetic pcapng files (little-endian)
// ---------------------------------------------------------------------------

fn ng_block(out: &mut Vec<u8>, block_type: u32, body: &[u8]) {
    let padded = (body.len() + 3) & !3;
    let total = (12 + padded) as u32;
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(body);
    out.resize(out.len() + padded - body.len(), 0);
    out.extend_from_slice(&total.to_le_bytes());
}

pub fn ng_section_header(out: &mut Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1a2b3c4du32.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&(-1i64).to_le_bytes());
    ng_block(out, 0x0a0d0d0a, &body);
}

/// Interface description; `tsresol` is the raw `if_tsresol` option byte.
pub fn ng_interface(out: &mut Vec<u8>, linktype: u16, tsresol: Option<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(&linktype.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&65535u32.to_le_bytes());
    if let Some(res) = tsresol {
        // if_tsresol, then opt_endofopt
        body.extend_from_slice(&9u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&[res, 0, 0, 0]);
        body.extend_from_slice(&[0, 0, 0, 0]);
    }
    ng_block(out, 1, &body);
}

/// Enhanced packet block with a raw timestamp in interface units.
pub fn ng_enhanced(out: &mut Vec<u8>, if_id: u32, ts_units: u64, data: &[u8], origlen: u32) {
    let mut body = Vec::new();
    body.extend_from_slice(&if_id.to_le_bytes());
    body.extend_from_slice(&((ts_units >> 32) as u32).to_le_bytes());
    body.extend_from_slice(&(ts_units as u32).to_le_bytes());
    body.extend_from_slice(&(data.len() as u32).to_le_bytes());
    body.extend_from_slice(&origlen.to_le_bytes());
    body.extend_from_slice(data);
    ng_block(out, 6, &body);
}

pub fn ng_simple(out: &mut Vec<u8>, data: &[u8]) {
    let mut body = Vec::new();
    body.extend_from_slice(&(data.len() as u32).to_le_bytes());
    body.extend_from_slice(data);
    ng_block(out, 3, &body);
}

/// Handshake followed by `sizes.len()` client data frames one second apart.
pub fn plaintext_session(t0: f64, sizes: &[u32]) -> Vec<FrameSpec> {
    let mut frames = vec![
        FrameSpec::client(t0, TcpFlags::SYN, Vec::new()),
        FrameSpec::server(t0 + 0.01, TcpFlags::SYN | TcpFlags::ACK, Vec::new()),
        FrameSpec::client(t0 + 0.02, TcpFlags::ACK, Vec::new()),
    ];
    for (i, &size) in sizes.iter().enumerate() {
        frames.push(FrameSpec::client(
            t0 + 1.0 + i as f64,
            TcpFlags::PSH | TcpFlags::ACK,
            padding(size),
        ));
    }
    frames
}
