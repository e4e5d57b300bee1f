use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use etherparse::{LaxPacketHeaders, NetHeaders, TransportHeader};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::*;
use serde::Serialize;

use crate::models::{IpLayer, Packet, TcpFlags, TcpLayer};
use crate::tls;

const READ_BUFFER: usize = 256 * 1024;
const MICROS: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// CaptureReader: lazy, pull-based packet source over a pcap/pcapng file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Interface {
    linktype: Linktype,
    ts_resolution: u64,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            ts_resolution: MICROS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureStats {
    pub frames: u64,
    pub bytes: u64,
    /// Frames without a decodable IP header (ARP, unknown link types, garbage).
    pub undecoded: u64,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
}

impl CaptureStats {
    fn record(&mut self, pkt: &Packet) {
        self.frames += 1;
        self.bytes += pkt.length as u64;
        if pkt.ip.is_none() {
            self.undecoded += 1;
        }
        if let Some(ts) = pkt.timestamp {
            if self.first_timestamp.map_or(true, |first| ts < first) {
                self.first_timestamp = Some(ts);
            }
            if self.last_timestamp.map_or(true, |last| ts > last) {
                self.last_timestamp = Some(ts);
            }
        }
    }

    pub fn capture_start(&self) -> Option<DateTime<Utc>> {
        self.first_timestamp.and_then(to_datetime)
    }

    pub fn capture_end(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp.and_then(to_datetime)
    }
}

/// Streams decoded packets out of a capture file.
///
/// Yields `Err` once and then stops if the container is malformed. The file
/// handle is owned by the reader and closed when it is dropped.
pub struct CaptureReader {
    filename: String,
    reader: Box<dyn PcapReaderIterator>,
    interfaces: Vec<Interface>,
    stats: CaptureStats,
    stalled: bool,
    finished: bool,
}

impl CaptureReader {
    pub fn open(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let file = File::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let file_size = file
            .metadata()
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();

        let reader = create_reader(READ_BUFFER, file)
            .map_err(|e| anyhow!("{}: not a pcap or pcapng capture: {e}", filename))?;

        tracing::info!(file = %filename, size = file_size, "opened capture");

        Ok(Self {
            filename,
            reader,
            interfaces: vec![Interface::default()],
            stats: CaptureStats::default(),
            stalled: false,
            finished: false,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }
}

fn interface_at(interfaces: &[Interface], if_id: u32) -> Interface {
    interfaces.get(if_id as usize).copied().unwrap_or_default()
}

impl Iterator for CaptureReader {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Result<Packet>> {
        while !self.finished {
            let mut decoded = None;

            match self.reader.next() {
                Ok((consumed, block)) => {
                    self.stalled = false;
                    match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            let ts_resolution = if header.is_nanosecond_precision() {
                                1_000_000_000
                            } else {
                                MICROS
                            };
                            self.interfaces = vec![Interface {
                                linktype: header.network,
                                ts_resolution,
                            }];
                        }
                        PcapBlockOwned::Legacy(b) => {
                            let iface = interface_at(&self.interfaces, 0);
                            let ts = b.ts_sec as f64 + b.ts_usec as f64 / iface.ts_resolution as f64;
                            decoded = Some(decode_frame(iface.linktype, b.data, Some(ts), b.origlen));
                        }
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            self.interfaces.clear();
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                            let mut ts_resolution = MICROS;
                            for opt in &idb.options {
                                if opt.code == OptionCode::IfTsresol {
                                    if let Some(&val) = opt.value.first() {
                                        ts_resolution = if val & 0x80 != 0 {
                                            2u64.saturating_pow((val & 0x7f) as u32)
                                        } else {
                                            10u64.saturating_pow(val as u32)
                                        };
                                    }
                                }
                            }
                            self.interfaces.push(Interface {
                                linktype: idb.linktype,
                                ts_resolution: ts_resolution.max(1),
                            });
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            let iface = interface_at(&self.interfaces, epb.if_id);
                            let raw = ((epb.ts_high as u64) << 32) | (epb.ts_low as u64);
                            let secs = raw / iface.ts_resolution;
                            let frac = raw % iface.ts_resolution;
                            let ts = secs as f64 + frac as f64 / iface.ts_resolution as f64;
                            let len = (epb.caplen as usize).min(epb.data.len());
                            decoded = Some(decode_frame(iface.linktype, &epb.data[..len], Some(ts), epb.origlen));
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            // simple packet blocks carry no timestamp
                            let iface = interface_at(&self.interfaces, 0);
                            let len = (spb.origlen as usize).min(spb.data.len());
                            decoded = Some(decode_frame(iface.linktype, &spb.data[..len], None, spb.origlen));
                        }
                        _ => {}
                    }
                    self.reader.consume(consumed);
                }
                Err(PcapError::Eof) => {
                    self.finished = true;
                    tracing::debug!(
                        file = %self.filename,
                        frames = self.stats.frames,
                        bytes = self.stats.bytes,
                        "capture fully read"
                    );
                }
                Err(PcapError::UnexpectedEof) => {
                    tracing::warn!(
                        file = %self.filename,
                        frames = self.stats.frames,
                        "capture ends with a truncated block"
                    );
                    self.finished = true;
                }
                Err(PcapError::Incomplete(_)) => {
                    if self.stalled {
                        tracing::warn!(
                            file = %self.filename,
                            frames = self.stats.frames,
                            "capture ends with a truncated block"
                        );
                        self.finished = true;
                    } else {
                        self.stalled = true;
                        if let Err(e) = self.reader.refill() {
                            let err = anyhow!("{}: read failed: {e}", self.filename);
                            self.finished = true;
                            return Some(Err(err));
                        }
                    }
                }
                Err(e) => {
                    let err = anyhow!(
                        "{}: malformed capture block after {} frames: {e}",
                        self.filename,
                        self.stats.frames
                    );
                    self.finished = true;
                    return Some(Err(err));
                }
            }

            if let Some(pkt) = decoded {
                self.stats.record(&pkt);
                return Some(Ok(pkt));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

fn decode_frame(linktype: Linktype, data: &[u8], timestamp: Option<f64>, origlen: u32) -> Packet {
    let mut pkt = Packet {
        timestamp,
        length: origlen,
        ip: None,
        tcp: None,
        tls: false,
    };

    let headers = match parse_link_layer(linktype, data) {
        Some(h) => h,
        None => return pkt,
    };

    pkt.ip = match headers.net {
        Some(NetHeaders::Ipv4(ref h, _)) => Some(IpLayer {
            src: IpAddr::V4(Ipv4Addr::from(h.source)),
            dst: IpAddr::V4(Ipv4Addr::from(h.destination)),
        }),
        Some(NetHeaders::Ipv6(ref h, _)) => Some(IpLayer {
            src: IpAddr::V6(Ipv6Addr::from(h.source)),
            dst: IpAddr::V6(Ipv6Addr::from(h.destination)),
        }),
        _ => None,
    };

    if let Some(TransportHeader::Tcp(ref tcp)) = headers.transport {
        pkt.tcp = Some(TcpLayer {
            src_port: tcp.source_port,
            dst_port: tcp.destination_port,
            flags: TcpFlags(tcp_flag_byte(tcp)),
        });

        // snaplen-cut frames still carry the start of the payload
        let payload = headers.payload.slice();
        if let Some(hdr) = tls::parse_record_header(payload) {
            tracing::trace!(
                version = %tls::format_tls_version(hdr.version),
                content_type = hdr.content_type,
                "tls record"
            );
            pkt.tls = true;
        }
    }

    pkt
}

/// Lax decoding keeps the IP and TCP headers of frames cut short by the
/// capture snap length; decoding stops at the first layer that is incomplete.
fn parse_link_layer(linktype: Linktype, data: &[u8]) -> Option<LaxPacketHeaders<'_>> {
    let headers = match linktype {
        Linktype::ETHERNET => LaxPacketHeaders::from_ethernet(data).ok(),
        // raw IP: DLT_RAW, its OpenBSD alias, LINKTYPE_IPV4, LINKTYPE_IPV6
        Linktype::RAW | Linktype(12) | Linktype(228) | Linktype(229) => {
            LaxPacketHeaders::from_ip(data).ok()
        }
        // BSD loopback / OpenBSD loop: 4-byte family header
        Linktype::NULL | Linktype(108) => {
            LaxPacketHeaders::from_ip(data.get(4..)?).ok()
        }
        Linktype::LINUX_SLL => {
            if data.len() < 16 {
                return None;
            }
            let ethertype = u16::from_be_bytes([data[14], data[15]]);
            if ethertype != 0x0800 && ethertype != 0x86DD {
                return None;
            }
            LaxPacketHeaders::from_ip(&data[16..]).ok()
        }
        _ => None,
    }?;

    if let Some((err, layer)) = &headers.stop_err {
        tracing::trace!(?layer, "partial frame: {err}");
    }
    Some(headers)
}

fn tcp_flag_byte(tcp: &etherparse::TcpHeader) -> u8 {
    let mut bits = 0u8;
    for (set, bit) in [
        (tcp.fin, TcpFlags::FIN),
        (tcp.syn, TcpFlags::SYN),
        (tcp.rst, TcpFlags::RST),
        (tcp.psh, TcpFlags::PSH),
        (tcp.ack, TcpFlags::ACK),
        (tcp.urg, TcpFlags::URG),
        (tcp.ece, TcpFlags::ECE),
        (tcp.cwr, TcpFlags::CWR),
    ] {
        if set {
            bits |= bit;
        }
    }
    bits
}

fn to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}
