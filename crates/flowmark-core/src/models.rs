use std::fmt;
use std::net::{IpAddr, SocketAddr};

// ---------------------------------------------------------------------------
// Packet: the normalized record handed from the packet source to the core
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    /// Seconds since the epoch. `None` when the capture block carries no timestamp.
    pub timestamp: Option<f64>,
    /// Original wire length of the frame in bytes.
    pub length: u32,
    pub ip: Option<IpLayer>,
    pub tcp: Option<TcpLayer>,
    pub tls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpLayer {
    pub src: IpAddr,
    pub dst: IpAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpLayer {
    pub src_port: u16,
    pub dst_port: u16,
    pub flags: TcpFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Ip,
    Tcp,
    Tls,
}

impl Packet {
    pub fn has_layer(&self, layer: Layer) -> bool {
        match layer {
            Layer::Ip => self.ip.is_some(),
            Layer::Tcp => self.tcp.is_some(),
            Layer::Tls => self.tls,
        }
    }

    pub fn source(&self) -> Option<Endpoint> {
        let (ip, tcp) = self.ip.zip(self.tcp)?;
        Some(Endpoint::new(ip.src, tcp.src_port))
    }

    pub fn destination(&self) -> Option<Endpoint> {
        let (ip, tcp) = self.ip.zip(self.tcp)?;
        Some(Endpoint::new(ip.dst, tcp.dst_port))
    }

    pub fn tcp_flags(&self) -> Option<TcpFlags> {
        self.tcp.map(|t| t.flags)
    }
}

// ---------------------------------------------------------------------------
// TCP flags
// ---------------------------------------------------------------------------

/// Raw TCP flag byte. Handshake matching compares whole bytes, so a SYN with
/// ECE/CWR set is not a "SYN only" segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;

    pub fn is_syn_only(self) -> bool {
        self.0 == Self::SYN
    }

    pub fn is_syn_ack(self) -> bool {
        self.0 == Self::SYN | Self::ACK
    }

    pub fn is_ack_only(self) -> bool {
        self.0 == Self::ACK
    }
}

// ---------------------------------------------------------------------------
// Flow keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SocketAddr::new(self.addr, self.port).fmt(f)
    }
}

/// Direction-normalized pair of endpoints: `lo <= hi` always holds, so both
/// directions of a conversation share one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub lo: Endpoint,
    pub hi: Endpoint,
}

impl FlowKey {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// `None` unless the packet has both an IP and a TCP layer.
    pub fn from_packet(pkt: &Packet) -> Option<Self> {
        Some(Self::new(pkt.source()?, pkt.destination()?))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}
