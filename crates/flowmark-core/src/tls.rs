const CHANGE_CIPHER_SPEC: u8 = 0x14;
const HEARTBEAT: u8 = 0x18;

/// Plaintext limit plus the largest expansion allowed for protected records.
const MAX_RECORD_LEN: u16 = (1 << 14) + 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: u8,
    pub version: u16,
    pub length: u16,
}

/// Recognizes a TLS record header at the start of a TCP payload. Records
/// are not reassembled, so a segment that begins mid-record is not matched.
pub fn parse_record_header(payload: &[u8]) -> Option<RecordHeader> {
    if payload.len() < 5 {
        return None;
    }

    let content_type = payload[0];
    if !(CHANGE_CIPHER_SPEC..=HEARTBEAT).contains(&content_type) {
        return None;
    }

    let version = u16::from_be_bytes([payload[1], payload[2]]);
    if !(0x0300..=0x0304).contains(&version) {
        return None;
    }

    let length = u16::from_be_bytes([payload[3], payload[4]]);
    if length == 0 || length > MAX_RECORD_LEN {
        return None;
    }

    Some(RecordHeader {
        content_type,
        version,
        length,
    })
}

pub fn format_tls_version(v: u16) -> String {
    match v {
        0x0300 => "SSL 3.0".to_string(),
        0x0301 => "TLS 1.0".to_string(),
        0x0302 => "TLS 1.1".to_string(),
        0x0303 => "TLS 1.2".to_string(),
        0x0304 => "TLS 1.3".to_string(),
        _ => format!("0x{:04x}", v),
    }
}
