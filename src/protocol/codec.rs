//! Packet encode/decode and integrity checks.
//!
//! Decoding validates, in order: the fixed header is present, the declared
//! payload is present (and within the caller's limit), the CRC32 matches, and
//! the version is one this build speaks. Only then are header strings parsed
//! and the payload handed out, so corrupt frames are rejected before any
//! variant-specific work happens.

use bytes::{BufMut, Bytes, BytesMut};
use crc32fast::Hasher;

use super::header::{
    CHECKSUM_OFFSET, HEADER_SIZE, PAYLOAD_LENGTH_OFFSET, PROTOCOL_VERSION, PacketHeader,
    VERSION_OFFSET,
};
use super::message_type::MessageType;
use super::payload::TypedPayload;
use crate::utils::ProtocolError;

/// Protocol versions `decode` accepts.
pub const SUPPORTED_VERSIONS: &[u8] = &[PROTOCOL_VERSION];

/// One header + payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Pairs a header with its payload, filling in `payload_length` and `checksum`.
    pub fn new(mut header: PacketHeader, payload: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        header.payload_length = payload_len_u32(payload.len())?;
        header.checksum = compute_checksum(&header, &payload);
        Ok(Self { header, payload })
    }

    /// Serializes `payload` into the layout for its variant and seals the packet.
    pub fn from_payload(header: PacketHeader, payload: &TypedPayload) -> Result<Self, ProtocolError> {
        Self::new(header, payload.to_bytes()?)
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        encode(&self.header, &self.payload)
    }

    pub fn kind(&self) -> Result<MessageType, ProtocolError> {
        self.header.kind()
    }

    pub fn interpret(&self) -> Result<TypedPayload, ProtocolError> {
        interpret_payload(&self.header, &self.payload)
    }
}

/// Serializes `header` followed by `payload`.
///
/// `payload_length` and `checksum` are derived from the payload; whatever the
/// header carried in those fields is ignored.
pub fn encode(header: &PacketHeader, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let mut sealed = header.clone();
    sealed.payload_length = payload_len_u32(payload.len())?;
    sealed.checksum = 0;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    sealed.write_to(&mut buf);
    buf.put_slice(payload);

    // header with a zeroed checksum followed by the payload is exactly the buffer
    let checksum = crc32fast::hash(&buf);
    buf[CHECKSUM_OFFSET..HEADER_SIZE].copy_from_slice(&checksum.to_be_bytes());
    Ok(buf.freeze())
}

/// Decodes one complete frame.
pub fn decode(frame: impl Into<Bytes>) -> Result<Packet, ProtocolError> {
    decode_with_limit(frame, u32::MAX as usize)
}

/// Like [`decode`], refusing frames that declare more than `max_payload` bytes.
pub fn decode_with_limit(frame: impl Into<Bytes>, max_payload: usize) -> Result<Packet, ProtocolError> {
    let frame = frame.into();
    if frame.len() < HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            need: HEADER_SIZE,
            have: frame.len(),
        });
    }

    let declared = read_u32(&frame, PAYLOAD_LENGTH_OFFSET) as usize;
    if declared > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            len: declared,
            max: max_payload,
        });
    }

    let need = HEADER_SIZE + declared;
    if frame.len() < need {
        return Err(ProtocolError::Truncated {
            need,
            have: frame.len(),
        });
    }

    let expected = read_u32(&frame, CHECKSUM_OFFSET);
    let computed = frame_checksum(&frame[..need]);
    if expected != computed {
        return Err(ProtocolError::ChecksumMismatch { expected, computed });
    }

    let version = frame[VERSION_OFFSET];
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    if frame.len() > need {
        return Err(ProtocolError::TrailingBytes {
            extra: frame.len() - need,
        });
    }

    let header = PacketHeader::read_from(&mut &frame[..HEADER_SIZE])?;
    Ok(Packet {
        header,
        payload: frame.slice(HEADER_SIZE..need),
    })
}

/// Integrity-only check: does `header` describe exactly this payload?
pub fn verify(header: &PacketHeader, payload: &[u8]) -> bool {
    header.payload_length as usize == payload.len() && header.checksum == compute_checksum(header, payload)
}

/// True when `bytes` is one complete, intact frame.
pub fn is_frame(bytes: &[u8]) -> bool {
    decode(Bytes::copy_from_slice(bytes)).is_ok()
}

/// CRC32 over the serialized header (checksum field zeroed) followed by `payload`.
pub fn compute_checksum(header: &PacketHeader, payload: &[u8]) -> u32 {
    let mut raw = [0u8; HEADER_SIZE];
    let mut zeroed = header.clone();
    zeroed.checksum = 0;
    zeroed.write_to(&mut &mut raw[..]);

    let mut hasher = Hasher::new();
    hasher.update(&raw);
    hasher.update(payload);
    hasher.finalize()
}

/// Dispatches on the header's message type to the matching payload layout.
pub fn interpret_payload(header: &PacketHeader, payload: &[u8]) -> Result<TypedPayload, ProtocolError> {
    let kind = header.kind()?;
    TypedPayload::parse(kind, payload)
}

fn frame_checksum(frame: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&frame[..CHECKSUM_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&frame[HEADER_SIZE..]);
    hasher.finalize()
}

fn read_u32(frame: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&frame[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

fn payload_len_u32(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge {
        len,
        max: u32::MAX as usize,
    })
}
