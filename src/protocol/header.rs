//! Fixed-size packet header.
//!
//! Layout (big endian, 218 bytes):
//!
//! ```text
//! offset  size  field
//!      0     4  message_type
//!      4     4  payload_length
//!      8     4  message_id
//!     12     8  timestamp_millis
//!     20     1  protocol_version
//!     21     1  flags
//!     22    64  sender   (NUL padded)
//!     86   128  topic    (NUL padded)
//!    214     4  checksum (CRC32 over header with this field zeroed + payload)
//! ```

use bytes::{Buf, BufMut};

use super::fixed::FixedString;
use super::message_type::MessageType;
use crate::utils::ProtocolError;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Width of the sender field.
pub const SENDER_LEN: usize = 64;

/// Width of the topic field.
pub const TOPIC_LEN: usize = 128;

/// Serialized header size in bytes.
pub const HEADER_SIZE: usize = 4 + 4 + 4 + 8 + 1 + 1 + SENDER_LEN + TOPIC_LEN + 4;

pub(crate) const PAYLOAD_LENGTH_OFFSET: usize = 4;
pub(crate) const VERSION_OFFSET: usize = 20;
pub(crate) const CHECKSUM_OFFSET: usize = HEADER_SIZE - 4;

/// Header flag bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const ENCRYPTED: Self = Self(0x01);
    pub const COMPRESSED: Self = Self(0x02);
    pub const PRIORITY: Self = Self(0x04);
    /// Advisory; nothing here retries unacknowledged packets.
    pub const REQUIRE_ACK: Self = Self(0x08);

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Keeps unknown bits so they survive a decode/encode cycle.
    pub const fn from_bits_retain(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Envelope prefixed to every packet on the wire.
///
/// `message_type` stays a raw `u32` so frames with types this build does not
/// know still decode; `MessageType::try_from` classifies it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub message_type: u32,
    pub payload_length: u32,
    pub message_id: u32,
    pub timestamp_millis: u64,
    pub protocol_version: u8,
    pub flags: PacketFlags,
    pub sender: FixedString<SENDER_LEN>,
    pub topic: FixedString<TOPIC_LEN>,
    pub checksum: u32,
}

impl PacketHeader {
    /// Builds a header stamped with the current version and wall-clock time.
    ///
    /// `payload_length` and `checksum` are filled in when the packet is sealed.
    pub fn new(kind: MessageType, sender: &str, topic: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            message_type: kind.as_u32(),
            payload_length: 0,
            message_id: 0,
            timestamp_millis: now_millis(),
            protocol_version: PROTOCOL_VERSION,
            flags: PacketFlags::empty(),
            sender: FixedString::new(sender)?,
            topic: FixedString::new(topic)?,
            checksum: 0,
        })
    }

    pub fn with_message_id(mut self, message_id: u32) -> Self {
        self.message_id = message_id;
        self
    }

    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Typed view of `message_type`.
    pub fn kind(&self) -> Result<MessageType, ProtocolError> {
        MessageType::try_from(self.message_type)
    }

    pub(crate) fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.message_type);
        buf.put_u32(self.payload_length);
        buf.put_u32(self.message_id);
        buf.put_u64(self.timestamp_millis);
        buf.put_u8(self.protocol_version);
        buf.put_u8(self.flags.bits());
        self.sender.write_to(buf);
        self.topic.write_to(buf);
        buf.put_u32(self.checksum);
    }

    /// Caller guarantees at least `HEADER_SIZE` bytes are available.
    pub(crate) fn read_from(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        Ok(Self {
            message_type: buf.get_u32(),
            payload_length: buf.get_u32(),
            message_id: buf.get_u32(),
            timestamp_millis: buf.get_u64(),
            protocol_version: buf.get_u8(),
            flags: PacketFlags::from_bits_retain(buf.get_u8()),
            sender: FixedString::read_from(buf, "sender")?,
            topic: FixedString::read_from(buf, "topic")?,
            checksum: buf.get_u32(),
        })
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
