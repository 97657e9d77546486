//! Binary packet codec.
//!
//! Every frame is a fixed 218-byte [`PacketHeader`] followed by
//! `payload_length` payload bytes. [`decode`] checks framing and integrity
//! without looking at the payload; [`interpret_payload`] turns the payload
//! into a [`TypedPayload`] once the caller decides it wants it.

pub mod codec;
pub mod fixed;
pub mod header;
pub mod message_type;
pub mod payload;

pub use codec::{
    Packet, SUPPORTED_VERSIONS, compute_checksum, decode, decode_with_limit, encode,
    interpret_payload, is_frame, verify,
};
pub use fixed::{FixedString, Id};
pub use header::{HEADER_SIZE, PROTOCOL_VERSION, PacketFlags, PacketHeader, SENDER_LEN, TOPIC_LEN};
pub use message_type::MessageType;
pub use payload::TypedPayload;

pub use crate::utils::ProtocolError;
