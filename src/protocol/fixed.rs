//! Bounded-length strings and the primitive readers/writers shared by the
//! header and payload layouts.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::utils::ProtocolError;

/// A UTF-8 string that fits a fixed-width, NUL-padded wire field of `N` bytes.
///
/// The width check happens at construction, so a value of this type can
/// always be written without truncation.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    /// Width of the wire field.
    pub const WIDTH: usize = N;

    pub fn new(value: &str) -> Result<Self, ProtocolError> {
        if value.len() > N {
            return Err(ProtocolError::FieldTooLong {
                len: value.len(),
                max: N,
            });
        }
        if value.as_bytes().contains(&0) {
            return Err(ProtocolError::EmbeddedNul);
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes the value followed by NUL padding up to `N` bytes.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.0.as_bytes());
        buf.put_bytes(0, N - self.0.len());
    }

    /// Reads `N` bytes and keeps everything before the first NUL.
    ///
    /// Every byte after the first NUL must be NUL too, so a value has exactly
    /// one encoding.
    pub fn read_from(buf: &mut impl Buf, field: &'static str) -> Result<Self, ProtocolError> {
        if buf.remaining() < N {
            return Err(ProtocolError::Truncated {
                need: N,
                have: buf.remaining(),
            });
        }
        let mut raw = vec![0u8; N];
        buf.copy_to_slice(&mut raw);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
        if raw[end..].iter().any(|&b| b != 0) {
            return Err(ProtocolError::DirtyPadding { field });
        }
        raw.truncate(end);
        String::from_utf8(raw)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> AsRef<str> for FixedString<N> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 64-byte identifier field (user, room, message, transfer ids...).
pub type Id = FixedString<64>;

pub(crate) fn ensure(buf: &impl Buf, need: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < need {
        return Err(ProtocolError::Truncated {
            need,
            have: buf.remaining(),
        });
    }
    Ok(())
}

/// Writes `text` with a big-endian `u16` length prefix.
pub(crate) fn put_text_u16(buf: &mut impl BufMut, text: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(text.len()).map_err(|_| ProtocolError::FieldTooLong {
        len: text.len(),
        max: u16::MAX as usize,
    })?;
    buf.put_u16(len);
    buf.put_slice(text.as_bytes());
    Ok(())
}

pub(crate) fn get_text_u16(buf: &mut impl Buf, field: &'static str) -> Result<String, ProtocolError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure(buf, len)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8 { field })
}
