//! OBEX headers.
//!
//! ```text
//! 4-byte kinds (CONNECTION_ID, LENGTH):  id(1) | value(4)
//! everything else:                       id(1) | length(2, BE) | body
//! ```
//!
//! `length` counts the id and the length field itself, so a header with no
//! body is exactly 3 bytes.

use std::fmt;

use crate::error::SyncError;

// ── HeaderId ─────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderId {
    /// Service the operation is aimed at.
    Target = 0x46,
    /// Multiplexing id handed out by the server on CONNECT.
    ConnectionId = 0xCB,
    /// Object name, usually a file name.
    Name = 0x01,
    /// Object MIME type.
    Type = 0x42,
    Who = 0x4A,
    Body = 0x48,
    EndOfBody = 0x49,
    /// Object length in bytes.
    Length = 0xC3,
    Description = 0x05,
}

impl HeaderId {
    /// Ids whose value is a bare 4-byte quantity with no length prefix.
    pub fn is_four_byte(id: u8) -> bool {
        id == HeaderId::ConnectionId as u8 || id == HeaderId::Length as u8
    }
}

impl TryFrom<u8> for HeaderId {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x46 => Ok(HeaderId::Target),
            0xCB => Ok(HeaderId::ConnectionId),
            0x01 => Ok(HeaderId::Name),
            0x42 => Ok(HeaderId::Type),
            0x4A => Ok(HeaderId::Who),
            0x48 => Ok(HeaderId::Body),
            0x49 => Ok(HeaderId::EndOfBody),
            0xC3 => Ok(HeaderId::Length),
            0x05 => Ok(HeaderId::Description),
            _ => Err(SyncError::UnknownVariant {
                type_name: "HeaderId",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Target => "Target",
            Self::ConnectionId => "ConnectionId",
            Self::Name => "Name",
            Self::Type => "Type",
            Self::Who => "Who",
            Self::Body => "Body",
            Self::EndOfBody => "EndOfBody",
            Self::Length => "Length",
            Self::Description => "Description",
        };
        f.write_str(s)
    }
}

// ── ObexHeader ───────────────────────────────────────────────────

const FOUR_BYTE_LEN: usize = 5;
const PREFIX_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObexHeader {
    /// Raw id byte; unknown ids from a peer are kept as-is.
    pub id: u8,
    /// `None` when the header carries no body.
    pub body: Option<Vec<u8>>,
}

impl ObexHeader {
    /// A header with no body.
    pub fn empty(id: HeaderId) -> Self {
        Self {
            id: id as u8,
            body: None,
        }
    }

    /// An empty `bytes` is stored as "no body".
    pub fn with_bytes(id: HeaderId, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_raw(id as u8, bytes.into())
    }

    pub fn with_u32(id: HeaderId, value: u32) -> Self {
        Self {
            id: id as u8,
            body: Some(value.to_be_bytes().to_vec()),
        }
    }

    /// UTF-16BE text followed by a two-byte null terminator.
    pub fn with_text(id: HeaderId, text: &str) -> Self {
        let mut body: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        body.extend_from_slice(&[0x00, 0x00]);
        Self {
            id: id as u8,
            body: Some(body),
        }
    }

    fn from_raw(id: u8, body: Vec<u8>) -> Self {
        Self {
            id,
            body: (!body.is_empty()).then_some(body),
        }
    }

    pub fn kind(&self) -> Option<HeaderId> {
        HeaderId::try_from(self.id).ok()
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        if HeaderId::is_four_byte(self.id) {
            FOUR_BYTE_LEN
        } else {
            PREFIX_LEN + self.body.as_ref().map_or(0, Vec::len)
        }
    }

    /// Body bytes, or an empty slice.
    pub fn bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Decode a UTF-16BE text body, dropping the null terminator.
    ///
    /// Returns `None` when there is no body.
    pub fn text(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        Some(String::from_utf16_lossy(&units[..end]))
    }

    /// Big-endian `u32` value of a 4-byte header.
    pub fn as_u32(&self) -> Option<u32> {
        let body = self.body.as_ref()?;
        let bytes: [u8; 4] = body.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.id);
        if HeaderId::is_four_byte(self.id) {
            let mut value = [0u8; 4];
            let body = self.bytes();
            let n = body.len().min(4);
            value[..n].copy_from_slice(&body[..n]);
            out.extend_from_slice(&value);
        } else {
            out.extend_from_slice(&(self.len() as u16).to_be_bytes());
            out.extend_from_slice(self.bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.encode_into(&mut out);
        out
    }

    /// Parse one header from the front of `data`, returning it together
    /// with the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), SyncError> {
        let Some(&id) = data.first() else {
            return Err(SyncError::Truncated {
                needed: 1,
                available: 0,
            });
        };

        if HeaderId::is_four_byte(id) {
            if data.len() < FOUR_BYTE_LEN {
                return Err(SyncError::Truncated {
                    needed: FOUR_BYTE_LEN,
                    available: data.len(),
                });
            }
            let header = Self {
                id,
                body: Some(data[1..FOUR_BYTE_LEN].to_vec()),
            };
            return Ok((header, FOUR_BYTE_LEN));
        }

        if data.len() < PREFIX_LEN {
            return Err(SyncError::Truncated {
                needed: PREFIX_LEN,
                available: data.len(),
            });
        }
        let length = u16::from_be_bytes([data[1], data[2]]) as usize;
        if length < PREFIX_LEN {
            return Err(SyncError::MalformedPacket("header length below 3"));
        }
        if data.len() < length {
            return Err(SyncError::Truncated {
                needed: length,
                available: data.len(),
            });
        }

        Ok((Self::from_raw(id, data[PREFIX_LEN..length].to_vec()), length))
    }

    /// Parse every header in `data`.
    pub fn parse_all(mut data: &[u8]) -> Result<Vec<Self>, SyncError> {
        let mut headers = Vec::new();
        while !data.is_empty() {
            let (header, used) = Self::parse(data)?;
            headers.push(header);
            data = &data[used..];
        }
        Ok(headers)
    }
}

impl fmt::Display for ObexHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{kind}")?,
            None => write!(f, "{:#04x}", self.id)?,
        }
        write!(f, " ({} bytes)", self.len())
    }
}
