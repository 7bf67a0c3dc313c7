//! OBEX responses received by the file-transfer client.

use std::fmt;

use crate::error::SyncError;
use crate::obex::header::{HeaderId, ObexHeader};
use crate::obex::request::OBEX_VERSION;

// ── ResponseCode ─────────────────────────────────────────────────

macro_rules! response_codes {
    ($($name:ident = $value:literal),* $(,)?) => {
        /// Response code byte (final bit included).
        ///
        /// Codes outside the table are kept as [`ResponseCode::Other`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ResponseCode {
            $($name,)*
            Other(u8),
        }

        impl From<u8> for ResponseCode {
            fn from(value: u8) -> Self {
                match value {
                    $($value => ResponseCode::$name,)*
                    other => ResponseCode::Other(other),
                }
            }
        }

        impl From<ResponseCode> for u8 {
            fn from(code: ResponseCode) -> u8 {
                match code {
                    $(ResponseCode::$name => $value,)*
                    ResponseCode::Other(other) => other,
                }
            }
        }

        impl fmt::Display for ResponseCode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(ResponseCode::$name => write!(f, "{} ({:#04x})", stringify!($name), $value),)*
                    ResponseCode::Other(other) => write!(f, "Other ({other:#04x})"),
                }
            }
        }
    };
}

response_codes! {
    Continue = 0x90,
    Success = 0xA0,
    Created = 0xA1,
    Accepted = 0xA2,
    MultipleChoices = 0xB0,
    MovedPermanently = 0xB1,
    MovedTemporarily = 0xB2,
    SeeOther = 0xB3,
    NotModified = 0xB4,
    UseProxy = 0xB5,
    BadRequest = 0xC0,
    Unauthorized = 0xC1,
    Forbidden = 0xC3,
    NotFound = 0xC4,
    MethodNotAllowed = 0xC5,
    NotAcceptable = 0xC6,
    ProxyAuthenticationRequired = 0xC7,
    RequestTimeOut = 0xC8,
    Conflict = 0xC9,
    Gone = 0xCA,
    LengthRequired = 0xCB,
    PreconditionFailed = 0xCC,
    RequestEntityTooLarge = 0xCD,
    RequestUrlTooLarge = 0xCE,
    UnsupportedMediaType = 0xCF,
    InternalServerError = 0xD0,
    NotImplemented = 0xD1,
    BadGateway = 0xD2,
    ServiceUnavailable = 0xD3,
    GatewayTimeout = 0xD4,
    HttpVersionNotSupported = 0xD5,
    DatabaseFull = 0xE0,
    DatabaseLocked = 0xE1,
}

impl ResponseCode {
    /// 0xC0 and above.
    pub fn is_error(self) -> bool {
        u8::from(self) >= 0xC0
    }
}

// ── ObexResponse ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObexResponse {
    pub code: ResponseCode,
    /// Present on CONNECT replies only.
    pub version: Option<u8>,
    pub flags: Option<u8>,
    pub max_packet_size: Option<u16>,
    /// Headers in wire order.
    pub headers: Vec<ObexHeader>,
}

impl ObexResponse {
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            version: None,
            flags: None,
            max_packet_size: None,
            headers: Vec::new(),
        }
    }

    /// Successful CONNECT reply handing out `connection_id`.
    pub fn connected(connection_id: u32) -> Self {
        let mut response = Self::new(ResponseCode::Success)
            .with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id));
        response.version = Some(OBEX_VERSION);
        response.flags = Some(0);
        response.max_packet_size = Some(crate::obex::request::MAX_PACKET_SIZE);
        response
    }

    pub fn with_header(mut self, header: ObexHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Last header with the given id.
    pub fn header(&self, id: HeaderId) -> Option<&ObexHeader> {
        self.headers.iter().rev().find(|h| h.id == id as u8)
    }

    /// Body of the given header, or empty when absent.
    pub fn body(&self, id: HeaderId) -> &[u8] {
        self.header(id).map(ObexHeader::bytes).unwrap_or(&[])
    }

    pub fn connection_id(&self) -> Option<u32> {
        self.header(HeaderId::ConnectionId).and_then(ObexHeader::as_u32)
    }

    pub fn len(&self) -> usize {
        let fixed = if self.version.is_some() { 4 } else { 0 };
        3 + fixed + self.headers.iter().map(ObexHeader::len).sum::<usize>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.len();
        let mut out = Vec::with_capacity(len);
        out.push(self.code.into());
        out.extend_from_slice(&(len as u16).to_be_bytes());
        if let Some(version) = self.version {
            out.push(version);
            out.push(self.flags.unwrap_or(0));
            out.extend_from_slice(&self.max_packet_size.unwrap_or(0).to_be_bytes());
        }
        for header in &self.headers {
            header.encode_into(&mut out);
        }
        out
    }

    /// Decode one complete response packet.
    ///
    /// When the byte after the length equals the protocol version the next
    /// four bytes are read as version, flags and maximum packet size. This
    /// is a heuristic: only CONNECT replies carry those fields.
    pub fn parse(data: &[u8]) -> Result<Self, SyncError> {
        if data.len() < 3 {
            return Err(SyncError::Truncated {
                needed: 3,
                available: data.len(),
            });
        }
        let length = u16::from_be_bytes([data[1], data[2]]) as usize;
        if length < 3 {
            return Err(SyncError::MalformedPacket("response length below 3"));
        }
        if data.len() < length {
            return Err(SyncError::Truncated {
                needed: length,
                available: data.len(),
            });
        }
        let data = &data[..length];

        let mut response = Self::new(ResponseCode::from(data[0]));
        let mut offset = 3;
        if length > 3 && data[3] == OBEX_VERSION {
            if length < 7 {
                return Err(SyncError::Truncated {
                    needed: 7,
                    available: length,
                });
            }
            response.version = Some(data[3]);
            response.flags = Some(data[4]);
            response.max_packet_size = Some(u16::from_be_bytes([data[5], data[6]]));
            offset = 7;
        }

        response.headers = ObexHeader::parse_all(&data[offset..])?;
        Ok(response)
    }
}

impl fmt::Display for ObexResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {} header(s)", self.code, self.headers.len())
    }
}
