//! OBEX requests sent by the file-transfer client.
//!
//! ```text
//! opcode(1) | length(2, BE) | [CONNECT: version(1) flags(1) max size(2)]
//!                           | [SET_PATH: flags(1) constants(1)] | headers …
//! ```

use std::fmt;

use bitflags::bitflags;

use crate::error::SyncError;
use crate::obex::header::{HeaderId, ObexHeader};

/// Protocol version sent on CONNECT and recognised in replies.
pub const OBEX_VERSION: u8 = 0x10;

/// Largest packet the client accepts.
pub const MAX_PACKET_SIZE: u16 = 0xFFDC;

/// Folder-browsing service UUID `F9EC7BC4-953C-11D2-984E-525400DC9E09`.
pub const FTP_TARGET_UUID: [u8; 16] = [
    0xF9, 0xEC, 0x7B, 0xC4, 0x95, 0x3C, 0x11, 0xD2, 0x98, 0x4E, 0x52, 0x54, 0x00, 0xDC, 0x9E, 0x09,
];

/// MIME type of a folder listing, null terminated.
pub const FOLDER_LISTING_TYPE: &[u8] = b"x-obex/folder-listing\0";

/// SET_PATH constants byte.
pub const DEFAULT_CONSTANTS: u8 = 0x00;

// ── Opcode ───────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Connect = 0x80,
    Disconnect = 0x81,
    Put = 0x82,
    Get = 0x83,
    SetPath = 0x85,
    Session = 0x87,
    Abort = 0xFF,
}

impl TryFrom<u8> for Opcode {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(Opcode::Connect),
            0x81 => Ok(Opcode::Disconnect),
            0x82 => Ok(Opcode::Put),
            0x83 => Ok(Opcode::Get),
            0x85 => Ok(Opcode::SetPath),
            0x87 => Ok(Opcode::Session),
            0xFF => Ok(Opcode::Abort),
            _ => Err(SyncError::UnknownVariant {
                type_name: "Opcode",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::SetPath => "SET_PATH",
            Self::Session => "SESSION",
            Self::Abort => "ABORT",
        };
        f.write_str(s)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetPathFlags: u8 {
        /// Go up one level before applying the name.
        const BACKUP = 0x01;
        /// Fail instead of creating a missing folder.
        const DONT_CREATE_FOLDER = 0x02;
    }
}

/// Fixed fields that follow the length on CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectParams {
    pub version: u8,
    pub flags: u8,
    pub max_packet_size: u16,
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            version: OBEX_VERSION,
            flags: 0,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

/// Fixed fields that follow the length on SET_PATH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetPathParams {
    pub flags: SetPathFlags,
    pub constants: u8,
}

// ── ObexRequest ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObexRequest {
    pub opcode: Opcode,
    pub connect: Option<ConnectParams>,
    pub set_path: Option<SetPathParams>,
    pub headers: Vec<ObexHeader>,
}

impl ObexRequest {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            connect: (opcode == Opcode::Connect).then(ConnectParams::default),
            set_path: (opcode == Opcode::SetPath).then(SetPathParams::default),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: ObexHeader) -> Self {
        self.headers.push(header);
        self
    }

    // ── Builders ─────────────────────────────────────────────────

    /// Open a session with the folder-browsing service.
    pub fn connect() -> Self {
        Self::new(Opcode::Connect)
            .with_header(ObexHeader::with_bytes(HeaderId::Target, FTP_TARGET_UUID))
    }

    pub fn disconnect(connection_id: u32) -> Self {
        Self::new(Opcode::Disconnect)
            .with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id))
    }

    /// Listing of the current folder.
    pub fn list_folder(connection_id: u32) -> Self {
        Self::new(Opcode::Get)
            .with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id))
            .with_header(ObexHeader::empty(HeaderId::Name))
            .with_header(ObexHeader::with_bytes(HeaderId::Type, FOLDER_LISTING_TYPE))
    }

    /// `".."` moves up, `""` returns to the root, anything else enters a
    /// child folder.
    pub fn set_path(name: &str, connection_id: u32) -> Self {
        let mut request = Self::new(Opcode::SetPath);
        let flags = match name {
            ".." => SetPathFlags::BACKUP | SetPathFlags::DONT_CREATE_FOLDER,
            "" => {
                request.headers.push(ObexHeader::empty(HeaderId::Name));
                SetPathFlags::DONT_CREATE_FOLDER
            }
            _ => {
                request.headers.push(ObexHeader::with_text(HeaderId::Name, name));
                SetPathFlags::DONT_CREATE_FOLDER
            }
        };
        request.set_path = Some(SetPathParams {
            flags,
            constants: DEFAULT_CONSTANTS,
        });
        request.with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id))
    }

    /// Delete by PUT with no body.
    pub fn delete(name: &str, connection_id: u32) -> Self {
        Self::new(Opcode::Put)
            .with_header(ObexHeader::with_text(HeaderId::Name, name))
            .with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id))
    }

    pub fn get_file(name: &str, connection_id: u32) -> Self {
        Self::new(Opcode::Get)
            .with_header(ObexHeader::with_text(HeaderId::Name, name))
            .with_header(ObexHeader::with_u32(HeaderId::ConnectionId, connection_id))
    }

    // ── Accessors ────────────────────────────────────────────────

    /// First header with the given id.
    pub fn header(&self, id: HeaderId) -> Option<&ObexHeader> {
        self.headers.iter().find(|h| h.id == id as u8)
    }

    /// Text of the NAME header, if it has one.
    pub fn name(&self) -> Option<String> {
        self.header(HeaderId::Name).and_then(ObexHeader::text)
    }

    /// A GET with three headers is a folder listing; two is a file fetch.
    pub fn is_folder_listing(&self) -> bool {
        self.opcode == Opcode::Get && self.headers.len() == 3
    }

    pub fn set_path_flags(&self) -> SetPathFlags {
        self.set_path.map(|p| p.flags).unwrap_or_default()
    }

    /// Total encoded length, opcode and length field included.
    pub fn len(&self) -> usize {
        let fixed = match self.opcode {
            Opcode::Connect => 4,
            Opcode::SetPath => 2,
            _ => 0,
        };
        3 + fixed + self.headers.iter().map(ObexHeader::len).sum::<usize>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.len();
        let mut out = Vec::with_capacity(len);
        out.push(self.opcode as u8);
        out.extend_from_slice(&(len as u16).to_be_bytes());

        match self.opcode {
            Opcode::Connect => {
                let p = self.connect.unwrap_or_default();
                out.push(p.version);
                out.push(p.flags);
                out.extend_from_slice(&p.max_packet_size.to_be_bytes());
            }
            Opcode::SetPath => {
                let p = self.set_path.unwrap_or_default();
                out.push(p.flags.bits());
                out.push(p.constants);
            }
            _ => {}
        }

        for header in &self.headers {
            header.encode_into(&mut out);
        }
        out
    }

    /// Decode a complete request packet (server side of the exchange).
    pub fn parse(data: &[u8]) -> Result<Self, SyncError> {
        if data.len() < 3 {
            return Err(SyncError::Truncated {
                needed: 3,
                available: data.len(),
            });
        }
        let opcode = Opcode::try_from(data[0])?;
        let length = u16::from_be_bytes([data[1], data[2]]) as usize;
        if length < 3 {
            return Err(SyncError::MalformedPacket("request length below 3"));
        }
        if data.len() < length {
            return Err(SyncError::Truncated {
                needed: length,
                available: data.len(),
            });
        }
        let data = &data[..length];

        let mut request = Self::new(opcode);
        let mut offset = 3;
        match opcode {
            Opcode::Connect => {
                let fixed = data.get(3..7).ok_or(SyncError::Truncated {
                    needed: 7,
                    available: data.len(),
                })?;
                request.connect = Some(ConnectParams {
                    version: fixed[0],
                    flags: fixed[1],
                    max_packet_size: u16::from_be_bytes([fixed[2], fixed[3]]),
                });
                offset = 7;
            }
            Opcode::SetPath => {
                let fixed = data.get(3..5).ok_or(SyncError::Truncated {
                    needed: 5,
                    available: data.len(),
                })?;
                request.set_path = Some(SetPathParams {
                    flags: SetPathFlags::from_bits_retain(fixed[0]),
                    constants: fixed[1],
                });
                offset = 5;
            }
            _ => {}
        }

        request.headers = ObexHeader::parse_all(&data[offset..])?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_layout() {
        let bytes = ObexRequest::connect().to_bytes();
        assert_eq!(bytes.len(), 7 + 3 + 16);
        assert_eq!(&bytes[..7], &[0x80, 0x00, 0x1A, 0x10, 0x00, 0xFF, 0xDC]);
        assert_eq!(&bytes[7..10], &[0x46, 0x00, 0x13]);
        assert_eq!(&bytes[10..], &FTP_TARGET_UUID);
    }

    #[test]
    fn disconnect_layout() {
        assert_eq!(
            ObexRequest::disconnect(0x11223344).to_bytes(),
            vec![0x81, 0x00, 0x08, 0xCB, 0x11, 0x22, 0x33, 0x44]
        );
    }

    #[test]
    fn list_folder_has_three_headers() {
        let request = ObexRequest::list_folder(1);
        assert!(request.is_folder_listing());
        assert_eq!(request.headers[0].id, HeaderId::ConnectionId as u8);
        assert_eq!(request.headers[1], ObexHeader::empty(HeaderId::Name));
        assert_eq!(request.headers[2].bytes(), FOLDER_LISTING_TYPE);
        // 3 + 5 + 3 + (3 + 22)
        assert_eq!(request.len(), 36);
    }

    #[test]
    fn get_file_is_not_a_listing() {
        let request = ObexRequest::get_file("a.pdf", 1);
        assert!(!request.is_folder_listing());
        assert_eq!(request.name().as_deref(), Some("a.pdf"));
    }

    #[test]
    fn set_path_up_has_no_name() {
        let request = ObexRequest::set_path("..", 9);
        assert_eq!(
            request.set_path_flags(),
            SetPathFlags::BACKUP | SetPathFlags::DONT_CREATE_FOLDER
        );
        assert!(request.header(HeaderId::Name).is_none());
        assert_eq!(
            request.to_bytes(),
            vec![0x85, 0x00, 0x0A, 0x03, 0x00, 0xCB, 0x00, 0x00, 0x00, 0x09]
        );
    }

    #[test]
    fn set_path_root_has_empty_name() {
        let request = ObexRequest::set_path("", 1);
        assert_eq!(request.set_path_flags(), SetPathFlags::DONT_CREATE_FOLDER);
        assert_eq!(request.headers[0], ObexHeader::empty(HeaderId::Name));
        assert_eq!(request.name(), None);
    }

    #[test]
    fn set_path_child_names_folder() {
        let request = ObexRequest::set_path("notes", 1);
        assert_eq!(request.name().as_deref(), Some("notes"));
        assert_eq!(request.headers.len(), 2);
    }

    #[test]
    fn delete_is_put_with_name() {
        let request = ObexRequest::delete("x", 3);
        assert_eq!(request.opcode, Opcode::Put);
        assert_eq!(request.name().as_deref(), Some("x"));
        assert_eq!(request.len(), 3 + 7 + 5);
    }

    #[test]
    fn length_field_matches_encoded_size() {
        for request in [
            ObexRequest::connect(),
            ObexRequest::disconnect(1),
            ObexRequest::list_folder(1),
            ObexRequest::set_path("..", 1),
            ObexRequest::set_path("folder", 1),
            ObexRequest::delete("file.pdf", 1),
            ObexRequest::get_file("file.pdf", 1),
        ] {
            let bytes = request.to_bytes();
            assert_eq!(bytes.len(), request.len());
            assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]) as usize, bytes.len());
        }
    }

    #[test]
    fn parse_recovers_request() {
        for request in [
            ObexRequest::connect(),
            ObexRequest::list_folder(5),
            ObexRequest::set_path("..", 5),
            ObexRequest::get_file("file.pdf", 5),
        ] {
            assert_eq!(ObexRequest::parse(&request.to_bytes()).unwrap(), request);
        }
    }

    #[test]
    fn parse_rejects_unknown_opcode() {
        assert!(matches!(
            ObexRequest::parse(&[0x84, 0x00, 0x03]),
            Err(SyncError::UnknownVariant { .. })
        ));
    }
}
