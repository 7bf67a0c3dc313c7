//! HID-style message layer carried inside verified frames.
//!
//! ```text
//! channel(1) | type << 4 | parameter (1) | [report id (1)] | [data …]
//! ```
//!
//! [`decode`] classifies a verified payload into a [`HidMessage`];
//! [`SetReport`] builds the packets the host sends back.

pub mod report;
pub mod set_report;

use std::fmt;

use crate::error::SyncError;

pub use report::{CaptureReport, MAX_X, MAX_Y, ReportFlags};
pub use set_report::{DeviceMode, ReportId, ReportType, SetReport};

// ── Channel ──────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Control = 0x00,
    Interrupt = 0x01,
}

impl TryFrom<u8> for Channel {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Channel::Control),
            0x01 => Ok(Channel::Interrupt),
            _ => Err(SyncError::UnknownVariant {
                type_name: "Channel",
                value: value as u64,
            }),
        }
    }
}

// ── MessageType ──────────────────────────────────────────────────

/// High nibble of the header byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Handshake = 0x0,
    Control = 0x1,
    GetReport = 0x4,
    SetReport = 0x5,
    GetProtocol = 0x6,
    SetProtocol = 0x7,
    Data = 0xA,
}

impl TryFrom<u8> for MessageType {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(MessageType::Handshake),
            0x1 => Ok(MessageType::Control),
            0x4 => Ok(MessageType::GetReport),
            0x5 => Ok(MessageType::SetReport),
            0x6 => Ok(MessageType::GetProtocol),
            0x7 => Ok(MessageType::SetProtocol),
            0xA => Ok(MessageType::Data),
            _ => Err(SyncError::UnknownVariant {
                type_name: "MessageType",
                value: value as u64,
            }),
        }
    }
}

// ── HandshakeResult ──────────────────────────────────────────────

/// Result code carried in the parameter nibble of a handshake.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeResult {
    Successful = 0x00,
    NotReady = 0x01,
    InvalidReportId = 0x02,
    UnsupportedRequest = 0x03,
    InvalidParameter = 0x04,
    Unknown = 0x0E,
    Fatal = 0x0F,
}

impl HandshakeResult {
    /// Map a raw code onto a defined result.
    ///
    /// Codes between `InvalidParameter` and `Unknown` become
    /// `UnsupportedRequest`; negative codes and codes above `Fatal` become
    /// `InvalidParameter`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0x00 => Self::Successful,
            0x01 => Self::NotReady,
            0x02 => Self::InvalidReportId,
            0x03 => Self::UnsupportedRequest,
            0x04 => Self::InvalidParameter,
            0x05..=0x0D => Self::UnsupportedRequest,
            0x0E => Self::Unknown,
            0x0F => Self::Fatal,
            _ => Self::InvalidParameter,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Successful
    }
}

impl fmt::Display for HandshakeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Successful => "successful",
            Self::NotReady => "not ready",
            Self::InvalidReportId => "invalid report id",
            Self::UnsupportedRequest => "unsupported request",
            Self::InvalidParameter => "invalid parameter",
            Self::Unknown => "unknown error",
            Self::Fatal => "fatal error",
        };
        f.write_str(s)
    }
}

// ── HidMessage ───────────────────────────────────────────────────

/// A classified payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidMessage {
    /// Control-channel handshake reply.
    Handshake(HandshakeResult),
    /// Pen sample on the interrupt channel.
    CaptureReport(CaptureReport),
    /// Any other channel/type combination.
    Generic {
        channel: u8,
        message_type: u8,
        parameter: u8,
    },
}

/// Split a header byte into `(type, parameter)`.
pub fn split_header(header: u8) -> (u8, u8) {
    let message_type = header >> 4;
    (message_type, (message_type << 4) ^ header)
}

/// Classify a verified payload (checksum already stripped).
pub fn decode(payload: &[u8]) -> Result<HidMessage, SyncError> {
    if payload.len() < 2 {
        return Err(SyncError::Truncated {
            needed: 2,
            available: payload.len(),
        });
    }

    let channel = payload[0];
    let (message_type, parameter) = split_header(payload[1]);

    let control = channel == Channel::Control as u8;
    let interrupt = channel == Channel::Interrupt as u8;

    if control && message_type == MessageType::Handshake as u8 && payload.len() == 2 {
        return Ok(HidMessage::Handshake(HandshakeResult::from_code(
            parameter as i32,
        )));
    }

    if interrupt && message_type == MessageType::Data as u8 {
        if let Ok(report) = CaptureReport::parse(&payload[2..]) {
            return Ok(HidMessage::CaptureReport(report));
        }
    }

    Ok(HidMessage::Generic {
        channel,
        message_type,
        parameter,
    })
}

// ── Tests ────────────────────────────────────────────────────────
