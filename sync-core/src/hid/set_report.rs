//! Host-to-device SET_REPORT requests.
//!
//! ```text
//! CONTROL | 0x50 | report type | report id | report id | 0x00 | data …
//! ```
//!
//! The report id is sent twice followed by a zero byte; the device
//! firmware expects that layout.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::SyncError;
use crate::frame;
use crate::hid::{Channel, MessageType};

// ── ReportType / ReportId ────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Input = 0x01,
    Output = 0x02,
    Feature = 0x03,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportId {
    OperationRequest = 0x04,
    Mode = 0x05,
    Date = 0x06,
    Device = 0x08,
}

// ── DeviceMode ───────────────────────────────────────────────────

/// Operating mode of the tablet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceMode {
    /// Nothing selected; the link is down or the mode is unknown.
    #[default]
    None = 0x01,
    /// Stream capture reports in real time.
    Capture = 0x04,
    /// Expose stored pages over the file-transfer link.
    File = 0x05,
}

impl TryFrom<u8> for DeviceMode {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DeviceMode::None),
            0x04 => Ok(DeviceMode::Capture),
            0x05 => Ok(DeviceMode::File),
            _ => Err(SyncError::UnknownVariant {
                type_name: "DeviceMode",
                value: value as u64,
            }),
        }
    }
}

impl std::str::FromStr for DeviceMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DeviceMode::None),
            "capture" => Ok(DeviceMode::Capture),
            "file" => Ok(DeviceMode::File),
            _ => Err(SyncError::Other(format!("unknown device mode '{s}'"))),
        }
    }
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Capture => write!(f, "capture"),
            Self::File => write!(f, "file"),
        }
    }
}

// ── SetReport ────────────────────────────────────────────────────

/// Host kind announced by [`SetReport::inform_device`].
const HOST_KIND: u8 = 0x08;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReport {
    pub report_type: ReportType,
    pub report_id: ReportId,
    pub data: Vec<u8>,
}

impl SetReport {
    pub fn new(report_type: ReportType, report_id: ReportId, data: Vec<u8>) -> Self {
        Self {
            report_type,
            report_id,
            data,
        }
    }

    /// Clear the tablet's screen.
    pub fn erase() -> Self {
        Self::new(ReportType::Feature, ReportId::OperationRequest, vec![0x01])
    }

    pub fn set_mode(mode: DeviceMode) -> Self {
        Self::new(ReportType::Feature, ReportId::Mode, vec![mode as u8])
    }

    /// Set the device clock. Fields are packed FAT-style with two-second
    /// resolution and a 1980 epoch.
    pub fn set_date(at: NaiveDateTime) -> Self {
        let second = at.second() as u8;
        let minute = at.minute() as u8;
        let hour = at.hour() as u8;
        let day = at.day() as u8;
        let month = at.month() as u8;
        let year = (at.year() - 1980).clamp(0, 127) as u8;

        let data = vec![
            (minute << 5) | (second / 2),
            (hour << 3) | (minute >> 3),
            (month << 5) | day,
            (year << 1) | (month >> 3),
        ];
        Self::new(ReportType::Feature, ReportId::Date, data)
    }

    /// Tell the tablet what kind of host is attached.
    pub fn inform_device() -> Self {
        Self::new(
            ReportType::Feature,
            ReportId::Device,
            vec![HOST_KIND, 0x00, 0x00, 0x00],
        )
    }

    pub fn header(&self) -> u8 {
        ((MessageType::SetReport as u8) << 4) | self.report_type as u8
    }

    /// Unframed packet bytes.
    pub fn to_packet(&self) -> Vec<u8> {
        let id = self.report_id as u8;
        let mut packet = Vec::with_capacity(5 + self.data.len());
        packet.extend_from_slice(&[Channel::Control as u8, self.header(), id, id, 0x00]);
        packet.extend_from_slice(&self.data);
        packet
    }

    /// Complete wire frame.
    pub fn to_frame(&self) -> Result<Vec<u8>, SyncError> {
        frame::frame(&self.to_packet())
    }
}
