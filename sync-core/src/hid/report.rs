//! Pen capture reports from the interrupt channel.

use bitflags::bitflags;
use serde::Serialize;

use crate::error::SyncError;

/// Largest x coordinate the digitizer reports.
pub const MAX_X: u16 = 20280;
/// Largest y coordinate the digitizer reports.
pub const MAX_Y: u16 = 13942;

/// Report id byte plus x, y, pressure and flags.
const REPORT_LEN: usize = 1 + 7;

bitflags! {
    /// Flag byte at the end of every capture report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct ReportFlags: u8 {
        const TIP_SWITCH = 0x01;
        const BARREL_SWITCH = 0x02;
        const READY = 0x04;
        /// The device finished saving the current page.
        const SAVE_COMPLETE = 0x10;
        /// The device finished erasing the screen.
        const ERASE_COMPLETE = 0x20;
        const SAVE_SWITCH = 0x40;
        const ERASE_SWITCH = 0x80;
    }
}

/// One stylus sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureReport {
    pub report_id: u8,
    pub x: u16,
    pub y: u16,
    pub pressure: u16,
    pub flags: ReportFlags,
}

impl CaptureReport {
    /// Parse from the bytes that follow the header byte: report id, then
    /// x, y and pressure as little-endian `u16`, then the flag byte.
    pub fn parse(data: &[u8]) -> Result<Self, SyncError> {
        if data.len() < REPORT_LEN {
            return Err(SyncError::Truncated {
                needed: REPORT_LEN,
                available: data.len(),
            });
        }

        Ok(Self {
            report_id: data[0],
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
            pressure: u16::from_le_bytes([data[5], data[6]]),
            flags: ReportFlags::from_bits_retain(data[7]),
        })
    }

    /// Serialise back to the wire layout accepted by [`parse`](Self::parse).
    pub fn to_bytes(&self) -> [u8; REPORT_LEN] {
        let x = self.x.to_le_bytes();
        let y = self.y.to_le_bytes();
        let p = self.pressure.to_le_bytes();
        [
            self.report_id,
            x[0],
            x[1],
            y[0],
            y[1],
            p[0],
            p[1],
            self.flags.bits(),
        ]
    }

    /// The pen is in range and touching the surface.
    pub fn is_contact(&self) -> bool {
        self.flags
            .contains(ReportFlags::READY | ReportFlags::TIP_SWITCH)
    }
}
