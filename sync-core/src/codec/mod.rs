//! `tokio_util::codec` adapters for the two device links.
//!
//! - [`HidCodec`]: streaming link. Unframes, verifies and classifies
//!   incoming bytes; frames outgoing SET_REPORTs and keep-alives.
//! - [`ObexCodec`]: file-transfer link. Segments responses by their length
//!   field; encodes requests.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::SyncError;
use crate::frame::{FEND, FrameScanner};
use crate::hid::{self, HidMessage, SetReport};
use crate::obex::{ObexRequest, ObexResponse};

// ── HidCodec ─────────────────────────────────────────────────────

/// Items written to the streaming link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidOutbound {
    Report(SetReport),
    /// A lone frame delimiter; keeps the device's capture session alive.
    KeepAlive,
}

#[derive(Debug, Default)]
pub struct HidCodec {
    scanner: FrameScanner,
}

impl HidCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames dropped for bad length or checksum so far.
    pub fn dropped_frames(&self) -> u64 {
        self.scanner.dropped()
    }
}

impl Decoder for HidCodec {
    type Item = HidMessage;
    type Error = SyncError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let Some(payload) = self.scanner.push(src.get_u8()) else {
                continue;
            };
            match hid::decode(&payload) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => debug!("dropping payload: {e}"),
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A partial frame at end of stream is noise, not an error.
        let item = self.decode(src)?;
        if item.is_none() {
            self.scanner.reset();
        }
        Ok(item)
    }
}

impl Encoder<HidOutbound> for HidCodec {
    type Error = SyncError;

    fn encode(&mut self, item: HidOutbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            HidOutbound::Report(report) => dst.extend_from_slice(&report.to_frame()?),
            HidOutbound::KeepAlive => dst.put_u8(FEND),
        }
        Ok(())
    }
}

// ── ObexCodec ────────────────────────────────────────────────────

const OBEX_PREFIX_LEN: usize = 3;

#[derive(Debug, Default)]
pub struct ObexCodec;

impl Decoder for ObexCodec {
    type Item = ObexResponse;
    type Error = SyncError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < OBEX_PREFIX_LEN {
            return Ok(None);
        }

        let length = u16::from_be_bytes([src[1], src[2]]) as usize;
        if length < OBEX_PREFIX_LEN {
            return Err(SyncError::MalformedPacket("response length below 3"));
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let packet = src.split_to(length);
        ObexResponse::parse(&packet).map(Some)
    }
}

impl Encoder<ObexRequest> for ObexCodec {
    type Error = SyncError;

    fn encode(&mut self, item: ObexRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = item.to_bytes();
        dst.reserve(bytes.len());
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
