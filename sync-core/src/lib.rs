//! # sync-core
//!
//! Host-side link library for the Sync writing tablet.
//!
//! This crate contains:
//! - **Framing**: `frame` escaping, checksum and the `FrameScanner`
//! - **HID**: capture reports, handshakes and outgoing SET_REPORTs
//! - **OBEX**: the folder-browsing client subset, requests, responses and listings
//! - **Codec**: `HidCodec` and `ObexCodec` for framed I/O via `tokio_util`
//! - **Stroke**: `StrokeFilter` turning pen samples into smoothed segments
//! - **State**: connection phases plus the sans-IO streaming and transfer sessions
//! - **Network**: `Transport`, the `Link` I/O task and the `Connector`
//! - **Service**: streaming and file-transfer actors driven through handles
//! - **Error**: `SyncError`, a typed `thiserror`-based error enum

pub mod codec;
pub mod error;
pub mod frame;
pub mod hid;
pub mod listener;
pub mod network;
pub mod obex;
pub mod service;
pub mod state;
pub mod stroke;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{HidCodec, HidOutbound, ObexCodec};
pub use error::SyncError;
pub use frame::FrameScanner;
pub use hid::{CaptureReport, DeviceMode, HandshakeResult, HidMessage, ReportFlags, SetReport};
pub use listener::{FtpListener, ResultCode, StreamingListener};
pub use network::{Link, LinkEvent, TcpTransport, Transport};
pub use obex::{FolderListingItem, ObexHeader, ObexRequest, ObexResponse, ResponseCode};
pub use service::{FtpHandle, StreamingHandle, StreamingOptions};
pub use state::{
    ConnectionPhase, FtpCommand, FtpEvent, RemotePath, StreamingEvent, StreamingSession,
    TransferSession,
};
pub use stroke::{PathSegment, PointF, StrokeFilter};
