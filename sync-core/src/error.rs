//! Domain-specific error types for the Sync link.
//!
//! All fallible operations return `Result<T, SyncError>`.
//! Malformed input never panics; framing noise is dropped before it
//! ever becomes an error (see [`crate::frame::FrameScanner`]).

use thiserror::Error;

/// The canonical error type for the Sync link.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Framing Errors ───────────────────────────────────────────
    /// An empty packet cannot be framed.
    #[error("cannot frame an empty packet")]
    EmptyPacket,

    /// A packet violated the wire layout.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// A packet or header ended before its declared length.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A folder listing could not be parsed.
    #[error("folder listing error: {0}")]
    Listing(String),

    // ── Session Errors ───────────────────────────────────────────
    /// The outgoing request queue is at capacity.
    #[error("request queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// A command was issued in a phase that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The transport reported an I/O error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A service or link channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for SyncError {
    fn from(s: String) -> Self {
        SyncError::Other(s)
    }
}

impl From<&str> for SyncError {
    fn from(s: &str) -> Self {
        SyncError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SyncError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SyncError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SyncError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SyncError::ChannelClosed
    }
}

impl From<quick_xml::Error> for SyncError {
    fn from(e: quick_xml::Error) -> Self {
        SyncError::Listing(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SyncError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        SyncError::Listing(e.to_string())
    }
}

impl From<chrono::ParseError> for SyncError {
    fn from(e: chrono::ParseError) -> Self {
        SyncError::Listing(format!("bad timestamp: {e}"))
    }
}
