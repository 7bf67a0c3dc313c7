//! Link lifecycle shared by the streaming and file-transfer sessions.
//!
//! Transitions are validated and return `Result` instead of panicking;
//! a broken link skips validation through
//! [`ConnectionPhase::force_disconnect`].

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::SyncError;

/// The current phase of a device link.
///
/// ```text
///  Disconnected ──► Connecting ──► Handshaking ──► Connected
///       ▲                                │              │
///       │                                ▼              ▼
///       └──────── (link down) ◄──── Disconnecting ◄─────┘
/// ```
///
/// Any phase drops straight back to `Disconnected` when the link breaks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,

    /// Transport connect in progress.
    Connecting,

    /// Byte channel is up; session setup (OBEX CONNECT, device mode
    /// configuration) in progress.
    Handshaking,

    Connected {
        since: Instant,
    },

    /// Local close or OBEX DISCONNECT in progress. Ends when the link
    /// reports broken.
    Disconnecting,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Handshaking => "Handshaking",
            Self::Connected { .. } => "Connected",
            Self::Disconnecting => "Disconnecting",
        };
        f.write_str(name)
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Time spent in `Connected`, `None` in any other phase.
    pub fn connected_duration(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn advance(&mut self, allowed: bool, next: Self, refusal: &'static str) -> Result<(), SyncError> {
        if !allowed {
            return Err(SyncError::InvalidState(refusal));
        }
        *self = next;
        Ok(())
    }

    // ── Transitions ──────────────────────────────────────────────

    pub fn begin_connect(&mut self) -> Result<(), SyncError> {
        self.advance(
            self.is_disconnected(),
            Self::Connecting,
            "link already open or opening",
        )
    }

    /// The byte channel is open.
    pub fn begin_handshake(&mut self) -> Result<(), SyncError> {
        self.advance(
            *self == Self::Connecting,
            Self::Handshaking,
            "no connect attempt in progress",
        )
    }

    pub fn complete_handshake(&mut self) -> Result<(), SyncError> {
        self.advance(
            *self == Self::Handshaking,
            Self::Connected {
                since: Instant::now(),
            },
            "no session setup in progress",
        )
    }

    /// Valid while the byte channel is open and not already closing.
    pub fn begin_disconnect(&mut self) -> Result<(), SyncError> {
        self.advance(
            matches!(self, Self::Handshaking | Self::Connected { .. }),
            Self::Disconnecting,
            "no open session to close",
        )
    }

    /// The link is gone, whatever the phase was.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close() {
        let mut phase = ConnectionPhase::default();
        assert!(phase.is_disconnected());

        phase.begin_connect().unwrap();
        phase.begin_handshake().unwrap();
        assert_eq!(phase, ConnectionPhase::Handshaking);
        assert_eq!(phase.connected_duration(), None);

        phase.complete_handshake().unwrap();
        assert!(phase.is_connected());
        assert!(phase.connected_duration().is_some());

        phase.begin_disconnect().unwrap();
        assert_eq!(phase, ConnectionPhase::Disconnecting);
        phase.force_disconnect();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn second_open_is_refused() {
        let mut phase = ConnectionPhase::Connecting;
        assert!(matches!(
            phase.begin_connect(),
            Err(SyncError::InvalidState(_))
        ));
        assert_eq!(phase, ConnectionPhase::Connecting);
    }

    #[test]
    fn handshake_needs_a_connect_attempt() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.begin_handshake().is_err());
        assert!(phase.complete_handshake().is_err());
        assert!(phase.is_disconnected());
    }

    #[test]
    fn setup_can_be_abandoned() {
        let mut phase = ConnectionPhase::Connecting;
        phase.begin_handshake().unwrap();
        phase.begin_disconnect().unwrap();
        assert!(phase.begin_disconnect().is_err());
    }

    #[test]
    fn nothing_to_close_while_connecting() {
        let mut phase = ConnectionPhase::Connecting;
        assert!(phase.begin_disconnect().is_err());
        phase.force_disconnect();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn display_names() {
        assert_eq!(ConnectionPhase::Disconnecting.to_string(), "Disconnecting");
        let connected = ConnectionPhase::Connected {
            since: Instant::now(),
        };
        assert_eq!(connected.to_string(), "Connected");
    }
}
