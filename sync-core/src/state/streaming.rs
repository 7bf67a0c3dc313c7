//! Streaming session: device mode, stroke reconstruction and the drawn
//! page.
//!
//! Sans-IO like [`crate::state::TransferSession`]: decoded messages go in
//! through [`StreamingSession::handle_message`], outgoing reports come out
//! of [`StreamingSession::poll_transmit`].

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use tracing::{debug, info, trace, warn};

use crate::codec::HidOutbound;
use crate::error::SyncError;
use crate::hid::{CaptureReport, DeviceMode, HidMessage, ReportFlags, SetReport};
use crate::listener::StreamingListener;
use crate::state::connection::ConnectionPhase;
use crate::stroke::{PathSegment, StrokeFilter};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamingEvent {
    CaptureReport(CaptureReport),
    DrawnPaths(Vec<PathSegment>),
    Erase,
    Save,
}

impl StreamingEvent {
    pub fn deliver(self, listener: &mut dyn StreamingListener) {
        match self {
            Self::CaptureReport(report) => listener.on_capture_report(&report),
            Self::DrawnPaths(paths) => listener.on_drawn_paths(&paths),
            Self::Erase => listener.on_erase(),
            Self::Save => listener.on_save(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StreamingSession {
    phase: ConnectionPhase,
    mode: DeviceMode,
    filter: StrokeFilter,
    /// Every segment drawn on the current page.
    paths: Vec<PathSegment>,
    outbound: VecDeque<HidOutbound>,
}

impl StreamingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn paths(&self) -> &[PathSegment] {
        &self.paths
    }

    pub fn poll_transmit(&mut self) -> Option<HidOutbound> {
        self.outbound.pop_front()
    }

    // ── Link lifecycle ───────────────────────────────────────────

    pub fn begin_connect(&mut self) -> Result<(), SyncError> {
        self.phase.begin_connect()
    }

    /// The byte channel is open. Puts the device in file mode, sets its
    /// clock to `now` and announces the host.
    pub fn link_up(&mut self, now: NaiveDateTime) -> Result<(), SyncError> {
        self.phase.begin_handshake()?;
        self.phase.complete_handshake()?;
        info!("streaming link up");

        self.set_mode(DeviceMode::File)?;
        self.send(SetReport::set_date(now));
        self.send(SetReport::inform_device());
        Ok(())
    }

    pub fn begin_close(&mut self) {
        if self.phase.begin_disconnect().is_err() {
            debug!(phase = %self.phase, "close requested outside an open session");
        }
    }

    /// The byte channel is gone; mode and page are forgotten.
    pub fn link_down(&mut self) {
        self.phase.force_disconnect();
        self.mode = DeviceMode::None;
        self.paths.clear();
        self.filter.reset();
        self.outbound.clear();
    }

    // ── Commands ─────────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<(), SyncError> {
        if self.phase.is_connected() {
            Ok(())
        } else {
            Err(SyncError::InvalidState("streaming link not connected"))
        }
    }

    fn send(&mut self, report: SetReport) {
        debug!(id = ?report.report_id, data = ?report.data, "queueing set report");
        self.outbound.push_back(HidOutbound::Report(report));
    }

    pub fn set_mode(&mut self, mode: DeviceMode) -> Result<(), SyncError> {
        self.ensure_connected()?;
        if mode == self.mode {
            return Err(SyncError::InvalidState("device already in requested mode"));
        }
        self.send(SetReport::set_mode(mode));
        info!(from = %self.mode, to = %mode, "device mode changed");
        self.mode = mode;
        Ok(())
    }

    /// Blank the device screen and the drawn page.
    pub fn erase(&mut self) -> Result<(), SyncError> {
        self.ensure_connected()?;
        self.paths.clear();
        self.send(SetReport::erase());
        Ok(())
    }

    /// Queue a keep-alive byte. Only capture mode needs one; returns
    /// whether a byte was queued.
    pub fn keep_alive(&mut self) -> bool {
        if self.mode != DeviceMode::Capture || !self.phase.is_connected() {
            return false;
        }
        trace!("queueing keep-alive");
        self.outbound.push_back(HidOutbound::KeepAlive);
        true
    }

    // ── Incoming ─────────────────────────────────────────────────

    pub fn handle_message(&mut self, message: HidMessage) -> Vec<StreamingEvent> {
        match message {
            HidMessage::CaptureReport(report) => self.handle_report(report),
            HidMessage::Handshake(result) if result.is_success() => {
                debug!("device acknowledged request");
                Vec::new()
            }
            HidMessage::Handshake(result) => {
                warn!(%result, "device rejected request");
                Vec::new()
            }
            HidMessage::Generic {
                channel,
                message_type,
                parameter,
            } => {
                trace!(channel, message_type, parameter, "ignoring message");
                Vec::new()
            }
        }
    }

    fn handle_report(&mut self, report: CaptureReport) -> Vec<StreamingEvent> {
        let mut events = vec![StreamingEvent::CaptureReport(report)];

        let segments = self.filter.process(&report);
        if !segments.is_empty() {
            self.paths.extend_from_slice(&segments);
            events.push(StreamingEvent::DrawnPaths(segments));
        }

        if report.flags.contains(ReportFlags::ERASE_SWITCH) {
            info!(cleared = self.paths.len(), "erase button pressed");
            self.paths.clear();
            events.push(StreamingEvent::Erase);
        }
        if report.flags.contains(ReportFlags::SAVE_COMPLETE) {
            info!(paths = self.paths.len(), "page saved");
            events.push(StreamingEvent::Save);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{HandshakeResult, ReportId};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 10, 21)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap()
    }

    fn connected() -> StreamingSession {
        let mut session = StreamingSession::new();
        session.begin_connect().unwrap();
        session.link_up(now()).unwrap();
        while session.poll_transmit().is_some() {}
        session
    }

    fn report(x: u16, flags: ReportFlags) -> HidMessage {
        HidMessage::CaptureReport(CaptureReport {
            report_id: 1,
            x,
            y: 3000,
            pressure: 400,
            flags,
        })
    }

    fn contact() -> ReportFlags {
        ReportFlags::READY | ReportFlags::TIP_SWITCH
    }

    fn report_ids(session: &mut StreamingSession) -> Vec<ReportId> {
        std::iter::from_fn(|| session.poll_transmit())
            .filter_map(|o| match o {
                HidOutbound::Report(r) => Some(r.report_id),
                HidOutbound::KeepAlive => None,
            })
            .collect()
    }

    #[test]
    fn link_up_configures_device() {
        let mut session = StreamingSession::new();
        session.begin_connect().unwrap();
        session.link_up(now()).unwrap();

        assert!(session.phase().is_connected());
        assert_eq!(session.mode(), DeviceMode::File);
        assert_eq!(
            report_ids(&mut session),
            [ReportId::Mode, ReportId::Date, ReportId::Device]
        );
    }

    #[test]
    fn mode_change_rules() {
        let mut session = StreamingSession::new();
        assert!(matches!(
            session.set_mode(DeviceMode::Capture),
            Err(SyncError::InvalidState(_))
        ));

        let mut session = connected();
        assert!(session.set_mode(DeviceMode::File).is_err());
        assert!(session.poll_transmit().is_none());

        session.set_mode(DeviceMode::Capture).unwrap();
        assert_eq!(session.mode(), DeviceMode::Capture);
        assert_eq!(
            session.poll_transmit(),
            Some(HidOutbound::Report(SetReport::set_mode(DeviceMode::Capture)))
        );
    }

    #[test]
    fn keep_alive_only_in_capture_mode() {
        let mut session = connected();
        assert!(!session.keep_alive());

        session.set_mode(DeviceMode::Capture).unwrap();
        session.poll_transmit();
        assert!(session.keep_alive());
        assert_eq!(session.poll_transmit(), Some(HidOutbound::KeepAlive));
    }

    #[test]
    fn strokes_accumulate_into_page() {
        let mut session = connected();
        let mut drawn = 0;
        for i in 0..40u16 {
            for event in session.handle_message(report(1000 + i * 30, contact())) {
                if let StreamingEvent::DrawnPaths(paths) = event {
                    drawn += paths.len();
                }
            }
        }
        assert!(drawn > 0);
        assert_eq!(session.paths().len(), drawn);
    }

    #[test]
    fn every_report_is_forwarded() {
        let mut session = connected();
        let events = session.handle_message(report(10, ReportFlags::READY));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamingEvent::CaptureReport(_)));
    }

    #[test]
    fn erase_switch_clears_page() {
        let mut session = connected();
        for i in 0..40u16 {
            session.handle_message(report(1000 + i * 30, contact()));
        }
        assert!(!session.paths().is_empty());

        let events =
            session.handle_message(report(0, ReportFlags::READY | ReportFlags::ERASE_SWITCH));
        assert!(events.contains(&StreamingEvent::Erase));
        assert!(session.paths().is_empty());
    }

    #[test]
    fn save_complete_fires_save() {
        let mut session = connected();
        let events =
            session.handle_message(report(0, ReportFlags::READY | ReportFlags::SAVE_COMPLETE));
        assert_eq!(events.last(), Some(&StreamingEvent::Save));
    }

    #[test]
    fn erase_command_clears_and_sends() {
        let mut session = connected();
        for i in 0..40u16 {
            session.handle_message(report(1000 + i * 30, contact()));
        }
        session.erase().unwrap();
        assert!(session.paths().is_empty());
        assert_eq!(report_ids(&mut session), [ReportId::OperationRequest]);
    }

    #[test]
    fn handshakes_produce_no_events() {
        let mut session = connected();
        let ok = HidMessage::Handshake(HandshakeResult::Successful);
        let bad = HidMessage::Handshake(HandshakeResult::UnsupportedRequest);
        assert!(session.handle_message(ok).is_empty());
        assert!(session.handle_message(bad).is_empty());
    }

    #[test]
    fn link_down_resets_everything() {
        let mut session = connected();
        session.set_mode(DeviceMode::Capture).unwrap();
        for i in 0..40u16 {
            session.handle_message(report(1000 + i * 30, contact()));
        }

        session.link_down();
        assert!(session.phase().is_disconnected());
        assert_eq!(session.mode(), DeviceMode::None);
        assert!(session.paths().is_empty());
        assert!(session.poll_transmit().is_none());
        assert!(session.erase().is_err());
        assert!(!session.keep_alive());
    }
}
