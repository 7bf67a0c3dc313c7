//! File-transfer session: sequences OBEX requests and interprets replies.
//!
//! The session does no I/O. Callers enqueue commands, drain encoded
//! requests with [`TransferSession::poll_transmit`], and feed every
//! response back through [`TransferSession::handle_response`], acting on
//! the returned [`SessionAction`]s. Exactly one request is awaiting a
//! reply at any time; replies carry no correlation id, so the reply is
//! always matched to that one request.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::listener::{FtpListener, ResultCode};
use crate::obex::{
    FolderListingItem, HeaderId, ObexRequest, ObexResponse, ResponseCode, SetPathFlags,
    parse_folder_listing,
};
use crate::state::connection::ConnectionPhase;

/// Commands that may wait behind the one in flight.
pub const QUEUE_CAPACITY: usize = 10;

// ── RemotePath ───────────────────────────────────────────────────

/// Working folder on the device, tracked from successful SET_PATH replies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `"/"` returns to the root, `".."` (or `"../"`) drops the last
    /// segment, anything else is appended.
    pub fn apply(&mut self, segment: &str) {
        match segment {
            "/" => self.segments.clear(),
            ".." | "../" => {
                self.segments.pop();
            }
            other => self.segments.push(other.trim_matches('/').to_string()),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

// ── Commands and events ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpCommand {
    Connect,
    Disconnect,
    ListFolder,
    ChangeFolder(String),
    Delete(String),
    GetFile(FolderListingItem),
}

impl FtpCommand {
    fn request(&self, connection_id: u32) -> ObexRequest {
        match self {
            Self::Connect => ObexRequest::connect(),
            Self::Disconnect => ObexRequest::disconnect(connection_id),
            Self::ListFolder => ObexRequest::list_folder(connection_id),
            Self::ChangeFolder(name) => ObexRequest::set_path(name, connection_id),
            Self::Delete(name) => ObexRequest::delete(name, connection_id),
            Self::GetFile(item) => ObexRequest::get_file(&item.name, connection_id),
        }
    }

    /// Completion reported when the command can no longer be carried out.
    fn failed(&self) -> FtpEvent {
        match self {
            Self::Connect => FtpEvent::Connect(ResultCode::Fail),
            Self::Disconnect => FtpEvent::Disconnect(ResultCode::Fail),
            Self::ListFolder => FtpEvent::FolderListing(None),
            Self::ChangeFolder(_) => FtpEvent::ChangeFolder(None),
            Self::Delete(_) => FtpEvent::Delete(None),
            Self::GetFile(_) => FtpEvent::GetFile(None),
        }
    }
}

/// Command completion. A `None` payload means the command failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpEvent {
    Connect(ResultCode),
    Disconnect(ResultCode),
    FolderListing(Option<Vec<FolderListingItem>>),
    ChangeFolder(Option<RemotePath>),
    Delete(Option<String>),
    GetFile(Option<FolderListingItem>),
}

impl FtpEvent {
    pub fn result(&self) -> ResultCode {
        match self {
            Self::Connect(r) | Self::Disconnect(r) => *r,
            Self::FolderListing(v) => ResultCode::from_success(v.is_some()),
            Self::ChangeFolder(v) => ResultCode::from_success(v.is_some()),
            Self::Delete(v) => ResultCode::from_success(v.is_some()),
            Self::GetFile(v) => ResultCode::from_success(v.is_some()),
        }
    }

    pub fn deliver(self, listener: &mut dyn FtpListener) {
        let result = self.result();
        match self {
            Self::Connect(r) => listener.on_connect_complete(r),
            Self::Disconnect(r) => listener.on_disconnect_complete(r),
            Self::FolderListing(items) => listener.on_folder_listing_complete(items, result),
            Self::ChangeFolder(path) => listener.on_change_folder_complete(path, result),
            Self::Delete(name) => listener.on_delete_complete(name, result),
            Self::GetFile(item) => listener.on_get_file_complete(item, result),
        }
    }
}

/// What the owner of the link must do after a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Notify(FtpEvent),
    /// Close the byte channel.
    Close,
}

// ── TransferSession ──────────────────────────────────────────────

#[derive(Debug)]
struct InFlight {
    command: FtpCommand,
    request: ObexRequest,
    retried: bool,
}

#[derive(Debug, Default)]
pub struct TransferSession {
    phase: ConnectionPhase,
    connection_id: Option<u32>,
    path: RemotePath,
    queue: VecDeque<FtpCommand>,
    in_flight: Option<InFlight>,
    outbound: VecDeque<ObexRequest>,
    /// Accumulates BODY fragments of the GET in flight.
    body: Vec<u8>,
}

impl TransferSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn connection_id(&self) -> Option<u32> {
        self.connection_id
    }

    /// Commands waiting behind the one in flight.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.in_flight.is_some()
    }

    // ── Link lifecycle ───────────────────────────────────────────

    /// A transport connect was started.
    pub fn begin_connect(&mut self) -> Result<(), SyncError> {
        self.phase.begin_connect()
    }

    /// The byte channel is open; queued commands start flowing.
    pub fn link_up(&mut self) -> Result<(), SyncError> {
        self.phase.begin_handshake()?;
        self.dispatch_next();
        Ok(())
    }

    /// Local close requested.
    pub fn begin_close(&mut self) {
        if self.phase.begin_disconnect().is_err() {
            debug!(phase = %self.phase, "close requested outside an open session");
        }
    }

    /// The byte channel is gone. Every queued and in-flight command
    /// resolves as failed.
    pub fn link_down(&mut self) -> Vec<FtpEvent> {
        let events = self.abandon_all();
        self.phase.force_disconnect();
        self.connection_id = None;
        self.path = RemotePath::root();
        events
    }

    fn abandon_all(&mut self) -> Vec<FtpEvent> {
        self.outbound.clear();
        self.body.clear();
        self.in_flight
            .take()
            .map(|f| f.command)
            .into_iter()
            .chain(self.queue.drain(..))
            .map(|c| c.failed())
            .collect()
    }

    // ── Commands ─────────────────────────────────────────────────

    pub fn enqueue(&mut self, command: FtpCommand) -> Result<(), SyncError> {
        match (&self.phase, &command) {
            (ConnectionPhase::Disconnected | ConnectionPhase::Disconnecting, _) => {
                return Err(SyncError::InvalidState("no open link"));
            }
            (ConnectionPhase::Connected { .. }, FtpCommand::Connect) => {
                return Err(SyncError::InvalidState("session already connected"));
            }
            _ => {}
        }
        if self.queue.len() >= QUEUE_CAPACITY {
            return Err(SyncError::QueueFull {
                capacity: QUEUE_CAPACITY,
            });
        }

        debug!(?command, "command queued");
        self.queue.push_back(command);
        self.dispatch_next();
        Ok(())
    }

    pub fn connect(&mut self) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::Connect)
    }

    pub fn disconnect(&mut self) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::Disconnect)
    }

    pub fn list_folder(&mut self) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::ListFolder)
    }

    pub fn change_folder(&mut self, name: impl Into<String>) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::ChangeFolder(name.into()))
    }

    pub fn delete_file(&mut self, name: impl Into<String>) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::Delete(name.into()))
    }

    pub fn get_file(&mut self, item: FolderListingItem) -> Result<(), SyncError> {
        self.enqueue(FtpCommand::GetFile(item))
    }

    /// Next request to write to the link.
    pub fn poll_transmit(&mut self) -> Option<ObexRequest> {
        self.outbound.pop_front()
    }

    fn dispatch_next(&mut self) {
        let ready = matches!(
            self.phase,
            ConnectionPhase::Handshaking | ConnectionPhase::Connected { .. }
        );
        if !ready || self.in_flight.is_some() {
            return;
        }
        let Some(command) = self.queue.pop_front() else {
            return;
        };

        if command == FtpCommand::Disconnect {
            self.begin_close();
        }
        // Built at dispatch so commands queued behind CONNECT pick up the
        // id it hands out.
        let request = command.request(self.connection_id.unwrap_or_default());
        debug!(opcode = %request.opcode, len = request.len(), "sending request");
        self.outbound.push_back(request.clone());
        self.in_flight = Some(InFlight {
            command,
            request,
            retried: false,
        });
    }

    fn resend(&mut self, in_flight: InFlight) {
        self.outbound.push_back(in_flight.request.clone());
        self.in_flight = Some(in_flight);
    }

    // ── Responses ────────────────────────────────────────────────

    pub fn handle_response(&mut self, response: ObexResponse) -> Vec<SessionAction> {
        let Some(current) = self.in_flight.take() else {
            debug!(code = %response.code, "unsolicited response dropped");
            return Vec::new();
        };

        if response.code.is_error() {
            warn!(
                code = %response.code,
                opcode = %current.request.opcode,
                "device refused request"
            );
        }

        let success = response.code == ResponseCode::Success;
        let mut actions = Vec::new();

        let InFlight {
            command,
            request,
            retried,
        } = current;
        match command {
            FtpCommand::Connect => match response.connection_id().filter(|_| success) {
                Some(id) => {
                    info!(connection_id = id, "session connected");
                    self.connection_id = Some(id);
                    if self.phase == ConnectionPhase::Handshaking {
                        // Handshaking -> Connected cannot fail here.
                        let _ = self.phase.complete_handshake();
                    }
                    actions.push(SessionAction::Notify(FtpEvent::Connect(ResultCode::Ok)));
                }
                None => {
                    self.begin_close();
                    actions.push(SessionAction::Notify(FtpEvent::Connect(ResultCode::Fail)));
                    actions.push(SessionAction::Close);
                }
            },

            FtpCommand::Disconnect => {
                info!(code = %response.code, "session disconnected");
                self.connection_id = None;
                actions.push(SessionAction::Notify(FtpEvent::Disconnect(
                    ResultCode::from_success(success),
                )));
                actions.push(SessionAction::Close);
            }

            FtpCommand::Delete(name) => {
                let deleted = success.then_some(name);
                actions.push(SessionAction::Notify(FtpEvent::Delete(deleted)));
            }

            FtpCommand::ChangeFolder(_) => {
                let event = if success {
                    let segment = request.name().unwrap_or_else(|| {
                        if request.set_path_flags().contains(SetPathFlags::BACKUP) {
                            "..".to_string()
                        } else {
                            "/".to_string()
                        }
                    });
                    self.path.apply(&segment);
                    info!(path = %self.path, "folder changed");
                    FtpEvent::ChangeFolder(Some(self.path.clone()))
                } else {
                    FtpEvent::ChangeFolder(None)
                };
                actions.push(SessionAction::Notify(event));
            }

            get @ (FtpCommand::ListFolder | FtpCommand::GetFile(_)) => {
                let current = InFlight {
                    command: get,
                    request,
                    retried,
                };
                return self.handle_get(current, response);
            }
        }

        self.dispatch_next();
        actions
    }

    fn handle_get(&mut self, mut current: InFlight, response: ObexResponse) -> Vec<SessionAction> {
        let listing = current.request.is_folder_listing();
        let event = match response.code {
            ResponseCode::Continue => {
                self.body.extend_from_slice(response.body(HeaderId::Body));
                debug!(received = self.body.len(), "pulling next fragment");
                self.resend(current);
                return Vec::new();
            }
            ResponseCode::Success => {
                self.body.extend_from_slice(response.body(HeaderId::EndOfBody));
                let data = std::mem::take(&mut self.body);
                self.finish_get(current.command, data)
            }
            _ if listing && !current.retried => {
                // Firmware sometimes refuses the first listing after a
                // folder change.
                debug!(code = %response.code, "retrying folder listing once");
                self.body.clear();
                current.retried = true;
                self.resend(current);
                return Vec::new();
            }
            _ => {
                self.body.clear();
                current.command.failed()
            }
        };

        self.dispatch_next();
        vec![SessionAction::Notify(event)]
    }

    fn finish_get(&self, command: FtpCommand, data: Vec<u8>) -> FtpEvent {
        match command {
            FtpCommand::GetFile(mut item) => {
                info!(name = %item.name, bytes = data.len(), "file fetched");
                item.data = data;
                FtpEvent::GetFile(Some(item))
            }
            _ => match parse_folder_listing(&data) {
                Ok(items) => {
                    info!(entries = items.len(), path = %self.path, "folder listed");
                    FtpEvent::FolderListing(Some(items))
                }
                Err(e) => {
                    warn!("unreadable folder listing: {e}");
                    FtpEvent::FolderListing(None)
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obex::{ObexHeader, Opcode};

    const LISTING: &[u8] = br#"<?xml version="1.0"?>
<folder-listing version="1.0">
  <file name="page1.pdf" size="2048" modified="20141022T100000"/>
  <folder name="SAVED" modified="20141021T100000"/>
</folder-listing>"#;

    fn linked() -> TransferSession {
        let mut session = TransferSession::new();
        session.begin_connect().unwrap();
        session.link_up().unwrap();
        session
    }

    fn connected(id: u32) -> TransferSession {
        let mut session = linked();
        session.connect().unwrap();
        assert_eq!(session.poll_transmit().unwrap().opcode, Opcode::Connect);
        let actions = session.handle_response(ObexResponse::connected(id));
        assert_eq!(
            actions,
            vec![SessionAction::Notify(FtpEvent::Connect(ResultCode::Ok))]
        );
        session
    }

    fn respond(code: ResponseCode) -> ObexResponse {
        ObexResponse::new(code)
    }

    fn body(code: ResponseCode, id: HeaderId, data: &[u8]) -> ObexResponse {
        ObexResponse::new(code).with_header(ObexHeader::with_bytes(id, data.to_vec()))
    }

    fn only_event(actions: Vec<SessionAction>) -> FtpEvent {
        match actions.as_slice() {
            [SessionAction::Notify(event)] => event.clone(),
            other => panic!("expected one notification, got {other:?}"),
        }
    }

    #[test]
    fn remote_path_updates() {
        let mut path = RemotePath::root();
        assert_eq!(path.to_string(), "/");
        path.apply("SAVED");
        path.apply("2014");
        assert_eq!(path.to_string(), "/SAVED/2014");
        path.apply("..");
        assert_eq!(path.to_string(), "/SAVED");
        path.apply("../");
        assert!(path.is_root());
        path.apply("..");
        assert!(path.is_root());
        path.apply("a");
        path.apply("/");
        assert!(path.is_root());
    }

    #[test]
    fn commands_rejected_without_link() {
        let mut session = TransferSession::new();
        assert!(matches!(
            session.list_folder(),
            Err(SyncError::InvalidState(_))
        ));
        assert!(session.poll_transmit().is_none());
    }

    #[test]
    fn connect_stores_connection_id() {
        let mut session = connected(0x1234);
        assert_eq!(session.connection_id(), Some(0x1234));
        assert!(session.phase().is_connected());
        assert!(!session.is_awaiting_response());

        session.list_folder().unwrap();
        let request = session.poll_transmit().unwrap();
        assert_eq!(
            request.header(HeaderId::ConnectionId).and_then(ObexHeader::as_u32),
            Some(0x1234)
        );
        assert!(matches!(
            session.connect(),
            Err(SyncError::InvalidState(_))
        ));
    }

    #[test]
    fn commands_queued_before_link_wait() {
        let mut session = TransferSession::new();
        session.begin_connect().unwrap();
        session.connect().unwrap();
        session.list_folder().unwrap();
        assert!(session.poll_transmit().is_none());

        session.link_up().unwrap();
        assert_eq!(session.poll_transmit().unwrap().opcode, Opcode::Connect);
        assert!(session.poll_transmit().is_none());

        session.handle_response(ObexResponse::connected(9));
        let listing = session.poll_transmit().unwrap();
        assert!(listing.is_folder_listing());
        assert_eq!(
            listing.header(HeaderId::ConnectionId).and_then(ObexHeader::as_u32),
            Some(9)
        );
    }

    #[test]
    fn refused_connect_closes_link() {
        let mut session = linked();
        session.connect().unwrap();
        session.poll_transmit();
        let actions = session.handle_response(respond(ResponseCode::Forbidden));
        assert_eq!(
            actions,
            vec![
                SessionAction::Notify(FtpEvent::Connect(ResultCode::Fail)),
                SessionAction::Close,
            ]
        );
        assert_eq!(session.connection_id(), None);
    }

    #[test]
    fn one_request_in_flight() {
        let mut session = connected(1);
        session.list_folder().unwrap();
        session.change_folder("SAVED").unwrap();
        session.delete_file("x.pdf").unwrap();

        assert!(session.poll_transmit().is_some());
        assert!(session.poll_transmit().is_none());
        assert_eq!(session.queued(), 2);

        session.handle_response(body(ResponseCode::Success, HeaderId::EndOfBody, LISTING));
        assert_eq!(session.poll_transmit().unwrap().opcode, Opcode::SetPath);
        assert!(session.poll_transmit().is_none());
    }

    #[test]
    fn queue_is_bounded() {
        let mut session = connected(1);
        // first command goes in flight, the next ten wait
        for _ in 0..=QUEUE_CAPACITY {
            session.list_folder().unwrap();
        }
        assert_eq!(session.queued(), QUEUE_CAPACITY);
        assert!(matches!(
            session.list_folder(),
            Err(SyncError::QueueFull { capacity: 10 })
        ));
    }

    #[test]
    fn file_fetch_accumulates_fragments() {
        let mut session = connected(1);
        let item = FolderListingItem::new("page1.pdf", None, 9);
        session.get_file(item).unwrap();
        let request = session.poll_transmit().unwrap();
        assert_eq!(request.headers.len(), 2);

        let actions = session.handle_response(body(ResponseCode::Continue, HeaderId::Body, b"abc"));
        assert!(actions.is_empty());
        assert_eq!(session.poll_transmit(), Some(request.clone()));

        session.handle_response(body(ResponseCode::Continue, HeaderId::Body, b"def"));
        assert_eq!(session.poll_transmit(), Some(request));

        let event = only_event(session.handle_response(body(
            ResponseCode::Success,
            HeaderId::EndOfBody,
            b"ghi",
        )));
        let FtpEvent::GetFile(Some(fetched)) = event else {
            panic!("expected fetched file");
        };
        assert_eq!(fetched.name, "page1.pdf");
        assert_eq!(fetched.data, b"abcdefghi");
        assert!(!session.is_awaiting_response());
    }

    #[test]
    fn failed_file_fetch_is_not_retried() {
        let mut session = connected(1);
        session
            .get_file(FolderListingItem::new("gone.pdf", None, 1))
            .unwrap();
        session.poll_transmit();
        session.handle_response(body(ResponseCode::Continue, HeaderId::Body, b"part"));
        session.poll_transmit();

        let event = only_event(session.handle_response(respond(ResponseCode::NotFound)));
        assert_eq!(event, FtpEvent::GetFile(None));
        assert_eq!(event.result(), ResultCode::Fail);
        assert!(session.poll_transmit().is_none());
    }

    #[test]
    fn folder_listing_parsed_and_sorted() {
        let mut session = connected(1);
        session.list_folder().unwrap();
        session.poll_transmit();

        let (head, tail) = LISTING.split_at(40);
        session.handle_response(body(ResponseCode::Continue, HeaderId::Body, head));
        session.poll_transmit();
        let event = only_event(session.handle_response(body(
            ResponseCode::Success,
            HeaderId::EndOfBody,
            tail,
        )));

        let FtpEvent::FolderListing(Some(items)) = event else {
            panic!("expected listing");
        };
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["SAVED", "page1.pdf"]);
    }

    #[test]
    fn folder_listing_retried_exactly_once() {
        let mut session = connected(1);
        session.list_folder().unwrap();
        let request = session.poll_transmit().unwrap();

        assert!(session.handle_response(respond(ResponseCode::Forbidden)).is_empty());
        assert_eq!(session.poll_transmit(), Some(request));

        let event = only_event(session.handle_response(respond(ResponseCode::Forbidden)));
        assert_eq!(event, FtpEvent::FolderListing(None));
        assert!(session.poll_transmit().is_none());
    }

    #[test]
    fn retried_listing_can_succeed() {
        let mut session = connected(1);
        session.list_folder().unwrap();
        session.poll_transmit();
        session.handle_response(respond(ResponseCode::Forbidden));
        session.poll_transmit();

        let event = only_event(session.handle_response(body(
            ResponseCode::Success,
            HeaderId::EndOfBody,
            LISTING,
        )));
        assert!(matches!(event, FtpEvent::FolderListing(Some(items)) if items.len() == 2));
    }

    #[test]
    fn change_folder_tracks_path() {
        let mut session = connected(1);
        session.change_folder("SAVED").unwrap();
        session.poll_transmit();
        let event = only_event(session.handle_response(respond(ResponseCode::Success)));
        assert_eq!(event.result(), ResultCode::Ok);
        assert_eq!(session.path().to_string(), "/SAVED");

        session.change_folder("..").unwrap();
        let request = session.poll_transmit().unwrap();
        assert_eq!(
            request.set_path_flags(),
            SetPathFlags::BACKUP | SetPathFlags::DONT_CREATE_FOLDER
        );
        assert!(request.header(HeaderId::Name).is_none());
        session.handle_response(respond(ResponseCode::Success));
        assert!(session.path().is_root());
    }

    #[test]
    fn change_to_root_resets_path() {
        let mut session = connected(1);
        for name in ["a", "b"] {
            session.change_folder(name).unwrap();
            session.poll_transmit();
            session.handle_response(respond(ResponseCode::Success));
        }
        assert_eq!(session.path().segments().len(), 2);

        session.change_folder("").unwrap();
        session.poll_transmit();
        let event = only_event(session.handle_response(respond(ResponseCode::Success)));
        assert_eq!(event, FtpEvent::ChangeFolder(Some(RemotePath::root())));
    }

    #[test]
    fn failed_change_folder_keeps_path() {
        let mut session = connected(1);
        session.change_folder("missing").unwrap();
        session.poll_transmit();
        let event = only_event(session.handle_response(respond(ResponseCode::NotFound)));
        assert_eq!(event, FtpEvent::ChangeFolder(None));
        assert!(session.path().is_root());
    }

    #[test]
    fn delete_reports_name_on_success_only() {
        let mut session = connected(1);
        session.delete_file("a.pdf").unwrap();
        let request = session.poll_transmit().unwrap();
        assert_eq!(request.opcode, Opcode::Put);
        assert_eq!(request.name().as_deref(), Some("a.pdf"));
        let event = only_event(session.handle_response(respond(ResponseCode::Success)));
        assert_eq!(event, FtpEvent::Delete(Some("a.pdf".into())));

        session.delete_file("b.pdf").unwrap();
        session.poll_transmit();
        let event = only_event(session.handle_response(respond(ResponseCode::Unauthorized)));
        assert_eq!(event, FtpEvent::Delete(None));
    }

    #[test]
    fn disconnect_closes_link() {
        let mut session = connected(5);
        session.disconnect().unwrap();
        assert_eq!(*session.phase(), ConnectionPhase::Disconnecting);
        assert!(session.list_folder().is_err());

        let request = session.poll_transmit().unwrap();
        assert_eq!(request.opcode, Opcode::Disconnect);
        let actions = session.handle_response(respond(ResponseCode::Success));
        assert_eq!(
            actions,
            vec![
                SessionAction::Notify(FtpEvent::Disconnect(ResultCode::Ok)),
                SessionAction::Close,
            ]
        );
        assert!(session.link_down().is_empty());
        assert!(session.phase().is_disconnected());
    }

    #[test]
    fn link_down_fails_everything_once() {
        let mut session = connected(1);
        session.list_folder().unwrap();
        session.delete_file("a").unwrap();
        session
            .get_file(FolderListingItem::new("b", None, 1))
            .unwrap();

        let events = session.link_down();
        assert_eq!(
            events,
            vec![
                FtpEvent::FolderListing(None),
                FtpEvent::Delete(None),
                FtpEvent::GetFile(None),
            ]
        );
        assert!(session.poll_transmit().is_none());
        assert!(session.link_down().is_empty());
        assert_eq!(session.connection_id(), None);
    }

    #[test]
    fn unsolicited_response_is_ignored() {
        let mut session = connected(1);
        assert!(session.handle_response(respond(ResponseCode::Success)).is_empty());
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl FtpListener for Recorder {
        fn on_delete_complete(&mut self, name: Option<String>, result: ResultCode) {
            self.0.push(format!("{name:?} {result}"));
        }
    }

    #[test]
    fn events_reach_listener() {
        let mut recorder = Recorder::default();
        FtpEvent::Delete(Some("x".into())).deliver(&mut recorder);
        FtpEvent::Delete(None).deliver(&mut recorder);
        assert_eq!(recorder.0, ["Some(\"x\") ok", "None fail"]);
    }
}
