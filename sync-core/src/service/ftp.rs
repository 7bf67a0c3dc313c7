//! File-transfer service actor.
//!
//! One task owns the [`TransferSession`], the link and the listener.
//! Callers talk to it through a cloneable [`FtpHandle`]; each command is
//! acknowledged once it is queued, and its completion arrives later via
//! [`FtpListener`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::ObexCodec;
use crate::error::SyncError;
use crate::listener::FtpListener;
use crate::network::{ConnectOutcome, Connector, Link, LinkEvent, Transport};
use crate::obex::{FolderListingItem, ObexRequest, ObexResponse};
use crate::service::next_link_event;
use crate::state::{ConnectionPhase, FtpCommand, RemotePath, SessionAction, TransferSession};

const COMMAND_BUFFER: usize = 32;

type Ack = oneshot::Sender<Result<(), SyncError>>;

#[derive(Debug)]
enum Request {
    Open(Ack),
    Command(FtpCommand, Ack),
    Path(oneshot::Sender<Option<RemotePath>>),
    Close(Ack),
    Shutdown,
}

/// Cloneable handle to a running file-transfer service.
#[derive(Debug, Clone)]
pub struct FtpHandle {
    tx: mpsc::Sender<Request>,
}

impl FtpHandle {
    /// Start the service. The task ends on [`FtpHandle::shutdown`] or
    /// when every handle is dropped, and hands back the listener.
    pub fn spawn<T, L>(transport: T, listener: L) -> (Self, JoinHandle<L>)
    where
        T: Transport,
        L: FtpListener,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (connector, outcomes) = Connector::new(transport);
        let actor = FtpActor {
            session: TransferSession::new(),
            listener,
            connector,
            outcomes,
            link: None,
            events: None,
        };
        (Self { tx }, tokio::spawn(actor.run(rx)))
    }

    async fn request(&self, build: impl FnOnce(Ack) -> Request) -> Result<(), SyncError> {
        let (ack, rx) = oneshot::channel();
        self.tx.send(build(ack)).await?;
        rx.await?
    }

    /// Open the byte channel, dropping any current one first.
    pub async fn open(&self) -> Result<(), SyncError> {
        self.request(Request::Open).await
    }

    /// Close the byte channel. Pending commands complete as failed.
    pub async fn close(&self) -> Result<(), SyncError> {
        self.request(Request::Close).await
    }

    pub async fn command(&self, command: FtpCommand) -> Result<(), SyncError> {
        self.request(|ack| Request::Command(command, ack)).await
    }

    /// OBEX CONNECT to the folder-browsing service.
    pub async fn connect(&self) -> Result<(), SyncError> {
        self.command(FtpCommand::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), SyncError> {
        self.command(FtpCommand::Disconnect).await
    }

    pub async fn list_folder(&self) -> Result<(), SyncError> {
        self.command(FtpCommand::ListFolder).await
    }

    /// `".."` for the parent folder, `""` for the root.
    pub async fn change_folder(&self, name: impl Into<String>) -> Result<(), SyncError> {
        self.command(FtpCommand::ChangeFolder(name.into())).await
    }

    pub async fn delete_file(&self, name: impl Into<String>) -> Result<(), SyncError> {
        self.command(FtpCommand::Delete(name.into())).await
    }

    pub async fn get_file(&self, item: FolderListingItem) -> Result<(), SyncError> {
        self.command(FtpCommand::GetFile(item)).await
    }

    /// Current folder, `None` without an OBEX session.
    pub async fn current_path(&self) -> Result<Option<RemotePath>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Request::Path(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.tx.send(Request::Shutdown).await?;
        Ok(())
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct FtpActor<T: Transport, L> {
    session: TransferSession,
    listener: L,
    connector: Connector<T>,
    outcomes: mpsc::UnboundedReceiver<ConnectOutcome<T::Channel>>,
    link: Option<Link<ObexRequest>>,
    events: Option<mpsc::UnboundedReceiver<LinkEvent<ObexResponse>>>,
}

impl<T: Transport, L: FtpListener> FtpActor<T, L> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) -> L {
        loop {
            let before = self.session.phase().clone();

            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.handle_request(request),
                },
                Some(outcome) = self.outcomes.recv() => self.handle_outcome(outcome),
                Some(event) = next_link_event(&mut self.events) => self.handle_link_event(event),
            }

            self.flush();
            self.report_phase(&before);
        }

        let before = self.session.phase().clone();
        self.connector.cancel();
        self.drop_link();
        self.report_phase(&before);
        debug!("ftp service stopped");
        self.listener
    }

    fn report_phase(&mut self, before: &ConnectionPhase) {
        let after = self.session.phase();
        if after != before {
            info!(from = %before, to = %after, "ftp state changed");
            self.listener.on_state_change(before, after);
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Open(ack) => {
                self.drop_link();
                let result = self.session.begin_connect();
                if result.is_ok() {
                    self.connector.start();
                }
                let _ = ack.send(result);
            }
            Request::Command(command, ack) => {
                let _ = ack.send(self.session.enqueue(command));
            }
            Request::Path(reply) => {
                let path = self
                    .session
                    .phase()
                    .is_connected()
                    .then(|| self.session.path().clone());
                let _ = reply.send(path);
            }
            Request::Close(ack) => {
                match self.link.as_mut() {
                    Some(link) => {
                        self.session.begin_close();
                        link.close();
                    }
                    None => self.drop_link(),
                }
                let _ = ack.send(Ok(()));
            }
            Request::Shutdown => {}
        }
    }

    fn handle_outcome(&mut self, outcome: ConnectOutcome<T::Channel>) {
        if !self.connector.accept(&outcome) {
            debug!(attempt = outcome.attempt, "stale connect outcome dropped");
            return;
        }
        match outcome.result {
            Ok(channel) => {
                let (link, events) = Link::spawn(channel, ObexCodec);
                self.link = Some(link);
                self.events = Some(events);
                if let Err(e) = self.session.link_up() {
                    warn!("link up in unexpected state: {e}");
                }
            }
            Err(e) => {
                warn!("ftp connect failed: {e}");
                self.notify_link_down();
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent<ObexResponse>) {
        match event {
            LinkEvent::Received(response) => {
                debug!(%response, "response received");
                for action in self.session.handle_response(response) {
                    match action {
                        SessionAction::Notify(event) => event.deliver(&mut self.listener),
                        SessionAction::Close => {
                            if let Some(link) = self.link.as_mut() {
                                link.close();
                            }
                        }
                    }
                }
            }
            LinkEvent::Broken(reason) => {
                let uptime = self.session.phase().connected_duration();
                match reason {
                    Some(e) => warn!(?uptime, "ftp link broken: {e}"),
                    None => info!(?uptime, "ftp link closed"),
                }
                self.link = None;
                self.events = None;
                self.notify_link_down();
            }
        }
    }

    /// Tear down whatever is open or opening, failing pending commands.
    fn drop_link(&mut self) {
        self.connector.cancel();
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.events = None;
        if !self.session.phase().is_disconnected() {
            self.notify_link_down();
        }
    }

    fn notify_link_down(&mut self) {
        for event in self.session.link_down() {
            event.deliver(&mut self.listener);
        }
    }

    fn flush(&mut self) {
        while let Some(request) = self.session.poll_transmit() {
            let Some(link) = self.link.as_ref() else {
                break;
            };
            if let Err(e) = link.send(request) {
                // The Broken event follows and fails the command.
                debug!("request not sent: {e}");
                break;
            }
        }
    }
}
