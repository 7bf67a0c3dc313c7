//! Streaming service actor.
//!
//! Owns the [`StreamingSession`], the link, the listener and the
//! keep-alive timer. While the device is in capture mode a lone frame
//! delimiter is written every keep-alive period; without that traffic the
//! Bluetooth link starts dropping and corrupting frames.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::codec::{HidCodec, HidOutbound};
use crate::error::SyncError;
use crate::hid::{DeviceMode, HidMessage};
use crate::listener::StreamingListener;
use crate::network::{ConnectOutcome, Connector, Link, LinkEvent, Transport};
use crate::service::next_link_event;
use crate::state::{ConnectionPhase, StreamingSession};
use crate::stroke::PathSegment;

const COMMAND_BUFFER: usize = 32;

pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(3);

type Ack = oneshot::Sender<Result<(), SyncError>>;

#[derive(Debug)]
enum Request {
    Open(Ack),
    SetMode(DeviceMode, Ack),
    Erase(Ack),
    Paths(oneshot::Sender<Vec<PathSegment>>),
    Close(Ack),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct StreamingOptions {
    pub keepalive: Duration,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            keepalive: DEFAULT_KEEPALIVE,
        }
    }
}

/// Cloneable handle to a running streaming service.
#[derive(Debug, Clone)]
pub struct StreamingHandle {
    tx: mpsc::Sender<Request>,
}

impl StreamingHandle {
    pub fn spawn<T, L>(transport: T, listener: L, options: StreamingOptions) -> (Self, JoinHandle<L>)
    where
        T: Transport,
        L: StreamingListener,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (connector, outcomes) = Connector::new(transport);
        let actor = StreamingActor {
            session: StreamingSession::new(),
            listener,
            connector,
            outcomes,
            link: None,
            events: None,
            keepalive: options.keepalive,
        };
        (Self { tx }, tokio::spawn(actor.run(rx)))
    }

    async fn request(&self, build: impl FnOnce(Ack) -> Request) -> Result<(), SyncError> {
        let (ack, rx) = oneshot::channel();
        self.tx.send(build(ack)).await?;
        rx.await?
    }

    pub async fn open(&self) -> Result<(), SyncError> {
        self.request(Request::Open).await
    }

    pub async fn close(&self) -> Result<(), SyncError> {
        self.request(Request::Close).await
    }

    /// Rejected when the link is down or the device is already in `mode`.
    pub async fn set_mode(&self, mode: DeviceMode) -> Result<(), SyncError> {
        self.request(|ack| Request::SetMode(mode, ack)).await
    }

    /// Blank the device screen.
    pub async fn erase(&self) -> Result<(), SyncError> {
        self.request(Request::Erase).await
    }

    /// Segments drawn on the current page so far.
    pub async fn paths(&self) -> Result<Vec<PathSegment>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Request::Paths(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.tx.send(Request::Shutdown).await?;
        Ok(())
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct StreamingActor<T: Transport, L> {
    session: StreamingSession,
    listener: L,
    connector: Connector<T>,
    outcomes: mpsc::UnboundedReceiver<ConnectOutcome<T::Channel>>,
    link: Option<Link<HidOutbound>>,
    events: Option<mpsc::UnboundedReceiver<LinkEvent<HidMessage>>>,
    keepalive: Duration,
}

impl<T: Transport, L: StreamingListener> StreamingActor<T, L> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) -> L {
        let mut keepalive = tokio::time::interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let before = self.session.phase().clone();

            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.handle_request(request),
                },
                Some(outcome) = self.outcomes.recv() => self.handle_outcome(outcome),
                Some(event) = next_link_event(&mut self.events) => self.handle_link_event(event),
                _ = keepalive.tick() => {
                    self.session.keep_alive();
                }
            }

            self.flush();
            self.report_phase(&before);
        }

        let before = self.session.phase().clone();
        self.drop_link();
        self.report_phase(&before);
        debug!("streaming service stopped");
        self.listener
    }

    fn report_phase(&mut self, before: &ConnectionPhase) {
        let after = self.session.phase();
        if after != before {
            info!(from = %before, to = %after, "streaming state changed");
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
            Request::SetMode(mode, ack) => {
                let _ = ack.send(self.session.set_mode(mode));
            }
            Request::Erase(ack) => {
                let _ = ack.send(self.session.erase());
            }
            Request::Paths(reply) => {
                let _ = reply.send(self.session.paths().to_vec());
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
                let (link, events) = Link::spawn(channel, HidCodec::new());
                self.link = Some(link);
                self.events = Some(events);
                let now = chrono::Local::now().naive_local();
                if let Err(e) = self.session.link_up(now) {
                    warn!("link up in unexpected state: {e}");
                }
            }
            Err(e) => {
                warn!("streaming connect failed: {e}");
                self.session.link_down();
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent<HidMessage>) {
        match event {
            LinkEvent::Received(message) => {
                for event in self.session.handle_message(message) {
                    event.deliver(&mut self.listener);
                }
            }
            LinkEvent::Broken(reason) => {
                let uptime = self.session.phase().connected_duration();
                match reason {
                    Some(e) => warn!(?uptime, "streaming link broken: {e}"),
                    None => info!(?uptime, "streaming link closed"),
                }
                self.link = None;
                self.events = None;
                self.session.link_down();
            }
        }
    }

    fn drop_link(&mut self) {
        self.connector.cancel();
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.events = None;
        self.session.link_down();
    }

    fn flush(&mut self) {
        while let Some(item) = self.session.poll_transmit() {
            let Some(link) = self.link.as_ref() else {
                break;
            };
            if let Err(e) = link.send(item) {
                debug!("report not sent: {e}");
                break;
            }
        }
    }
}
