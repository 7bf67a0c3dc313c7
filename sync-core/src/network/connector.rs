//! Cancel-then-start connect attempts.
//!
//! Only one attempt runs at a time. Starting a new one aborts the old
//! one, and each outcome is tagged with its attempt number so that a
//! result arriving late from an aborted attempt can be told apart.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SyncError;
use crate::network::transport::Transport;

#[derive(Debug)]
pub struct ConnectOutcome<C> {
    pub attempt: u64,
    pub result: Result<C, SyncError>,
}

pub struct Connector<T: Transport> {
    transport: Arc<T>,
    attempt: u64,
    running: Option<JoinHandle<()>>,
    outcomes: mpsc::UnboundedSender<ConnectOutcome<T::Channel>>,
}

impl<T: Transport> Connector<T> {
    pub fn new(transport: T) -> (Self, mpsc::UnboundedReceiver<ConnectOutcome<T::Channel>>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        let connector = Self {
            transport: Arc::new(transport),
            attempt: 0,
            running: None,
            outcomes,
        };
        (connector, rx)
    }

    /// Abort any attempt in progress and start a new one.
    pub fn start(&mut self) -> u64 {
        self.cancel();
        self.attempt += 1;

        let attempt = self.attempt;
        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        self.running = Some(tokio::spawn(async move {
            let result = transport.connect().await;
            let _ = outcomes.send(ConnectOutcome { attempt, result });
        }));

        debug!(attempt, "connect attempt started");
        attempt
    }

    pub fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            if !running.is_finished() {
                debug!(attempt = self.attempt, "connect attempt aborted");
            }
            running.abort();
        }
    }

    /// Whether `outcome` belongs to the latest attempt and that attempt
    /// was not cancelled since.
    pub fn accept<C>(&mut self, outcome: &ConnectOutcome<C>) -> bool {
        if outcome.attempt != self.attempt || self.running.is_none() {
            return false;
        }
        self.running = None;
        true
    }
}

impl<T: Transport> Drop for Connector<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
