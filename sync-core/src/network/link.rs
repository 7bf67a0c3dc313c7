//! Link task: owns one byte channel for its whole life.
//!
//! The task reads decoded items and forwards them FIFO over an unbounded
//! channel, and writes items handed to [`Link::send`]. A read error, end
//! of stream, write error or [`Link::close`] ends it. Items queued before
//! a close are still written, and exactly one [`LinkEvent::Broken`] is
//! emitted as the last event.

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::network::transport::ByteChannel;

#[derive(Debug)]
pub enum LinkEvent<T> {
    Received(T),
    /// The channel is gone. `None` for end of stream or local close.
    Broken(Option<SyncError>),
}

/// Handle to a running link task.
#[derive(Debug)]
pub struct Link<E> {
    outbound: mpsc::UnboundedSender<E>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl<E: Send + 'static> Link<E> {
    /// Take ownership of `channel` and start the task.
    pub fn spawn<S, C>(channel: S, codec: C) -> (Self, mpsc::UnboundedReceiver<LinkEvent<C::Item>>)
    where
        S: ByteChannel,
        C: Decoder<Error = SyncError> + Encoder<E, Error = SyncError> + Send + 'static,
        C::Item: Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let framed = Framed::new(channel, codec);
        let task = tokio::spawn(run(framed, outbound_rx, shutdown_rx, events_tx));

        let link = Self {
            outbound,
            shutdown: Some(shutdown),
            task,
        };
        (link, events)
    }

    /// Queue an item for writing. Fails only when the task has ended.
    pub fn send(&self, item: E) -> Result<(), SyncError> {
        self.outbound.send(item)?;
        Ok(())
    }

    /// Ask the task to close the channel. The `Broken` event follows.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run<S, C, E>(
    framed: Framed<S, C>,
    mut outbound: mpsc::UnboundedReceiver<E>,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<LinkEvent<C::Item>>,
) where
    S: ByteChannel,
    C: Decoder<Error = SyncError> + Encoder<E, Error = SyncError>,
{
    let (mut sink, mut stream) = framed.split();

    let reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("link closed locally");
                break drain(&mut sink, &mut outbound).await.err();
            }
            item = outbound.recv() => match item {
                Some(item) => {
                    if let Err(e) = sink.send(item).await {
                        break Some(e);
                    }
                }
                None => break None,
            },
            frame = stream.next() => match frame {
                Some(Ok(item)) => {
                    if events.send(LinkEvent::Received(item)).is_err() {
                        break None;
                    }
                }
                Some(Err(e)) => break Some(e),
                None => {
                    debug!("link reached end of stream");
                    break None;
                }
            },
        }
    };

    if let Some(e) = &reason {
        warn!("link broken: {e}");
    }
    let _ = sink.close().await;
    let _ = events.send(LinkEvent::Broken(reason));
}

/// Write whatever was queued before the close.
async fn drain<K, E>(sink: &mut K, outbound: &mut mpsc::UnboundedReceiver<E>) -> Result<(), SyncError>
where
    K: Sink<E, Error = SyncError> + Unpin,
{
    while let Ok(item) = outbound.try_recv() {
        sink.feed(item).await?;
    }
    Ok(())
}
