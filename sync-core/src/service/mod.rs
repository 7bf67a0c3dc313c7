//! Service actors tying sessions, links and listeners together.

mod ftp;
mod streaming;

use tokio::sync::mpsc;

use crate::network::LinkEvent;

pub use ftp::FtpHandle;
pub use streaming::{DEFAULT_KEEPALIVE, StreamingHandle, StreamingOptions};

/// Next event of the current link, or never when there is none.
async fn next_link_event<T>(
    events: &mut Option<mpsc::UnboundedReceiver<LinkEvent<T>>>,
) -> Option<LinkEvent<T>> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
