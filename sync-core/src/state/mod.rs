pub mod connection;
mod streaming;
mod transfer;

pub use connection::ConnectionPhase;
pub use streaming::{StreamingEvent, StreamingSession};
pub use transfer::{
    FtpCommand, FtpEvent, QUEUE_CAPACITY, RemotePath, SessionAction, TransferSession,
};
