pub mod connector;
pub mod link;
pub mod transport;

pub use connector::{ConnectOutcome, Connector};
pub use link::{Link, LinkEvent};
pub use transport::{ByteChannel, TcpTransport, Transport};
