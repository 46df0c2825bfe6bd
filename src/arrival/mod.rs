//! Push channel intake: transport, wire protocol, normalization, reconnect.

pub mod channel;
pub mod event;
pub mod protocol;
pub mod transport;

pub use channel::{ArrivalChannel, ChannelConfig, ChannelMonitor, ChannelStats, ConnectionState};
pub use event::{ArrivalEvent, CallKey, CallSource, PayloadError};
pub use transport::{MockPushServer, MockTransport, PushConnection, PushTransport, TcpTransport};
