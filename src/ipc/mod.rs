//! Local control socket: JSON lines over a Unix socket.

pub mod client;
pub mod protocol;
pub mod server;
