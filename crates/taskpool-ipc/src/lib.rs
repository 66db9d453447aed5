//! Wire protocol, framing, and a client for talking to the supervisor
//! over its Unix domain control socket.

pub mod client;
pub mod codec;
pub mod config;
pub mod protocol;

pub use client::Client;
pub use codec::MessageStream;
pub use config::IpcConfig;
pub use protocol::{Request, Response};
