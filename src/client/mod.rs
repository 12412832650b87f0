pub use self::auth::AuthFailure;
pub use self::client::{Client, SessionInfo};
pub use self::config::{AlgoPrefs, ClientConfig, PasswordProvider, SessionHook};
pub use self::transport::{PacketReceiver, PacketSender, TransportHandles};

mod auth;
mod client;
mod config;
mod handshake;
mod transport;
