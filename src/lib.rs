pub use crate::client::{
    AlgoPrefs, AuthFailure, Client, ClientConfig, PacketReceiver, PacketSender, SessionInfo,
    TransportHandles,
};
pub use crate::codec::{PacketDecode, PacketEncode};
pub use crate::error::{AlgoNegotiateError, DisconnectError, Error, Result};
pub use crate::ident::Ident;
pub use crate::kexinit::{negotiate, KexInit, NegotiatedAlgos};
pub use crate::signer::{AcceptAllHostKeys, HostKeyVerifier, PubkeyCredential, Signer};

pub mod cipher;
pub mod client;
pub mod codec;
pub mod error;
pub mod ident;
pub mod kex;
pub mod kexinit;
pub mod mac;
pub mod numbers;
pub mod signer;
pub mod util;
