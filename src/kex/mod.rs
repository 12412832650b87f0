//! Key exchange interface.
//!
//! The key agreement mathematics and the derivation of keys from the shared
//! secret live behind the [`KeyExchange`] trait; the transport only sequences
//! the packets and installs the resulting keys.
use bytes::Bytes;
use crate::codec::PacketDecode;
use crate::error::Result;
use crate::util::CryptoRngCore;

/// Algorithm for key exchange.
#[derive(Debug)]
pub struct KexAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    pub make_kex: fn(rng: &mut dyn CryptoRngCore) -> Result<Box<dyn KeyExchange + Send>>,
}

/// Inputs that the exchange hash is computed from (RFC 4253, section 8).
///
/// The identification lines are byte-exact as sent, without the CRLF; the
/// KEXINIT payloads include the leading message id byte.
#[derive(Debug)]
pub struct KexInput<'a> {
    pub client_ident: &'a [u8],
    pub server_ident: &'a [u8],
    pub client_kex_init: &'a [u8],
    pub server_kex_init: &'a [u8],
    /// Exchange hash of the first key exchange of this connection, or `None`
    /// during that first exchange.
    pub session_id: Option<&'a [u8]>,
    pub key_sizes: KeySizes,
}

/// Byte counts of the keying material that the negotiated algorithms consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    pub iv_cts: usize,
    pub iv_stc: usize,
    pub key_cts: usize,
    pub key_stc: usize,
    pub mac_key_cts: usize,
    pub mac_key_stc: usize,
}

/// Results of a finished key exchange.
pub struct KexOutput {
    /// The exchange hash `H`; becomes the session id after the first exchange.
    pub exchange_hash: Vec<u8>,
    /// The server's host key, as encoded on the wire.
    pub server_host_key: Bytes,
    pub keys: KeyMaterial,
}

/// The six per-direction keying materials derived from the shared secret
/// (RFC 4253, section 7.2).
pub struct KeyMaterial {
    pub iv_cts: Vec<u8>,
    pub iv_stc: Vec<u8>,
    pub key_cts: Vec<u8>,
    pub key_stc: Vec<u8>,
    pub mac_key_cts: Vec<u8>,
    pub mac_key_stc: Vec<u8>,
}

/// A running key exchange.
///
/// The transport drives the exchange by pumping packets in the kex message
/// range into [`recv_packet`][Self::recv_packet], sending everything that
/// [`send_packet`][Self::send_packet] produces and polling
/// [`output`][Self::output] for the result. The implementation must verify
/// the server's signature over the exchange hash before producing an output.
pub trait KeyExchange {
    /// Handles a received message in the kex range (30 to 49).
    fn recv_packet(&mut self, msg_id: u8, payload: &mut PacketDecode) -> Result<()>;

    /// Returns the next packet payload to send, if any.
    fn send_packet(&mut self) -> Result<Option<Bytes>>;

    /// Returns the exchange output once both sides are done, `None` while the
    /// exchange still waits for packets.
    fn output(&mut self, input: &KexInput) -> Result<Option<KexOutput>>;
}
