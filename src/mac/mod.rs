//! Authentication of packets.
//!
//! Except with AEAD ciphers, every packet is followed by a tag computed by a
//! mac algorithm over the packet sequence number and the cleartext packet.
use crate::Result;
pub use self::hmac::HMAC_SHA2_256;
pub use self::none::{Empty, NONE};

mod hmac;
mod none;

/// Algorithm for authenticating packets.
#[derive(Debug)]
pub struct MacAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    pub(crate) tag_len: usize,
    pub(crate) key_len: usize,
    pub(crate) make_mac: fn(key: &[u8]) -> Box<dyn Mac + Send>,
}

pub(crate) trait Mac {
    fn sign(&mut self, packet_seq: u32, plaintext: &[u8], tag: &mut [u8]);
    fn verify(&mut self, packet_seq: u32, plaintext: &[u8], tag: &[u8]) -> Result<MacVerified>;
}

/// Witness that a tag was verified before the payload is handed on.
#[derive(Debug)]
pub struct MacVerified(());

impl MacVerified {
    pub fn assertion() -> Self {
        Self(())
    }
}
