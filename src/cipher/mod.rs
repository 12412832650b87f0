//! Encryption and decryption of packets.
//!
//! The SSH protocol supports many symmetric encryption algorithms (ciphers), which are used to
//! provide **confidentiality** (the attacker cannot see the content of the messages that we
//! exchange over SSH).
//!
//! The client and the server exchange lists of supported algorithms, and the first algorithm on
//! the client's list that is also supported by the server is used for the connection.
//!
//! # Supported algorithms
//!
//! - "aes128-gcm@openssh.com" ([`AES128_GCM`])
//! - "aes128-ctr" ([`AES128_CTR`])
//! - "aes128-cbc" ([`AES128_CBC`])
//! - "none" ([`NONE`])
use std::cmp;
use crate::error::Result;
use crate::mac::MacVerified;
pub use self::aes_gcm::AES128_GCM;
pub use self::block::AES128_CBC;
pub use self::none::NONE;
pub use self::stream::AES128_CTR;

mod aes_gcm;
mod block;
mod none;
mod stream;

/// Algorithm for encrypting and decrypting packets.
///
/// See the [module documentation][self] for details.
#[derive(Debug)]
pub struct CipherAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    pub(crate) block_len: usize,
    pub(crate) key_len: usize,
    pub(crate) iv_len: usize,
    pub(crate) tag_len: usize,
    pub(crate) make_send: fn(key: &[u8], iv: &[u8]) -> SendCipher,
    pub(crate) make_recv: fn(key: &[u8], iv: &[u8]) -> RecvCipher,
}

/// Cipher state for the sending direction of a connection.
///
/// The variants carry the evolving per-direction state: the chained IV for
/// CBC, the counter block for CTR and the invocation counter for GCM.
pub(crate) enum SendCipher {
    None,
    Cbc(block::CbcEnc),
    Ctr(stream::Ctr128),
    Gcm(aes_gcm::Gcm),
}

/// Cipher state for the receiving direction of a connection.
pub(crate) enum RecvCipher {
    None,
    Cbc(block::CbcDec),
    Ctr(stream::Ctr128),
    Gcm(aes_gcm::Gcm),
}

impl SendCipher {
    pub fn block_len(&self) -> usize {
        match self {
            SendCipher::None => NONE.block_len,
            SendCipher::Cbc(_) => AES128_CBC.block_len,
            SendCipher::Ctr(_) => AES128_CTR.block_len,
            SendCipher::Gcm(_) => AES128_GCM.block_len,
        }
    }

    pub fn tag_len(&self) -> usize {
        match self {
            SendCipher::Gcm(_) => AES128_GCM.tag_len,
            _ => 0,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, SendCipher::Gcm(_))
    }

    /// Padding length for a packet carrying `payload_len` bytes of payload.
    pub fn padding_len(&self, payload_len: usize) -> usize {
        padding_len(payload_len, self.block_len(), self.is_aead())
    }

    /// Encrypts a framed packet in place. For AEAD ciphers the first 4 bytes
    /// of `packet` stay cleartext and the tag is written to `tag`; other
    /// ciphers leave `tag` untouched.
    pub fn encrypt_packet(&mut self, packet: &mut [u8], tag: &mut [u8]) -> Result<()> {
        match self {
            SendCipher::None => Ok(()),
            SendCipher::Cbc(enc) => block::encrypt_blocks(enc, packet),
            SendCipher::Ctr(ctr) => stream::apply_keystream(ctr, packet),
            SendCipher::Gcm(gcm) => gcm.seal_packet(packet, tag),
        }
    }
}

impl RecvCipher {
    pub fn block_len(&self) -> usize {
        match self {
            RecvCipher::None => NONE.block_len,
            RecvCipher::Cbc(_) => AES128_CBC.block_len,
            RecvCipher::Ctr(_) => AES128_CTR.block_len,
            RecvCipher::Gcm(_) => AES128_GCM.block_len,
        }
    }

    pub fn tag_len(&self) -> usize {
        match self {
            RecvCipher::Gcm(_) => AES128_GCM.tag_len,
            _ => 0,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, RecvCipher::Gcm(_))
    }

    /// Number of bytes that must be buffered before the packet length can be
    /// recovered: the length prefix is cleartext for AEAD ciphers, otherwise a
    /// whole block must be decrypted.
    pub fn len_prefix_len(&self) -> usize {
        if self.is_aead() { 4 } else { self.block_len() }
    }

    /// Decrypts the first block of a packet in place so the length prefix can
    /// be read from it. AEAD ciphers transmit the length in cleartext, so this
    /// is a no-op for them.
    pub fn decrypt_first_block(&mut self, block: &mut [u8]) -> Result<()> {
        match self {
            RecvCipher::None | RecvCipher::Gcm(_) => Ok(()),
            RecvCipher::Cbc(dec) => block::decrypt_blocks(dec, block),
            RecvCipher::Ctr(ctr) => stream::apply_keystream(ctr, block),
        }
    }

    /// Decrypts the remainder of a non-AEAD packet, after the first block was
    /// already handled by [`Self::decrypt_first_block`].
    pub fn decrypt_rest(&mut self, data: &mut [u8]) -> Result<()> {
        match self {
            RecvCipher::None => Ok(()),
            RecvCipher::Cbc(dec) => block::decrypt_blocks(dec, data),
            RecvCipher::Ctr(ctr) => stream::apply_keystream(ctr, data),
            RecvCipher::Gcm(_) => panic!("called decrypt_rest() on an aead cipher"),
        }
    }

    /// Decrypts and authenticates an AEAD packet in place, treating the
    /// cleartext length prefix as additional authenticated data.
    pub fn open_packet(&mut self, packet: &mut [u8], tag: &[u8]) -> Result<MacVerified> {
        match self {
            RecvCipher::Gcm(gcm) => gcm.open_packet(packet, tag),
            _ => panic!("called open_packet() on a non-aead cipher"),
        }
    }
}

/// Padding length for a packet with `payload_len` bytes of payload (RFC 4253, section 6).
///
/// The padded length is aligned to the cipher block (at least 8) and the
/// padding is at least 4 bytes. AEAD ciphers do not count the 4-byte length
/// prefix, which is transmitted in cleartext.
pub(crate) fn padding_len(payload_len: usize, block_len: usize, is_aead: bool) -> usize {
    let align = cmp::max(block_len, 8);
    let header_len = if is_aead { 1 } else { 5 };
    let min_padded_len = header_len + payload_len + 4;
    let padded_len = (min_padded_len + align - 1) / align * align;
    padded_len - payload_len - header_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_len() {
        for &align in &[8, 16] {
            for payload_len in 0..=10000 {
                let padding_len_non_aead = padding_len(payload_len, align, false);
                assert!(padding_len_non_aead >= 4);
                assert_eq!((5 + payload_len + padding_len_non_aead) % align, 0);

                let padding_len_aead = padding_len(payload_len, align, true);
                assert!(padding_len_aead >= 4);
                assert_eq!((1 + payload_len + padding_len_aead) % align, 0);
            }
        }
    }

    fn frame(payload: &[u8], block_len: usize, is_aead: bool) -> Vec<u8> {
        let padding_len = padding_len(payload.len(), block_len, is_aead);
        let mut packet = Vec::new();
        packet.extend_from_slice(&u32::to_be_bytes((1 + payload.len() + padding_len) as u32));
        packet.push(padding_len as u8);
        packet.extend_from_slice(payload);
        packet.extend(std::iter::repeat(0).take(padding_len));
        packet
    }

    fn check_round_trip(algo: &CipherAlgo) {
        let key = vec![0x42; algo.key_len];
        let iv = vec![0x17; algo.iv_len];
        let mut send = (algo.make_send)(&key, &iv);
        let mut recv = (algo.make_recv)(&key, &iv);

        for payload_len in [0, 1, 5, 100, 1000] {
            let payload = (0..payload_len).map(|i| i as u8).collect::<Vec<_>>();
            let mut packet = frame(&payload, algo.block_len, send.is_aead());
            let expected = packet.clone();
            let mut tag = vec![0; algo.tag_len];

            send.encrypt_packet(&mut packet, &mut tag).unwrap();
            if let SendCipher::None = send {
                assert_eq!(packet, expected);
            } else {
                assert_ne!(packet, expected);
            }

            if recv.is_aead() {
                assert_eq!(&packet[..4], &expected[..4]);
                recv.open_packet(&mut packet, &tag).unwrap();
            } else {
                let block_len = recv.block_len();
                recv.decrypt_first_block(&mut packet[..block_len]).unwrap();
                recv.decrypt_rest(&mut packet[block_len..]).unwrap();
            }
            assert_eq!(packet, expected);
        }
    }

    #[test]
    fn test_round_trip_none() {
        check_round_trip(&NONE);
    }

    #[test]
    fn test_round_trip_aes128_cbc() {
        check_round_trip(&AES128_CBC);
    }

    #[test]
    fn test_round_trip_aes128_ctr() {
        check_round_trip(&AES128_CTR);
    }

    #[test]
    fn test_round_trip_aes128_gcm() {
        check_round_trip(&AES128_GCM);
    }
}
