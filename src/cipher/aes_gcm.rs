use aes_gcm::aead::AeadInPlace as _;
use aes_gcm::aes::cipher::KeyInit as _;
use aes_gcm::aes::cipher::generic_array::GenericArray;
use aes_gcm::aes::cipher::generic_array::sequence::Concat as _;
use aes_gcm::aes::cipher::typenum::U12;
use crate::error::{Error, Result};
use crate::mac::MacVerified;
use super::{CipherAlgo, RecvCipher, SendCipher};

/// "aes128-gcm@openssh.com" cipher described in RFC 5647 and slightly modified by OpenSSH.
///
/// This is an AEAD cipher that does not use an additional [mac algorithm][crate::mac]. The
/// 4-byte packet length prefix is transmitted in cleartext and authenticated as additional
/// data.
pub static AES128_GCM: CipherAlgo = CipherAlgo {
    name: "aes128-gcm@openssh.com",
    block_len: 16,
    key_len: 16,
    iv_len: 12,
    tag_len: 16,
    make_send: |key, iv| SendCipher::Gcm(Gcm::new(key, iv)),
    make_recv: |key, iv| RecvCipher::Gcm(Gcm::new(key, iv)),
};

/// The 12-byte nonce is a 4-byte fixed salt followed by a 64-bit invocation
/// counter that advances by one per packet.
pub(crate) struct Gcm {
    aes_gcm: aes_gcm::AesGcm<aes::Aes128, U12>,
    iv_fixed: u32,
    iv_counter: u64,
}

impl Gcm {
    fn new(key: &[u8], iv: &[u8]) -> Gcm {
        let aes_gcm = aes_gcm::AesGcm::new_from_slice(key)
            .expect("invalid key length for aes128-gcm");
        let iv_fixed = u32::from_be_bytes(iv[0..4].try_into().unwrap());
        let iv_counter = u64::from_be_bytes(iv[4..12].try_into().unwrap());
        Gcm { aes_gcm, iv_fixed, iv_counter }
    }

    fn next_nonce(&mut self) -> GenericArray<u8, U12> {
        let iv_fixed = GenericArray::from(self.iv_fixed.to_be_bytes());
        let iv_counter = GenericArray::from(self.iv_counter.to_be_bytes());
        self.iv_counter = self.iv_counter.wrapping_add(1);
        iv_fixed.concat(iv_counter)
    }

    pub fn seal_packet(&mut self, packet: &mut [u8], tag: &mut [u8]) -> Result<()> {
        let nonce = self.next_nonce();
        let (packet_len, packet_rest) = packet.split_at_mut(4);
        let gcm_tag = self.aes_gcm.encrypt_in_place_detached(&nonce, packet_len, packet_rest)
            .map_err(|_| Error::Crypto("aes-gcm encryption failed"))?;
        tag.copy_from_slice(&gcm_tag);
        Ok(())
    }

    pub fn open_packet(&mut self, packet: &mut [u8], tag: &[u8]) -> Result<MacVerified> {
        let gcm_tag = *GenericArray::from_slice(tag);
        let nonce = self.next_nonce();
        let (packet_len, packet_rest) = packet.split_at_mut(4);
        match self.aes_gcm.decrypt_in_place_detached(&nonce, packet_len, packet_rest, &gcm_tag) {
            Ok(_) => Ok(MacVerified::assertion()),
            Err(_) => Err(Error::Mac),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pair() -> (Gcm, Gcm) {
        let key = [0x42; 16];
        let iv = [0x17; 12];
        (Gcm::new(&key, &iv), Gcm::new(&key, &iv))
    }

    fn sealed_packet() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let (mut send, _) = make_pair();
        let plaintext = b"\x00\x00\x00\x10\x0bpayl\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec();
        let mut packet = plaintext.clone();
        let mut tag = vec![0; 16];
        send.seal_packet(&mut packet, &mut tag).unwrap();
        (plaintext, packet, tag)
    }

    // the length prefix stays cleartext, the rest does not
    #[test]
    fn test_length_in_cleartext() {
        let (plaintext, packet, _tag) = sealed_packet();
        assert_eq!(&packet[..4], &plaintext[..4]);
        assert_ne!(&packet[4..], &plaintext[4..]);
    }

    #[test]
    fn test_open() {
        let (plaintext, mut packet, tag) = sealed_packet();
        let (_, mut recv) = make_pair();
        recv.open_packet(&mut packet, &tag).unwrap();
        assert_eq!(packet, plaintext);
    }

    // flipping any single bit of the ciphertext, the cleartext length prefix
    // or the tag must make authentication fail
    #[test]
    fn test_bit_flips_rejected() {
        let (_, packet, tag) = sealed_packet();

        for byte in 0..packet.len() {
            for bit in 0..8 {
                let mut mangled = packet.clone();
                mangled[byte] ^= 1 << bit;
                let (_, mut recv) = make_pair();
                assert!(
                    matches!(recv.open_packet(&mut mangled, &tag), Err(Error::Mac)),
                    "bit {} of packet byte {} was not authenticated", bit, byte,
                );
            }
        }

        for byte in 0..tag.len() {
            for bit in 0..8 {
                let mut mangled_tag = tag.clone();
                mangled_tag[byte] ^= 1 << bit;
                let mut packet = packet.clone();
                let (_, mut recv) = make_pair();
                assert!(
                    matches!(recv.open_packet(&mut packet, &mangled_tag), Err(Error::Mac)),
                    "bit {} of tag byte {} was not authenticated", bit, byte,
                );
            }
        }
    }

    // each packet uses a fresh nonce, so equal plaintexts give different ciphertexts
    #[test]
    fn test_invocation_counter_advances() {
        let (mut send, mut recv) = make_pair();
        let plaintext = [0u8; 32];

        let mut first = plaintext;
        let mut first_tag = [0; 16];
        send.seal_packet(&mut first, &mut first_tag).unwrap();

        let mut second = plaintext;
        let mut second_tag = [0; 16];
        send.seal_packet(&mut second, &mut second_tag).unwrap();
        assert_ne!(first[4..], second[4..]);

        recv.open_packet(&mut first, &first_tag).unwrap();
        recv.open_packet(&mut second, &second_tag).unwrap();
        assert_eq!(first, plaintext);
        assert_eq!(second, plaintext);
    }

    // the counter occupies the low 8 bytes of the derived iv
    #[test]
    fn test_counter_from_iv_tail() {
        let key = [0x42; 16];
        let mut iv = [0; 12];
        iv[11] = 1;
        let mut early = Gcm::new(&key, &iv);

        iv[11] = 2;
        let mut late = Gcm::new(&key, &iv);

        // encrypting the second packet of `early` matches the first of `late`
        let mut a = [7u8; 32];
        let mut a_tag = [0; 16];
        early.seal_packet(&mut a.clone(), &mut a_tag).unwrap();
        early.seal_packet(&mut a, &mut a_tag).unwrap();

        let mut b = [7u8; 32];
        let mut b_tag = [0; 16];
        late.seal_packet(&mut b, &mut b_tag).unwrap();

        assert_eq!(a, b);
        assert_eq!(a_tag, b_tag);
    }
}
