use cipher::{InnerIvInit as _, KeyInit as _, StreamCipher as _};
use crate::error::Result;
use super::{CipherAlgo, RecvCipher, SendCipher};

/// "aes128-ctr" cipher from RFC 4344.
///
/// The counter block advances by one for every 16 bytes of keystream, so a
/// packet of `k` bytes advances it by `k / 16` (packets are block-aligned).
pub static AES128_CTR: CipherAlgo = CipherAlgo {
    name: "aes128-ctr",
    block_len: 16,
    key_len: 16,
    iv_len: 16,
    tag_len: 0,
    make_send: |key, iv| SendCipher::Ctr(new_aes128_ctr(key, iv)),
    make_recv: |key, iv| RecvCipher::Ctr(new_aes128_ctr(key, iv)),
};

pub(crate) type Ctr128 = ctr::Ctr128BE<aes::Aes128>;

fn new_aes128_ctr(key: &[u8], iv: &[u8]) -> Ctr128 {
    let aes = aes::Aes128::new_from_slice(key).expect("invalid key length for aes128-ctr");
    let ctr = ctr::CtrCore::inner_iv_slice_init(aes, iv).expect("invalid iv length for aes128-ctr");
    cipher::StreamCipherCoreWrapper::from_core(ctr)
}

pub(crate) fn apply_keystream(cipher: &mut Ctr128, data: &mut [u8]) -> Result<()> {
    cipher.apply_keystream(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_iv(counter: u8) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[15] = counter;
        iv
    }

    // a 32-byte packet advances the counter by 2, a 48-byte packet by 3
    #[test]
    fn test_counter_advance() {
        let key = [0x07; 16];

        for (packet_len, advance) in [(16, 1u8), (32, 2), (48, 3)] {
            let mut cipher = new_aes128_ctr(&key, &counter_iv(0));
            let mut packet = vec![0u8; packet_len];
            apply_keystream(&mut cipher, &mut packet).unwrap();

            let mut next = [0u8; 16];
            apply_keystream(&mut cipher, &mut next).unwrap();

            let mut expected = [0u8; 16];
            apply_keystream(&mut new_aes128_ctr(&key, &counter_iv(advance)), &mut expected).unwrap();
            assert_eq!(next, expected, "wrong counter after {} bytes", packet_len);
        }
    }

    // a packet that is fed to the cipher in unaligned chunks produces the same
    // keystream as a single pass
    #[test]
    fn test_chunked_keystream() {
        let key = [0x07; 16];
        let iv = counter_iv(0);

        let mut whole = [0xabu8; 48];
        apply_keystream(&mut new_aes128_ctr(&key, &iv), &mut whole).unwrap();

        let mut chunked = [0xabu8; 48];
        let mut cipher = new_aes128_ctr(&key, &iv);
        apply_keystream(&mut cipher, &mut chunked[..33]).unwrap();
        apply_keystream(&mut cipher, &mut chunked[33..]).unwrap();
        assert_eq!(whole, chunked);
    }

    // encrypt and decrypt are the same keystream xor
    #[test]
    fn test_symmetric() {
        let key = [0x07; 16];
        let iv = counter_iv(9);

        let plaintext = b"sixteen byte msg";
        let mut data = *plaintext;
        apply_keystream(&mut new_aes128_ctr(&key, &iv), &mut data).unwrap();
        apply_keystream(&mut new_aes128_ctr(&key, &iv), &mut data).unwrap();
        assert_eq!(&data, plaintext);
    }
}
