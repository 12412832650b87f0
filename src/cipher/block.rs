use cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit as _, KeyInit as _};
use cipher::inout::InOutBuf;
use crate::error::Result;
use super::{CipherAlgo, RecvCipher, SendCipher};

/// "aes128-cbc" cipher from RFC 4253.
///
/// The IV for a packet is the last ciphertext block of the previous packet.
pub static AES128_CBC: CipherAlgo = CipherAlgo {
    name: "aes128-cbc",
    block_len: 16,
    key_len: 16,
    iv_len: 16,
    tag_len: 0,
    make_send: |key, iv| SendCipher::Cbc(new_cbc_enc(key, iv)),
    make_recv: |key, iv| RecvCipher::Cbc(new_cbc_dec(key, iv)),
};

pub(crate) type CbcEnc = cbc::Encryptor<aes::Aes128>;
pub(crate) type CbcDec = cbc::Decryptor<aes::Aes128>;

fn new_cbc_enc(key: &[u8], iv: &[u8]) -> CbcEnc {
    let aes = aes::Aes128::new_from_slice(key).expect("invalid key length for aes128-cbc");
    CbcEnc::inner_iv_slice_init(aes, iv).expect("invalid iv length for cbc")
}

fn new_cbc_dec(key: &[u8], iv: &[u8]) -> CbcDec {
    let aes = aes::Aes128::new_from_slice(key).expect("invalid key length for aes128-cbc");
    CbcDec::inner_iv_slice_init(aes, iv).expect("invalid iv length for cbc")
}

pub(crate) fn encrypt_blocks(enc: &mut CbcEnc, data: &mut [u8]) -> Result<()> {
    let (blocks, tail) = InOutBuf::from(data).into_chunks();
    debug_assert!(tail.is_empty(), "plaintext is not aligned to block");
    enc.encrypt_blocks_inout_mut(blocks);
    Ok(())
}

pub(crate) fn decrypt_blocks(dec: &mut CbcDec, data: &mut [u8]) -> Result<()> {
    let (blocks, tail) = InOutBuf::from(data).into_chunks();
    debug_assert!(tail.is_empty(), "ciphertext is not aligned to block");
    dec.decrypt_blocks_inout_mut(blocks);
    Ok(())
}
