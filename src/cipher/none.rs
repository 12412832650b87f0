use super::{CipherAlgo, RecvCipher, SendCipher};

/// "none" cipher (no encryption).
pub static NONE: CipherAlgo = CipherAlgo {
    name: "none",
    block_len: 8,
    key_len: 0,
    iv_len: 0,
    tag_len: 0,
    make_send: |_key, _iv| SendCipher::None,
    make_recv: |_key, _iv| RecvCipher::None,
};
