use crate::error::{Error, Result};
use super::{Mac, MacAlgo, MacVerified};

/// "none" MAC (no authentication).
pub static NONE: MacAlgo = MacAlgo {
    name: "none",
    tag_len: 0,
    key_len: 0,
    make_mac: |_key| Box::new(Empty),
};

/// Mac with an empty tag, used before the first key exchange completes.
#[derive(Debug)]
pub struct Empty;

impl Mac for Empty {
    fn sign(&mut self, _packet_seq: u32, _plaintext: &[u8], _tag: &mut [u8]) {}

    fn verify(&mut self, _packet_seq: u32, _plaintext: &[u8], tag: &[u8]) -> Result<MacVerified> {
        if tag.is_empty() {
            Ok(MacVerified::assertion())
        } else {
            Err(Error::Mac)
        }
    }
}
