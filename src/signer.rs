//! Signing and host key verification interfaces.
//!
//! Key parsing, signature construction and signature verification live behind
//! these traits; the transport only feeds them bytes.
use bytes::Bytes;
use derivative::Derivative;
use crate::error::Result;

/// Produces signatures for user authentication.
pub trait Signer {
    /// Signs `data` under the algorithm that this signer was created for,
    /// returning the wire encoding of the signature.
    fn sign(&self, data: &[u8]) -> Result<Bytes>;
}

/// Decides whether a server host key is acceptable for a host.
pub trait HostKeyVerifier {
    /// Returns true to accept the key, false to reject it and abort the
    /// connection.
    fn verify(&self, host: &str, host_key: &[u8]) -> bool;
}

/// Accepts every host key. Vulnerable to man-in-the-middle attacks, useful
/// for tests.
#[derive(Debug)]
pub struct AcceptAllHostKeys;

impl HostKeyVerifier for AcceptAllHostKeys {
    fn verify(&self, _host: &str, _host_key: &[u8]) -> bool {
        true
    }
}

/// One public key candidate for the authentication loop.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PubkeyCredential {
    /// Public key algorithm name, e.g. "ssh-ed25519".
    pub algo_name: String,
    /// The wire encoding of the public key.
    pub pubkey_blob: Bytes,
    #[derivative(Debug = "ignore")]
    pub signer: Box<dyn Signer + Send>,
}
