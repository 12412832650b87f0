use derivative::Derivative;
use crate::cipher::{self, CipherAlgo};
use crate::kex::KexAlgo;
use crate::mac::{self, MacAlgo};
use crate::signer::{HostKeyVerifier, PubkeyCredential};
use super::client::SessionInfo;
use super::transport::TransportHandles;

/// Callback invoked after key exchange or after authentication, receiving
/// the session state and the [transport handles][TransportHandles]. Hooks
/// exist for instrumentation and must not send arbitrary packets
/// mid-handshake.
pub type SessionHook = Box<dyn FnMut(&SessionInfo, &mut dyn TransportHandles) + Send>;

/// Supplies the password for the "password" fallback method.
pub type PasswordProvider = Box<dyn FnOnce() -> Vec<u8> + Send>;

/// Configuration of the client handshake.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ClientConfig {
    /// Host identity handed to the host key verifier.
    pub host: String,
    /// User name to authenticate as.
    pub username: String,
    /// Software version for the identification banner (printable US-ASCII,
    /// no `-`, no whitespace).
    pub software_version: String,
    /// Debug verbosity of the driver; 0 disables its debug records.
    pub verbosity: u32,
    /// Public key candidates, tried in order before the password fallback.
    pub credentials: Vec<PubkeyCredential>,
    #[derivative(Debug = "ignore")]
    pub password: Option<PasswordProvider>,
    #[derivative(Debug = "ignore")]
    pub host_key_verifier: Box<dyn HostKeyVerifier + Send>,
    /// Algorithm preferences for the KEXINIT proposal.
    pub algos: AlgoPrefs,
    #[derivative(Debug = "ignore")]
    pub after_kex: Option<SessionHook>,
    #[derivative(Debug = "ignore")]
    pub after_auth: Option<SessionHook>,
}

impl ClientConfig {
    /// Configuration with the default algorithm preferences and no
    /// credentials. The key exchange algorithms come from the caller, see
    /// [`AlgoPrefs::with_kex`].
    pub fn new(
        host: &str,
        username: &str,
        host_key_verifier: Box<dyn HostKeyVerifier + Send>,
        kex_algos: Vec<&'static KexAlgo>,
    ) -> ClientConfig {
        ClientConfig {
            host: host.into(),
            username: username.into(),
            software_version: concat!("minato_", env!("CARGO_PKG_VERSION")).into(),
            verbosity: 0,
            credentials: Vec::new(),
            password: None,
            host_key_verifier,
            algos: AlgoPrefs::with_kex(kex_algos),
            after_kex: None,
            after_auth: None,
        }
    }
}

/// Ordered algorithm preferences for each KEXINIT slot. The first name in
/// each list is the preferred choice.
#[derive(Debug)]
pub struct AlgoPrefs {
    pub kex: Vec<&'static KexAlgo>,
    pub server_host_key: Vec<String>,
    pub ciphers_cts: Vec<&'static CipherAlgo>,
    pub ciphers_stc: Vec<&'static CipherAlgo>,
    pub macs_cts: Vec<&'static MacAlgo>,
    pub macs_stc: Vec<&'static MacAlgo>,
}

impl AlgoPrefs {
    /// The full supported algorithm set, combined with the given key exchange
    /// algorithms.
    pub fn with_kex(kex: Vec<&'static KexAlgo>) -> AlgoPrefs {
        let ciphers = vec![&cipher::AES128_GCM, &cipher::AES128_CTR, &cipher::AES128_CBC];
        let macs = vec![&mac::HMAC_SHA2_256];
        AlgoPrefs {
            kex,
            server_host_key: vec!["ssh-ed25519".into(), "rsa-sha2-256".into()],
            ciphers_cts: ciphers.clone(),
            ciphers_stc: ciphers,
            macs_cts: macs.clone(),
            macs_stc: macs,
        }
    }
}
