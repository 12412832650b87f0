//! The `SSH_MSG_KEXINIT` message and algorithm negotiation (RFC 4253, section 7.1).
use bytes::Bytes;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{AlgoNegotiateError, Error, Result};
use crate::numbers::msg;

/// One peer's algorithm proposal, as carried by `SSH_MSG_KEXINIT`.
///
/// The first name in each list is the proposing peer's preferred choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    /// 16 random bytes, freshly generated for every KEXINIT we send.
    pub cookie: [u8; 16],
    pub kex_algos: Vec<String>,
    pub server_host_key_algos: Vec<String>,
    pub cipher_algos_cts: Vec<String>,
    pub cipher_algos_stc: Vec<String>,
    pub mac_algos_cts: Vec<String>,
    pub mac_algos_stc: Vec<String>,
    pub compression_algos_cts: Vec<String>,
    pub compression_algos_stc: Vec<String>,
    pub languages_cts: Vec<String>,
    pub languages_stc: Vec<String>,
    pub first_kex_follows: bool,
}

impl KexInit {
    /// Encodes the message, including the leading message id byte.
    pub fn encode(&self) -> Bytes {
        let mut payload = PacketEncode::new();
        payload.put_u8(msg::KEXINIT);
        payload.put_raw(&self.cookie);
        payload.put_name_list(&self.kex_algos);
        payload.put_name_list(&self.server_host_key_algos);
        payload.put_name_list(&self.cipher_algos_cts);
        payload.put_name_list(&self.cipher_algos_stc);
        payload.put_name_list(&self.mac_algos_cts);
        payload.put_name_list(&self.mac_algos_stc);
        payload.put_name_list(&self.compression_algos_cts);
        payload.put_name_list(&self.compression_algos_stc);
        payload.put_name_list(&self.languages_cts);
        payload.put_name_list(&self.languages_stc);
        payload.put_bool(self.first_kex_follows);
        payload.put_u32(0); // reserved
        payload.finish()
    }

    /// Decodes the message, starting at the message id byte.
    pub fn decode(payload: Bytes) -> Result<KexInit> {
        let mut payload = PacketDecode::new(payload);
        if payload.get_u8()? != msg::KEXINIT {
            return Err(Error::Protocol("expected SSH_MSG_KEXINIT"));
        }

        let mut cookie = [0; 16];
        cookie.copy_from_slice(&payload.get_raw(16)?);

        let kex_init = KexInit {
            cookie,
            kex_algos: payload.get_name_list()?,
            server_host_key_algos: payload.get_name_list()?,
            cipher_algos_cts: payload.get_name_list()?,
            cipher_algos_stc: payload.get_name_list()?,
            mac_algos_cts: payload.get_name_list()?,
            mac_algos_stc: payload.get_name_list()?,
            compression_algos_cts: payload.get_name_list()?,
            compression_algos_stc: payload.get_name_list()?,
            languages_cts: payload.get_name_list()?,
            languages_stc: payload.get_name_list()?,
            first_kex_follows: payload.get_bool()?,
        };
        payload.get_u32()?; // reserved

        Ok(kex_init)
    }
}

/// Algorithms negotiated from the client's and the server's KEXINIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedAlgos {
    pub kex: String,
    pub server_host_key: String,
    pub cipher_cts: String,
    pub cipher_stc: String,
    pub mac_cts: String,
    pub mac_stc: String,
    pub compression_cts: String,
    pub compression_stc: String,
}

/// Picks, for every slot, the first algorithm in the client's list that the
/// server also lists.
///
/// An empty intersection in a mandatory slot (key exchange, host key, the
/// two cipher slots, the two mac slots) is a fatal negotiation failure.
/// Compression legitimately negotiates to "none" when the lists do not
/// intersect, and languages are not negotiated at all.
pub fn negotiate(client: &KexInit, server: &KexInit) -> Result<NegotiatedAlgos> {
    Ok(NegotiatedAlgos {
        kex: negotiate_algo(
            &client.kex_algos, &server.kex_algos, "key exchange")?,
        server_host_key: negotiate_algo(
            &client.server_host_key_algos, &server.server_host_key_algos, "server host key")?,
        cipher_cts: negotiate_algo(
            &client.cipher_algos_cts, &server.cipher_algos_cts, "cipher client-to-server")?,
        cipher_stc: negotiate_algo(
            &client.cipher_algos_stc, &server.cipher_algos_stc, "cipher server-to-client")?,
        mac_cts: negotiate_algo(
            &client.mac_algos_cts, &server.mac_algos_cts, "mac client-to-server")?,
        mac_stc: negotiate_algo(
            &client.mac_algos_stc, &server.mac_algos_stc, "mac server-to-client")?,
        compression_cts: negotiate_compression(
            &client.compression_algos_cts, &server.compression_algos_cts, "compression client-to-server"),
        compression_stc: negotiate_compression(
            &client.compression_algos_stc, &server.compression_algos_stc, "compression server-to-client"),
    })
}

fn negotiate_algo(
    client_algos: &[String],
    server_algos: &[String],
    name: &'static str,
) -> Result<String> {
    for client_algo in client_algos.iter() {
        if server_algos.contains(client_algo) {
            log::debug!("negotiated algo {:?} for {}", client_algo, name);
            return Ok(client_algo.clone())
        }
    }

    Err(Error::AlgoNegotiate(AlgoNegotiateError {
        algo_name: name.into(),
        our_algos: client_algos.to_vec(),
        their_algos: server_algos.to_vec(),
    }))
}

fn negotiate_compression(
    client_algos: &[String],
    server_algos: &[String],
    name: &'static str,
) -> String {
    for client_algo in client_algos.iter() {
        if server_algos.contains(client_algo) {
            log::debug!("negotiated algo {:?} for {}", client_algo, name);
            return client_algo.clone()
        }
    }

    log::debug!("no common algo for {}, falling back to \"none\"", name);
    "none".into()
}
