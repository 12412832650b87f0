use bytes::Bytes;
use rand::RngCore as _;
use tokio::io::{AsyncRead, AsyncWrite};
use crate::cipher::CipherAlgo;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Error, Result};
use crate::ident::Ident;
use crate::kex::{KexAlgo, KexInput, KeySizes};
use crate::kexinit::{self, KexInit};
use crate::mac::MacAlgo;
use crate::numbers::msg;
use super::client::{recv_transport_packet, Client};
use super::config::{AlgoPrefs, ClientConfig};
use super::transport::Transport;

/// Writes our banner and reads the peer's, skipping any lines the peer sends
/// before it (RFC 4253, section 4.2). Both lines are returned without the
/// CRLF, byte-exact for the exchange hash.
pub(super) async fn exchange_idents<S>(
    transport: &mut Transport<S>,
    config: &ClientConfig,
) -> Result<(Bytes, Bytes)>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let our_ident = Ident::new(&config.software_version)?;
    let our_line = Bytes::from(our_ident.to_line());
    transport.send_ident(&our_line).await?;

    let their_line = transport.recv_ident().await?;
    log::debug!("received peer identifier: {:?}", their_line);
    let their_ident = Ident::parse(&their_line)?;
    if their_ident.protocol_version() != "2.0" {
        return Err(Error::Protocol("peer speaks an unsupported protocol version"));
    }

    Ok((our_line, their_line))
}

/// Runs one complete key exchange: KEXINIT in both directions, the negotiated
/// kex algorithm, and the NEWKEYS barrier that installs the new keys.
///
/// The first exchange of a connection also sets the session id.
pub(super) async fn run_key_exchange<S>(client: &mut Client<S>) -> Result<()>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let mut cookie = [0; 16];
    client.rng.fill_bytes(&mut cookie);
    let our_kex_init = proposal(&client.config.algos, cookie);
    let our_payload = our_kex_init.encode();
    log::debug!("sending SSH_MSG_KEXINIT");
    client.transport.send_packet(&our_payload).await?;

    let their_payload = recv_transport_packet(&mut client.transport, client.config.verbosity)
        .await?.payload;
    if their_payload.first() != Some(&msg::KEXINIT) {
        return Err(Error::Protocol("expected SSH_MSG_KEXINIT"));
    }
    let their_kex_init = KexInit::decode(their_payload.clone())?;
    log::debug!("received SSH_MSG_KEXINIT: {:?}", their_kex_init);
    if their_kex_init.first_kex_follows {
        return Err(Error::Protocol("received SSH_MSG_KEXINIT with first_kex_packet_follows set"));
    }

    let algos = kexinit::negotiate(&our_kex_init, &their_kex_init)?;
    let kex_algo = find_algo(&client.config.algos.kex, &algos.kex)?;
    let cipher_cts = find_algo(&client.config.algos.ciphers_cts, &algos.cipher_cts)?;
    let cipher_stc = find_algo(&client.config.algos.ciphers_stc, &algos.cipher_stc)?;
    let mac_cts = find_algo(&client.config.algos.macs_cts, &algos.mac_cts)?;
    let mac_stc = find_algo(&client.config.algos.macs_stc, &algos.mac_stc)?;

    let key_sizes = KeySizes {
        iv_cts: cipher_cts.iv_len,
        iv_stc: cipher_stc.iv_len,
        key_cts: cipher_cts.key_len,
        key_stc: cipher_stc.key_len,
        mac_key_cts: mac_cts.key_len,
        mac_key_stc: mac_stc.key_len,
    };

    let mut kex = (kex_algo.make_kex)(&mut *client.rng)?;
    let output = loop {
        while let Some(packet) = kex.send_packet()? {
            client.transport.send_packet(&packet).await?;
        }

        let input = KexInput {
            client_ident: &client.our_ident_line,
            server_ident: &client.their_ident_line,
            client_kex_init: &our_payload,
            server_kex_init: &their_payload,
            session_id: if client.session_id.is_empty() { None } else { Some(&client.session_id) },
            key_sizes,
        };
        if let Some(output) = kex.output(&input)? {
            break output;
        }

        let payload = recv_transport_packet(&mut client.transport, client.config.verbosity)
            .await?.payload;
        let mut payload = PacketDecode::new(payload);
        let msg_id = payload.get_u8()?;
        match msg_id {
            30..=49 => kex.recv_packet(msg_id, &mut payload)?,
            _ => return Err(Error::Protocol("received unexpected message during key exchange")),
        }
    };
    log::debug!("finished kex");

    // the host key must be accepted before any keys are installed
    if !client.config.host_key_verifier.verify(&client.config.host, &output.server_host_key) {
        return Err(Error::HostKey);
    }

    if client.session_id.is_empty() {
        // the exchange hash of the first kex becomes the session id
        client.session_id = output.exchange_hash.clone();
    }

    // our SSH_MSG_NEWKEYS, then replace the send keys
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::NEWKEYS);
    client.transport.send_packet(&payload.finish()).await?;
    let send_pipe = &mut client.transport.codec.send_pipe;
    send_pipe.set_cipher((cipher_cts.make_send)(&output.keys.key_cts, &output.keys.iv_cts));
    send_pipe.set_mac((mac_cts.make_mac)(&output.keys.mac_key_cts), mac_cts.tag_len);
    log::debug!("sent SSH_MSG_NEWKEYS and applied new keys");

    // peer's SSH_MSG_NEWKEYS, then replace the receive keys
    let payload = recv_transport_packet(&mut client.transport, client.config.verbosity)
        .await?.payload;
    if payload.first() != Some(&msg::NEWKEYS) {
        return Err(Error::Protocol("expected SSH_MSG_NEWKEYS"));
    }
    let recv_pipe = &mut client.transport.codec.recv_pipe;
    recv_pipe.set_cipher((cipher_stc.make_recv)(&output.keys.key_stc, &output.keys.iv_stc));
    recv_pipe.set_mac((mac_stc.make_mac)(&output.keys.mac_key_stc), mac_stc.tag_len);
    log::debug!("received SSH_MSG_NEWKEYS and applied new keys");

    Ok(())
}

// RFC 4253, section 7.1
fn proposal(algos: &AlgoPrefs, cookie: [u8; 16]) -> KexInit {
    KexInit {
        cookie,
        kex_algos: algo_names(&algos.kex),
        server_host_key_algos: algos.server_host_key.clone(),
        cipher_algos_cts: algo_names(&algos.ciphers_cts),
        cipher_algos_stc: algo_names(&algos.ciphers_stc),
        mac_algos_cts: algo_names(&algos.macs_cts),
        mac_algos_stc: algo_names(&algos.macs_stc),
        compression_algos_cts: vec!["none".into()],
        compression_algos_stc: vec!["none".into()],
        languages_cts: Vec::new(),
        languages_stc: Vec::new(),
        first_kex_follows: false,
    }
}

fn algo_names<A: NamedAlgo>(algos: &[&'static A]) -> Vec<String> {
    algos.iter().map(|algo| algo.name().into()).collect()
}

fn find_algo<A: NamedAlgo>(algos: &[&'static A], name: &str) -> Result<&'static A> {
    algos.iter().find(|algo| algo.name() == name).copied()
        .ok_or(Error::Protocol("negotiated an algorithm that is not in our proposal"))
}

trait NamedAlgo { fn name(&self) -> &'static str; }
impl NamedAlgo for KexAlgo { fn name(&self) -> &'static str { self.name } }
impl NamedAlgo for CipherAlgo { fn name(&self) -> &'static str { self.name } }
impl NamedAlgo for MacAlgo { fn name(&self) -> &'static str { self.name } }
