use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use crate::codec::{PacketDecode, PacketEncode, RecvPacket};
use crate::error::{DisconnectError, Error, Result};
use crate::numbers::{disconnect, msg};
use crate::util::CryptoRngCore;
use super::auth;
use super::config::{ClientConfig, SessionHook};
use super::handshake;
use super::transport::{PacketReceiver, PacketSender, Transport};

/// Snapshot of the session state handed to the instrumentation hooks.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// The exchange hash of the first key exchange.
    pub session_id: Vec<u8>,
    /// Our identification line, without the CRLF.
    pub client_ident: Bytes,
    /// The server's identification line, without the CRLF.
    pub server_ident: Bytes,
}

/// An SSH client connection.
///
/// [`Client::connect`] drives the handshake from the version exchange through
/// user authentication; the resulting client carries an encrypted transport
/// that [`Client::split`] hands over to the connection layer.
pub struct Client<S> {
    pub(super) transport: Transport<S>,
    pub(super) config: ClientConfig,
    pub(super) rng: Box<dyn CryptoRngCore + Send>,
    pub(super) our_ident_line: Bytes,
    pub(super) their_ident_line: Bytes,
    pub(super) session_id: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Runs the client handshake to completion: version exchange, initial key
    /// exchange, service request and user authentication.
    ///
    /// On a fatal protocol error a best-effort `SSH_MSG_DISCONNECT` is sent
    /// to the peer before the error is returned.
    pub async fn connect(
        stream: S,
        config: ClientConfig,
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> Result<Client<S>> {
        let mut client = Client {
            transport: Transport::new(stream),
            config,
            rng,
            our_ident_line: Bytes::new(),
            their_ident_line: Bytes::new(),
            session_id: Vec::new(),
        };

        match client.handshake().await {
            Ok(()) => Ok(client),
            Err(err) => {
                if let Some(reason_code) = err.disconnect_reason() {
                    let _ = send_disconnect(&mut client.transport, reason_code).await;
                }
                Err(err)
            },
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        let (our_line, their_line) =
            handshake::exchange_idents(&mut self.transport, &self.config).await?;
        self.our_ident_line = our_line;
        self.their_ident_line = their_line;

        handshake::run_key_exchange(self).await?;
        self.run_hook(|config| config.after_kex.as_mut());

        auth::authenticate(self).await?;
        log::debug!("user authentication finished");
        self.run_hook(|config| config.after_auth.as_mut());

        Ok(())
    }

    fn run_hook(&mut self, get: impl FnOnce(&mut ClientConfig) -> Option<&mut SessionHook>) {
        let info = SessionInfo {
            session_id: self.session_id.clone(),
            client_ident: self.our_ident_line.clone(),
            server_ident: self.their_ident_line.clone(),
        };
        if let Some(hook) = get(&mut self.config) {
            hook(&info, &mut self.transport);
        }
    }

    /// The session id: the exchange hash of the first key exchange, immutable
    /// for the rest of the connection.
    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    /// Our identification line, without the CRLF.
    pub fn client_ident(&self) -> &[u8] {
        &self.our_ident_line
    }

    /// The server's identification line, without the CRLF.
    pub fn server_ident(&self) -> &[u8] {
        &self.their_ident_line
    }

    /// Re-runs the key exchange to install fresh keys on an established
    /// connection (RFC 4253, section 9). The session id and the sequence
    /// numbers are untouched.
    ///
    /// The caller must not interleave other traffic with the re-key.
    pub async fn rekey(&mut self) -> Result<()> {
        handshake::run_key_exchange(self).await
    }

    /// Splits the connection into its two packet halves, which the connection
    /// layer drives from its reader and writer tasks.
    pub fn split(self) -> (PacketSender<WriteHalf<S>>, PacketReceiver<ReadHalf<S>>) {
        self.transport.into_split()
    }
}

/// Receives the next packet that the transport layer does not consume itself:
/// `SSH_MSG_DISCONNECT`, `SSH_MSG_IGNORE`, `SSH_MSG_DEBUG` and
/// `SSH_MSG_UNIMPLEMENTED` are handled here.
pub(super) async fn recv_transport_packet<S>(
    transport: &mut Transport<S>,
    verbosity: u32,
) -> Result<RecvPacket>
    where S: AsyncRead + AsyncWrite + Unpin
{
    loop {
        let packet = transport.recv_packet().await?;
        let mut payload = PacketDecode::new(packet.payload.clone());
        match payload.get_u8()? {
            msg::DISCONNECT => {
                let err = DisconnectError {
                    reason_code: payload.get_u32()?,
                    description: payload.get_string()?,
                    description_lang: payload.get_string()?,
                };
                log::debug!("received SSH_MSG_DISCONNECT: {:?}", err);
                return Err(Error::PeerDisconnected(err));
            },
            msg::IGNORE => {},
            msg::DEBUG => {
                let always_display = payload.get_bool()?;
                let message = payload.get_string()?;
                let _message_lang = payload.get_string()?;
                if always_display || verbosity > 0 {
                    log::debug!("received SSH_MSG_DEBUG: {:?}", message);
                }
            },
            msg::UNIMPLEMENTED => {
                let packet_seq = payload.get_u32()?;
                log::debug!("received SSH_MSG_UNIMPLEMENTED for packet seq {}", packet_seq);
            },
            _ => return Ok(packet),
        }
    }
}

pub(super) async fn send_disconnect<S>(
    transport: &mut Transport<S>,
    reason_code: u32,
) -> Result<()>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::DISCONNECT);
    payload.put_u32(reason_code);
    payload.put_str(disconnect::to_str(reason_code).unwrap_or(""));
    payload.put_str("");
    log::debug!("sending SSH_MSG_DISCONNECT with reason code {}", reason_code);
    transport.send_packet(&payload.finish()).await?;
    Ok(())
}
