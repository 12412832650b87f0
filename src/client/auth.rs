use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Error, Result};
use crate::numbers::msg;
use crate::signer::PubkeyCredential;
use super::client::{recv_transport_packet, Client};

/// Message sent by the server when an authentication attempt fails.
///
/// This corresponds to `SSH_MSG_USERAUTH_FAILURE` (RFC 4252, section 5.1).
/// Note that this may actually represent a [partial
/// success][Self::partial_success].
#[derive(Debug, Clone)]
pub struct AuthFailure {
    /// Authentication methods that may productively continue the
    /// authentication.
    pub methods_can_continue: Vec<String>,
    /// True if the request was successful, but the authentication should
    /// continue with another method.
    pub partial_success: bool,
}

enum AuthReply {
    Success,
    Failure(AuthFailure),
}

/// Runs the user authentication phase: the "ssh-userauth" service request,
/// the public key candidates in order, and at most one password attempt.
pub(super) async fn authenticate<S>(client: &mut Client<S>) -> Result<()>
    where S: AsyncRead + AsyncWrite + Unpin
{
    if client.session_id.is_empty() {
        return Err(Error::Protocol("user authentication attempted before key exchange"));
    }

    request_userauth_service(client).await?;

    for index in 0..client.config.credentials.len() {
        let payload = {
            let credential = &client.config.credentials[index];
            pubkey_request(&client.session_id, &client.config.username, credential)?
        };
        log::debug!("sending SSH_MSG_USERAUTH_REQUEST for method 'publickey'");
        client.transport.send_packet(&payload).await?;

        match recv_auth_reply(client).await? {
            AuthReply::Success => return Ok(()),
            AuthReply::Failure(failure) => {
                log::debug!("received SSH_MSG_USERAUTH_FAILURE: {:?}", failure);
                if failure.methods_can_continue.is_empty() && !failure.partial_success {
                    return Err(Error::AuthFailed);
                }
            },
        }
    }

    // a single password attempt once every public key was rejected
    if let Some(provider) = client.config.password.take() {
        let password = provider();
        let payload = password_request(&client.config.username, &password);
        log::debug!("sending SSH_MSG_USERAUTH_REQUEST for method 'password'");
        client.transport.send_packet(&payload).await?;

        match recv_auth_reply(client).await? {
            AuthReply::Success => return Ok(()),
            AuthReply::Failure(failure) => {
                log::debug!("received SSH_MSG_USERAUTH_FAILURE: {:?}", failure);
                return Err(Error::AuthFailed);
            },
        }
    }

    Err(Error::AuthFailed)
}

async fn request_userauth_service<S>(client: &mut Client<S>) -> Result<()>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::SERVICE_REQUEST);
    payload.put_str("ssh-userauth");
    log::debug!("sending SSH_MSG_SERVICE_REQUEST for 'ssh-userauth'");
    client.transport.send_packet(&payload.finish()).await?;

    let payload = recv_transport_packet(&mut client.transport, client.config.verbosity)
        .await?.payload;
    let mut payload = PacketDecode::new(payload);
    if payload.get_u8()? != msg::SERVICE_ACCEPT {
        return Err(Error::Protocol("expected SSH_MSG_SERVICE_ACCEPT"));
    }
    if payload.get_string()?.as_str() != "ssh-userauth" {
        return Err(Error::Protocol("received SSH_MSG_SERVICE_ACCEPT for an unexpected service"));
    }
    log::debug!("received SSH_MSG_SERVICE_ACCEPT for 'ssh-userauth'");
    Ok(())
}

fn pubkey_request(
    session_id: &[u8],
    username: &str,
    credential: &PubkeyCredential,
) -> Result<Bytes> {
    // RFC 4252, section 7: the signature covers the session id and the
    // request fields up to and including the public key blob
    let mut signed = PacketEncode::new();
    signed.put_bytes(session_id);
    signed.put_u8(msg::USERAUTH_REQUEST);
    signed.put_str(username);
    signed.put_str("ssh-connection");
    signed.put_str("publickey");
    signed.put_bool(true);
    signed.put_str(&credential.algo_name);
    signed.put_bytes(&credential.pubkey_blob);
    let signature = credential.signer.sign(&signed.finish())?;

    let mut payload = PacketEncode::new();
    payload.put_u8(msg::USERAUTH_REQUEST);
    payload.put_str(username);
    payload.put_str("ssh-connection");
    payload.put_str("publickey");
    payload.put_bool(true);
    payload.put_str(&credential.algo_name);
    payload.put_bytes(&credential.pubkey_blob);
    payload.put_bytes(&signature);
    Ok(payload.finish())
}

fn password_request(username: &str, password: &[u8]) -> Bytes {
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::USERAUTH_REQUEST);
    payload.put_str(username);
    payload.put_str("ssh-connection");
    payload.put_str("password");
    payload.put_bool(false);
    payload.put_bytes(password);
    payload.finish()
}

async fn recv_auth_reply<S>(client: &mut Client<S>) -> Result<AuthReply>
    where S: AsyncRead + AsyncWrite + Unpin
{
    loop {
        let packet = recv_transport_packet(&mut client.transport, client.config.verbosity).await?;
        let mut payload = PacketDecode::new(packet.payload.clone());
        let msg_id = payload.get_u8()?;
        match msg_id {
            msg::USERAUTH_SUCCESS => {
                log::debug!("received SSH_MSG_USERAUTH_SUCCESS");
                return Ok(AuthReply::Success);
            },
            msg::USERAUTH_FAILURE => {
                return Ok(AuthReply::Failure(AuthFailure {
                    methods_can_continue: payload.get_name_list()?,
                    partial_success: payload.get_bool()?,
                }));
            },
            msg::USERAUTH_BANNER => {
                let message = payload.get_string()?;
                let _message_lang = payload.get_string()?;
                log::debug!("received SSH_MSG_USERAUTH_BANNER: {:?}", message);
            },
            // method-specific messages that we do not support, e.g. password
            // change requests
            60..=79 => {
                log::debug!("received unimplemented packet {}, seq {}", msg_id, packet.packet_seq);
                let mut reply = PacketEncode::new();
                reply.put_u8(msg::UNIMPLEMENTED);
                reply.put_u32(packet.packet_seq);
                client.transport.send_packet(&reply.finish()).await?;
            },
            _ => return Err(Error::Protocol("received unexpected message during authentication")),
        }
    }
}
