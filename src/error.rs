use std::fmt;
use crate::numbers::disconnect;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("cryptography error: {0}")]
    Crypto(&'static str),
    #[error("mac verification failed")]
    Mac,
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    #[error("could not decode bytes: {0}")]
    Decode(&'static str),
    #[error("could not negotiate algorithm: {0}")]
    AlgoNegotiate(AlgoNegotiateError),
    #[error("illegal identification banner: {0}")]
    IllegalIdent(&'static str),
    #[error("server host key was not accepted")]
    HostKey,
    #[error("could not log in")]
    AuthFailed,
    #[error("packet {0} not implemented")]
    PacketNotImplemented(u8),
    #[error("IO error when reading")]
    ReadIo(#[source] std::io::Error),
    #[error("IO error when writing")]
    WriteIo(#[source] std::io::Error),
    #[error("connection unexpectedly closed by peer")]
    PeerClosed,
    #[error("peer disconnected: {0}")]
    PeerDisconnected(DisconnectError),
}

impl Error {
    /// Reason code of the `SSH_MSG_DISCONNECT` that should be reported to the
    /// peer before the connection is torn down, if any.
    pub(crate) fn disconnect_reason(&self) -> Option<u32> {
        match self {
            Error::Protocol(_) | Error::Decode(_) | Error::IllegalIdent(_)
                | Error::PacketNotImplemented(_) =>
                Some(disconnect::PROTOCOL_ERROR),
            Error::AlgoNegotiate(_) | Error::HostKey =>
                Some(disconnect::KEY_EXCHANGE_FAILED),
            Error::Mac =>
                Some(disconnect::MAC_ERROR),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("for {algo_name:}, our algos are {our_algos:?}, their algos are {their_algos:?}")]
pub struct AlgoNegotiateError {
    pub algo_name: String,
    pub our_algos: Vec<String>,
    pub their_algos: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct DisconnectError {
    pub reason_code: u32,
    pub description: String,
    pub description_lang: String,
}

impl fmt::Display for DisconnectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "server returned error ")?;
        if let Some(reason) = disconnect::to_str(self.reason_code) {
            write!(f, "`{}` ({})", reason, self.reason_code)?;
        } else {
            write!(f, "{}", self.reason_code)?;
        }
        if !self.description.is_empty() {
            write!(f, ": {:?}", self.description)?;
        }
        Ok(())
    }
}
