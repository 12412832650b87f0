pub use self::packet_encode::PacketEncode;
pub use self::packet_decode::PacketDecode;
pub(crate) use self::recv_pipe::{RecvPacket, RecvPipe};
pub(crate) use self::send_pipe::SendPipe;

/// Hard limit on `packet_length` (RFC 4253, section 6.1).
pub(crate) const MAX_PACKET_LEN: usize = 35000;

pub(crate) struct Codec {
    pub recv_pipe: RecvPipe,
    pub send_pipe: SendPipe,
}

mod packet_encode;
mod packet_decode;
mod recv_pipe;
mod send_pipe;
