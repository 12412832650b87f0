use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _, ReadHalf, WriteHalf};
use crate::codec::{Codec, RecvPacket, RecvPipe, SendPipe};
use crate::error::{Error, Result};

pub(super) struct Transport<S> {
    stream: S,
    pub codec: Codec,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Transport<S> {
    pub fn new(stream: S) -> Transport<S> {
        Transport {
            stream,
            codec: Codec {
                recv_pipe: RecvPipe::new(),
                send_pipe: SendPipe::new(),
            },
        }
    }

    pub async fn send_ident(&mut self, ident: &[u8]) -> Result<()> {
        self.codec.send_pipe.feed_ident(ident);
        flush(&mut self.stream, &mut self.codec.send_pipe).await
    }

    pub async fn send_packet(&mut self, payload: &[u8]) -> Result<u32> {
        let packet_seq = self.codec.send_pipe.feed_packet(payload)?;
        flush(&mut self.stream, &mut self.codec.send_pipe).await?;
        Ok(packet_seq)
    }

    pub async fn recv_ident(&mut self) -> Result<Bytes> {
        loop {
            if let Some(line) = self.codec.recv_pipe.consume_ident()? {
                // detach the line from the pipe's internal buffer
                return Ok(Bytes::copy_from_slice(&line));
            }
            read_more(&mut self.stream, &mut self.codec.recv_pipe).await?;
        }
    }

    pub async fn recv_packet(&mut self) -> Result<RecvPacket> {
        loop {
            if let Some(packet) = self.codec.recv_pipe.consume_packet()? {
                return Ok(packet);
            }
            read_more(&mut self.stream, &mut self.codec.recv_pipe).await?;
        }
    }

    pub fn into_split(self) -> (PacketSender<WriteHalf<S>>, PacketReceiver<ReadHalf<S>>) {
        let (reader, writer) = tokio::io::split(self.stream);
        let sender = PacketSender { writer, pipe: self.codec.send_pipe };
        let receiver = PacketReceiver { reader, pipe: self.codec.recv_pipe };
        (sender, receiver)
    }
}

async fn flush<W>(writer: &mut W, pipe: &mut SendPipe) -> Result<()>
    where W: AsyncWrite + Unpin
{
    while !pipe.is_empty() {
        let written_len = writer.write(pipe.peek_bytes()).await.map_err(Error::WriteIo)?;
        if written_len == 0 {
            return Err(Error::WriteIo(std::io::ErrorKind::WriteZero.into()));
        }
        log::trace!("written {} bytes", written_len);
        pipe.consume_bytes(written_len);
    }
    writer.flush().await.map_err(Error::WriteIo)
}

async fn read_more<R>(reader: &mut R, pipe: &mut RecvPipe) -> Result<()>
    where R: AsyncRead + Unpin
{
    let read_len = reader.read_buf(pipe.feed_buf()).await.map_err(Error::ReadIo)?;
    if read_len == 0 {
        log::debug!("received eof");
        return Err(Error::PeerClosed);
    }
    log::trace!("read {} bytes", read_len);
    Ok(())
}

/// The transport handles passed to the instrumentation hooks.
///
/// A hook may inspect the pipes or queue a packet that goes out with the
/// driver's next write (an `SSH_MSG_IGNORE` keepalive, an `SSH_MSG_DEBUG`
/// marker), but it must not send arbitrary packets that take part in the
/// handshake itself.
pub trait TransportHandles {
    /// Queues one packet on the send pipe without flushing it; it is written
    /// together with the driver's next packet. Returns the packet sequence
    /// number.
    fn feed_packet(&mut self, payload: &[u8]) -> Result<u32>;

    /// Number of outbound bytes framed but not yet written to the stream.
    fn send_buffered_len(&self) -> usize;

    /// Number of inbound bytes buffered but not yet parsed into packets.
    fn recv_buffered_len(&self) -> usize;
}

impl<S: AsyncRead + AsyncWrite + Unpin> TransportHandles for Transport<S> {
    fn feed_packet(&mut self, payload: &[u8]) -> Result<u32> {
        self.codec.send_pipe.feed_packet(payload)
    }

    fn send_buffered_len(&self) -> usize {
        self.codec.send_pipe.peek_bytes().len()
    }

    fn recv_buffered_len(&self) -> usize {
        self.codec.recv_pipe.buffered_len()
    }
}

/// Sending half of an established connection.
///
/// The half owns its cipher state and sequence counter, so sends are
/// serialized by driving it from a single task.
pub struct PacketSender<W> {
    writer: W,
    pipe: SendPipe,
}

impl<W: AsyncWrite + Unpin> PacketSender<W> {
    /// Frames, encrypts and writes one packet, returning its sequence number.
    pub async fn send_packet(&mut self, payload: &[u8]) -> Result<u32> {
        let packet_seq = self.pipe.feed_packet(payload)?;
        flush(&mut self.writer, &mut self.pipe).await?;
        Ok(packet_seq)
    }
}

/// Receiving half of an established connection.
pub struct PacketReceiver<R> {
    reader: R,
    pipe: RecvPipe,
}

impl<R: AsyncRead + Unpin> PacketReceiver<R> {
    /// Reads, decrypts and authenticates the next packet, returning its
    /// payload.
    pub async fn recv_packet(&mut self) -> Result<Bytes> {
        loop {
            if let Some(packet) = self.pipe.consume_packet()? {
                return Ok(packet.payload);
            }
            read_more(&mut self.reader, &mut self.pipe).await?;
        }
    }
}
