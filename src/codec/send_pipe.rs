use bytes::{Buf as _, BufMut as _, BytesMut};
use crate::cipher::SendCipher;
use crate::error::Result;
use crate::mac::{self, Mac};

pub(crate) struct SendPipe {
    buf: BytesMut,
    cipher: SendCipher,
    mac: Box<dyn Mac + Send>,
    mac_tag_len: usize,
    packet_seq: u32,
}

impl SendPipe {
    pub fn new() -> SendPipe {
        SendPipe {
            buf: BytesMut::new(),
            cipher: SendCipher::None,
            mac: Box::new(mac::Empty),
            mac_tag_len: 0,
            packet_seq: 0,
        }
    }

    pub fn feed_ident(&mut self, ident: &[u8]) {
        // RFC 4253, section 4.2
        self.buf.reserve(ident.len() + 2);
        self.buf.put_slice(ident);
        self.buf.put_slice(&b"\r\n"[..]);
    }

    pub fn feed_packet(&mut self, payload: &[u8]) -> Result<u32> {
        log::trace!("feed packet {}, len {}, seq {}",
            payload.first().cloned().unwrap_or(0), payload.len(), self.packet_seq);

        let padding_len = self.cipher.padding_len(payload.len());
        let tag_len = if self.cipher.is_aead() { self.cipher.tag_len() } else { self.mac_tag_len };

        // RFC 4253, section 6
        //
        // packet layout:
        // 4 bytes: `packet_len = 1 + payload_len + padding_len` (u32 big endian)
        // 1 byte: padding_len (u8)
        // `payload_len` bytes: payload
        // `padding_len` bytes: zero padding
        // `tag_len` bytes: mac tag

        let packet_begin = self.buf.len();
        self.buf.reserve(5 + payload.len() + padding_len + tag_len);
        self.buf.put_u32((1 + payload.len() + padding_len) as u32);
        self.buf.put_u8(padding_len as u8);
        self.buf.put_slice(payload);
        self.buf.put_bytes(0, padding_len + tag_len);

        let packet = &mut self.buf[packet_begin..];
        let (plaintext, tag) = packet.split_at_mut(5 + payload.len() + padding_len);
        if self.cipher.is_aead() {
            self.cipher.encrypt_packet(plaintext, tag)?;
        } else {
            self.mac.sign(self.packet_seq, plaintext, tag);
            self.cipher.encrypt_packet(plaintext, &mut [])?;
        }

        let packet_seq = self.packet_seq;
        self.packet_seq = self.packet_seq.wrapping_add(1);
        Ok(packet_seq)
    }

    pub fn set_cipher(&mut self, cipher: SendCipher) {
        self.cipher = cipher;
    }

    pub fn set_mac(&mut self, mac: Box<dyn Mac + Send>, tag_len: usize) {
        self.mac = mac;
        self.mac_tag_len = tag_len;
    }

    pub fn peek_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn consume_bytes(&mut self, len: usize) {
        self.buf.advance(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_send() {
        fn assert_is_send<T: Send>() {}
        assert_is_send::<SendPipe>()
    }

    // 5 bytes of payload frame to a 16-byte packet with 6 bytes of zero padding
    #[test]
    fn test_feed_packet_none_cipher() {
        let mut pipe = SendPipe::new();
        pipe.feed_packet(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        assert_eq!(
            pipe.peek_bytes(),
            &b"\x00\x00\x00\x0c\x06\x01\x02\x03\x04\x05\x00\x00\x00\x00\x00\x00"[..],
        );
    }

    #[test]
    fn test_feed_ident() {
        let mut pipe = SendPipe::new();
        pipe.feed_ident(b"SSH-2.0-dummy");
        assert_eq!(pipe.peek_bytes(), &b"SSH-2.0-dummy\r\n"[..]);
    }

    // the sequence number advances by one per packet
    #[test]
    fn test_packet_seq() {
        let mut pipe = SendPipe::new();
        for expected_seq in 0..10 {
            let seq = pipe.feed_packet(b"payload").unwrap();
            assert_eq!(seq, expected_seq);
        }
    }
}
