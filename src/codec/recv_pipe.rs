use bytes::{Bytes, BytesMut};
use crate::cipher::RecvCipher;
use crate::error::{Error, Result};
use crate::mac::{self, Mac, MacVerified};
use super::MAX_PACKET_LEN;

pub(crate) struct RecvPipe {
    buf: BytesMut,
    state: State,
    cipher: RecvCipher,
    mac: Box<dyn Mac + Send>,
    mac_tag_len: usize,
    packet_seq: u32,
}

#[derive(Debug, Copy, Clone)]
enum State {
    Ready,
    ScanningLine { pos: usize },
    DecryptedLen { packet_len: usize },
}

#[derive(Debug)]
pub struct RecvPacket {
    pub payload: Bytes,
    pub packet_seq: u32,
}

impl RecvPipe {
    pub fn new() -> RecvPipe {
        RecvPipe {
            buf: BytesMut::new(),
            state: State::Ready,
            cipher: RecvCipher::None,
            mac: Box::new(mac::Empty),
            mac_tag_len: 0,
            packet_seq: 0,
        }
    }

    pub fn feed_buf(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn consume_ident(&mut self) -> Result<Option<Bytes>> {
        // RFC 4253, section 4.2: lines before the one starting with "SSH-"
        // are discarded
        loop {
            let line = match self.consume_line()? {
                Some(line) => line,
                None => return Ok(None),
            };

            if line.starts_with(&b"SSH-"[..]) {
                if line.len() > 255 {
                    return Err(Error::Protocol("received identification string is too long"))
                }
                return Ok(Some(line));
            }
        }
    }

    fn consume_line(&mut self) -> Result<Option<Bytes>> {
        let mut pos = match self.state {
            State::Ready => 0,
            State::ScanningLine { pos } => pos,
            State::DecryptedLen { .. } =>
                panic!("called consume_ident() after consume_packet() returned None"),
        };

        let mut line_len = None;
        loop {
            if pos >= self.buf.len() {
                break
            } else if self.buf[pos] == b'\r' {
                if pos + 1 >= self.buf.len() {
                    break
                } else if self.buf[pos + 1] == b'\n' {
                    line_len = Some(pos);
                    pos += 2;
                    break;
                }
            } else if self.buf[pos] == b'\n' {
                line_len = Some(pos);
                pos += 1;
                break;
            }

            pos += 1;
        }

        if let Some(line_len) = line_len {
            self.state = State::Ready;
            let mut line = self.buf.split_to(pos).freeze();
            line.truncate(line_len);
            Ok(Some(line))
        } else {
            self.state = State::ScanningLine { pos };
            Ok(None)
        }
    }

    pub fn consume_packet(&mut self) -> Result<Option<RecvPacket>> {
        let packet_len = match self.state {
            State::Ready => {
                let packet_len = match self.decrypt_packet_len()? {
                    Some(packet_len) => packet_len as usize,
                    None => return Ok(None),
                };

                if packet_len > MAX_PACKET_LEN {
                    return Err(Error::Protocol("invalid packet length (exceeds the 35000 byte limit)"));
                } else if packet_len < 5 {
                    return Err(Error::Protocol("invalid packet length (too short)"));
                }

                let aligned_len = if self.cipher.is_aead() { packet_len } else { packet_len + 4 };
                if aligned_len % self.cipher.block_len() != 0 {
                    return Err(Error::Protocol("invalid packet length (not aligned to cipher block length)"));
                }

                log::trace!("decrypted packet len {}", packet_len);
                self.state = State::DecryptedLen { packet_len };
                packet_len
            },
            State::DecryptedLen { packet_len } =>
                packet_len,
            State::ScanningLine { .. } =>
                panic!("called consume_packet() after consume_ident() returned None"),
        };

        let total_packet_len = 4 + packet_len + self.tag_len();
        if self.buf.len() < total_packet_len {
            log::trace!("received only {} bytes", self.buf.len());
            self.buf.reserve(total_packet_len - self.buf.len());
            return Ok(None)
        }

        let mut packet = self.buf.split_to(total_packet_len);
        let _verified: MacVerified = self.decrypt_packet_body(&mut packet, packet_len)?;

        let padding_len = packet[4] as usize;
        if padding_len < 4 {
            return Err(Error::Protocol("invalid padding length (must be at least 4)"));
        }
        if packet_len < 1 + padding_len {
            return Err(Error::Protocol("invalid packet length (too short for given padding)"));
        }

        let payload_len = packet_len - padding_len - 1;
        let payload = packet.freeze().slice(5..(5 + payload_len));
        let packet_seq = self.packet_seq;

        self.packet_seq = self.packet_seq.wrapping_add(1);
        self.state = State::Ready;
        Ok(Some(RecvPacket { payload, packet_seq }))
    }

    fn decrypt_packet_len(&mut self) -> Result<Option<u32>> {
        let prefix_len = self.cipher.len_prefix_len();
        if self.buf.len() < prefix_len {
            return Ok(None)
        }

        // the prefix is either one block that must be decrypted in place, or
        // the 4 cleartext length bytes of an AEAD packet
        self.cipher.decrypt_first_block(&mut self.buf[..prefix_len])?;
        Ok(Some(u32::from_be_bytes(self.buf[..4].try_into().unwrap())))
    }

    fn decrypt_packet_body(&mut self, packet: &mut [u8], packet_len: usize) -> Result<MacVerified> {
        if self.cipher.is_aead() {
            let (packet, tag) = packet.split_at_mut(4 + packet_len);
            self.cipher.open_packet(packet, tag)
        } else {
            let block_len = self.cipher.block_len();
            self.cipher.decrypt_rest(&mut packet[block_len..(4 + packet_len)])?;

            let plaintext = &packet[..(4 + packet_len)];
            let tag = &packet[(4 + packet_len)..][..self.mac_tag_len];
            self.mac.verify(self.packet_seq, plaintext, tag)
        }
    }

    fn tag_len(&self) -> usize {
        if self.cipher.is_aead() { self.cipher.tag_len() } else { self.mac_tag_len }
    }

    pub fn set_cipher(&mut self, cipher: RecvCipher) {
        self.cipher = cipher;
    }

    pub fn set_mac(&mut self, mac: Box<dyn Mac + Send>, tag_len: usize) {
        self.mac = mac;
        self.mac_tag_len = tag_len;
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, RngCore, SeedableRng as _};
    use crate::cipher::{self, CipherAlgo};
    use crate::codec::SendPipe;
    use crate::mac::{Mac, MacAlgo};
    use super::*;

    #[test]
    fn test_is_send() {
        fn assert_is_send<T: Send>() {}
        assert_is_send::<RecvPipe>()
    }

    fn make_rng() -> Box<dyn RngCore> {
        Box::new(rand_chacha::ChaCha8Rng::seed_from_u64(42))
    }

    fn b<D: AsRef<[u8]> + ?Sized>(data: &D) -> Bytes {
        Bytes::copy_from_slice(data.as_ref())
    }

    fn check_feeding<F0, F1, F2>(
        data: &[u8],
        mut check_prepare: F0,
        mut check_before: F1,
        mut check_after: F2,
    )
        where F0: FnMut(&mut RecvPipe),
              F1: FnMut(&mut RecvPipe),
              F2: FnMut(&mut RecvPipe),
    {
        let mut rng = make_rng();
        for iter in 0..100 {
            let mut data = data;
            let mut pipe = RecvPipe::new();
            check_prepare(&mut pipe);

            while !data.is_empty() {
                check_before(&mut pipe);
                let feed_len = if iter == 0 { 1 } else { rng.gen_range(1..=data.len()) };
                pipe.feed_buf().extend_from_slice(&data[..feed_len]);
                data = &data[feed_len..];
            }

            check_after(&mut pipe);
        }
    }


    fn check_ident<D: AsRef<[u8]>>(data: &D, ident: Option<Bytes>) {
        check_feeding(
            data.as_ref(),
            |_| (),
            |pipe| assert_eq!(pipe.consume_ident().unwrap(), None),
            |pipe| assert_eq!(pipe.consume_ident().unwrap(), ident.clone()),
        );
    }

    #[test]
    fn test_consume_ident() {
        // ident line terminated with \r\n preceded with some garbage lines
        check_ident(
            b"spam and eggs\nfoo bar\r\nSSH-2.0-dummy\r\n",
            Some(b("SSH-2.0-dummy")),
        );

        // it is ok to end a line with just \n
        check_ident(
            b"spam and eggs\r\nSSH-2.0-dummy\n",
            Some(b("SSH-2.0-dummy")),
        );

        // \r without \n is not a valid line termination
        check_ident(
            b"spam and eggs\r\nSSH-2.0-dummy\rfoo",
            None,
        );
    }


    fn check_packet<D: AsRef<[u8]>>(data: &D, payload: Bytes) {
        check_feeding(
            data.as_ref(),
            |_| (),
            |pipe| assert!(pipe.consume_packet().unwrap().is_none()),
            |pipe| assert_eq!(pipe.consume_packet().unwrap().unwrap().payload, payload),
        );
    }

    fn check_packet_err<D: AsRef<[u8]>>(data: &D, expected_msg: &str) {
        check_feeding(
            data.as_ref(),
            |_| (),
            |pipe| assert!(pipe.consume_packet().unwrap().is_none()),
            |pipe| {
                match pipe.consume_packet() {
                    Err(Error::Protocol(msg)) => assert!(msg.contains(expected_msg)),
                    Err(err) => panic!("unexpected error {:?}", err),
                    Ok(_) => panic!("expected an error"),
                }
            },
        );
    }

    #[test]
    fn test_consume_packet() {
        // packet with 3 bytes of payload and 8 bytes of padding
        check_packet(
            b"\x00\x00\x00\x0c\x08foo01234567",
            b("foo"),
        );

        // packet with 0 bytes of payload and 11 bytes of padding
        check_packet(
            b"\x00\x00\x00\x0c\x0b0123456789a",
            b(""),
        );

        // packet with excessive length
        check_packet_err(
            b"\xde\xad\xbe\xef\x00zzz",
            "35000 byte limit",
        );

        // packet that is too short
        check_packet_err(
            b"\x00\x00\x00\x03\x00zzz",
            "too short",
        );

        // packet with padding length below the 4 byte minimum
        check_packet_err(
            b"\x00\x00\x00\x0c\x03zzzzzzzzzzz",
            "padding length",
        );

        // packet that is too short for given padding length of 32
        check_packet_err(
            b"\x00\x00\x00\x0c\x20zzzxxxxyyyy",
            "too short for given padding",
        );

        // packet with 3 bytes of payload and 4 bytes of padding, not aligned to 8 byte block
        check_packet_err(
            b"\x00\x00\x00\x08\x04zzz",
            "not aligned",
        );
    }


    fn check_packet_mac<D: AsRef<[u8]>>(data: &D, tag: Bytes) {
        struct DummyMac {
            expected_plaintext: Bytes,
            expected_tag: Bytes,
            verify: bool,
        }

        impl Mac for DummyMac {
            fn sign(&mut self, _: u32, _: &[u8], _: &mut [u8]) {
                panic!("called DummyMac::sign()")
            }

            fn verify(&mut self, packet_seq: u32, plaintext: &[u8], tag: &[u8]) -> Result<MacVerified> {
                assert_eq!(packet_seq, 0);
                assert_eq!(plaintext, self.expected_plaintext.as_ref());
                assert_eq!(tag, self.expected_tag.as_ref());
                if self.verify {
                    Ok(MacVerified::assertion())
                } else {
                    Err(Error::Mac)
                }
            }
        }

        let data = data.as_ref();
        let plaintext = Bytes::copy_from_slice(&data[..data.len() - tag.len()]);
        for &verify in &[true, false] {
            check_feeding(
                data,
                |pipe| {
                    let mac = DummyMac {
                        expected_plaintext: plaintext.clone(),
                        expected_tag: tag.clone(),
                        verify,
                    };
                    pipe.set_mac(Box::new(mac), tag.len());
                },
                |pipe| {
                    assert!(pipe.consume_packet().unwrap().is_none());
                },
                |pipe| {
                    if verify {
                        assert!(pipe.consume_packet().is_ok());
                    } else {
                        assert!(pipe.consume_packet().is_err());
                    }
                },
            );
        }
    }

    #[test]
    fn test_consume_packet_mac() {
        check_packet_mac(
            b"\x00\x00\x00\x0c\x08foo01234567magicmac",
            b(b"magicmac"),
        );
    }


    // send a few packets through a send pipe and feed the wire bytes back
    // into a recv pipe keyed with the same algorithms
    fn check_pipe_round_trip(cipher_algo: &CipherAlgo, mac_algo: &MacAlgo) {
        let key = vec![0x42; cipher_algo.key_len];
        let iv = vec![0x17; cipher_algo.iv_len];
        let mac_key = vec![0x23; mac_algo.key_len];

        let mut send_pipe = SendPipe::new();
        send_pipe.set_cipher((cipher_algo.make_send)(&key, &iv));
        send_pipe.set_mac((mac_algo.make_mac)(&mac_key), mac_algo.tag_len);

        let mut recv_pipe = RecvPipe::new();
        recv_pipe.set_cipher((cipher_algo.make_recv)(&key, &iv));
        recv_pipe.set_mac((mac_algo.make_mac)(&mac_key), mac_algo.tag_len);

        let payloads = [
            Vec::from(&b"shorter payload"[..]),
            Vec::new(),
            (0..2000).map(|i| i as u8).collect(),
        ];
        for payload in &payloads {
            send_pipe.feed_packet(payload).unwrap();
        }

        recv_pipe.feed_buf().extend_from_slice(send_pipe.peek_bytes());
        for (i, payload) in payloads.iter().enumerate() {
            let packet = recv_pipe.consume_packet().unwrap().unwrap();
            assert_eq!(packet.packet_seq, i as u32);
            assert_eq!(packet.payload.as_ref(), payload.as_slice());
        }
        assert!(recv_pipe.consume_packet().unwrap().is_none());
    }

    #[test]
    fn test_pipe_round_trip_none() {
        check_pipe_round_trip(&cipher::NONE, &crate::mac::NONE);
    }

    #[test]
    fn test_pipe_round_trip_aes128_cbc() {
        check_pipe_round_trip(&cipher::AES128_CBC, &crate::mac::HMAC_SHA2_256);
    }

    #[test]
    fn test_pipe_round_trip_aes128_ctr() {
        check_pipe_round_trip(&cipher::AES128_CTR, &crate::mac::HMAC_SHA2_256);
    }

    #[test]
    fn test_pipe_round_trip_aes128_gcm() {
        check_pipe_round_trip(&cipher::AES128_GCM, &crate::mac::NONE);
    }

    // with aes-gcm the first 4 bytes on the wire are the cleartext packet length
    #[test]
    fn test_gcm_length_in_cleartext() {
        let key = [0x42; 16];
        let iv = [0x17; 12];
        let mut send_pipe = SendPipe::new();
        send_pipe.set_cipher((cipher::AES128_GCM.make_send)(&key, &iv));

        send_pipe.feed_packet(b"abcd").unwrap();
        // 1 + 4 bytes of payload + 11 bytes of padding
        assert_eq!(&send_pipe.peek_bytes()[..4], &[0, 0, 0, 16]);
        assert_eq!(send_pipe.peek_bytes().len(), 4 + 16 + 16);
    }
}
