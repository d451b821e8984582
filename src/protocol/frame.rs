//! WebSocket frame codec: pure conversion between a byte stream and
//! [`Frame`] values. Owns no I/O beyond reading from the supplied source.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::FrameError;

/// Largest payload that fits the 16-bit extended length field.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// 4-bit frame opcode.
///
/// Unknown nibbles decode into `Reserved` so that a frame with an
/// unrecognized opcode can still be read off the wire and skipped by the
/// dispatch layer instead of desynchronizing the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl OpCode {
    pub fn from_u8(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(other) => other & 0x0F,
        }
    }
}

/// One decoded protocol frame. Transient: constructed per read/write,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a text frame from a UTF-8 payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            fin: true,
            opcode: OpCode::Text,
            payload: content.into().into_bytes(),
        }
    }

    /// Build a pong frame echoing the given ping payload.
    pub fn pong(payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode: OpCode::Pong,
            payload,
        }
    }

    /// Build an empty close frame.
    pub fn close() -> Self {
        Self {
            fin: true,
            opcode: OpCode::Close,
            payload: Vec::new(),
        }
    }
}

/// Read one frame from the byte source.
///
/// EOF before the first header byte signals graceful closure
/// ([`FrameError::ConnectionClosed`]), not an error. Masked payloads are
/// unmasked in place with `mask_key[i % 4]`. A 7-bit length of 126 pulls a
/// 16-bit extended length; 127 (64-bit length) is rejected.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let first = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(FrameError::Io(e)),
    };
    let fin = first & 0x80 != 0;
    let opcode = OpCode::from_u8(first & 0x0F);

    let second = reader.read_u8().await?;
    let masked = second & 0x80 != 0;
    let mut payload_len = (second & 0x7F) as usize;
    if payload_len == 126 {
        payload_len = reader.read_u16().await? as usize;
    } else if payload_len == 127 {
        return Err(FrameError::UnsupportedFrameSize);
    }

    let mask_key = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;

    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Frame {
        fin,
        opcode,
        payload,
    })
}

/// Encode a frame for the server-to-client direction.
///
/// Server-originated frames always carry FIN=1 and are never masked.
/// Payloads above [`MAX_FRAME_PAYLOAD`] fail with
/// [`FrameError::PayloadTooLarge`].
pub fn encode(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let len = frame.payload.len();
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge(len));
    }

    let mut buf = Vec::with_capacity(4 + len);
    buf.push(0x80 | frame.opcode.to_u8());
    if len < 126 {
        buf.push(len as u8);
    } else {
        buf.push(126);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    }
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a client-style frame: FIN=1, masked payload.
    fn client_frame(opcode: u8, payload: &[u8], mask_key: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(0x80 | opcode);
        if payload.len() < 126 {
            buf.push(0x80 | payload.len() as u8);
        } else {
            buf.push(0x80 | 126);
            buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        buf.extend_from_slice(&mask_key);
        buf.extend(
            payload
                .iter()
                .enumerate()
                .map(|(i, byte)| byte ^ mask_key[i % 4]),
        );
        buf
    }

    #[tokio::test]
    async fn test_round_trip_masked_text_frames() {
        // テスト項目: クライアント相当のマスク付きフレームが元のペイロードに復元される
        // given (前提条件): 境界値を含むペイロード長
        for len in [0usize, 1, 125, 126, 1000, 65535] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let wire = client_frame(0x1, &payload, [0x12, 0x34, 0x56, 0x78]);

            // when (操作):
            let frame = read_frame(&mut wire.as_slice()).await.unwrap();

            // then (期待する結果):
            assert!(frame.fin, "len={len}");
            assert_eq!(frame.opcode, OpCode::Text, "len={len}");
            assert_eq!(frame.payload, payload, "len={len}");
        }
    }

    #[tokio::test]
    async fn test_decode_unmasked_server_frame() {
        // テスト項目: encode した（マスクなしの）フレームがそのまま decode できる
        // given (前提条件):
        let frame = Frame::text("hello");
        let wire = encode(&frame).unwrap();

        // when (操作):
        let decoded = read_frame(&mut wire.as_slice()).await.unwrap();

        // then (期待する結果):
        assert_eq!(decoded, frame);
    }

    #[tokio::test]
    async fn test_eof_before_first_byte_is_graceful_close() {
        // テスト項目: 先頭バイトの前の EOF は ConnectionClosed として通知される
        // given (前提条件):
        let wire: Vec<u8> = Vec::new();

        // when (操作):
        let result = read_frame(&mut wire.as_slice()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_64bit_length_is_rejected() {
        // テスト項目: 64-bit 拡張長（7-bit 長 = 127）は UnsupportedFrameSize になる
        // given (前提条件):
        let wire = vec![0x81, 0x80 | 127];

        // when (操作):
        let result = read_frame(&mut wire.as_slice()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(FrameError::UnsupportedFrameSize)));
    }

    #[tokio::test]
    async fn test_unknown_opcode_still_decodes() {
        // テスト項目: 未知の opcode でもフレームとして decode できる
        // given (前提条件): opcode 0x3 (reserved)
        let wire = client_frame(0x3, b"x", [1, 2, 3, 4]);

        // when (操作):
        let frame = read_frame(&mut wire.as_slice()).await.unwrap();

        // then (期待する結果):
        assert_eq!(frame.opcode, OpCode::Reserved(0x3));
        assert_eq!(frame.payload, b"x");
    }

    #[tokio::test]
    async fn test_ping_frame_decodes_with_payload() {
        // テスト項目: Ping フレームがペイロード付きで decode できる
        // given (前提条件):
        let wire = client_frame(0x9, b"ping-data", [9, 8, 7, 6]);

        // when (操作):
        let frame = read_frame(&mut wire.as_slice()).await.unwrap();

        // then (期待する結果):
        assert_eq!(frame.opcode, OpCode::Ping);
        assert_eq!(frame.payload, b"ping-data");
    }

    #[test]
    fn test_encode_small_payload_uses_direct_length() {
        // テスト項目: 126 バイト未満のペイロードは直接長で encode される
        // given (前提条件):
        let frame = Frame::text("hi");

        // when (操作):
        let wire = encode(&frame).unwrap();

        // then (期待する結果): FIN=1 | opcode=1, 長さ 2, マスクなし
        assert_eq!(wire[0], 0x81);
        assert_eq!(wire[1], 2);
        assert_eq!(&wire[2..], b"hi");
    }

    #[test]
    fn test_encode_extended_length() {
        // テスト項目: 126〜65535 バイトのペイロードは 16-bit 拡張長で encode される
        // given (前提条件):
        let payload = "a".repeat(300);
        let frame = Frame::text(payload);

        // when (操作):
        let wire = encode(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(wire[0], 0x81);
        assert_eq!(wire[1], 126);
        assert_eq!(u16::from_be_bytes([wire[2], wire[3]]), 300);
        assert_eq!(wire.len(), 4 + 300);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        // テスト項目: 65536 バイト以上のペイロードは PayloadTooLarge になる
        // given (前提条件):
        let frame = Frame {
            fin: true,
            opcode: OpCode::Text,
            payload: vec![0u8; MAX_FRAME_PAYLOAD + 1],
        };

        // when (操作):
        let result = encode(&frame);

        // then (期待する結果):
        assert!(matches!(result, Err(FrameError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_encode_pong_uses_pong_opcode() {
        // テスト項目: Pong フレームは opcode 0xA で encode される
        // given (前提条件):
        let frame = Frame::pong(b"echo".to_vec());

        // when (操作):
        let wire = encode(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(wire[0], 0x8A);
        assert_eq!(wire[1], 4);
        assert_eq!(&wire[2..], b"echo");
    }

    #[test]
    fn test_opcode_round_trip() {
        // テスト項目: OpCode の from_u8/to_u8 が往復で一致する
        // given (前提条件):
        for nibble in 0u8..16 {
            // when (操作):
            let opcode = OpCode::from_u8(nibble);

            // then (期待する結果):
            assert_eq!(opcode.to_u8(), nibble);
        }
    }
}
