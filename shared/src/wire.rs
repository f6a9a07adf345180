//! Tagged message framing for the single duplex stream.
//!
//! Every message starts with a big-endian `i32` tag:
//!
//! | tag | payload |
//! |-----|---------|
//! | [`TAG_TEXT`]  | `u16` byte length, then that many UTF-8 bytes |
//! | [`TAG_FRAME`] | `i32` byte length in `1..=MAX_FRAME_BYTES`, then the raw bytes |
//!
//! Anything else is a framing violation. Framing violations are fatal: the
//! stream can no longer be resynchronised, so the connection must be dropped.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const TAG_TEXT: i32 = 1;
pub const TAG_FRAME: i32 = 2;
/// Hard ceiling on a single frame; larger length headers are rejected before
/// any allocation happens.
pub const MAX_FRAME_BYTES: usize = 50 * 1024 * 1024;
pub const MAX_TEXT_BYTES: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Frame(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown message tag {0}")]
    UnknownTag(i32),
    #[error("invalid frame length {0}")]
    InvalidFrameLength(i64),
    #[error("text message of {0} bytes does not fit a u16 length")]
    TextTooLong(usize),
    #[error("text message is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// True for errors caused by the peer violating the framing rules, as
    /// opposed to the transport failing underneath.
    pub fn is_framing_violation(&self) -> bool {
        !matches!(self, WireError::Io(_))
    }
}

pub fn encode_text(text: &str) -> Result<Vec<u8>, WireError> {
    let bytes = text.as_bytes();
    if bytes.len() > MAX_TEXT_BYTES {
        return Err(WireError::TextTooLong(bytes.len()));
    }

    let mut out = Vec::with_capacity(6 + bytes.len());
    out.extend_from_slice(&TAG_TEXT.to_be_bytes());
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(out)
}

pub fn encode_frame(data: &[u8]) -> Result<Vec<u8>, WireError> {
    if data.is_empty() || data.len() > MAX_FRAME_BYTES {
        return Err(WireError::InvalidFrameLength(data.len() as i64));
    }

    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&TAG_FRAME.to_be_bytes());
    out.extend_from_slice(&(data.len() as i32).to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    match message {
        Message::Text(text) => encode_text(text),
        Message::Frame(data) => encode_frame(data),
    }
}

/// Reads the next tagged message.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between two
/// messages. A stream that ends in the middle of a message is an
/// `UnexpectedEof` I/O error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut tag_buf = [0u8; 4];
    let first = reader.read(&mut tag_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    if first < tag_buf.len() {
        reader.read_exact(&mut tag_buf[first..]).await?;
    }

    match i32::from_be_bytes(tag_buf) {
        TAG_TEXT => {
            let len = reader.read_u16().await? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes).await?;
            Ok(Some(Message::Text(String::from_utf8(bytes)?)))
        }
        TAG_FRAME => {
            let len = reader.read_i32().await?;
            if len <= 0 || len as usize > MAX_FRAME_BYTES {
                return Err(WireError::InvalidFrameLength(len as i64));
            }
            let mut bytes = vec![0u8; len as usize];
            reader.read_exact(&mut bytes).await?;
            Ok(Some(Message::Frame(bytes)))
        }
        other => Err(WireError::UnknownTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_text_message() {
        let bytes = encode_text("Usuario:").unwrap();
        let mut mock = Builder::new().read(&bytes).build();

        let message = read_message(&mut mock).await.unwrap();
        assert_eq!(message, Some(Message::Text("Usuario:".to_string())));
    }

    #[tokio::test]
    async fn test_read_non_ascii_text() {
        let bytes = encode_text("Contraseña:").unwrap();
        // Tag, length and payload arrive in separate reads
        let mut mock = Builder::new()
            .read(&bytes[..2])
            .read(&bytes[2..5])
            .read(&bytes[5..])
            .build();

        let message = read_message(&mut mock).await.unwrap();
        assert_eq!(message, Some(Message::Text("Contraseña:".to_string())));
    }

    #[tokio::test]
    async fn test_read_frame_message() {
        let bytes = encode_frame(&[1, 2, 3, 4, 5]).unwrap();
        let mut mock = Builder::new().read(&bytes).build();

        let message = read_message(&mut mock).await.unwrap();
        assert_eq!(message, Some(Message::Frame(vec![1, 2, 3, 4, 5])));
    }

    #[tokio::test]
    async fn test_clean_eof_is_end_of_stream() {
        let mut mock = Builder::new().build();
        assert!(read_message(&mut mock).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_inside_message_is_io_error() {
        let bytes = encode_text("derecha").unwrap();
        let mut mock = Builder::new().read(&bytes[..7]).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::Io(_)));
        assert!(!err.is_framing_violation());
    }

    #[tokio::test]
    async fn test_unknown_tag_rejected() {
        let mut mock = Builder::new().read(&7i32.to_be_bytes()).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::UnknownTag(7)));
        assert!(err.is_framing_violation());
    }

    #[tokio::test]
    async fn test_zero_length_frame_rejected() {
        let mut bytes = TAG_FRAME.to_be_bytes().to_vec();
        bytes.extend_from_slice(&0i32.to_be_bytes());
        let mut mock = Builder::new().read(&bytes).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::InvalidFrameLength(0)));
    }

    #[tokio::test]
    async fn test_negative_frame_length_rejected() {
        let mut bytes = TAG_FRAME.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(-5i32).to_be_bytes());
        let mut mock = Builder::new().read(&bytes).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::InvalidFrameLength(-5)));
    }

    #[tokio::test]
    async fn test_oversized_frame_header_rejected_without_payload() {
        let mut bytes = TAG_FRAME.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(MAX_FRAME_BYTES as i32 + 1).to_be_bytes());
        let mut mock = Builder::new().read(&bytes).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::InvalidFrameLength(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let mut bytes = TAG_TEXT.to_be_bytes().to_vec();
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&[0xc3, 0x28]);
        let mut mock = Builder::new().read(&bytes).build();

        let err = read_message(&mut mock).await.unwrap_err();
        assert!(matches!(err, WireError::InvalidUtf8(_)));
    }

    #[test]
    fn test_encode_layout() {
        let text = encode_text("ab").unwrap();
        assert_eq!(text, vec![0, 0, 0, 1, 0, 2, b'a', b'b']);

        let frame = encode_frame(&[9]).unwrap();
        assert_eq!(frame, vec![0, 0, 0, 2, 0, 0, 0, 1, 9]);
    }

    #[test]
    fn test_encode_limits() {
        let long = "x".repeat(MAX_TEXT_BYTES + 1);
        assert!(matches!(encode_text(&long), Err(WireError::TextTooLong(_))));
        assert!(encode_text(&"x".repeat(MAX_TEXT_BYTES)).is_ok());
        assert!(matches!(
            encode_frame(&[]),
            Err(WireError::InvalidFrameLength(0))
        ));
    }

    #[test]
    fn test_encode_dispatches_on_kind() {
        let text = encode(&Message::Text("hola".to_string())).unwrap();
        assert_eq!(&text[..4], &TAG_TEXT.to_be_bytes());
        let frame = encode(&Message::Frame(vec![1])).unwrap();
        assert_eq!(&frame[..4], &TAG_FRAME.to_be_bytes());
    }
}
