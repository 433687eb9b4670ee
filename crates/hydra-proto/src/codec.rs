//! Length-prefixed CBOR framing.
//!
//! A frame is a 4-byte big-endian body length followed by the CBOR encoding
//! of one [`HydraMessage`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtoError, Result};
use crate::messages::{limits, HydraMessage};

/// Encode a message into a complete frame.
pub fn encode_frame(message: &HydraMessage) -> Result<Vec<u8>> {
    let mut frame = vec![0u8; 4];
    ciborium::into_writer(message, &mut frame).map_err(|e| ProtoError::Encode(e.to_string()))?;
    let size = frame.len() - 4;
    if size > limits::MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge {
            size,
            max: limits::MAX_FRAME_SIZE,
        });
    }
    frame[..4].copy_from_slice(&(size as u32).to_be_bytes());
    Ok(frame)
}

/// Decode a frame body.
pub fn decode_body(body: &[u8]) -> Result<HydraMessage> {
    ciborium::from_reader(body).map_err(|e| ProtoError::Decode(e.to_string()))
}

/// Write one message as a frame.
pub async fn write_message<W>(writer: &mut W, message: &HydraMessage) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message.
///
/// Returns `Ok(None)` when the peer closed the stream between frames. A body
/// that fails to decode yields [`ProtoError::Decode`] with the stream still
/// positioned at the next frame. Not cancel-safe.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<HydraMessage>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len = [0u8; 4];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_be_bytes(len) as usize;
    if size > limits::MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge {
            size,
            max: limits::MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    decode_body(&body).map(Some)
}
