//! 4-byte big-endian length prefix + JSON body framing, generic over any
//! Tokio async reader/writer (a Unix stream in production, an in-memory
//! duplex pipe in tests).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Messages larger than this are rejected outright; the connection may be
/// closed by the caller after observing this error.
pub const MAX_MESSAGE_BYTES: u32 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("connection closed")]
    Closed,
    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit")]
    TooLarge(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one framed message. Returns `Err(FramingError::Closed)` if the peer
/// closed the connection before sending a length prefix (a clean EOF at a
/// message boundary, e.g. idle-timeout disconnect).
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::Closed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(FramingError::TooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Write one framed message: the 4-byte big-endian length prefix followed
/// by `body`. Rejects oversize bodies before writing anything.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), FramingError> {
    let len: u32 = body.len().try_into().map_err(|_| FramingError::TooLarge(u32::MAX))?;
    if len > MAX_MESSAGE_BYTES {
        return Err(FramingError::TooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
