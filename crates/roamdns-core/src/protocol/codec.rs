//! Single-value JSON framing over a byte stream.
//!
//! Every message is exactly one JSON value followed by a newline. There is no
//! length prefix: the reader buffers until the bytes hold one complete value.
//! Bytes after the first value are discarded, since each connection carries
//! at most one message in each direction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Upper bound on buffered bytes for one message
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 1024;

/// Encode `msg` and write it to `writer`, followed by a newline
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one JSON value from `reader` and decode it as `T`
///
/// # Errors
///
/// - [`Error::Protocol`] if the bytes are not valid JSON for `T`, the peer
///   closes before a full value arrives, or the value exceeds
///   [`MAX_MESSAGE_LEN`]
/// - [`Error::Network`] on socket errors
pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if let Some(msg) = try_decode(&buf)? {
            return Ok(msg);
        }
        if buf.len() > MAX_MESSAGE_LEN {
            return Err(Error::protocol(format!(
                "message exceeds {} bytes",
                MAX_MESSAGE_LEN
            )));
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(if buf.iter().all(u8::is_ascii_whitespace) {
                Error::protocol("connection closed before a message arrived")
            } else {
                Error::protocol("connection closed mid-message")
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// `Ok(None)` means the buffer holds a valid but incomplete prefix
fn try_decode<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<T>> {
    let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<T>();
    match values.next() {
        None => Ok(None),
        Some(Ok(msg)) => Ok(Some(msg)),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(Error::protocol(format!("malformed message: {}", e))),
    }
}
