//! Reading and writing EPP frames
//!
//! Each message is prefixed with a 32-bit big-endian unsigned integer giving
//! the total frame length, prefix included. The codec works over any
//! `AsyncRead + AsyncWrite` stream so the same loop serves TLS sockets and
//! in-memory pipes.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::Error;

/// Upper bound on a declared frame length. Anything larger is refused
/// before the payload is read.
pub const MAX_FRAME: usize = 65_536;

/// Reads one frame and returns its XML payload.
///
/// A connection closed cleanly between frames yields [`Error::Closed`]; EOF
/// in the middle of a frame is an error. Short reads are retried until the
/// declared length has arrived.
pub async fn read_frame<S>(stream: &mut S) -> Result<String, Error>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let read = stream.read(&mut header[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Err(Error::Closed);
            }
            return Err(unexpected_eof());
        }
        filled += read;
    }

    let frame_size = u32::from_be_bytes(header) as usize;
    if !(4..=MAX_FRAME).contains(&frame_size) {
        return Err(Error::FrameLength(frame_size));
    }

    let message_size = frame_size - 4;
    trace!("frame header declares {message_size} payload bytes");
    let mut buf = vec![0; message_size];
    let mut read_size = 0;
    while read_size < message_size {
        let read = stream.read(&mut buf[read_size..]).await?;
        if read == 0 {
            return Err(unexpected_eof());
        }
        read_size += read;
    }

    Ok(String::from_utf8(buf)?)
}

/// Writes one frame: length prefix and payload in a single buffer.
pub async fn write_frame<S>(stream: &mut S, content: &str) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    let len = content.len() + 4;
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&u32::to_be_bytes(u32::try_from(len).map_err(|_| {
        Error::FrameLength(len)
    })?));
    buf.extend_from_slice(content.as_bytes());

    stream.write_all(&buf).await?;
    stream.flush().await?;
    trace!("wrote {len} bytes");
    Ok(())
}

fn unexpected_eof() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "unexpected eof mid-frame",
    ))
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn framed(payload: &str) -> Vec<u8> {
        let mut buf = ((payload.len() as u32) + 4).to_be_bytes().to_vec();
        buf.extend_from_slice(payload.as_bytes());
        buf
    }

    #[tokio::test]
    async fn round_trip() {
        let payload = "<epp/>";
        let expected = framed(payload);
        assert_eq!(expected.len(), payload.len() + 4);
        assert_eq!(&expected[..4], &10u32.to_be_bytes());

        let mut stream = Builder::new().write(&expected).build();
        write_frame(&mut stream, payload).await.unwrap();

        let mut stream = Builder::new().read(&expected).build();
        assert_eq!(read_frame(&mut stream).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn chunked_reads_reassemble() {
        let payload = "<epp><hello/></epp>";
        let bytes = framed(payload);
        let mut stream = Builder::new()
            .read(&bytes[..2])
            .read(&bytes[2..7])
            .read(&bytes[7..])
            .build();
        assert_eq!(read_frame(&mut stream).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn clean_close_between_frames() {
        let mut stream = Builder::new().build();
        assert!(matches!(read_frame(&mut stream).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn eof_mid_frame_fails() {
        let bytes = framed("<epp/>");
        let mut stream = Builder::new().read(&bytes[..6]).build();
        assert!(matches!(read_frame(&mut stream).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn oversize_frame_is_refused() {
        let header = ((MAX_FRAME as u32) + 1).to_be_bytes();
        let mut stream = Builder::new().read(&header).build();
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(Error::FrameLength(_))
        ));
    }

    #[tokio::test]
    async fn undersize_header_is_refused() {
        let header = 3u32.to_be_bytes();
        let mut stream = Builder::new().read(&header).build();
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(Error::FrameLength(3))
        ));
    }
}
