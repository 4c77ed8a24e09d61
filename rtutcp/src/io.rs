//! Stream helpers used by the exchange path.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::Instant;

use crate::{Error, Result};

/// Byte stream a transport can own: TCP, Unix socket, vsock, in-memory duplex.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Connection for T {}

/// Reads into `buf` until at least `min` bytes have arrived.
///
/// Returns the number of bytes read, which may exceed `min` when the stream
/// delivered more in one read. End of stream before `min` is an
/// `UnexpectedEof` error.
pub async fn read_at_least<R>(reader: &mut R, buf: &mut [u8], min: usize) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if buf.len() < min {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "buffer smaller than minimum read",
        ));
    }

    let mut n = 0;
    while n < min {
        match reader.read(&mut buf[n..]).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {} bytes", n, min),
                ));
            }
            Ok(read) => n += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Point in time by which an exchange must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Deadline `timeout` after `start`.
    pub fn after(start: Instant, timeout: Duration) -> Self {
        Self {
            at: start + timeout,
            timeout,
        }
    }

    /// Runs `fut`, failing with [`Error::Timeout`] naming `op` if the
    /// deadline passes first. `None` runs it unbounded.
    pub async fn run<F>(deadline: Option<Deadline>, op: &'static str, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        match deadline {
            Some(d) => tokio::time::timeout_at(d.at, fut)
                .await
                .map_err(|_| Error::Timeout {
                    op,
                    after: d.timeout,
                }),
            None => Ok(fut.await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_at_least_collects_chunks() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            for byte in [1u8, 2, 3, 4, 5] {
                server.write_all(&[byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
            server
        });

        let mut buf = [0u8; 16];
        let n = read_at_least(&mut client, &mut buf, 4).await.unwrap();
        assert!(n >= 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_at_least_eof() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(&[1, 2]).await.unwrap();
        drop(server);

        let mut buf = [0u8; 16];
        let err = read_at_least(&mut client, &mut buf, 4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_at_least_short_buffer() {
        let (mut client, _server) = tokio::io::duplex(64);
        let mut buf = [0u8; 2];
        let err = read_at_least(&mut client, &mut buf, 4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let (mut client, _server) = tokio::io::duplex(64);
        let deadline = Deadline::after(Instant::now(), Duration::from_millis(100));

        let mut buf = [0u8; 8];
        let err = Deadline::run(Some(deadline), "read", read_at_least(&mut client, &mut buf, 4))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "read timed out after 100ms");
    }

    #[tokio::test]
    async fn test_no_deadline() {
        let value = Deadline::run(None, "noop", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
