//! TCP connection to one tracker or storage endpoint.
//!
//! Every operation owns a fresh connection: open, write the header then
//! body then payload in order, read the framed response, and close by
//! sending the protocol quit header before ending the stream. There is no
//! pooling or reuse.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{self, PacketReceiver, RecvEvent};
use crate::{DfsError, Result};

/// Read buffer size for response and payload streaming.
pub(crate) const READ_BUF_SIZE: usize = 64 * 1024;

/// One open connection to a tracker or storage server.
pub struct Connection {
    stream: TcpStream,
    endpoint: String,
    timeout: Duration,
}

impl Connection {
    /// Opens a TCP connection with a connect timeout.
    ///
    /// # Errors
    /// - `DfsError::ConnectionTimeout` - Connect did not finish in time
    /// - `DfsError::ConnectionFailed` - Refused, unreachable, or reset
    pub async fn open(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let endpoint = format!("{host}:{port}");
        tracing::debug!("connecting to server [{endpoint}]");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(DfsError::ConnectionFailed {
                    endpoint,
                    reason: err.to_string(),
                });
            }
            Err(_) => return Err(DfsError::ConnectionTimeout { endpoint }),
        };

        tracing::debug!("server [{endpoint}] is connected");
        Ok(Self {
            stream,
            endpoint,
            timeout,
        })
    }

    /// Endpoint in `host:port` form, for error attribution and logging.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Writes a complete buffer to the stream.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|err| self.write_error(err))
    }

    /// Streams exactly `length` payload bytes from `reader` to the stream.
    ///
    /// The caller has already sent the header and fixed body fields, so
    /// the server is parsing these bytes as raw file content. A short
    /// source is a protocol error: the declared body length would never be
    /// satisfied.
    pub async fn send_payload<R>(&mut self, reader: &mut R, length: u64) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut remaining = length;
        let mut buf = vec![0u8; READ_BUF_SIZE.min(length.max(1) as usize)];
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            let read = reader.read(&mut buf[..want]).await?;
            if read == 0 {
                return Err(DfsError::Protocol {
                    message: format!("upload source ended with {remaining} bytes left to send"),
                });
            }
            self.stream
                .write_all(&buf[..read])
                .await
                .map_err(|err| self.write_error(err))?;
            remaining -= read as u64;
        }
        self.stream
            .flush()
            .await
            .map_err(|err| self.write_error(err))
    }

    /// Reads one chunk from the stream with the idle timeout applied.
    ///
    /// Returns `None` when the peer closed the stream.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let read = match tokio::time::timeout(self.timeout, self.stream.read(buf)).await {
            Ok(Ok(read)) => read,
            Ok(Err(err)) => {
                return Err(DfsError::ConnectionFailed {
                    endpoint: self.endpoint.clone(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                return Err(DfsError::ConnectionTimeout {
                    endpoint: self.endpoint.clone(),
                });
            }
        };
        Ok(if read == 0 { None } else { Some(read) })
    }

    /// Receives one buffered response and closes the connection.
    ///
    /// Drives a `PacketReceiver` over the read loop until the full body is
    /// accumulated, then sends the quit header and ends the stream. The
    /// connection is consumed and closed on every path, success or error.
    ///
    /// # Errors
    /// - `DfsError::Protocol` / `DfsError::Server` - Malformed or failed response
    /// - `DfsError::ConnectionFailed` / `DfsError::ConnectionTimeout` - Read failure
    pub async fn receive_response(
        mut self,
        expected_command: u8,
        expected_body_length: Option<u64>,
    ) -> Result<Bytes> {
        let mut receiver = PacketReceiver::new(expected_command, expected_body_length);
        let result = self.drive_buffered(&mut receiver).await;
        self.close().await;
        result
    }

    async fn drive_buffered(&mut self, receiver: &mut PacketReceiver) -> Result<Bytes> {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let read = match self.read_chunk(&mut buf).await? {
                Some(read) => read,
                None => {
                    return Err(DfsError::ConnectionFailed {
                        endpoint: self.endpoint.clone(),
                        reason: "connection closed before full response".to_string(),
                    });
                }
            };
            for event in receiver.feed(&buf[..read])? {
                if let RecvEvent::Body(body) = event {
                    return Ok(body);
                }
            }
        }
    }

    /// Closes the connection the protocol way: quit header, then stream end.
    ///
    /// Write failures here are ignored; the peer may already be gone and
    /// the socket is dropped either way.
    pub async fn close(mut self) {
        let quit = protocol::pack_header(protocol::CMD_QUIT, 0, 0);
        if self.stream.write_all(&quit).await.is_ok() {
            let _ = self.stream.shutdown().await;
        }
        tracing::debug!("connection to [{}] closed", self.endpoint);
    }

    fn write_error(&self, err: std::io::Error) -> DfsError {
        DfsError::ConnectionFailed {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::protocol::{CMD_QUIT, CMD_RESP, HEADER_BYTE_LEN, PacketHeader, pack_header};

    #[tokio::test]
    async fn test_open_refused_connection() {
        // Bind and drop a listener so the port is known to be closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Connection::open("127.0.0.1", addr.port(), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DfsError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_receive_response_and_quit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut response = pack_header(CMD_RESP, 4, 0).to_vec();
            response.extend_from_slice(b"body");
            socket.write_all(&response).await.unwrap();

            // The client must close with a quit header.
            let mut quit = [0u8; HEADER_BYTE_LEN];
            socket.read_exact(&mut quit).await.unwrap();
            PacketHeader::parse(&quit)
        });

        let conn = Connection::open("127.0.0.1", addr.port(), Duration::from_secs(2))
            .await
            .unwrap();
        let body = conn.receive_response(CMD_RESP, Some(4)).await.unwrap();
        assert_eq!(&body[..], b"body");

        let quit = server.await.unwrap();
        assert_eq!(quit.command, CMD_QUIT);
        assert_eq!(quit.body_length, 0);
    }

    #[tokio::test]
    async fn test_receive_response_server_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&pack_header(CMD_RESP, 0, 2)).await.unwrap();
        });

        let conn = Connection::open("127.0.0.1", addr.port(), Duration::from_secs(2))
            .await
            .unwrap();
        let result = conn.receive_response(CMD_RESP, None).await;
        assert!(matches!(result, Err(DfsError::Server { code: 2 })));
    }
}
