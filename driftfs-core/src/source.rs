//! Upload inputs and download outputs.
//!
//! The protocol layer only ever sees "a byte reader of known length" and
//! "an async sink"; the variants here normalize paths, in-memory buffers,
//! and caller-supplied streams into those two shapes.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::{DfsError, Result};

/// Boxed async reader used for upload payloads.
pub type SourceReader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Boxed async writer used for download sinks.
pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the bytes of an upload come from.
pub enum UploadSource {
    /// Read the file at this path; its size and extension come from disk.
    Path(PathBuf),
    /// Upload an in-memory buffer.
    Bytes(Bytes),
    /// Stream from an arbitrary reader; the exact byte count must be
    /// supplied because the request header declares it up front.
    Reader { reader: SourceReader, size: u64 },
}

impl UploadSource {
    /// Creates a source reading from a filesystem path.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a source from an in-memory buffer.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::Bytes(data.into())
    }

    /// Creates a source from a reader with an externally known length.
    pub fn reader(reader: SourceReader, size: u64) -> Self {
        Self::Reader { reader, size }
    }

    /// File extension inferred from the source, without the leading dot.
    ///
    /// Only path sources carry one; buffers and readers fall back to the
    /// configured default extension.
    pub fn extension(&self) -> Option<String> {
        match self {
            Self::Path(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string),
            _ => None,
        }
    }

    /// Resolves the source into its byte length and a reader.
    ///
    /// # Errors
    /// - `DfsError::Io` - Path source does not exist or cannot be opened
    pub async fn into_reader(self) -> Result<(u64, SourceReader)> {
        match self {
            Self::Path(path) => {
                let file = File::open(&path).await?;
                let size = file.metadata().await?.len();
                Ok((size, Box::new(file)))
            }
            Self::Bytes(data) => {
                let size = data.len() as u64;
                Ok((size, Box::new(std::io::Cursor::new(data))))
            }
            Self::Reader { reader, size } => Ok((size, reader)),
        }
    }
}

impl From<&str> for UploadSource {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(data: Vec<u8>) -> Self {
        Self::bytes(data)
    }
}

/// Where downloaded bytes go.
pub enum DownloadTarget {
    /// Collect the whole body into one in-memory buffer.
    Memory,
    /// Write to the file at this path, created or truncated.
    Path(PathBuf),
    /// Write to a caller-supplied sink.
    Writer(SinkWriter),
}

/// Result of a completed download.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body, for `DownloadTarget::Memory`.
    Bytes(Bytes),
    /// Number of bytes written, for path and writer targets.
    Written(u64),
}

impl DownloadOutcome {
    /// The in-memory body, if the download targeted memory.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Bytes(data) => Some(data),
            Self::Written(_) => None,
        }
    }
}

/// Open sink state while a download is streaming.
pub(crate) enum DownloadSink {
    Memory(Vec<u8>),
    Writer(SinkWriter),
}

impl DownloadTarget {
    /// Opens the target, producing a sink that accepts repeated writes.
    pub(crate) async fn open(self) -> Result<DownloadSink> {
        match self {
            Self::Memory => Ok(DownloadSink::Memory(Vec::new())),
            Self::Path(path) => {
                let file = File::create(&path).await?;
                Ok(DownloadSink::Writer(Box::new(BufWriter::new(file))))
            }
            Self::Writer(writer) => Ok(DownloadSink::Writer(writer)),
        }
    }
}

impl DownloadSink {
    pub(crate) async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            Self::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            Self::Writer(writer) => writer
                .write_all(chunk)
                .await
                .map_err(DfsError::Io),
        }
    }

    /// Finalizes the sink exactly once, after the declared body length has
    /// been received and before the connection is torn down.
    pub(crate) async fn finalize(self, received: u64) -> Result<DownloadOutcome> {
        match self {
            Self::Memory(buf) => Ok(DownloadOutcome::Bytes(Bytes::from(buf))),
            Self::Writer(mut writer) => {
                writer.shutdown().await?;
                Ok(DownloadOutcome::Written(received))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_extension_from_path() {
        assert_eq!(
            UploadSource::path("/tmp/photo.JPG").extension(),
            Some("JPG".to_string())
        );
        assert_eq!(UploadSource::path("/tmp/no-extension").extension(), None);
        assert_eq!(UploadSource::bytes(vec![1, 2, 3]).extension(), None);
    }

    #[tokio::test]
    async fn test_bytes_source_resolution() {
        let source = UploadSource::bytes(b"hello".to_vec());
        let (size, mut reader) = source.into_reader().await.unwrap();
        assert_eq!(size, 5);

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello");
    }

    #[tokio::test]
    async fn test_path_source_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        tokio::fs::write(&path, b"on disk").await.unwrap();

        let (size, _reader) = UploadSource::path(&path).into_reader().await.unwrap();
        assert_eq!(size, 7);
    }

    #[tokio::test]
    async fn test_memory_sink_round_trip() {
        let mut sink = DownloadTarget::Memory.open().await.unwrap();
        sink.write(b"part one, ").await.unwrap();
        sink.write(b"part two").await.unwrap();
        let outcome = sink.finalize(18).await.unwrap();
        assert_eq!(
            outcome.into_bytes().unwrap(),
            Bytes::from_static(b"part one, part two")
        );
    }

    #[tokio::test]
    async fn test_path_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("downloaded.bin");

        let mut sink = DownloadTarget::Path(path.clone()).open().await.unwrap();
        sink.write(b"abcdef").await.unwrap();
        let outcome = sink.finalize(6).await.unwrap();
        assert!(matches!(outcome, DownloadOutcome::Written(6)));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abcdef");
    }
}
