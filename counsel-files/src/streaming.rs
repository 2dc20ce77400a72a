//! Chunked asynchronous reads for large files.

use std::path::Path;
use std::sync::Arc;

use counsel_types::FileError;
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::reader::resolve_and_validate_path;

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Streams large files in bounded chunks without blocking the scheduler.
///
/// Concurrency across reads is limited by a semaphore; cancellation is
/// honoured between chunks so a cancelled request stops touching the disk
/// promptly.
pub struct StreamingFileReader {
    chunk_size: usize,
    max_file_size: u64,
    semaphore: Arc<Semaphore>,
}

impl StreamingFileReader {
    /// Reader with the default 8 KiB chunks, 100 MiB cap, and concurrency 5.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_CONCURRENT)
    }

    /// Reader with explicit limits. Zero values fall back to the defaults.
    pub fn with_limits(chunk_size: usize, max_file_size: u64, max_concurrent: usize) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        let max_file_size = if max_file_size == 0 {
            DEFAULT_MAX_FILE_SIZE
        } else {
            max_file_size
        };
        let max_concurrent = if max_concurrent == 0 {
            DEFAULT_MAX_CONCURRENT
        } else {
            max_concurrent
        };
        Self {
            chunk_size,
            max_file_size,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Read a whole file in chunks, normalising line endings to LF.
    ///
    /// Validates the path through the sandbox first, enforces the size
    /// cap, and checks the cancellation token between chunks.
    pub async fn read_to_string(
        &self,
        path_str: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FileError> {
        let path = resolve_and_validate_path(path_str)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FileError::Cancelled)?;

        let meta = tokio::fs::metadata(&path).await?;
        if meta.len() > self.max_file_size {
            return Err(FileError::TooLarge {
                path: path.clone(),
                size: meta.len(),
                max: self.max_file_size,
            });
        }

        let mut file = tokio::fs::File::open(&path).await?;
        let mut bytes: Vec<u8> = Vec::with_capacity(meta.len() as usize);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            if cancel.is_cancelled() {
                debug!(path = %path.display(), "streaming read cancelled");
                return Err(FileError::Cancelled);
            }
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..n]);
        }

        let text = String::from_utf8_lossy(&bytes);
        Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
    }

    /// The configured chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for StreamingFileReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_across_chunk_boundaries() {
        let mut f = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        let body = "abcdefgh".repeat(10);
        f.write_all(body.as_bytes()).unwrap();
        let reader = StreamingFileReader::with_limits(16, 0, 0);
        let out = reader
            .read_to_string(&f.path().to_string_lossy(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn size_cap_is_enforced() {
        let mut f = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        f.write_all(&vec![b'x'; 256]).unwrap();
        let reader = StreamingFileReader::with_limits(16, 64, 0);
        let err = reader
            .read_to_string(&f.path().to_string_lossy(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_the_read() {
        let mut f = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        f.write_all(b"data").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reader = StreamingFileReader::new();
        let err = reader
            .read_to_string(&f.path().to_string_lossy(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Cancelled));
    }

    #[tokio::test]
    async fn relative_path_is_rejected() {
        let reader = StreamingFileReader::new();
        let err = reader
            .read_to_string("not/absolute.txt", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::RelativePath(_)));
    }
}
