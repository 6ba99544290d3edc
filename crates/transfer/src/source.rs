use std::future::Future;
use std::io::{Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::TransferError;
use crate::validation::validate_source_file;

/// Reader over the not-yet-confirmed tail of a source.
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something that can produce the upload payload starting at any offset.
///
/// Each call to [`open_at`](Self::open_at) yields a fresh reader, so a
/// resumed attempt never depends on the state a failed attempt left behind.
pub trait ByteSource: Send + Sync {
    /// Human-readable identity of the source (a path, a label).
    fn descriptor(&self) -> String;

    /// Total payload size in bytes.
    fn size(&self) -> u64;

    /// Opens a reader positioned at `offset` that yields exactly
    /// `size() - offset` bytes.
    fn open_at(
        &self,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>>;
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file on disk.
///
/// The size is pinned when the source is created; every `open_at` checks
/// the file still has that size, which catches a payload that changed
/// between a failed attempt and its resumption.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /// Inspects `path` and pins its current size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.display().to_string()));
        }
        Ok(Self {
            size: metadata.len(),
            path,
        })
    }

    /// Uses `path` with a size recorded earlier (e.g. from a state record).
    pub fn with_size(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn descriptor(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn open_at(
        &self,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>> {
        Box::pin(async move {
            validate_source_file(&self.path, self.size).await?;
            if offset > self.size {
                return Err(TransferError::OffsetOutOfRange {
                    offset,
                    size: self.size,
                });
            }

            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            debug!(path = %self.path.display(), offset, "source opened");

            let reader: SourceReader = Box::new(file.take(self.size - offset));
            Ok(reader)
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// An in-memory payload.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn descriptor(&self) -> String {
        self.label.clone()
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn open_at(
        &self,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let size = self.size();
            if offset > size {
                return Err(TransferError::OffsetOutOfRange { offset, size });
            }
            let reader: SourceReader = Box::new(Cursor::new(self.data.slice(offset as usize..)));
            Ok(reader)
        })
    }
}
