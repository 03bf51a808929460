use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::debug;

use super::scanner::ScanError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A readable coverage document, transparently gunzipped.
///
/// Payer coverage files are usually published gzip-compressed. Compression is
/// detected from the stream's magic bytes, so the file extension does not
/// matter.
pub struct CoverageSource {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
}

impl CoverageSource {
    /// Open a coverage file on disk.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::SourceNotFound` if the file cannot be opened or read.
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let file = File::open(path).map_err(|source| ScanError::SourceNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_path(file, path.to_path_buf())
    }

    /// Wrap an already-open stream (stdin, a network body, a test buffer).
    ///
    /// # Errors
    ///
    /// Returns `ScanError::SourceNotFound` if the first bytes cannot be read.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self, ScanError> {
        Self::with_path(reader, PathBuf::from("<stream>"))
    }

    fn with_path<R: Read + Send + 'static>(reader: R, path: PathBuf) -> Result<Self, ScanError> {
        let mut buffered = BufReader::new(reader);
        let head = buffered.fill_buf().map_err(|source| ScanError::SourceNotFound {
            path: path.clone(),
            source,
        })?;

        let reader: Box<dyn BufRead + Send> = if head.starts_with(&GZIP_MAGIC) {
            debug!("Detected gzip-compressed coverage source: {}", path.display());
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        };

        Ok(Self { path, reader })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for CoverageSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for CoverageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
