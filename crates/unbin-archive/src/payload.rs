//! Self-extracting installers: a shell stub followed by a zip payload.
//!
//! The stub length differs between installer builds, so the payload offset is
//! found by scanning for the first [`ZIP_SIGNATURE`] rather than assumed.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result, read_err, write_err};
use crate::format::ZIP_SIGNATURE;

const SCAN_BUFFER: usize = 64 * 1024;

/// An installer file with a located payload. Never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInstaller {
    path: PathBuf,
    payload_offset: u64,
    len: u64,
}

/// What was written by [`RawInstaller::carve_payload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadInfo {
    pub offset: u64,
    pub len: u64,
    /// Hex SHA-256 of the payload bytes.
    pub sha256: String,
}

impl RawInstaller {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(read_err(path))?;
        let len = file.metadata().map_err(read_err(path))?.len();

        let payload_offset = find_signature(BufReader::new(file), &ZIP_SIGNATURE)
            .map_err(read_err(path))?
            .ok_or_else(|| Error::NotAnInstaller {
                path: path.to_path_buf(),
            })?;

        tracing::debug!(offset = payload_offset, "located installer payload");
        Ok(Self {
            path: path.to_path_buf(),
            payload_offset,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    pub fn payload_len(&self) -> u64 {
        self.len - self.payload_offset
    }

    /// Hash the payload without writing it anywhere.
    pub fn digest_payload(&self) -> Result<PayloadInfo> {
        self.stream_payload(None)
    }

    /// Write the payload bytes to `dest` (parent created if missing).
    #[tracing::instrument(skip_all, fields(dest = %dest.as_ref().display()))]
    pub fn carve_payload(&self, dest: impl AsRef<Path>) -> Result<PayloadInfo> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        }
        let mut out = File::create(dest).map_err(write_err(dest))?;
        let info = self.stream_payload(Some((&mut out, dest)))?;
        out.flush().map_err(write_err(dest))?;
        tracing::info!(bytes = info.len, sha256 = %info.sha256, "payload written");
        Ok(info)
    }

    fn stream_payload(&self, mut sink: Option<(&mut File, &Path)>) -> Result<PayloadInfo> {
        let mut file = File::open(&self.path).map_err(read_err(&self.path))?;
        file.seek(SeekFrom::Start(self.payload_offset))
            .map_err(read_err(&self.path))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; SCAN_BUFFER];
        let mut len = 0u64;
        loop {
            let n = file.read(&mut buf).map_err(read_err(&self.path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            if let Some((out, dest)) = sink.as_mut() {
                out.write_all(&buf[..n]).map_err(write_err(*dest))?;
            }
            len += n as u64;
        }

        Ok(PayloadInfo {
            offset: self.payload_offset,
            len,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}

/// Hex SHA-256 of a whole file.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(read_err(path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(read_err(path))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Offset of the first occurrence of `needle`, tolerating matches that
/// straddle read boundaries.
fn find_signature<R: Read>(mut reader: R, needle: &[u8]) -> std::io::Result<Option<u64>> {
    let keep = needle.len() - 1;
    let mut window: Vec<u8> = Vec::with_capacity(SCAN_BUFFER + keep);
    let mut buf = vec![0u8; SCAN_BUFFER];
    // stream offset of window[0]
    let mut base = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        window.extend_from_slice(&buf[..n]);

        if let Some(pos) = window.windows(needle.len()).position(|w| w == needle) {
            return Ok(Some(base + pos as u64));
        }

        if window.len() > keep {
            let drop = window.len() - keep;
            window.drain(..drop);
            base += drop as u64;
        }
    }
}
