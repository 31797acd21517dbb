use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, read_err};

/// Local file header signature that opens every zip-family container.
pub const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Container kinds recognized by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Zip,
    Jar,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 2] = [ContainerKind::Zip, ContainerKind::Jar];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Jar => "jar",
        }
    }

    /// Kind of `path`, by case-insensitive extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| ext.eq_ignore_ascii_case(kind.extension()))
    }
}

/// Directory a container unpacks into: its own path minus the extension.
pub fn unpack_target(container: &Path) -> std::path::PathBuf {
    container.with_extension("")
}

pub fn detect_signature(data: &[u8]) -> bool {
    data.starts_with(&ZIP_SIGNATURE)
}

/// Whether the file at `path` opens with [`ZIP_SIGNATURE`].
pub fn has_zip_signature(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(read_err(path))?;
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..]).map_err(read_err(path))?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(detect_signature(&header))
}
