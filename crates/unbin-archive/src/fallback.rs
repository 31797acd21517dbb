use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result, write_err};

/// What a tolerant extractor reported alongside a successful run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallbackOutcome {
    pub warnings: Vec<String>,
}

/// A more forgiving extractor tried once the strict reader reports structural
/// corruption.
pub trait FallbackExtractor {
    fn name(&self) -> &str;

    /// Extract `container` into `dest`, overwriting existing files.
    fn extract(&self, container: &Path, dest: &Path) -> Result<FallbackOutcome>;
}

/// `unzip -q -o <container> -d <dest>`.
///
/// Info-ZIP's `unzip` skips damaged extra fields that the strict reader
/// refuses. Exit status 1 means "completed with warnings" and counts as
/// success when something landed in `dest`.
#[derive(Clone, Debug)]
pub struct UnzipTool {
    program: PathBuf,
}

impl Default for UnzipTool {
    fn default() -> Self {
        Self::new("unzip")
    }
}

impl UnzipTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl FallbackExtractor for UnzipTool {
    fn name(&self) -> &str {
        "unzip"
    }

    fn extract(&self, container: &Path, dest: &Path) -> Result<FallbackOutcome> {
        std::fs::create_dir_all(dest).map_err(write_err(dest))?;

        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-o")
            .arg(container)
            .arg("-d")
            .arg(dest)
            .output()
            .map_err(|source| Error::ToolSpawn {
                tool: self.program.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(FallbackOutcome {
                warnings: non_empty_lines(&stderr),
            }),
            Some(1) if has_entries(dest) => {
                tracing::warn!(
                    container = %container.display(),
                    "unzip completed with warnings"
                );
                Ok(FallbackOutcome {
                    warnings: non_empty_lines(&stderr),
                })
            }
            code => Err(Error::ToolFailed {
                tool: self.program.display().to_string(),
                path: container.to_path_buf(),
                code,
                stderr,
            }),
        }
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn has_entries(dest: &Path) -> bool {
    std::fs::read_dir(dest).is_ok_and(|mut entries| entries.next().is_some())
}
