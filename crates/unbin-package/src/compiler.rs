use std::path::{Path, PathBuf};
use std::process::Command;

use crate::assembler::StagedTree;
use crate::error::{Error, Result};

/// Turns a staged tree into a package file.
pub trait PackageCompiler {
    fn name(&self) -> &str;

    /// Build `tree` into `output` and return the written path.
    fn compile(&self, tree: &StagedTree, output: &Path) -> Result<PathBuf>;
}

/// `dpkg-deb --build <staged> <output>`.
#[derive(Clone, Debug)]
pub struct DpkgDeb {
    program: PathBuf,
    root_owner_group: bool,
}

impl Default for DpkgDeb {
    fn default() -> Self {
        Self::new("dpkg-deb")
    }
}

impl DpkgDeb {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            root_owner_group: false,
        }
    }

    /// Record files as owned by root regardless of the building user.
    pub fn root_owner_group(mut self, enabled: bool) -> Self {
        self.root_owner_group = enabled;
        self
    }
}

impl PackageCompiler for DpkgDeb {
    fn name(&self) -> &str {
        "dpkg-deb"
    }

    #[tracing::instrument(skip_all, fields(output = %output.display()))]
    fn compile(&self, tree: &StagedTree, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| unbin_fs::Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut cmd = Command::new(&self.program);
        if self.root_owner_group {
            cmd.arg("--root-owner-group");
        }
        let out = cmd
            .arg("--build")
            .arg(tree.path())
            .arg(output)
            .output()
            .map_err(|source| Error::ToolSpawn {
                tool: self.program.display().to_string(),
                source,
            })?;

        if !out.status.success() {
            return Err(Error::ToolFailed {
                tool: self.program.display().to_string(),
                code: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        tracing::info!("package built");
        Ok(output.to_path_buf())
    }
}
