use std::path::{Path, PathBuf};

use unbin_fs::{CopyStats, PermissionMode, Staging, copy_dir_all, copy_files_flat};
use unbin_locate::LocateReport;

use crate::error::{Error, Result};
use crate::spec::{CopyMode, PackageSpec};
use crate::templates::Templates;

const STAGING_PREFIX: &str = "unbin-deb-";

/// A deliverable copied into the staged tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedDeliverable {
    pub name: String,
    pub source: PathBuf,
    /// Path inside the staged tree.
    pub staged: PathBuf,
    pub stats: CopyStats,
}

/// A complete package layout in a directory owned by this value.
///
/// The directory is removed on drop unless [`StagedTree::persist`] is called.
#[derive(Debug)]
pub struct StagedTree {
    staging: Staging,
    output_name: String,
    deliverables: Vec<StagedDeliverable>,
    hooks: Vec<PathBuf>,
}

impl StagedTree {
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    pub fn control_path(&self) -> PathBuf {
        self.staging.join("DEBIAN/control")
    }

    pub fn hooks(&self) -> &[PathBuf] {
        &self.hooks
    }

    pub fn deliverables(&self) -> &[StagedDeliverable] {
        &self.deliverables
    }

    /// File name the compiled package gets when no output path is given.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn persist(self) -> PathBuf {
        self.staging.persist()
    }
}

/// Lays located deliverables out as a Debian package tree.
#[derive(Debug)]
pub struct Assembler {
    templates: Templates,
}

impl Assembler {
    pub fn new(templates: Templates) -> Self {
        Self { templates }
    }

    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Templates::builtin()?))
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Stage `spec` from the paths in `report` in a new directory under
    /// `staging_parent`.
    ///
    /// Nothing is created unless every mapped and every required deliverable
    /// was found and every hook template exists.
    #[tracing::instrument(skip_all, fields(package = %spec.name, version = %spec.version))]
    pub fn assemble(
        &self,
        spec: &PackageSpec,
        report: &LocateReport,
        staging_parent: impl AsRef<Path>,
    ) -> Result<StagedTree> {
        let sources = self.preflight(spec, report)?;

        let staging = Staging::new_in(staging_parent, STAGING_PREFIX)?;
        let prefix = spec.prefix();
        staging.create_dir_all(&prefix)?;

        let mut deliverables = Vec::with_capacity(sources.len());
        for (mapping, source) in spec.mappings.iter().zip(sources) {
            let rel = prefix.join(&mapping.install_path);
            let dest = staging.join(&rel);
            let copied = match mapping.copy {
                CopyMode::Tree => copy_dir_all(&source, &dest),
                CopyMode::Files => copy_files_flat(&source, &dest),
            };
            let stats = copied.map_err(|source| Error::Copy {
                deliverable: mapping.deliverable.clone(),
                source,
            })?;
            tracing::info!(
                deliverable = %mapping.deliverable,
                from = %source.display(),
                to = %rel.display(),
                files = stats.files,
                "staged"
            );
            deliverables.push(StagedDeliverable {
                name: mapping.deliverable.clone(),
                source,
                staged: rel,
                stats,
            });
        }

        let control = self.templates.render_control(spec)?;
        let control_path = staging.write("DEBIAN/control", control.as_bytes())?;
        PermissionMode::ReadWrite.apply_to_path(&control_path)?;

        let mut hooks = Vec::with_capacity(spec.hooks.len());
        for hook in &spec.hooks {
            let script = self.templates.render_hook(&hook.template, spec)?;
            let path = staging.write(
                Path::new("DEBIAN").join(hook.stage.file_name()),
                script.as_bytes(),
            )?;
            PermissionMode::Executable.apply_to_path(&path)?;
            hooks.push(path);
        }

        tracing::info!(path = %staging.path().display(), "package tree staged");
        Ok(StagedTree {
            staging,
            output_name: spec.output_file_name(),
            deliverables,
            hooks,
        })
    }

    /// Source directory per mapping, in mapping order.
    fn preflight(&self, spec: &PackageSpec, report: &LocateReport) -> Result<Vec<PathBuf>> {
        let mut missing: Vec<String> = report
            .missing_required()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut sources = Vec::with_capacity(spec.mappings.len());
        for mapping in &spec.mappings {
            match report.path(&mapping.deliverable) {
                Some(path) if path.is_dir() => sources.push(path.to_path_buf()),
                _ => {
                    if !missing.contains(&mapping.deliverable) {
                        missing.push(mapping.deliverable.clone());
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingDeliverables { names: missing });
        }

        for hook in &spec.hooks {
            if !self.templates.has(&hook.template) {
                return Err(Error::UnknownTemplate(hook.template.clone()));
            }
        }
        Ok(sources)
    }
}
