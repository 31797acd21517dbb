//! Installer to package, one stage at a time.
//!
//! Every stage is callable on its own so the `payload`, `unpack` and `locate`
//! subcommands can stop part way; [`Pipeline::package`] runs them all.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use unbin_archive::{ContainerReader, PayloadInfo, RawInstaller, UnzipTool, sha256_file};
use unbin_fs::{LOCK_FILE_NAME, ScopedRoot};
use unbin_locate::{Catalog, LocateReport, Locator};
use unbin_package::{Assembler, DpkgDeb, PackageCompiler, PackageSpec, Templates};
use unbin_unpack::{Engine, UnpackOptions, UnpackReport};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no installer given and no *.bin file in '{0}'")]
    NoInstaller(PathBuf),

    #[error("every container failed to extract: {}", .containers.join(", "))]
    AllContainersFailed { containers: Vec<String> },

    #[error("required deliverables not found: {}", .names.join(", "))]
    MissingDeliverables { names: Vec<String> },
}

/// The carved payload and whether an earlier carve was reused.
#[derive(Clone, Debug)]
pub struct PayloadStage {
    pub path: PathBuf,
    pub info: PayloadInfo,
    pub reused: bool,
}

#[derive(Debug)]
pub struct UnpackStage {
    pub payload: PayloadStage,
    /// The tree already held an extraction and was resumed.
    pub resumed: bool,
    pub report: UnpackReport,
}

#[derive(Debug)]
pub struct RunReport {
    pub unpack: UnpackStage,
    pub located: LocateReport,
    pub output: PathBuf,
    /// Set when the staged tree was kept.
    pub staging: Option<PathBuf>,
}

impl RunReport {
    pub fn is_degraded(&self) -> bool {
        self.unpack.report.is_degraded()
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut out = self.unpack.report.warnings();
        out.extend(
            self.located
                .results
                .iter()
                .filter(|r| !r.required && !r.found())
                .map(|r| format!("optional deliverable '{}' not found", r.name)),
        );
        out
    }
}

pub struct Pipeline {
    config: Config,
    catalog: Catalog,
    package: PackageSpec,
    templates_dir: Option<PathBuf>,
    compiler: Box<dyn PackageCompiler>,
}

impl Pipeline {
    /// Build from configuration, loading catalog and package overrides.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = match &config.catalog {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading catalog '{}'", path.display()))?;
                Catalog::from_toml(&text)
                    .with_context(|| format!("parsing catalog '{}'", path.display()))?
            }
            None => Catalog::s32ds_power()?,
        };

        let mut package = match &config.package {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading package description '{}'", path.display()))?;
                PackageSpec::from_toml(&text)
                    .with_context(|| format!("parsing package description '{}'", path.display()))?
            }
            None => PackageSpec::s32ds_power()?,
        };
        if let Some(version) = &config.version {
            package = package.with_version(version.clone());
        }
        package
            .validate(catalog.as_slice())
            .context("package description does not match the deliverable catalog")?;

        let compiler = DpkgDeb::new(&config.tools.dpkg_deb)
            .root_owner_group(config.tools.root_owner_group);

        Ok(Self {
            templates_dir: config.templates.clone(),
            config,
            catalog,
            package,
            compiler: Box::new(compiler),
        })
    }

    pub fn with_compiler(mut self, compiler: impl PackageCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn package_spec(&self) -> &PackageSpec {
        &self.package
    }

    fn reader(&self) -> ContainerReader {
        if self.config.tools.fallback {
            ContainerReader::strict_only().with_fallback(UnzipTool::new(&self.config.tools.unzip))
        } else {
            ContainerReader::strict_only()
        }
    }

    fn engine(&self) -> Engine {
        let mut options = UnpackOptions::new().collisions(self.config.collisions);
        if let Some(max) = self.config.max_iterations {
            options = options.max_iterations(max);
        }
        for name in &self.config.exclude {
            options = options.exclude(name.clone());
        }
        Engine::new(self.reader()).with_options(options)
    }

    /// Carve the payload into the work directory, reusing an earlier carve
    /// whose recorded digest still matches the installer.
    #[tracing::instrument(skip_all, fields(installer = %installer.display()))]
    pub fn payload(&self, installer: &Path) -> Result<PayloadStage> {
        let raw = RawInstaller::open(installer)?;
        let path = self.config.payload_path();
        let digest_path = self.config.digest_path();

        let info = raw.digest_payload()?;
        let recorded = fs::read_to_string(&digest_path).ok();
        if recorded.as_deref().map(str::trim) == Some(info.sha256.as_str())
            && sha256_file(&path).is_ok_and(|sha| sha == info.sha256)
        {
            tracing::info!(path = %path.display(), "reusing carved payload");
            return Ok(PayloadStage {
                path,
                info,
                reused: true,
            });
        }

        let info = raw.carve_payload(&path)?;
        fs::write(&digest_path, format!("{}\n", info.sha256))
            .with_context(|| format!("writing '{}'", digest_path.display()))?;
        Ok(PayloadStage {
            path,
            info,
            reused: false,
        })
    }

    /// Carve, extract the payload into the extraction root and unpack every
    /// nested container. A tree whose payload extraction completed for this
    /// same payload is resumed unless `fresh` is set; anything else in the
    /// root is discarded first.
    pub fn unpack(&self, installer: &Path) -> Result<UnpackStage> {
        let payload = self.payload(installer)?;
        let marker = self.config.extracted_marker_path();
        let root = ScopedRoot::new(self.config.installer_dir())?;

        let resumed = {
            let _lock = root.lock()?;
            let recorded = fs::read_to_string(&marker).ok();
            let complete = recorded.as_deref().map(str::trim) == Some(payload.info.sha256.as_str());

            if complete && !self.config.fresh && has_content(&root)? {
                tracing::info!(path = %root.path().display(), "resuming existing extraction");
                true
            } else {
                remove_if_exists(&marker)?;
                if has_content(&root)? {
                    if self.config.fresh {
                        tracing::info!(path = %root.path().display(), "removing previous extraction");
                    } else {
                        tracing::warn!(
                            path = %root.path().display(),
                            "discarding an extraction that never completed"
                        );
                    }
                    clear(&root)?;
                }

                let extraction = self
                    .reader()
                    .extract(&payload.path, root.path())
                    .with_context(|| format!("extracting payload '{}'", payload.path.display()))?;
                tracing::info!(
                    entries = extraction.entries,
                    bytes = extraction.bytes,
                    "payload extracted"
                );
                fs::write(&marker, format!("{}\n", payload.info.sha256))
                    .with_context(|| format!("writing '{}'", marker.display()))?;
                false
            }
        };

        let report = self.unpack_root(&root)?;
        Ok(UnpackStage {
            payload,
            resumed,
            report,
        })
    }

    /// Run the unpacking engine over an already populated root.
    pub fn unpack_root(&self, root: &ScopedRoot) -> Result<UnpackReport> {
        let engine = self.engine();
        let report = if self.config.until_found {
            let catalog = self.catalog.as_slice();
            let found = |dir: &Path| {
                Locator::new(dir)
                    .locate(catalog)
                    .is_ok_and(|r| r.all_required_found())
            };
            engine.run_until(root, &found)?
        } else {
            engine.run(root)?
        };

        if report.all_failed() {
            return Err(PipelineError::AllContainersFailed {
                containers: report
                    .failures
                    .iter()
                    .map(|f| f.path.display().to_string())
                    .collect(),
            }
            .into());
        }
        Ok(report)
    }

    pub fn locate(&self, root: &Path) -> Result<LocateReport> {
        Ok(Locator::new(root).locate(self.catalog.as_slice())?)
    }

    /// The whole pipeline. No output is written unless every required
    /// deliverable was found.
    pub fn package(&self, installer: &Path) -> Result<RunReport> {
        let unpack = self.unpack(installer)?;
        let located = self.locate(&self.config.installer_dir())?;

        let missing = located.missing_required();
        if !missing.is_empty() {
            return Err(PipelineError::MissingDeliverables {
                names: missing.into_iter().map(str::to_string).collect(),
            }
            .into());
        }

        let templates = match &self.templates_dir {
            Some(dir) => Templates::with_overrides(dir)?,
            None => Templates::builtin()?,
        };
        let staging_parent = self
            .config
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let tree = Assembler::new(templates)
            .assemble(&self.package, &located, &staging_parent)
            .context("assembling package layout")?;

        let output = self
            .config
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(tree.output_name()));
        let output = self
            .compiler
            .compile(&tree, &output)
            .with_context(|| format!("building package with {}", self.compiler.name()))?;

        let staging = if self.config.keep_staging {
            Some(tree.persist())
        } else {
            None
        };

        Ok(RunReport {
            unpack,
            located,
            output,
            staging,
        })
    }
}

/// Anything besides the lock file.
fn has_content(root: &ScopedRoot) -> Result<bool> {
    let entries = fs::read_dir(root.path())
        .with_context(|| format!("reading '{}'", root.path().display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading '{}'", root.path().display()))?;
        if entry.file_name().as_os_str() != OsStr::new(LOCK_FILE_NAME) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Empty the root, keeping the lock file.
fn clear(root: &ScopedRoot) -> Result<()> {
    for entry in fs::read_dir(root.path())? {
        let entry = entry?;
        if entry.file_name().as_os_str() == OsStr::new(LOCK_FILE_NAME) {
            continue;
        }
        let path = entry.path();
        let removed = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("removing '{}'", path.display()))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("removing '{}'", path.display()))
        }
        _ => Ok(()),
    }
}

/// First `*.bin` in `dir`, by name.
pub fn find_installer(dir: &Path) -> Result<PathBuf> {
    let pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let mut found: Vec<PathBuf> = glob::glob(&format!("{pattern}/*.bin"))
        .context("invalid installer search pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    found
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::NoInstaller(dir.to_path_buf()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_installer_picks_first_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.bin"), "x").unwrap();
        fs::write(dir.path().join("a.bin"), "x").unwrap();
        fs::write(dir.path().join("c.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("0.bin")).unwrap();

        assert_eq!(find_installer(dir.path()).unwrap(), dir.path().join("a.bin"));
    }

    #[test]
    fn find_installer_none() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_installer(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoInstaller(_))
        ));
    }

    #[test]
    fn run_warnings_list_each_entry_once() {
        let report = RunReport {
            unpack: UnpackStage {
                payload: PayloadStage {
                    path: PathBuf::from("installer_payload.zip"),
                    info: PayloadInfo {
                        offset: 50,
                        len: 10,
                        sha256: String::new(),
                    },
                    reused: false,
                },
                resumed: false,
                report: UnpackReport {
                    extraction_warnings: vec!["skipped symlink 'lib/evil'".to_string()],
                    ..Default::default()
                },
            },
            located: LocateReport::default(),
            output: PathBuf::from("s32ds.deb"),
            staging: None,
        };
        assert_eq!(report.warnings(), ["skipped symlink 'lib/evil'".to_string()]);
    }

    #[test]
    fn version_override_reaches_package() {
        let config = Config {
            version: Some("2017.2".into()),
            ..Config::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        assert_eq!(pipeline.package_spec().version, "2017.2");
    }

    #[test]
    fn invalid_package_description_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.toml");
        fs::write(
            &path,
            r#"
                name = "x"
                version = "1"
                architecture = "all"
                maintainer = "m"
                summary = "s"

                [[mapping]]
                deliverable = "nope"
                install_path = "nope"
            "#,
        )
        .unwrap();
        let config = Config {
            package: Some(path),
            ..Config::default()
        };
        assert!(Pipeline::new(config).is_err());
    }
}
