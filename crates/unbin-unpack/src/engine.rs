//! The unpacking loop.
//!
//! Each iteration scans the scoped root for containers and extracts the live
//! ones next to themselves. A successful extraction deletes its container and
//! a failed one is marked and never retried, so the live set only shrinks
//! within a nesting level and the loop reaches a fixed point after at most
//! (nesting depth + 1) scans.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use unbin_archive::{ContainerKind, ContainerReader, FailureClass, SCRATCH_PREFIX, unpack_target};
use unbin_fs::{LOCK_FILE_NAME, ScopedRoot};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::policy::{CollisionPolicy, Resolution, Target, resolve};
use crate::report::{Collision, UnpackReport};
use crate::state::{ArchiveNode, ExtractionState, FailedNode};

/// Caller-supplied early-exit check, evaluated against the scoped root.
pub trait StopPredicate {
    fn is_satisfied(&self, root: &Path) -> bool;
}

impl<F> StopPredicate for F
where
    F: Fn(&Path) -> bool,
{
    fn is_satisfied(&self, root: &Path) -> bool {
        self(root)
    }
}

#[derive(Clone, Debug)]
pub struct UnpackOptions {
    pub collisions: CollisionPolicy,
    pub max_iterations: Option<usize>,
    /// Directory names never descended into.
    pub exclude: Vec<String>,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            collisions: CollisionPolicy::default(),
            max_iterations: None,
            exclude: vec![".git".to_string()],
        }
    }
}

impl UnpackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collisions(mut self, policy: CollisionPolicy) -> Self {
        self.collisions = policy;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude.push(name.into());
        self
    }
}

pub struct Engine {
    reader: ContainerReader,
    options: UnpackOptions,
}

impl Engine {
    pub fn new(reader: ContainerReader) -> Self {
        Self {
            reader,
            options: UnpackOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UnpackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &UnpackOptions {
        &self.options
    }

    /// Unpack until no live containers remain.
    pub fn run(&self, root: &ScopedRoot) -> Result<UnpackReport> {
        self.run_inner(root, None)
    }

    /// Unpack until `stop` holds or no live containers remain. `stop` is
    /// checked before every scan and after every extraction.
    pub fn run_until(&self, root: &ScopedRoot, stop: &dyn StopPredicate) -> Result<UnpackReport> {
        self.run_inner(root, Some(stop))
    }

    #[tracing::instrument(skip_all, fields(root = %root.path().display()))]
    fn run_inner(
        &self,
        root: &ScopedRoot,
        stop: Option<&dyn StopPredicate>,
    ) -> Result<UnpackReport> {
        let _lock = root.lock()?;
        let mut state = ExtractionState::new(root.clone());
        let mut report = UnpackReport {
            root: root.path().to_path_buf(),
            ..Default::default()
        };

        'scan: loop {
            let found = self.scan(root)?;

            if stop.is_some_and(|s| s.is_satisfied(root.path())) {
                state.set_targets_found();
                report.stopped_early = true;
                tracing::info!(iteration = state.iteration(), "stop condition met before scan");
                break;
            }

            let live: Vec<PathBuf> = found
                .into_iter()
                .filter(|path| !state.is_failed(path))
                .collect();
            if live.is_empty() {
                tracing::info!(iterations = state.iteration(), "fixed point reached");
                break;
            }

            if self
                .options
                .max_iterations
                .is_some_and(|max| state.iteration() >= max)
            {
                tracing::warn!(
                    remaining = live.len(),
                    "iteration guard hit with containers still left"
                );
                report.exhausted = true;
                break;
            }

            let iteration = state.begin_iteration();
            report.iterations = iteration;
            tracing::info!(iteration, containers = live.len(), "unpacking batch");

            for container in live {
                self.unpack_one(&container, &mut state, &mut report)?;

                if stop.is_some_and(|s| s.is_satisfied(root.path())) {
                    state.set_targets_found();
                    report.stopped_early = true;
                    tracing::info!(iteration, "stop condition met mid-batch");
                    break 'scan;
                }
            }
        }

        if report.is_degraded() {
            for warning in report.warnings() {
                tracing::warn!("{warning}");
            }
        }
        Ok(report)
    }

    fn unpack_one(
        &self,
        container: &Path,
        state: &mut ExtractionState,
        report: &mut UnpackReport,
    ) -> Result<()> {
        let iteration = state.iteration();
        let mut fail = |state: &mut ExtractionState, class: FailureClass, detail: String| {
            tracing::warn!(container = %container.display(), %class, "{detail}");
            state.mark_failed(container, class);
            report.failures.push(FailedNode {
                path: container.to_path_buf(),
                iteration,
                class,
                detail,
            });
        };

        if !state.mark_attempted(container) {
            fail(
                state,
                FailureClass::Revisited,
                "a new container appeared at a path already attempted in this run; \
                 it was left unextracted"
                    .to_string(),
            );
            return Ok(());
        }

        let container = state.root().ensure_within(container)?;
        let wanted = state.root().ensure_within(unpack_target(&container))?;

        let target = resolve(wanted, self.options.collisions);
        let Some(dest) = target.destination().map(Path::to_path_buf) else {
            fail(
                state,
                FailureClass::Collision,
                "target directory already exists and the collision policy is 'fail'".to_string(),
            );
            report.collisions.push(Collision {
                container: container.clone(),
                existing: unpack_target(&container),
                resolution: Resolution::Refused,
            });
            return Ok(());
        };
        let dest = state.root().ensure_within(dest)?;

        match self.reader.consume(&container, &dest) {
            Ok(extraction) => {
                tracing::debug!(
                    container = %container.display(),
                    entries = extraction.entries,
                    strategy = ?extraction.strategy,
                    "extracted"
                );
                if let Target::Collided {
                    existing,
                    resolution,
                } = target
                {
                    report.collisions.push(Collision {
                        container: container.clone(),
                        existing,
                        resolution,
                    });
                }
                report.extraction_warnings.extend(extraction.warnings.iter().cloned());
                report.extracted.push(ArchiveNode {
                    path: container,
                    destination: dest,
                    iteration,
                    corrupted: extraction.is_corrupted(),
                });
            }
            Err(e) => fail(state, e.class, e.source.to_string()),
        }
        Ok(())
    }

    /// Containers under `root`, sorted. Symlinks are not followed.
    pub fn scan(&self, root: &ScopedRoot) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let walker = WalkDir::new(root.path())
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(Error::Scan {
                        path: root.path().to_path_buf(),
                        source: err,
                    });
                }
                Err(err) => {
                    tracing::warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if entry.file_type().is_file()
                && entry.file_name() != OsStr::new(LOCK_FILE_NAME)
                && ContainerKind::from_path(entry.path()).is_some()
            {
                found.push(entry.into_path());
            }
        }
        found.sort();
        Ok(found)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| {
                    name.starts_with(SCRATCH_PREFIX) || self.options.exclude.iter().any(|x| x == name)
                })
    }
}
