use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use unbin_archive::FailureClass;
use unbin_fs::ScopedRoot;

/// A container discovered and successfully extracted during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveNode {
    pub path: PathBuf,
    pub destination: PathBuf,
    /// Iteration (1-based) in which the container was extracted.
    pub iteration: usize,
    /// Set when the tolerant fallback had to be used.
    pub corrupted: bool,
}

/// A container that could not be extracted. It stays on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedNode {
    pub path: PathBuf,
    pub iteration: usize,
    pub class: FailureClass,
    pub detail: String,
}

/// Per-run bookkeeping for the unpacking loop.
#[derive(Debug)]
pub struct ExtractionState {
    root: ScopedRoot,
    iteration: usize,
    attempted: BTreeSet<PathBuf>,
    failed: BTreeMap<PathBuf, FailureClass>,
    targets_found: bool,
}

impl ExtractionState {
    pub fn new(root: ScopedRoot) -> Self {
        Self {
            root,
            iteration: 0,
            attempted: BTreeSet::new(),
            failed: BTreeMap::new(),
            targets_found: false,
        }
    }

    pub fn root(&self) -> &ScopedRoot {
        &self.root
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn targets_found(&self) -> bool {
        self.targets_found
    }

    pub fn was_attempted(&self, path: &Path) -> bool {
        self.attempted.contains(path)
    }

    pub fn is_failed(&self, path: &Path) -> bool {
        self.failed.contains_key(path)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, FailureClass)> {
        self.failed.iter().map(|(p, c)| (p.as_path(), *c))
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    /// Returns `false` when `path` was already attempted.
    pub(crate) fn mark_attempted(&mut self, path: &Path) -> bool {
        self.attempted.insert(path.to_path_buf())
    }

    pub(crate) fn mark_failed(&mut self, path: &Path, class: FailureClass) {
        self.failed.insert(path.to_path_buf(), class);
    }

    pub(crate) fn set_targets_found(&mut self) {
        self.targets_found = true;
    }
}
