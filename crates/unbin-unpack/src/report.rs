use std::path::PathBuf;

use crate::policy::Resolution;
use crate::state::{ArchiveNode, FailedNode};

/// A container whose target directory already existed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub container: PathBuf,
    pub existing: PathBuf,
    pub resolution: Resolution,
}

#[derive(Clone, Debug, Default)]
pub struct UnpackReport {
    pub root: PathBuf,
    /// Batches that ran at least one extraction attempt.
    pub iterations: usize,
    pub extracted: Vec<ArchiveNode>,
    pub failures: Vec<FailedNode>,
    pub collisions: Vec<Collision>,
    pub stopped_early: bool,
    /// The iteration guard was hit while live containers remained.
    pub exhausted: bool,
    /// Warnings passed through from individual extractions.
    pub extraction_warnings: Vec<String>,
}

impl UnpackReport {
    /// Failures, tolerant recoveries, merges or an exhausted guard.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
            || self.exhausted
            || self.extracted.iter().any(|n| n.corrupted)
            || self
                .collisions
                .iter()
                .any(|c| c.resolution == Resolution::Merged)
    }

    /// Every container attempted failed (and at least one was attempted).
    pub fn all_failed(&self) -> bool {
        self.extracted.is_empty() && !self.failures.is_empty()
    }

    pub fn corrupted(&self) -> impl Iterator<Item = &ArchiveNode> {
        self.extracted.iter().filter(|n| n.corrupted)
    }

    /// Human-readable list of everything that made the run degraded.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.corrupted() {
            out.push(format!(
                "'{}' was corrupted and recovered with the tolerant extractor",
                node.path.display()
            ));
        }
        for failure in &self.failures {
            out.push(format!(
                "'{}' could not be extracted ({}): {}",
                failure.path.display(),
                failure.class,
                failure.detail
            ));
        }
        for collision in &self.collisions {
            match &collision.resolution {
                Resolution::Merged => out.push(format!(
                    "'{}' was merged into existing directory '{}'; same-named files were overwritten",
                    collision.container.display(),
                    collision.existing.display()
                )),
                Resolution::Renamed(to) => out.push(format!(
                    "'{}' extracted into '{}' because '{}' already existed",
                    collision.container.display(),
                    to.display(),
                    collision.existing.display()
                )),
                // already listed as a failure
                Resolution::Refused => {}
            }
        }
        if self.exhausted {
            out.push(format!(
                "stopped after {} iterations with containers still left",
                self.iterations
            ));
        }
        out.extend(self.extraction_warnings.iter().cloned());
        out
    }
}
