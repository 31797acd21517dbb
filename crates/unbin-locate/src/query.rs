use std::path::Path;

use crate::matcher::NameMatch;
use crate::spec::{DeliverableSpec, EntryKind};

/// One entry of the walked tree, relative to the search root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// `/`-separated relative path.
    pub rel: String,
    pub depth: usize,
    pub is_dir: bool,
}

impl Entry {
    pub fn name(&self) -> &str {
        self.rel.rsplit('/').next().unwrap_or(&self.rel)
    }

    /// Whether `self` lies strictly beneath directory `dir`.
    pub fn is_beneath(&self, dir: &Entry) -> bool {
        self.rel.len() > dir.rel.len()
            && self.rel.starts_with(dir.rel.as_str())
            && self.rel.as_bytes()[dir.rel.len()] == b'/'
    }
}

/// A [`DeliverableSpec`] compiled into a predicate over walked entries.
#[derive(Clone, Debug)]
pub struct Query<'a> {
    spec: &'a DeliverableSpec,
}

impl<'a> Query<'a> {
    pub fn compile(spec: &'a DeliverableSpec) -> Self {
        Self { spec }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn parent(&self) -> Option<&NameMatch> {
        self.spec.parent.as_ref()
    }

    /// Name, kind and path-fragment checks. Never looks at file contents.
    pub fn matches_entry(&self, entry: &Entry) -> bool {
        let kind_ok = match self.spec.kind {
            EntryKind::Dir => entry.is_dir,
            EntryKind::File => !entry.is_dir,
        };
        kind_ok
            && self.spec.pattern.matches(entry.name())
            && self
                .spec
                .path_contains
                .as_deref()
                .is_none_or(|fragment| bracketed(&entry.rel).contains(fragment))
    }

    /// Required entries exist relative to the candidate at `abs`.
    pub fn requirements_met(&self, abs: &Path) -> bool {
        let base = match self.spec.kind {
            EntryKind::Dir => abs,
            EntryKind::File => abs.parent().unwrap_or(abs),
        };
        self.spec
            .requires
            .iter()
            .all(|req| base.join(req).symlink_metadata().is_ok())
    }

    /// Sort key: preference rank, then depth, then path.
    pub fn rank<'e>(&self, entry: &'e Entry) -> (usize, usize, &'e str) {
        let haystack = bracketed(&entry.rel).to_lowercase();
        let preference = self
            .spec
            .prefer
            .iter()
            .position(|fragment| haystack.contains(&fragment.to_lowercase()))
            .unwrap_or(self.spec.prefer.len());
        (preference, entry.depth, entry.rel.as_str())
    }
}

/// `/rel/`, so fragments like `/lin/` also match at either end.
fn bracketed(rel: &str) -> String {
    format!("/{rel}/")
}
