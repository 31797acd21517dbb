use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::query::{Entry, Query};
use crate::spec::DeliverableSpec;

/// Outcome of one deliverable query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverableResult {
    pub name: String,
    pub required: bool,
    /// Absolute path of the chosen match.
    pub path: Option<PathBuf>,
    /// Walked entries the query was evaluated against.
    pub examined: usize,
    pub elapsed: Duration,
}

impl DeliverableResult {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocateReport {
    pub root: PathBuf,
    pub results: Vec<DeliverableResult>,
}

impl LocateReport {
    pub fn get(&self, name: &str) -> Option<&DeliverableResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(|r| r.path.as_deref())
    }

    pub fn missing_required(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.required && !r.found())
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn all_required_found(&self) -> bool {
        self.results.iter().all(|r| !r.required || r.found())
    }
}

/// Runs deliverable queries over a tree without touching it.
#[derive(Clone, Debug)]
pub struct Locator {
    root: PathBuf,
    skip: Vec<String>,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skip: vec![".git".to_string()],
        }
    }

    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.skip.push(name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve every spec, in order. Not finding something is not an error.
    #[tracing::instrument(skip_all, fields(root = %self.root.display()))]
    pub fn locate(&self, specs: &[DeliverableSpec]) -> Result<LocateReport> {
        let entries = self.walk()?;
        let results = specs
            .iter()
            .map(|spec| self.resolve(&Query::compile(spec), spec.required, &entries))
            .collect();
        let report = LocateReport {
            root: self.root.clone(),
            results,
        };
        for result in &report.results {
            match &result.path {
                Some(path) => tracing::debug!(name = %result.name, path = %path.display(), "found"),
                None => tracing::debug!(name = %result.name, required = result.required, "not found"),
            }
        }
        Ok(report)
    }

    fn resolve(&self, query: &Query<'_>, required: bool, entries: &[Entry]) -> DeliverableResult {
        let start = Instant::now();

        // narrow to the shallowest matching parent directory first
        let scope = match query.parent() {
            None => None,
            Some(parent) => {
                let best = entries
                    .iter()
                    .filter(|e| e.is_dir && parent.matches(e.name()))
                    .min_by(|a, b| (a.depth, &a.rel).cmp(&(b.depth, &b.rel)));
                match best {
                    Some(dir) => Some(dir),
                    None => {
                        return DeliverableResult {
                            name: query.name().to_string(),
                            required,
                            path: None,
                            examined: entries.len(),
                            elapsed: start.elapsed(),
                        };
                    }
                }
            }
        };

        let mut examined = 0;
        let best = entries
            .iter()
            .filter(|e| scope.is_none_or(|dir| e.is_beneath(dir)))
            .inspect(|_| examined += 1)
            .filter(|e| query.matches_entry(e))
            .filter(|e| query.requirements_met(&self.root.join(&e.rel)))
            .min_by(|a, b| query.rank(a).cmp(&query.rank(b)));

        DeliverableResult {
            name: query.name().to_string(),
            required,
            path: best.map(|e| self.root.join(&e.rel)),
            examined,
            elapsed: start.elapsed(),
        }
    }

    fn walk(&self) -> Result<Vec<Entry>> {
        if !self.root.is_dir() {
            return Err(Error::RootMissing(self.root.clone()));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.file_name()
                        .to_str()
                        .is_some_and(|n| self.skip.iter().any(|s| s == n)))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(Error::Walk {
                        path: self.root.clone(),
                        source,
                    });
                }
                Err(err) => {
                    tracing::warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(Entry {
                rel,
                depth: entry.depth(),
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::NameMatch;
    use std::fs;

    #[test]
    fn missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = Locator::new(dir.path().join("nope")).locate(&[]).unwrap_err();
        assert!(matches!(err, Error::RootMissing(_)));
    }

    #[test]
    fn file_spec_checks_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/lin")).unwrap();
        fs::create_dir_all(dir.path().join("b/lin")).unwrap();
        fs::write(dir.path().join("a/lin/tool"), "x").unwrap();
        fs::write(dir.path().join("b/lin/tool"), "x").unwrap();
        fs::write(dir.path().join("b/lin/libtool.so"), "x").unwrap();

        let spec = DeliverableSpec::file("tool", NameMatch::exact("tool")).requires("libtool.so");
        let report = Locator::new(dir.path()).locate(&[spec]).unwrap();
        assert_eq!(report.path("tool"), Some(dir.path().join("b/lin/tool").as_path()));
    }

    #[test]
    fn parent_scope_uses_shallowest_parent() {
        let dir = tempfile::tempdir().unwrap();
        let shallow = dir.path().join("plugins/com.pemicro.debug.gdbjtag.ppc_1.7");
        let deep = dir.path().join("x/y/plugins/com.pemicro.debug.gdbjtag.ppc_1.6");
        for base in [&shallow, &deep] {
            fs::create_dir_all(base.join("lin")).unwrap();
            fs::write(base.join("lin/pegdbserver_power_console"), "srv").unwrap();
        }

        let spec = DeliverableSpec::dir("gdbserver", NameMatch::exact("lin"))
            .parent(NameMatch::glob("com.pemicro.debug.gdbjtag.ppc_*").unwrap())
            .requires("pegdbserver_power_console");
        let report = Locator::new(dir.path()).locate(&[spec]).unwrap();
        assert_eq!(report.path("gdbserver"), Some(shallow.join("lin").as_path()));
    }

    #[test]
    fn missing_parent_means_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lin")).unwrap();

        let spec = DeliverableSpec::dir("gdbserver", NameMatch::exact("lin"))
            .parent(NameMatch::exact("com.pemicro"));
        let report = Locator::new(dir.path()).locate(&[spec]).unwrap();
        assert!(!report.get("gdbserver").unwrap().found());
        assert_eq!(report.missing_required(), ["gdbserver"]);
    }
}
