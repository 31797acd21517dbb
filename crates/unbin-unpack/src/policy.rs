use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What to do when a container's target directory already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Extract into the existing directory; same-named files are overwritten
    /// by the later container.
    #[default]
    Merge,
    /// Extract into `name.1`, `name.2`, ...
    Rename,
    /// Leave the container unextracted and record it as failed.
    Fail,
}

impl FromStr for CollisionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "rename" => Ok(Self::Rename),
            "fail" => Ok(Self::Fail),
            _ => Err(Error::UnknownPolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Merge => "merge",
            Self::Rename => "rename",
            Self::Fail => "fail",
        })
    }
}

/// How a collision was settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Merged,
    Renamed(PathBuf),
    Refused,
}

/// Where a container should be extracted, given the policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    Fresh(PathBuf),
    Collided {
        existing: PathBuf,
        resolution: Resolution,
    },
}

impl Target {
    /// Directory to extract into, `None` when refused.
    pub(crate) fn destination(&self) -> Option<&Path> {
        match self {
            Self::Fresh(path) => Some(path),
            Self::Collided {
                existing,
                resolution,
            } => match resolution {
                Resolution::Merged => Some(existing),
                Resolution::Renamed(path) => Some(path),
                Resolution::Refused => None,
            },
        }
    }
}

pub(crate) fn resolve(wanted: PathBuf, policy: CollisionPolicy) -> Target {
    let Ok(meta) = wanted.symlink_metadata() else {
        return Target::Fresh(wanted);
    };

    // a file or symlink squatting on the name can never be merged into
    let resolution = if !meta.is_dir() {
        Resolution::Renamed(next_free(&wanted))
    } else {
        match policy {
            CollisionPolicy::Merge => Resolution::Merged,
            CollisionPolicy::Rename => Resolution::Renamed(next_free(&wanted)),
            CollisionPolicy::Fail => Resolution::Refused,
        }
    };
    Target::Collided {
        existing: wanted,
        resolution,
    }
}

fn next_free(wanted: &Path) -> PathBuf {
    let mut n = 1usize;
    loop {
        let mut name = wanted.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        let candidate = PathBuf::from(name);
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_policy() {
        assert_eq!("merge".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Merge);
        assert_eq!("Rename".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Rename);
        assert!("skip".parse::<CollisionPolicy>().is_err());
    }

    #[test]
    fn fresh_target() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("a");
        assert_eq!(resolve(wanted.clone(), CollisionPolicy::Fail), Target::Fresh(wanted));
    }

    #[test]
    fn existing_directory_per_policy() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("a");
        std::fs::create_dir_all(&wanted).unwrap();
        std::fs::create_dir_all(dir.path().join("a.1")).unwrap();

        let merged = resolve(wanted.clone(), CollisionPolicy::Merge);
        assert_eq!(merged.destination(), Some(wanted.as_path()));

        let renamed = resolve(wanted.clone(), CollisionPolicy::Rename);
        assert_eq!(renamed.destination(), Some(dir.path().join("a.2").as_path()));

        let refused = resolve(wanted, CollisionPolicy::Fail);
        assert_eq!(refused.destination(), None);
    }

    #[test]
    fn file_in_the_way_forces_rename() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("a");
        std::fs::write(&wanted, "file").unwrap();

        let target = resolve(wanted, CollisionPolicy::Merge);
        assert_eq!(target.destination(), Some(dir.path().join("a.1").as_path()));
    }
}
