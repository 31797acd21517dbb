use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use unbin_locate::DeliverableSpec;

use crate::error::{Error, Result};

const S32DS_POWER: &str = include_str!("../package/s32ds-power.toml");

/// How a deliverable's files are copied into the staged tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    /// The whole directory, recursively.
    #[default]
    Tree,
    /// Only regular files directly inside the directory.
    Files,
}

/// Deliverable name to a path under the install prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mapping {
    pub deliverable: String,
    pub install_path: String,
    #[serde(default)]
    pub copy: CopyMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStage {
    Preinst,
    Postinst,
    Prerm,
    Postrm,
}

impl HookStage {
    /// File name under `DEBIAN/`.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Preinst => "preinst",
            Self::Postinst => "postinst",
            Self::Prerm => "prerm",
            Self::Postrm => "postrm",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A lifecycle script rendered from a named template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookBinding {
    pub stage: HookStage,
    pub template: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    /// First line of the `Description` field.
    pub summary: String,
    /// Bullet list under the description.
    #[serde(default)]
    pub contents: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Install prefix relative to `/`; defaults to `usr/local/<name>`.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(rename = "mapping", default)]
    pub mappings: Vec<Mapping>,
    #[serde(rename = "hook", default)]
    pub hooks: Vec<HookBinding>,
}

impl PackageSpec {
    /// The S32 Design Studio for Power Architecture package.
    pub fn s32ds_power() -> Result<Self> {
        Self::from_toml(S32DS_POWER)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Install prefix relative to the package root.
    pub fn prefix(&self) -> PathBuf {
        match &self.prefix {
            Some(prefix) => PathBuf::from(prefix.trim_start_matches('/')),
            None => Path::new("usr/local").join(&self.name),
        }
    }

    /// Absolute path a mapping occupies once installed.
    pub fn installed_path(&self, mapping: &Mapping) -> PathBuf {
        Path::new("/").join(self.prefix()).join(&mapping.install_path)
    }

    /// `<name>_<version>_<architecture>.deb`.
    pub fn output_file_name(&self) -> String {
        format!("{}_{}_{}.deb", self.name, self.version, self.architecture)
    }

    /// Every mapping names a declared, required deliverable and a distinct,
    /// relative install path.
    pub fn validate(&self, deliverables: &[DeliverableSpec]) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("version", &self.version),
            ("architecture", &self.architecture),
        ] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                return Err(Error::InvalidField {
                    field,
                    value: value.clone(),
                });
            }
        }
        if let Some(prefix) = &self.prefix {
            if !is_plain_relative(Path::new(prefix.trim_start_matches('/'))) {
                return Err(Error::InvalidInstallPath {
                    deliverable: "<prefix>".to_string(),
                    path: prefix.clone(),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for mapping in &self.mappings {
            let declared = deliverables.iter().find(|d| d.name == mapping.deliverable);
            match declared {
                None => {
                    return Err(Error::UnknownDeliverable(mapping.deliverable.clone()));
                }
                Some(spec) if !spec.required => {
                    return Err(Error::MappingNotRequired(mapping.deliverable.clone()));
                }
                Some(_) => {}
            }

            if !is_plain_relative(Path::new(&mapping.install_path)) {
                return Err(Error::InvalidInstallPath {
                    deliverable: mapping.deliverable.clone(),
                    path: mapping.install_path.clone(),
                });
            }
            if !seen.insert(mapping.install_path.trim_end_matches('/')) {
                return Err(Error::DuplicateInstallPath(mapping.install_path.clone()));
            }
        }

        let mut stages = BTreeSet::new();
        for hook in &self.hooks {
            if !stages.insert(hook.stage) {
                return Err(Error::DuplicateHook(hook.stage));
            }
        }
        Ok(())
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}
