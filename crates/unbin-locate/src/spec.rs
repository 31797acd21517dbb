use std::collections::BTreeSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matcher::NameMatch;

const S32DS_POWER: &str = include_str!("../catalog/s32ds-power.toml");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Dir,
    File,
}

/// A named artifact to find, described purely by names and paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverableSpec {
    pub name: String,
    #[serde(default)]
    pub kind: EntryKind,
    pub pattern: NameMatch,
    /// Search only beneath the shallowest directory matching this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NameMatch>,
    /// Fragment the `/`-separated relative path must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_contains: Option<String>,
    /// Entries that must exist beneath a matched directory, or next to a
    /// matched file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Path fragments ranked ahead of depth, most preferred first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefer: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl DeliverableSpec {
    pub fn dir(name: impl Into<String>, pattern: NameMatch) -> Self {
        Self::new(name, EntryKind::Dir, pattern)
    }

    pub fn file(name: impl Into<String>, pattern: NameMatch) -> Self {
        Self::new(name, EntryKind::File, pattern)
    }

    fn new(name: impl Into<String>, kind: EntryKind, pattern: NameMatch) -> Self {
        Self {
            name: name.into(),
            kind,
            pattern,
            parent: None,
            path_contains: None,
            requires: Vec::new(),
            prefer: Vec::new(),
            required: true,
        }
    }

    pub fn parent(mut self, parent: NameMatch) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn path_contains(mut self, fragment: impl Into<String>) -> Self {
        self.path_contains = Some(fragment.into());
        self
    }

    pub fn requires(mut self, entry: impl Into<String>) -> Self {
        self.requires.push(entry.into());
        self
    }

    pub fn prefer(mut self, fragment: impl Into<String>) -> Self {
        self.prefer.push(fragment.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        for entry in &self.requires {
            let path = Path::new(entry);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if entry.is_empty() || escapes {
                return Err(Error::InvalidRequirement {
                    name: self.name.clone(),
                    entry: entry.clone(),
                });
            }
        }
        Ok(())
    }
}

/// An ordered set of deliverables with unique names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "deliverable", default)]
    pub deliverables: Vec<DeliverableSpec>,
}

impl Catalog {
    pub fn new(deliverables: Vec<DeliverableSpec>) -> Result<Self> {
        let catalog = Self { deliverables };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Toolchain, debug server, runtime library and drivers of the
    /// S32 Design Studio for Power Architecture installer.
    pub fn s32ds_power() -> Result<Self> {
        Self::from_toml(S32DS_POWER)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for spec in &self.deliverables {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::DuplicateName(spec.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DeliverableSpec> {
        self.deliverables.iter().find(|d| d.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &DeliverableSpec> {
        self.deliverables.iter().filter(|d| d.required)
    }

    pub fn as_slice(&self) -> &[DeliverableSpec] {
        &self.deliverables
    }
}
