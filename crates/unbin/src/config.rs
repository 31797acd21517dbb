//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, `unbin.toml` in the current
//! directory (or the file given with `--config`), `UNBIN_*` environment
//! variables (`__` separates nested keys), then command-line flags.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use unbin_unpack::CollisionPolicy;

pub const CONFIG_FILE: &str = "unbin.toml";
pub const ENV_PREFIX: &str = "UNBIN_";

pub const PAYLOAD_FILE: &str = "installer_payload.zip";
pub const INSTALLER_DIR: &str = "installer";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Holds the carved payload and the extraction root.
    pub work_dir: PathBuf,
    /// Package file; `<name>_<version>_<arch>.deb` in the current directory
    /// when unset.
    pub output: Option<PathBuf>,
    /// Overrides the package description's version.
    pub version: Option<String>,
    pub collisions: CollisionPolicy,
    pub max_iterations: Option<usize>,
    /// Extra directory names the unpacker never descends into.
    pub exclude: Vec<String>,
    /// Stop unpacking as soon as every required deliverable is present.
    pub until_found: bool,
    /// Discard an existing extraction root instead of resuming it.
    pub fresh: bool,
    pub keep_staging: bool,
    /// Parent of the staging directory; the system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
    /// Directory of `*.tera` files overriding the built-in templates.
    pub templates: Option<PathBuf>,
    /// TOML file of `[[deliverable]]` tables replacing the built-in catalog.
    pub catalog: Option<PathBuf>,
    /// TOML package description replacing the built-in one.
    pub package: Option<PathBuf>,
    pub tools: Tools,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            output: None,
            version: None,
            collisions: CollisionPolicy::default(),
            max_iterations: None,
            exclude: Vec::new(),
            until_found: false,
            fresh: false,
            keep_staging: false,
            staging_dir: None,
            templates: None,
            catalog: None,
            package: None,
            tools: Tools::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    /// Use the tolerant extractor for structurally damaged containers.
    pub fallback: bool,
    pub unzip: PathBuf,
    pub dpkg_deb: PathBuf,
    pub root_owner_group: bool,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            fallback: true,
            unzip: PathBuf::from("unzip"),
            dpkg_deb: PathBuf::from("dpkg-deb"),
            root_owner_group: false,
        }
    }
}

impl Config {
    /// Extracted installer tree; the scoped root of the unpacker.
    pub fn installer_dir(&self) -> PathBuf {
        self.work_dir.join(INSTALLER_DIR)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.work_dir.join(PAYLOAD_FILE)
    }

    /// Sidecar holding the payload's SHA-256.
    pub fn digest_path(&self) -> PathBuf {
        self.work_dir.join(format!("{PAYLOAD_FILE}.sha256"))
    }

    /// Sidecar written once the payload is fully extracted, holding the
    /// payload's SHA-256. Only a tree with a matching record is resumed.
    pub fn extracted_marker_path(&self) -> PathBuf {
        self.work_dir.join(format!("{PAYLOAD_FILE}.extracted"))
    }

    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Layers defaults, `file`, the environment and `overrides`.
    pub fn load(file: &Path, overrides: &Overrides) -> Result<Self, figment::Error> {
        Self::figment(file)
            .merge(Serialized::defaults(overrides))
            .extract()
    }
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collisions: Option<CollisionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until_found: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_staging: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|jail| {
            let file = jail.directory().join(CONFIG_FILE);
            let config = Config::load(&file, &Overrides::default())?;
            assert_eq!(config, Config::default());
            assert_eq!(config.installer_dir(), Path::new("./installer"));
            assert!(config.tools.fallback);
            Ok(())
        });
    }

    #[test]
    fn layers_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                    work_dir = "from-file"
                    version = "2017.1"
                    collisions = "rename"

                    [tools]
                    unzip = "/opt/unzip"
                "#,
            )?;
            jail.set_env("UNBIN_VERSION", "2017.2-r1");
            jail.set_env("UNBIN_TOOLS__DPKG_DEB", "/opt/dpkg-deb");

            let overrides = Overrides {
                work_dir: Some(PathBuf::from("from-cli")),
                ..Default::default()
            };
            let file = jail.directory().join(CONFIG_FILE);
            let config = Config::load(&file, &overrides)?;

            assert_eq!(config.work_dir, Path::new("from-cli"));
            assert_eq!(config.version.as_deref(), Some("2017.2-r1"));
            assert_eq!(config.collisions, CollisionPolicy::Rename);
            assert_eq!(config.tools.unzip, Path::new("/opt/unzip"));
            assert_eq!(config.tools.dpkg_deb, Path::new("/opt/dpkg-deb"));
            assert!(config.tools.fallback);
            Ok(())
        });
    }

    #[test]
    fn bad_policy_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, r#"collisions = "clobber""#)?;
            let file = jail.directory().join(CONFIG_FILE);
            assert!(Config::load(&file, &Overrides::default()).is_err());
            Ok(())
        });
    }
}
