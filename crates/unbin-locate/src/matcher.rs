use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How a base name is compared against a pattern.
///
/// In configuration a bare string is an exact name, or a glob when it holds
/// any of `*?[`; tables `{ prefix = ".." }`, `{ suffix = ".." }`,
/// `{ exact = ".." }` and `{ glob = ".." }` pick the mode explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NameMatchRepr", into = "NameMatchRepr")]
pub enum NameMatch {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Glob(glob::Pattern),
}

impl NameMatch {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self::Suffix(suffix.into())
    }

    pub fn glob(pattern: &str) -> Result<Self, Error> {
        glob::Pattern::new(pattern)
            .map(Self::Glob)
            .map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Exact, or glob when the text holds a glob metacharacter.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if text.contains(['*', '?', '[']) {
            Self::glob(text)
        } else {
            Ok(Self::exact(text))
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Self::Glob(pattern) => pattern.matches(name),
        }
    }
}

impl fmt::Display for NameMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "{s}"),
            Self::Prefix(s) => write!(f, "{s}*"),
            Self::Suffix(s) => write!(f, "*{s}"),
            Self::Glob(p) => write!(f, "{}", p.as_str()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum NameMatchRepr {
    Plain(String),
    Exact { exact: String },
    Prefix { prefix: String },
    Suffix { suffix: String },
    Glob { glob: String },
}

impl TryFrom<NameMatchRepr> for NameMatch {
    type Error = Error;

    fn try_from(repr: NameMatchRepr) -> Result<Self, Self::Error> {
        match repr {
            NameMatchRepr::Plain(text) => Self::parse(&text),
            NameMatchRepr::Exact { exact } => Ok(Self::Exact(exact)),
            NameMatchRepr::Prefix { prefix } => Ok(Self::Prefix(prefix)),
            NameMatchRepr::Suffix { suffix } => Ok(Self::Suffix(suffix)),
            NameMatchRepr::Glob { glob } => Self::glob(&glob),
        }
    }
}

impl From<NameMatch> for NameMatchRepr {
    fn from(value: NameMatch) -> Self {
        match value {
            NameMatch::Exact(exact) => Self::Exact { exact },
            NameMatch::Prefix(prefix) => Self::Prefix { prefix },
            NameMatch::Suffix(suffix) => Self::Suffix { suffix },
            NameMatch::Glob(pattern) => Self::Glob {
                glob: pattern.as_str().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_modes() {
        assert!(NameMatch::exact("lin").matches("lin"));
        assert!(!NameMatch::exact("lin").matches("linux"));
        assert!(NameMatch::prefix("powerpc-").matches("powerpc-eabivle-4_9"));
        assert!(NameMatch::suffix("_4_9").matches("powerpc-eabivle-4_9"));
        let glob = NameMatch::glob("com.pemicro.debug.gdbjtag.ppc_*").unwrap();
        assert!(glob.matches("com.pemicro.debug.gdbjtag.ppc_1.7.2.201709281658"));
        assert!(!glob.matches("com.pemicro.debug.gdbjtag.arm_1.0"));
    }

    #[test]
    fn parse_picks_glob_only_for_metacharacters() {
        assert_eq!(NameMatch::parse("e200_ewl2").unwrap(), NameMatch::exact("e200_ewl2"));
        assert!(matches!(NameMatch::parse("ppc_*").unwrap(), NameMatch::Glob(_)));
        assert!(matches!(
            NameMatch::parse("[unclosed"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn deserialize_forms() {
        #[derive(Deserialize)]
        struct Holder {
            a: NameMatch,
            b: NameMatch,
        }
        let holder: Holder = toml::from_str(
            r#"
            a = "gdi"
            b = { suffix = "_ewl2" }
            "#,
        )
        .unwrap();
        assert_eq!(holder.a, NameMatch::exact("gdi"));
        assert_eq!(holder.b, NameMatch::suffix("_ewl2"));
    }
}
