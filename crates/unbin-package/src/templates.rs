use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::spec::PackageSpec;

pub const CONTROL_TEMPLATE: &str = "control";

const BUILTIN: [(&str, &str); 2] = [
    (CONTROL_TEMPLATE, include_str!("../templates/control.tera")),
    ("postinst", include_str!("../templates/postinst.tera")),
];

/// Control file and lifecycle script templates.
///
/// Built-in templates are always registered; `*.tera` files from an override
/// directory replace them (or add new ones) by file stem.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        for (name, body) in BUILTIN {
            tera.add_raw_template(name, body)
                .map_err(|source| Error::Render {
                    template: name.to_string(),
                    source,
                })?;
        }
        Ok(Self { tera })
    }

    pub fn with_overrides(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut templates = Self::builtin()?;

        let read_err = |source| unbin_fs::Error::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = fs::read_dir(dir)
            .map_err(read_err)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(read_err)?;
        files.sort_by_key(|e| e.file_name());

        for entry in files {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "tera") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let body = fs::read_to_string(&path).map_err(|source| unbin_fs::Error::Read {
                path: path.clone(),
                source,
            })?;
            templates
                .tera
                .add_raw_template(name, &body)
                .map_err(|source| Error::TemplateLoad {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(template = name, path = %path.display(), "template override");
        }
        Ok(templates)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render_control(&self, spec: &PackageSpec) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("package", spec);
        self.render(CONTROL_TEMPLATE, &ctx)
    }

    /// `install` maps deliverable names to their installed absolute paths.
    pub fn render_hook(&self, template: &str, spec: &PackageSpec) -> Result<String> {
        let install: BTreeMap<&str, String> = spec
            .mappings
            .iter()
            .map(|m| {
                let path = spec.installed_path(m);
                (m.deliverable.as_str(), path.to_string_lossy().into_owned())
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("package", spec);
        ctx.insert("prefix", &Path::new("/").join(spec.prefix()).to_string_lossy());
        ctx.insert("install", &install);
        self.render(template, &ctx)
    }

    fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        let text = self
            .tera
            .render(template, ctx)
            .map_err(|source| Error::Render {
                template: template.to_string(),
                source,
            })?;
        // exactly one trailing newline
        Ok(format!("{}\n", text.trim_end()))
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("names", &self.tera.get_template_names().collect::<Vec<_>>())
            .finish()
    }
}
