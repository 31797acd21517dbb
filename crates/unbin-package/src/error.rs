use std::io;
use std::path::PathBuf;

use crate::spec::HookStage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("required deliverables not found: {}", .names.join(", "))]
    MissingDeliverables { names: Vec<String> },

    #[error("mapping references undeclared deliverable '{0}'")]
    UnknownDeliverable(String),

    #[error("mapping references deliverable '{0}', which is not marked required")]
    MappingNotRequired(String),

    #[error("install path '{0}' is mapped more than once")]
    DuplicateInstallPath(String),

    #[error("install path '{path}' for '{deliverable}' must be relative and stay inside the prefix")]
    InvalidInstallPath { deliverable: String, path: String },

    #[error("more than one '{0}' hook")]
    DuplicateHook(HookStage),

    #[error("package field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("failed to parse package description: {0}")]
    Spec(#[from] toml::de::Error),

    #[error("failed to load templates from '{path}': {source}")]
    TemplateLoad { path: PathBuf, source: tera::Error },

    #[error("no template named '{0}'")]
    UnknownTemplate(String),

    #[error("failed to render template '{template}': {source}")]
    Render {
        template: String,
        source: tera::Error,
    },

    #[error("failed to copy deliverable '{deliverable}': {source}")]
    Copy {
        deliverable: String,
        source: unbin_fs::Error,
    },

    #[error("failed to run '{tool}': {source}")]
    ToolSpawn { tool: String, source: io::Error },

    #[error("'{tool}' failed (exit {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Fs(#[from] unbin_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
