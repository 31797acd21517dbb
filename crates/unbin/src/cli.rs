use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use unbin_unpack::CollisionPolicy;

use crate::config::Overrides;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "unbin",
    about = "Unpack a self-extracting toolchain installer and repackage it as a .deb",
    long_about = None,
    disable_version_flag = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub input: InputArg,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Write the installer's zip payload next to the extraction root.
    Payload(InputArg),
    /// Carve the payload and unpack every nested container.
    Unpack(InputArg),
    /// Report where each deliverable is in an unpacked tree.
    Locate(LocateArg),
    /// Run the whole pipeline and build the package (the default).
    Package(InputArg),
}

#[derive(Clone, Debug, Default, Args)]
pub struct InputArg {
    /// Installer `.bin`; the first one in the current directory when omitted.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Args)]
pub struct LocateArg {
    /// Tree to search; the work directory's extraction root when omitted.
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Args)]
pub struct Options {
    /// Package version written to the control file.
    #[arg(long = "version", value_name = "VERSION", global = true)]
    pub pkg_version: Option<String>,

    /// Output package path.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Directory for the payload and the extracted tree.
    #[arg(short = 'w', long, value_name = "DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// Configuration file (default: ./unbin.toml).
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// What to do when a container's target directory already exists.
    #[arg(long, value_name = "POLICY", global = true)]
    pub collisions: Option<CollisionPolicy>,

    /// Give up after this many unpacking passes.
    #[arg(long, value_name = "N", global = true)]
    pub max_iterations: Option<usize>,

    /// Stop unpacking once every required deliverable is present.
    #[arg(long, global = true)]
    pub until_found: bool,

    /// Discard an existing extracted tree instead of resuming it.
    #[arg(long, global = true)]
    pub fresh: bool,

    /// Keep the staged package tree after building.
    #[arg(long, global = true)]
    pub keep_staging: bool,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// The installer argument, wherever it was given.
    pub fn input(&self) -> Option<&PathBuf> {
        match &self.command {
            Some(Command::Payload(arg) | Command::Unpack(arg) | Command::Package(arg)) => {
                arg.input.as_ref()
            }
            Some(Command::Locate(_)) | None => self.input.input.as_ref(),
        }
    }
}

impl Options {
    /// Flags are overrides only when given; `false` switches stay unset.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            work_dir: self.work_dir.clone(),
            output: self.output.clone(),
            version: self.pkg_version.clone(),
            collisions: self.collisions,
            max_iterations: self.max_iterations,
            until_found: self.until_found.then_some(true),
            fresh: self.fresh.then_some(true),
            keep_staging: self.keep_staging.then_some(true),
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
