//! Command-line arguments and the optional config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use rewatch_directory_watcher::WatchConfig;
use serde::Deserialize;

/// Re-run a command whenever a directory tree settles after changes.
#[derive(Debug, Parser)]
#[command(name = "rewatch", version)]
pub struct Cli {
    /// Directory to watch recursively. May be repeated.
    #[arg(short = 'w', long = "watch", value_name = "DIR")]
    pub watch: Vec<PathBuf>,

    /// TOML file providing defaults for any of these options.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Quiet period that ends a burst of changes.
    #[arg(short = 'd', long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Descend into symlinked directories.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Stop after the first run.
    #[arg(long)]
    pub once: bool,

    /// Stop when the command fails.
    #[arg(long)]
    pub halt_on_failure: bool,

    /// Command to run after every settled burst.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub watch: WatchConfig,
    pub command: Vec<String>,
    pub once: bool,
    pub halt_on_failure: bool,
}

impl FileConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct Settings {
    pub watch: WatchConfig,
    pub command: Vec<String>,
    pub once: bool,
    pub halt_on_failure: bool,
}

impl Cli {
    /// Merge the arguments over the config file, if one was given.
    pub fn into_settings(self) -> Result<Settings> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.merge(file)
    }

    /// Flags win over the file. Roots and command replace, never extend.
    fn merge(self, file: FileConfig) -> Result<Settings> {
        let mut watch = file.watch;
        if !self.watch.is_empty() {
            watch.roots = self.watch;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            watch.debounce_ms = debounce_ms;
        }
        watch.follow_symlinks |= self.follow_symlinks;
        watch
            .validate()
            .context("invalid watch configuration, pass --watch DIR or set `roots`")?;

        let command = if self.command.is_empty() {
            file.command
        } else {
            self.command
        };
        if command.is_empty() {
            bail!("no command given, pass one after `--` or set `command` in the config file");
        }

        Ok(Settings {
            watch,
            command,
            once: self.once || file.once,
            halt_on_failure: self.halt_on_failure || file.halt_on_failure,
        })
    }
}
