//! Configuration for pyberry.
//!
//! Loaded from, in order of preference:
//! 1. An explicit path given on the command line
//! 2. `pyberry.toml` in the working directory
//! 3. Builtin defaults
//!
//! Example pyberry.toml:
//! ```toml
//! [prepass]
//! substitutions = [["time.sleep", "tasmota.delay"]]
//!
//! [mappings.classes]
//! deque = "list"
//!
//! [mappings.methods.list]
//! appendleft = "insert"
//!
//! [scope]
//! mode = "lexical"
//!
//! [output]
//! extension = "be"
//! declare_members = false
//! ```

use crate::error::TranslateError;
use crate::mappings::MappingTable;
use crate::output::EmitOptions;
use crate::prepass::Prepass;
use crate::scope::ScopeMode;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extra text substitutions, applied after the builtin ones.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PrepassConfig {
    pub substitutions: Vec<(String, String)>,
}

/// Additions to the class and method tables.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MappingsConfig {
    /// Python type name to Berry class name.
    pub classes: HashMap<String, String>,
    /// Berry class name to (Python method, Berry method) entries.
    pub methods: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScopeConfig {
    pub mode: ScopeMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Extension of written files, without the dot.
    pub extension: String,
    pub declare_members: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            extension: "be".to_string(),
            declare_members: false,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub prepass: PrepassConfig,
    pub mappings: MappingsConfig,
    pub scope: ScopeConfig,
    pub output: OutputConfig,
}

impl Config {
    pub const FILE_NAME: &'static str = "pyberry.toml";

    /// Load the explicit config, else `pyberry.toml` in the working
    /// directory, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, TranslateError> {
        Self::discover(explicit, Path::new("."))
    }

    /// Like [`Config::load`], looking for the implicit file in `dir`.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, TranslateError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let implicit = dir.join(Self::FILE_NAME);
        if implicit.is_file() {
            return Self::load_file(&implicit);
        }

        tracing::debug!("no {} found, using defaults", Self::FILE_NAME);
        Ok(Self::default())
    }

    /// Load config from a file path.
    pub fn load_file(path: &Path) -> Result<Self, TranslateError> {
        let content =
            std::fs::read_to_string(path).map_err(|err| TranslateError::io(path, err))?;
        let config = Self::parse(&content, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, TranslateError> {
        let config: Self = toml::from_str(content).map_err(|err| TranslateError::Config {
            path: PathBuf::from(path),
            message: err.message().to_string(),
        })?;

        let extension = &config.output.extension;
        // `py` would write over the input.
        if extension.is_empty()
            || extension.contains('/')
            || extension.eq_ignore_ascii_case("py")
        {
            return Err(TranslateError::Config {
                path: PathBuf::from(path),
                message: format!("invalid output extension `{extension}`"),
            });
        }
        Ok(config)
    }

    pub fn prepass(&self) -> Prepass {
        let mut prepass = Prepass::default();
        prepass.extend(self.prepass.substitutions.iter().cloned());
        prepass
    }

    /// Builtin tables extended with the configured entries, or `None` when
    /// nothing is configured.
    pub fn mapping_table(&self) -> Option<MappingTable> {
        if self.mappings.classes.is_empty() && self.mappings.methods.is_empty() {
            return None;
        }
        let mut table = MappingTable::default();
        table.extend(
            self.mappings.classes.clone(),
            self.mappings.methods.clone(),
        );
        Some(table)
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            scope_mode: self.scope.mode,
            declare_members: self.output.declare_members,
        }
    }
}
