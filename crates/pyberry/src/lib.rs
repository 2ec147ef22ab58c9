//! Translate Python automation scripts into Berry, the scripting language
//! embedded in Tasmota firmware.
//!
//! # Architecture
//!
//! ```text
//! source ─> prepass ─> input::python ─> ast::Module ─> output::emit ─> Berry
//!           (text)     (tree-sitter)                   (scope + mappings)
//! ```
//!
//! Translation is a single synchronous pass per file. The scope tracker and
//! output buffer live for one run; the mapping tables are read-only and
//! shared.
//!
//! # Example
//!
//! ```
//! let berry = pyberry::translate("if delay is not None:\n    self.set_delay(delay)\n")?;
//! assert_eq!(berry, "if delay != nil\n    self.set_delay(delay)\nend\n");
//! # Ok::<(), pyberry::TranslateError>(())
//! ```
//!
//! # Note on Translation Fidelity
//!
//! This is surface-level translation of a Python subset. Constructs with no
//! direct Berry counterpart are rejected with
//! [`TranslateError::UnsupportedConstruct`] rather than approximated, and
//! a failed run produces no output at all.

pub mod ast;
pub mod config;
pub mod driver;
pub mod error;
pub mod input;
pub mod mappings;
pub mod output;
pub mod prepass;
pub mod scope;

pub use config::Config;
pub use error::TranslateError;
pub use mappings::MappingTable;
pub use output::EmitOptions;
pub use prepass::Prepass;
pub use scope::{ContainerKind, ScopeMode};

use std::borrow::Cow;

/// A configured translation pipeline.
#[derive(Debug, Clone)]
pub struct Translator {
    prepass: Prepass,
    table: Cow<'static, MappingTable>,
    options: EmitOptions,
    extension: String,
}

impl Default for Translator {
    fn default() -> Self {
        Self {
            prepass: Prepass::default(),
            table: Cow::Borrowed(MappingTable::builtin()),
            options: EmitOptions::default(),
            extension: "be".to_string(),
        }
    }
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let table = match config.mapping_table() {
            Some(table) => Cow::Owned(table),
            None => Cow::Borrowed(MappingTable::builtin()),
        };
        Self {
            prepass: config.prepass(),
            table,
            options: config.emit_options(),
            extension: config.output.extension.clone(),
        }
    }

    pub fn with_options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn options(&self) -> EmitOptions {
        self.options
    }

    /// Extension of output files, without the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Translate Python source text into Berry source text.
    pub fn translate(&self, source: &str) -> Result<String, TranslateError> {
        let rewritten = self.prepass.apply(source);
        let module = input::read_python(&rewritten)?;
        tracing::debug!(statements = module.body.len(), "parsed");
        output::emit(&module, &self.table, self.options)
    }
}

/// Translate with the builtin tables and default options.
pub fn translate(source: &str) -> Result<String, TranslateError> {
    Translator::default().translate(source)
}
