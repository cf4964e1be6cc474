//! Session configuration
//!
//! Controls how a [`Session`](crate::Session) sets up its engine. Built in
//! code with the `with_*` methods or loaded from TOML:
//!
//! ```toml
//! open_libs = true
//! traceback = true
//! chunk_name = "=main"
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use luabind::{Session, SessionConfig};
//!
//! let config = SessionConfig::new().with_traceback(true);
//! let session = Session::with_config(config)?;
//! ```

use serde::Deserialize;
use std::ffi::CString;

/// How a session's engine is set up
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Open the engine's standard libraries on creation
    #[serde(default = "default_open_libs")]
    pub open_libs: bool,

    /// Append a stack traceback to runtime error messages
    #[serde(default)]
    pub traceback: bool,

    /// Chunk name for source text (shows up in error positions)
    ///
    /// A leading `=` makes the engine print the rest verbatim; a leading
    /// `@` marks it as a file name.
    #[serde(default = "default_chunk_name")]
    pub chunk_name: String,
}

fn default_open_libs() -> bool {
    true
}

fn default_chunk_name() -> String {
    "=chunk".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_libs: default_open_libs(),
            traceback: false,
            chunk_name: default_chunk_name(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_libs(mut self, open_libs: bool) -> Self {
        self.open_libs = open_libs;
        self
    }

    pub fn with_traceback(mut self, traceback: bool) -> Self {
        self.traceback = traceback;
        self
    }

    pub fn with_chunk_name(mut self, chunk_name: impl Into<String>) -> Self {
        self.chunk_name = chunk_name.into();
        self
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse session config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that the type system cannot
    pub fn validate(&self) -> Result<(), String> {
        self.chunk_name_cstr().map(|_| ())
    }

    pub(crate) fn chunk_name_cstr(&self) -> Result<CString, String> {
        if self.chunk_name.is_empty() {
            return Err("chunk_name cannot be empty".to_string());
        }
        CString::new(self.chunk_name.as_str())
            .map_err(|_| format!("chunk_name '{}' contains a NUL byte", self.chunk_name.escape_debug()))
    }
}
