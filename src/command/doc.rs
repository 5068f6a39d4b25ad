//! Command documentation text, registered alongside the handler and carried
//! on fatal dispatch signals so a renderer can show contextual help.

use serde::Serialize;

/// Short and long documentation for one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CmdDoc {
    short: String,
    long: String,
}

impl CmdDoc {
    /// Full documentation: a one-line summary plus a longer body.
    pub fn new(short: impl Into<String>, long: impl Into<String>) -> Self {
        Self { short: short.into(), long: long.into() }
    }

    /// Summary-only documentation.
    pub fn oneline(short: impl Into<String>) -> Self {
        Self { short: short.into(), long: String::new() }
    }

    pub fn short(&self) -> &str {
        &self.short
    }

    /// The long body, falling back to the summary when absent.
    pub fn long(&self) -> &str {
        if self.long.is_empty() { &self.short } else { &self.long }
    }
}
