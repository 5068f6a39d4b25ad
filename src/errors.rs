//! Typed error hierarchy for argument binding and command dispatch.
//!
//! Two tiers cover the two failure domains:
//! - `BindError` — non-fatal binding diagnostics, accumulated over a full
//!   token pass and escalated to `CliError::Call` once the stream is consumed
//! - `CliError` — fatal dispatch signals (help, unresolved or ambiguous
//!   sub-commands, escalated binding errors, definition mistakes)
//!
//! Nothing here renders output; every variant carries structured data for an
//! external presentation layer.

use serde::Serialize;
use thiserror::Error;

use crate::command::CommandInfo;

/// Stable binding diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BindCode {
    /// A required parameter received no value from tokens or defaults.
    #[serde(rename = "NO_VALUE")]
    NoValue,
    /// A token could not be coerced to the parameter's declared type.
    #[serde(rename = "TYPE_MISMATCH")]
    TypeMismatch,
    /// An alias with no declared parameter, on a callable that rejects extras.
    #[serde(rename = "UNK_PARAM")]
    UnkParam,
    /// A dash-leading token that is not a valid keyword token.
    #[serde(rename = "BAD_KW")]
    BadKw,
    /// A `#` repetition request on a non-array parameter.
    #[serde(rename = "NOT_LIST")]
    NotList,
    /// A `#` repetition request whose count is unusable.
    #[serde(rename = "BAD_LIST")]
    BadList,
    /// An exact `#N` request that found fewer than N values.
    #[serde(rename = "LIST_TOO_FEW")]
    ListTooFew,
    /// A keyword parameter whose single value is absent.
    #[serde(rename = "KW_VAL_MISSING")]
    KwValMissing,
    /// An attempt to set the self-like parameter from tokens.
    #[serde(rename = "SELF")]
    SelfParam,
    /// A trailing token that nothing consumed.
    #[serde(rename = "UNUSED")]
    Unused,
}

impl BindCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindCode::NoValue => "NO_VALUE",
            BindCode::TypeMismatch => "TYPE_MISMATCH",
            BindCode::UnkParam => "UNK_PARAM",
            BindCode::BadKw => "BAD_KW",
            BindCode::NotList => "NOT_LIST",
            BindCode::BadList => "BAD_LIST",
            BindCode::ListTooFew => "LIST_TOO_FEW",
            BindCode::KwValMissing => "KW_VAL_MISSING",
            BindCode::SelfParam => "SELF",
            BindCode::Unused => "UNUSED",
        }
    }
}

impl std::fmt::Display for BindCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One binding diagnostic: a stable code plus a human-oriented message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindError {
    pub code: BindCode,
    pub message: String,
}

impl BindError {
    pub fn new(code: BindCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Construction-time usage errors in a command's parameter descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefnError {
    #[error("parameter alias '{alias}' is reserved for the help flag")]
    ReservedAlias { alias: String },

    #[error("parameter alias '{alias}' was defined multiple times")]
    DuplicateAlias { alias: String },

    #[error("parameter '{name}' cannot be both repeated and a flag")]
    RepeatedFlag { name: String },
}

/// Fatal dispatch-time signals.
///
/// `Help`, `CommandNotFound` and `AmbiguousCommand` short-circuit the chain
/// immediately; `Call` is raised once a completed binding pass still holds
/// errors. Each carries the owning command so a renderer can show
/// context-appropriate help.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("help requested for command '{}'", command.name)]
    Help { command: CommandInfo },

    #[error("command not found: '{name}'")]
    CommandNotFound {
        command: CommandInfo,
        name: String,
        available: Vec<String>,
    },

    #[error("ambiguous command '{name}' matched: {}", matches.join(", "))]
    AmbiguousCommand {
        command: CommandInfo,
        name: String,
        matches: Vec<String>,
    },

    #[error("command '{}' failed to bind: {} error(s)", command.name, errors.len())]
    Call {
        command: CommandInfo,
        errors: Vec<BindError>,
    },

    #[error(transparent)]
    Defn(#[from] DefnError),

    #[error("no value supplied for the {ordinal} positional parameter '{name}'")]
    Internal { name: String, ordinal: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// The accumulated binding diagnostics, when this is a `Call` error.
    pub fn bind_errors(&self) -> &[BindError] {
        match self {
            CliError::Call { errors, .. } => errors,
            _ => &[],
        }
    }

    /// The command a fatal signal belongs to, for contextual rendering.
    pub fn command(&self) -> Option<&CommandInfo> {
        match self {
            CliError::Help { command }
            | CliError::CommandNotFound { command, .. }
            | CliError::AmbiguousCommand { command, .. }
            | CliError::Call { command, .. } => Some(command),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::doc::CmdDoc;

    fn info(name: &str) -> CommandInfo {
        CommandInfo { name: name.to_string(), doc: CmdDoc::default() }
    }

    #[test]
    fn bind_code_display_matches_wire_names() {
        assert_eq!(BindCode::NoValue.to_string(), "NO_VALUE");
        assert_eq!(BindCode::SelfParam.to_string(), "SELF");
        assert_eq!(BindCode::ListTooFew.to_string(), "LIST_TOO_FEW");
    }

    #[test]
    fn bind_code_serializes_as_stable_string() {
        let json = serde_json::to_string(&BindCode::KwValMissing).unwrap();
        assert_eq!(json, "\"KW_VAL_MISSING\"");
    }

    #[test]
    fn bind_error_display_carries_code_and_message() {
        let err = BindError::new(BindCode::Unused, "Unused trailing token: 'x'");
        assert_eq!(err.to_string(), "UNUSED: Unused trailing token: 'x'");
    }

    #[test]
    fn call_error_exposes_bind_errors() {
        let err = CliError::Call {
            command: info("main"),
            errors: vec![BindError::new(BindCode::NoValue, "missing")],
        };
        assert_eq!(err.bind_errors().len(), 1);
        assert_eq!(err.bind_errors()[0].code, BindCode::NoValue);
    }

    #[test]
    fn fatal_signals_carry_owning_command() {
        let err = CliError::Help { command: info("serve") };
        assert_eq!(err.command().unwrap().name, "serve");

        let err = CliError::Other(anyhow::anyhow!("boom"));
        assert!(err.command().is_none());
    }

    #[test]
    fn ambiguous_command_lists_matches() {
        let err = CliError::AmbiguousCommand {
            command: info("main"),
            name: "s".into(),
            matches: vec!["serve".into(), "status".into()],
        };
        assert!(err.to_string().contains("serve, status"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&DefnError::ReservedAlias { alias: "h".into() });
        assert_std_error(&CliError::Internal { name: "a".into(), ordinal: "1st".into() });
    }
}
