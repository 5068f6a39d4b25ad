//! Derive complete command-line programs from plain callables.
//!
//! Commands declare their parameters as descriptor lists, tokens bind
//! against them with every error accumulated in one pass, and commands
//! compose into chains where each result payload feeds the next command.
//!
//! ```no_run
//! use argchain::{CmdDoc, Command, Handler, Param};
//! use serde_json::{Value, json};
//!
//! let greet = Command::new(
//!     "greet",
//!     Handler::sync(|call| {
//!         let name = call.get("name").and_then(Value::as_str).unwrap_or("world");
//!         Ok(json!(format!("hello, {name}")))
//!     }),
//! )
//! .about(CmdDoc::oneline("Say hello."))
//! .params([Param::keyword("name").default("world")]);
//!
//! let tokens: Vec<String> = std::env::args().skip(1).collect();
//! match greet.run_blocking(&tokens, Value::Null) {
//!     Ok(value) => println!("{value}"),
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

pub mod args;
pub mod command;
pub mod errors;

pub use args::{ArgType, BindOutcome, Coerce, MergeInput, Param, ParamKind, ParamSpec, ParamTable};
pub use command::doc::CmdDoc;
pub use command::{CallArgs, Command, CommandInfo, Dispatch, ExecutionKind, Handler};
pub use errors::{BindCode, BindError, CliError, DefnError};
