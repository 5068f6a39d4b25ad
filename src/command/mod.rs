//! Command registration, sub-command resolution, and chained dispatch.
//!
//! A [`Command`] couples a parameter descriptor list with a [`Handler`] and
//! an optional sub-command set. [`Command::invoke`] resolves a token list
//! into a [`Dispatch`] chain without running anything; [`Dispatch::execute`]
//! then drives the chain, feeding each command's result payload into the
//! next.
//!
//! Commands themselves are immutable and shareable; every per-invocation
//! mutable state lives on the `Dispatch` node.

pub mod doc;

use std::future::Future;
use std::sync::OnceLock;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::args::table::ordinal;
use crate::args::{BindOutcome, Param, ParamKind, ParamTable};
use crate::errors::{BindCode, BindError, CliError, DefnError};
use doc::CmdDoc;

/// Assembled inputs for one handler call: positional values in declaration
/// order (plus any variadic extras) and keyword values by parameter name.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }
}

/// How a handler produces its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionKind {
    Sync,
    Generator,
    AsyncSingle,
    AsyncGenerator,
}

type SyncFn = Box<dyn Fn(CallArgs) -> Result<Value, CliError> + Send + Sync>;
type GeneratorFn =
    Box<dyn Fn(CallArgs) -> Box<dyn Iterator<Item = Result<Value, CliError>> + Send> + Send + Sync>;
type AsyncFn =
    Box<dyn Fn(CallArgs) -> BoxFuture<'static, Result<Value, CliError>> + Send + Sync>;
type AsyncGeneratorFn =
    Box<dyn Fn(CallArgs) -> BoxStream<'static, Result<Value, CliError>> + Send + Sync>;

/// The four handler shapes. Single-result handlers forward one payload down
/// the chain; generator handlers forward each produced item in order and
/// gather the downstream results into an array.
pub enum Handler {
    Sync(SyncFn),
    Generator(GeneratorFn),
    AsyncSingle(AsyncFn),
    AsyncGenerator(AsyncGeneratorFn),
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CliError> + Send + Sync + 'static,
    {
        Handler::Sync(Box::new(f))
    }

    pub fn generator<F, I>(f: F) -> Self
    where
        F: Fn(CallArgs) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Result<Value, CliError>>,
        I::IntoIter: Send + 'static,
    {
        Handler::Generator(Box::new(move |call| Box::new(f(call).into_iter())))
    }

    pub fn async_single<F, Fut>(f: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CliError>> + Send + 'static,
    {
        Handler::AsyncSingle(Box::new(move |call| Box::pin(f(call))))
    }

    pub fn async_generator<F, S>(f: F) -> Self
    where
        F: Fn(CallArgs) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, CliError>> + Send + 'static,
    {
        Handler::AsyncGenerator(Box::new(move |call| Box::pin(f(call))))
    }

    pub fn kind(&self) -> ExecutionKind {
        match self {
            Handler::Sync(_) => ExecutionKind::Sync,
            Handler::Generator(_) => ExecutionKind::Generator,
            Handler::AsyncSingle(_) => ExecutionKind::AsyncSingle,
            Handler::AsyncGenerator(_) => ExecutionKind::AsyncGenerator,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// Identity snapshot carried on fatal dispatch signals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub doc: CmdDoc,
}

type DiscoverFn = Box<dyn Fn() -> Vec<Command> + Send + Sync>;

/// One registered command.
///
/// The parameter table and any discovered sub-commands are built lazily on
/// first use and memoized; after that the command is read-only and safe to
/// share across concurrent invocations.
pub struct Command {
    name: String,
    real_name: String,
    doc: CmdDoc,
    params: Vec<Param>,
    handler: Handler,
    table: OnceLock<Result<ParamTable, DefnError>>,
    subs: Vec<Command>,
    discover: Option<DiscoverFn>,
    discovered: OnceLock<Vec<Command>>,
}

impl Command {
    /// Register a command. The name follows the descriptor conventions: one
    /// trailing underscore is dropped (keyword avoidance) and underscores
    /// become hyphens, so `do_first_` registers as `do-first`.
    pub fn new(name: &str, handler: Handler) -> Self {
        let trimmed = name.strip_suffix('_').unwrap_or(name);
        Self {
            name: trimmed.replace('_', "-"),
            real_name: name.to_string(),
            doc: CmdDoc::default(),
            params: Vec::new(),
            handler,
            table: OnceLock::new(),
            subs: Vec::new(),
            discover: None,
            discovered: OnceLock::new(),
        }
    }

    pub fn about(mut self, doc: CmdDoc) -> Self {
        self.doc = doc;
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Register an explicit sub-command. Explicit registrations are matched
    /// before anything the discovery thunk produces.
    pub fn sub(mut self, command: Command) -> Self {
        self.subs.push(command);
        self
    }

    /// Register a lazy sub-command source, consulted once on first
    /// resolution.
    pub fn discover<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Vec<Command> + Send + Sync + 'static,
    {
        self.discover = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as registered, before normalization.
    pub fn real_name(&self) -> &str {
        &self.real_name
    }

    pub fn doc(&self) -> &CmdDoc {
        &self.doc
    }

    pub fn kind(&self) -> ExecutionKind {
        self.handler.kind()
    }

    pub fn info(&self) -> CommandInfo {
        CommandInfo { name: self.name.clone(), doc: self.doc.clone() }
    }

    /// The memoized parameter table; a descriptor mistake surfaces on every
    /// invocation.
    pub fn table(&self) -> Result<&ParamTable, DefnError> {
        match self.table.get_or_init(|| ParamTable::build(&self.params)) {
            Ok(table) => Ok(table),
            Err(err) => Err(err.clone()),
        }
    }

    fn sub_commands(&self) -> impl Iterator<Item = &Command> {
        let discovered = self
            .discovered
            .get_or_init(|| self.discover.as_ref().map(|f| f()).unwrap_or_default());
        self.subs.iter().chain(discovered.iter())
    }

    /// Resolve one leftover token against the sub-command set by unique
    /// case-insensitive prefix. A name that is also another name's prefix
    /// is therefore not reachable by itself; the match must be unique.
    fn resolve_sub(&self, token: &str) -> Result<&Command, CliError> {
        let wanted = token.to_lowercase().replace('_', "-");
        let all: Vec<&Command> = self.sub_commands().collect();
        let matches: Vec<&Command> = all
            .iter()
            .filter(|c| c.name.to_lowercase().starts_with(&wanted))
            .copied()
            .collect();
        match matches.as_slice() {
            [single] => Ok(*single),
            [] => Err(CliError::CommandNotFound {
                command: self.info(),
                name: token.to_string(),
                available: all.iter().map(|c| c.name.clone()).collect(),
            }),
            _ => Err(CliError::AmbiguousCommand {
                command: self.info(),
                name: token.to_string(),
                matches: matches.iter().map(|c| c.name.clone()).collect(),
            }),
        }
    }

    /// Resolve a token list into an executable dispatch chain.
    ///
    /// Binding errors, unconsumed trailing tokens on a leaf command, an
    /// unresolved sub-command name, and the help flag all surface here; a
    /// returned chain is guaranteed runnable.
    pub fn invoke(&self, tokens: &[String]) -> Result<Dispatch<'_>, CliError> {
        let table = self.table()?;
        let mut outcome = table.bind(tokens);
        debug!(command = %self.name, leftover = outcome.leftover.len(), "resolved tokens");
        if outcome.help {
            return Err(CliError::Help { command: self.info() });
        }
        if !outcome.leftover.is_empty() && self.sub_commands().next().is_none() {
            let leftover = std::mem::take(&mut outcome.leftover);
            for token in leftover {
                outcome.errors.push(BindError::new(
                    BindCode::Unused,
                    format!("Unused trailing token: '{token}'."),
                ));
            }
        }
        if !outcome.errors.is_empty() {
            return Err(CliError::Call { command: self.info(), errors: outcome.errors });
        }
        let mut next = None;
        if !outcome.leftover.is_empty() {
            let leftover = std::mem::take(&mut outcome.leftover);
            let sub = self.resolve_sub(&leftover[0])?;
            next = Some(Box::new(sub.invoke(&leftover[1..])?));
        }
        Ok(Dispatch { command: self, outcome, next })
    }

    /// Resolve and execute in one step.
    pub async fn run(&self, tokens: &[String], input: Value) -> Result<Value, CliError> {
        self.invoke(tokens)?.execute(input).await
    }

    /// [`run`](Self::run) on a private current-thread runtime, for callers
    /// without one.
    pub fn run_blocking(&self, tokens: &[String], input: Value) -> Result<Value, CliError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Other(e.into()))?;
        runtime.block_on(self.run(tokens, input))
    }

    /// Merge the incoming payload into a bound outcome and produce the final
    /// handler inputs.
    ///
    /// Token-bound values always win over payload keys. A payload object
    /// contributes only keys the callable accepts by keyword; the whole
    /// payload additionally lands in a hidden `_input` keyword parameter
    /// when one is declared, and fills the self-like slot when one exists.
    fn assemble(&self, outcome: &BindOutcome, input: &Value) -> Result<CallArgs, CliError> {
        let table = self.table()?;
        let mut args = outcome.args.clone();
        let mut kwargs = outcome.kwargs.clone();

        if let Value::Object(payload) = input {
            for (key, value) in payload {
                // A value bound from tokens is never displaced; a default is.
                if outcome.bound.contains(key) {
                    continue;
                }
                let accepted = table.accepts_var_kwargs()
                    || table.get(key).is_some_and(|spec| {
                        matches!(
                            spec.kind,
                            ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly
                        )
                    });
                if accepted {
                    kwargs.insert(key.clone(), value.clone());
                }
            }
        }

        if table.get("_input").is_some_and(|s| s.hidden && s.kind == ParamKind::KeywordOnly) {
            kwargs.insert("_input".to_string(), input.clone());
        }

        for spec in table.positional() {
            let slot = spec.index - 1;
            if spec.self_like {
                args[slot] = Some(input.clone());
                kwargs.remove(&spec.name);
                continue;
            }
            let payload_value = kwargs.remove(&spec.name);
            if outcome.bound.contains(&spec.name) && args[slot].is_some() {
                continue;
            }
            if let Some(value) = payload_value {
                args[slot] = Some(value);
            } else if args[slot].is_none() {
                if let Some(default) = &spec.default {
                    args[slot] = Some(default.clone());
                } else {
                    return Err(CliError::Internal {
                        name: spec.name.clone(),
                        ordinal: ordinal(spec.index),
                    });
                }
            }
        }

        let args = args.into_iter().map(|v| v.unwrap_or(Value::Null)).collect();
        Ok(CallArgs { args, kwargs })
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("subs", &self.subs.len())
            .finish_non_exhaustive()
    }
}

/// One resolved node of an invocation chain. Holds the bound outcome for its
/// command and, when the token list named a sub-command, the next node.
#[derive(Debug)]
pub struct Dispatch<'a> {
    command: &'a Command,
    outcome: BindOutcome,
    next: Option<Box<Dispatch<'a>>>,
}

impl Dispatch<'_> {
    pub fn command(&self) -> &Command {
        self.command
    }

    pub fn outcome(&self) -> &BindOutcome {
        &self.outcome
    }

    /// Run this node and everything chained after it.
    ///
    /// Chained commands run strictly in sequence; a generator forwards each
    /// item through the rest of the chain before producing the next one.
    pub fn execute(&self, input: Value) -> BoxFuture<'_, Result<Value, CliError>> {
        Box::pin(async move {
            let call = self.command.assemble(&self.outcome, &input)?;
            debug!(command = %self.command.name, kind = ?self.command.kind(), "executing");
            match &self.command.handler {
                Handler::Sync(f) => self.forward(f(call)?).await,
                Handler::AsyncSingle(f) => self.forward(f(call).await?).await,
                Handler::Generator(f) => {
                    let mut results = Vec::new();
                    for item in f(call) {
                        results.push(self.forward(item?).await?);
                    }
                    Ok(Value::Array(results))
                }
                Handler::AsyncGenerator(f) => {
                    let mut stream = f(call);
                    let mut results = Vec::new();
                    while let Some(item) = stream.next().await {
                        results.push(self.forward(item?).await?);
                    }
                    Ok(Value::Array(results))
                }
            }
        })
    }

    async fn forward(&self, value: Value) -> Result<Value, CliError> {
        match &self.next {
            Some(next) => next.execute(value).await,
            None => Ok(value),
        }
    }
}
