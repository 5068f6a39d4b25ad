//! The binding engine: a raw token list against a [`ParamTable`].
//!
//! Binding runs in two phases (positional consumption, then keyword
//! consumption) over a working copy of the token list and never stops at the
//! first problem — every diagnosable error is accumulated so the caller sees
//! the complete picture from a single pass.

use std::collections::{BTreeSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::args::table::{HELP_SLOT, ParamTable, dashed, ordinal};
use crate::args::ty::{ArgType, Coerce, MergeInput};
use crate::errors::{BindCode, BindError};

/// Keyword token grammar. One dash introduces a bundle of single-character
/// aliases, two dashes one long alias; an optional trailing `#N` requests an
/// explicit repetition count (digits may be omitted).
static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-{1,2})([A-Za-z][\w-]*)(#(\d*))?$").expect("keyword token regex")
});

/// The result of one binding attempt.
///
/// Positional slots hold `None` only for parameters that a later stage may
/// still fill (self-like, hidden); every other unset required parameter has
/// already produced a `NO_VALUE` error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindOutcome {
    /// Ordered positional values, plus raw leftover tokens when the callable
    /// accepts variadic positionals.
    pub args: Vec<Option<Value>>,
    /// Keyword-only parameters with a set value, plus raw unknown parameters
    /// when arbitrary keywords are accepted.
    pub kwargs: Map<String, Value>,
    /// Names of auto-registered unknown parameters, in appearance order.
    pub unknown: Vec<String>,
    /// Accumulated diagnostics, in discovery order.
    pub errors: Vec<BindError>,
    /// Trailing tokens nothing consumed; the dispatch layer routes these
    /// into sub-commands or turns them into `UNUSED` errors.
    pub leftover: Vec<String>,
    /// Names that received at least one value from tokens. Values present
    /// only through defaults are not listed; payload merging relies on the
    /// distinction.
    pub bound: BTreeSet<String>,
    /// Whether the reserved help flag was set.
    pub help: bool,
}

impl ParamTable {
    /// Bind a token list. The table itself is never mutated; each call works
    /// on fresh value slots and may run concurrently with other binds.
    pub fn bind(&self, tokens: &[String]) -> BindOutcome {
        debug!(tokens = tokens.len(), "binding token list");
        let outcome = Binder::new(self, tokens).run();
        debug!(
            errors = outcome.errors.len(),
            leftover = outcome.leftover.len(),
            "binding complete"
        );
        outcome
    }
}

/// How a token at the front of the stream reads.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenClass {
    /// A single `-`: phase terminator.
    Terminator,
    /// `-` followed by a digit or `.`: a negative numeric literal.
    Negative,
    /// L dashes (L > 1): the literal string of L-1 dashes.
    AllDash,
    /// Leading `\`: the remainder, taken literally.
    Escaped,
    /// Any other dash-leading token: keyword territory.
    KeywordLike,
    Plain,
}

fn classify(token: &str) -> TokenClass {
    if token.starts_with('\\') {
        return TokenClass::Escaped;
    }
    if !token.starts_with('-') {
        return TokenClass::Plain;
    }
    if token.len() == 1 {
        return TokenClass::Terminator;
    }
    let second = token.chars().nth(1);
    if second.is_some_and(|c| c.is_ascii_digit() || c == '.') {
        return TokenClass::Negative;
    }
    if token.bytes().all(|b| b == b'-') {
        return TokenClass::AllDash;
    }
    TokenClass::KeywordLike
}

/// The literal value a consumable token stands for.
fn literal_text(token: &str, class: TokenClass) -> String {
    match class {
        TokenClass::Escaped => token[1..].to_string(),
        TokenClass::AllDash => "-".repeat(token.len() - 1),
        _ => token.to_string(),
    }
}

fn consumable(class: TokenClass) -> bool {
    matches!(
        class,
        TokenClass::Plain | TokenClass::Negative | TokenClass::AllDash | TokenClass::Escaped
    )
}

/// Explicit repetition request parsed from a `#` suffix.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CountReq {
    /// No `#` suffix: a single value.
    Single,
    /// `#` without digits: consume until exhaustion or a non-consumable
    /// token, then close the array.
    Unbounded,
    /// `#N`: exactly N values; `#0` closes the array without adding any.
    Exact(u64),
}

/// A merge destination: a declared parameter slot or an auto-registered
/// unknown.
#[derive(Debug, Clone, Copy)]
enum Target {
    Known(usize),
    Unknown(usize),
}

/// Context for a type-mismatch diagnostic.
enum Ctx<'a> {
    Positional(usize),
    Keyword(&'a str),
}

struct UnknownParam {
    name: String,
    ty: ArgType,
    value: Option<Value>,
}

/// Working state for a single binding attempt.
struct Binder<'t> {
    table: &'t ParamTable,
    tokens: VecDeque<String>,
    values: Vec<Option<Value>>,
    unknown: Vec<UnknownParam>,
    errors: Vec<BindError>,
    bound: BTreeSet<String>,
}

impl<'t> Binder<'t> {
    fn new(table: &'t ParamTable, tokens: &[String]) -> Self {
        Self {
            table,
            tokens: tokens.iter().cloned().collect(),
            values: vec![None; table.specs.len()],
            unknown: Vec::new(),
            errors: Vec::new(),
            bound: BTreeSet::new(),
        }
    }

    fn run(mut self) -> BindOutcome {
        self.parse_positionals();
        self.parse_keywords();
        self.finish()
    }

    // Phase 1: consume positional values in index order. A repeated
    // parameter keeps consuming until the stream stops yielding values.
    fn parse_positionals(&mut self) {
        let slots: Vec<usize> = (0..self.table.specs.len())
            .filter(|&i| self.table.specs[i].index > 0 && !self.table.specs[i].self_like)
            .collect();
        for slot in slots {
            let (repeated, index) = {
                let spec = &self.table.specs[slot];
                (spec.ty.repeated, spec.index)
            };
            loop {
                let Some(front) = self.tokens.front() else { return };
                let class = classify(front);
                if class == TokenClass::Terminator {
                    self.tokens.pop_front();
                    return;
                }
                if class == TokenClass::KeywordLike {
                    return;
                }
                let Some(token) = self.tokens.pop_front() else { return };
                let text = literal_text(&token, class);
                self.merge_into(Target::Known(slot), MergeInput::Text(&text), Ctx::Positional(index));
                if !repeated {
                    break;
                }
            }
        }
    }

    // Phase 2: consume keyword tokens until the stream ends, a terminator is
    // seen, or a non-keyword token is reached (left in place as leftover).
    fn parse_keywords(&mut self) {
        loop {
            let Some(front) = self.tokens.front() else { return };
            match classify(front) {
                TokenClass::Terminator => {
                    self.tokens.pop_front();
                    return;
                }
                TokenClass::Plain | TokenClass::Negative | TokenClass::Escaped => return,
                TokenClass::AllDash | TokenClass::KeywordLike => {}
            }
            let Some(token) = self.tokens.pop_front() else { return };
            let Some(caps) = KEYWORD_RE.captures(&token) else {
                // The offending token stays in the stream so it also shows
                // up as leftover.
                self.errors.push(BindError::new(
                    BindCode::BadKw,
                    format!("Invalid parameter: '{token}'"),
                ));
                self.tokens.push_front(token);
                return;
            };
            let dashes = caps[1].len();
            let word = caps[2].to_string();
            let suffix = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
            let count = match caps.get(4) {
                None => CountReq::Single,
                Some(digits) if digits.as_str().is_empty() => CountReq::Unbounded,
                Some(digits) => match digits.as_str().parse::<u64>() {
                    Ok(n) => CountReq::Exact(n),
                    Err(_) => {
                        self.errors.push(BindError::new(
                            BindCode::BadList,
                            format!("Invalid array '#' count on parameter '{token}'."),
                        ));
                        continue;
                    }
                },
            };
            if dashes == 2 {
                let display = format!("--{word}{suffix}");
                self.handle_alias(&word, &display, true, count);
            } else {
                let elements: Vec<String> = word.chars().map(String::from).collect();
                let total = elements.len();
                for (i, k) in elements.iter().enumerate() {
                    let last = i == total - 1;
                    let display =
                        if last { format!("-{k}{suffix}") } else { format!("-{k}") };
                    let req = if last { count } else { CountReq::Single };
                    self.handle_alias(k, &display, last, req);
                }
            }
        }
    }

    /// Apply one resolved alias: set an occurrence, or pull value(s) from
    /// the stream when this is the final element of its token.
    fn handle_alias(&mut self, alias: &str, display: &str, last: bool, count: CountReq) {
        let target = match self.table.resolve_alias(alias) {
            Some(slot) if self.table.specs[slot].self_like => {
                self.errors.push(BindError::new(
                    BindCode::SelfParam,
                    format!("Parameter '{display}' can only be set by an incoming payload."),
                ));
                return;
            }
            Some(slot) => Target::Known(slot),
            None => Target::Unknown(self.unknown_slot(alias)),
        };

        // An explicit count is only meaningful on an array parameter. For an
        // untouched unknown it settles the array intent instead.
        if count != CountReq::Single && !self.ty_of(target).repeated {
            match target {
                Target::Unknown(i) if self.unknown[i].value.is_none() => {
                    self.unknown[i].ty = ArgType::list(Coerce::Str);
                }
                _ => {
                    self.errors.push(BindError::new(
                        BindCode::NotList,
                        format!(
                            "Invalid array '#' usage on parameter '{display}' of non-list type '{}'.",
                            self.ty_of(target)
                        ),
                    ));
                    return;
                }
            }
        }

        // Unknown parameters stay boolean flags until a value is actually
        // available for them.
        if last && count == CountReq::Single {
            if let Target::Unknown(i) = target {
                if self.unknown[i].ty.is_flag() && self.front_consumable() {
                    self.unknown[i].ty = ArgType::list(Coerce::Str);
                }
            }
        }

        if !last || self.ty_of(target).is_flag() {
            self.merge_into(target, MergeInput::Occurrence, Ctx::Keyword(display));
            return;
        }

        match count {
            CountReq::Single => match self.pull_value() {
                Some(text) => {
                    self.merge_into(target, MergeInput::Text(&text), Ctx::Keyword(display));
                }
                None => {
                    self.errors.push(BindError::new(
                        BindCode::KwValMissing,
                        format!("Keyword parameter '{display}' is missing a value."),
                    ));
                }
            },
            CountReq::Exact(0) => {
                self.merge_into(target, MergeInput::Close, Ctx::Keyword(display));
            }
            CountReq::Exact(want) => {
                let mut got = 0;
                while got < want {
                    let Some(text) = self.pull_value() else { break };
                    self.merge_into(target, MergeInput::Text(&text), Ctx::Keyword(display));
                    got += 1;
                }
                if got < want {
                    self.errors.push(BindError::new(
                        BindCode::ListTooFew,
                        format!("Expected {want} values but only received {got}."),
                    ));
                }
            }
            CountReq::Unbounded => {
                while let Some(text) = self.pull_value() {
                    self.merge_into(target, MergeInput::Text(&text), Ctx::Keyword(display));
                }
                self.merge_into(target, MergeInput::Close, Ctx::Keyword(display));
            }
        }
    }

    /// Pop the next token as a value if it reads as one; non-consumable
    /// tokens stay in place.
    fn pull_value(&mut self) -> Option<String> {
        let front = self.tokens.front()?;
        let class = classify(front);
        if !consumable(class) {
            return None;
        }
        let token = self.tokens.pop_front()?;
        Some(literal_text(&token, class))
    }

    fn front_consumable(&self) -> bool {
        self.tokens.front().is_some_and(|t| consumable(classify(t)))
    }

    fn ty_of(&self, target: Target) -> ArgType {
        match target {
            Target::Known(i) => self.table.specs[i].ty,
            Target::Unknown(i) => self.unknown[i].ty,
        }
    }

    fn unknown_slot(&mut self, name: &str) -> usize {
        if let Some(i) = self.unknown.iter().position(|u| u.name == name) {
            return i;
        }
        self.unknown.push(UnknownParam {
            name: name.to_string(),
            ty: ArgType::scalar(Coerce::Bool),
            value: None,
        });
        self.unknown.len() - 1
    }

    fn merge_into(&mut self, target: Target, input: MergeInput<'_>, ctx: Ctx<'_>) {
        let ty = self.ty_of(target);
        let prev = match target {
            Target::Known(i) => self.values[i].clone(),
            Target::Unknown(i) => self.unknown[i].value.clone(),
        };
        match ty.merge(input, prev) {
            Ok(value) => match target {
                Target::Known(i) => {
                    self.values[i] = Some(value);
                    let name = &self.table.specs[i].name;
                    if !name.is_empty() {
                        self.bound.insert(name.clone());
                    }
                }
                Target::Unknown(i) => {
                    self.unknown[i].value = Some(value);
                    self.bound.insert(self.unknown[i].name.clone());
                }
            },
            Err(detail) => {
                let message = match ctx {
                    Ctx::Positional(index) => {
                        format!("Type mismatch on {} parameter. {detail}", ordinal(index))
                    }
                    Ctx::Keyword(display) => {
                        format!("Parameter '{display}' type mismatch. {detail}")
                    }
                };
                self.errors.push(BindError::new(BindCode::TypeMismatch, message));
            }
        }
    }

    /// Defaults, required-parameter errors, unknown-parameter resolution,
    /// and final argument assembly.
    fn finish(mut self) -> BindOutcome {
        let help = self.values[HELP_SLOT]
            .as_ref()
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0;

        for i in 0..self.table.specs.len() {
            if self.values[i].is_some() {
                continue;
            }
            let spec = &self.table.specs[i];
            if let Some(default) = &spec.default {
                self.values[i] = Some(default.clone());
                continue;
            }
            if spec.hidden || spec.self_like {
                continue;
            }
            let message = if spec.aliases.is_empty() {
                format!(
                    "No value supplied for the {} positional parameter ({}).",
                    ordinal(spec.index),
                    spec.name
                )
            } else if spec.index > 0 {
                format!(
                    "No value supplied for the {} positional parameter ({}).",
                    ordinal(spec.index),
                    spec.dashed_aliases()
                )
            } else {
                format!(
                    "No value supplied for the keyword-only parameter ({}).",
                    spec.dashed_aliases()
                )
            };
            self.errors.push(BindError::new(BindCode::NoValue, message));
        }

        if !self.table.accepts_var_kwargs() {
            let mut rejected: Vec<(String, String)> = self
                .unknown
                .iter()
                .map(|u| {
                    let shown =
                        u.value.as_ref().map(Value::to_string).unwrap_or_else(|| "unset".into());
                    (u.name.clone(), shown)
                })
                .collect();
            rejected.sort();
            for (name, shown) in rejected {
                self.errors.push(BindError::new(
                    BindCode::UnkParam,
                    format!("Unknown parameter: {} {shown}", dashed(&name)),
                ));
            }
        }

        // A lone repeated value without an explicit array annotation is
        // ambiguous; collapse it to a scalar. Length >= 2 stays an array.
        for u in &mut self.unknown {
            if let Some(Value::Array(items)) = &u.value {
                if items.len() == 1 {
                    u.value = Some(items[0].clone());
                    u.ty = ArgType::scalar(Coerce::Str);
                }
            }
        }

        let mut args: Vec<Option<Value>> = Vec::new();
        let mut kwargs = Map::new();
        for (i, spec) in self.table.specs.iter().enumerate() {
            if spec.index > 0 {
                args.push(self.values[i].clone());
            } else if !spec.name.is_empty() {
                if let Some(value) = &self.values[i] {
                    kwargs.insert(spec.name.clone(), value.clone());
                }
            }
        }

        let unknown_names: Vec<String> = self.unknown.iter().map(|u| u.name.clone()).collect();
        if self.table.accepts_var_kwargs() {
            for u in self.unknown {
                if let Some(value) = u.value {
                    kwargs.insert(u.name, value);
                }
            }
        }

        let mut leftover: Vec<String> = self.tokens.into_iter().collect();
        if self.table.accepts_var_args() {
            args.extend(leftover.drain(..).map(|t| Some(Value::String(t))));
        }

        BindOutcome {
            args,
            kwargs,
            unknown: unknown_names,
            errors: self.errors,
            leftover,
            bound: self.bound,
            help,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::table::Param;
    use serde_json::json;

    fn toks(s: &str) -> Vec<String> {
        if s.is_empty() { Vec::new() } else { s.split(' ').map(String::from).collect() }
    }

    fn bind(params: &[Param], line: &str) -> BindOutcome {
        ParamTable::build(params).unwrap().bind(&toks(line))
    }

    fn codes(outcome: &BindOutcome) -> Vec<BindCode> {
        outcome.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn positional_literals() {
        let params = [Param::positional("a"), Param::positional("b")];
        let out = bind(&params, "1 2");
        assert_eq!(out.args, vec![Some(json!("1")), Some(json!("2"))]);
        assert!(out.errors.is_empty());

        // Negative numerics read as values.
        let out = bind(&params, "-.1 -0");
        assert_eq!(out.args, vec![Some(json!("-.1")), Some(json!("-0"))]);

        // All-dash tokens mean one dash fewer.
        let out = bind(&params, "-- ---");
        assert_eq!(out.args, vec![Some(json!("-")), Some(json!("--"))]);

        // A leading backslash escapes anything, including the empty string.
        let out = bind(&params, "\\ \\-33");
        assert_eq!(out.args, vec![Some(json!("")), Some(json!("-33"))]);
    }

    #[test]
    fn single_dash_ends_the_positional_phase() {
        let params = [
            Param::positional("a").list(Coerce::Str),
            Param::positional("b").default("fallback"),
        ];
        let out = bind(&params, "x y - -b z");
        assert_eq!(out.args[0], Some(json!(["x", "y"])));
        // b was never consumed positionally; the keyword phase set it.
        assert_eq!(out.args[1], Some(json!("z")));
        assert!(out.errors.is_empty());
    }

    #[test]
    fn keyword_tokens_stop_positional_consumption() {
        let params = [
            Param::positional("a").list(Coerce::Str),
            Param::keyword("t").default(Value::Null),
        ];
        let out = bind(&params, "a b -t c");
        assert_eq!(out.args[0], Some(json!(["a", "b"])));
        assert_eq!(out.kwargs.get("t"), Some(&json!("c")));
    }

    #[test]
    fn flags_accumulate_across_aliases_and_bundles() {
        let params = [
            Param::keyword("test__x").default(false),
            Param::keyword("y").default(false),
        ];
        let out = bind(&params, "-xxy --test --y -yyy");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("test__x"), Some(&json!(3)));
        assert_eq!(out.kwargs.get("y"), Some(&json!(5)));
    }

    #[test]
    fn bundle_tail_takes_the_value() {
        let params = [
            Param::keyword("verbose__v").flag().default(false),
            Param::keyword("times__t").of(Coerce::Int).default(1),
        ];
        let out = bind(&params, "-vt 3 --verbose");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("verbose__v"), Some(&json!(2)));
        assert_eq!(out.kwargs.get("times__t"), Some(&json!(3)));
    }

    #[test]
    fn occurrence_on_string_parameter_is_a_type_mismatch() {
        let params = [
            Param::keyword("x"),
            Param::keyword("z").default(false),
        ];
        // x is not last in the bundle, so it receives an occurrence, which a
        // string cannot absorb; x then stays unset.
        let out = bind(&params, "-xz 3");
        assert_eq!(
            codes(&out),
            vec![BindCode::TypeMismatch, BindCode::NoValue]
        );
        assert_eq!(out.leftover, toks("3"));
    }

    #[test]
    fn malformed_keyword_token_ends_the_phase_and_stays_leftover() {
        let params = [Param::keyword("x"), Param::keyword("y").default(9)];
        let out = bind(&params, "--x 3 ---y 3");
        assert_eq!(codes(&out), vec![BindCode::BadKw]);
        assert_eq!(out.kwargs.get("x"), Some(&json!("3")));
        assert_eq!(out.leftover, toks("---y 3"));
    }

    #[test]
    fn later_values_overwrite_earlier_ones() {
        let params = [Param::keyword("x")];
        let out = bind(&params, "-x 3 -x 99");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("x"), Some(&json!("99")));
    }

    #[test]
    fn missing_keyword_value_reports_and_leaves_the_stream_intact() {
        let params = [
            Param::keyword("x"),
            Param::keyword("y").default(9),
            Param::keyword("z").flag().default(false),
        ];
        // '-x' finds a terminator, not a value; the terminator then ends the
        // keyword phase, stranding '--y'.
        let out = bind(&params, "-zz -x - --y");
        assert_eq!(
            codes(&out),
            vec![BindCode::KwValMissing, BindCode::NoValue]
        );
        assert_eq!(out.leftover, toks("--y"));
    }

    #[test]
    fn unknown_parameters_error_without_var_keyword() {
        let params = [Param::keyword("x"), Param::keyword("z").flag().default(false)];
        let out = bind(&params, "--x 3 -ztt --cats");
        let unk: Vec<&BindError> =
            out.errors.iter().filter(|e| e.code == BindCode::UnkParam).collect();
        assert_eq!(unk.len(), 2);
        // Sorted by name for determinism: cats before t.
        assert!(unk[0].message.contains("--cats"));
        assert!(unk[1].message.contains("-t"));
        assert!(unk[1].message.contains('2'));
    }

    #[test]
    fn unknown_parameters_flow_into_kwargs_with_var_keyword() {
        let params = [Param::var_keyword()];
        let out = bind(&params, "--bob hi");
        assert!(out.errors.is_empty());
        // A single collected value collapses to a scalar.
        assert_eq!(out.kwargs.get("bob"), Some(&json!("hi")));
        assert_eq!(out.unknown, vec!["bob".to_string()]);

        // With no value available the unknown stays a counted flag.
        let out = bind(&params, "--bob");
        assert_eq!(out.kwargs.get("bob"), Some(&json!(1)));
        let out = bind(&params, "--bob --bob");
        assert_eq!(out.kwargs.get("bob"), Some(&json!(2)));

        // Two collected values stay an array.
        let out = bind(&params, "--bob hi --bob there");
        assert_eq!(out.kwargs.get("bob"), Some(&json!(["hi", "there"])));
    }

    #[test]
    fn unknown_reclassified_to_array_reports_missing_values() {
        let params = [Param::var_keyword()];
        let out = bind(&params, "--bob hi --bob");
        assert_eq!(codes(&out), vec![BindCode::KwValMissing]);
    }

    #[test]
    fn unknown_bundles_mix_flags_and_values() {
        let params = [Param::var_keyword()];
        let out = bind(&params, "-ax -a -a");
        assert!(out.errors.is_empty());
        // '-a' after '-ax' is not consumable, so x stays a flag too.
        assert_eq!(out.kwargs.get("a"), Some(&json!(3)));
        assert_eq!(out.kwargs.get("x"), Some(&json!(1)));
    }

    #[test]
    fn self_alias_is_rejected_from_tokens() {
        let params = [
            Param::positional("self"),
            Param::keyword("my__m").default("3"),
            Param::var_keyword(),
        ];
        let out = bind(&params, "-m happy --self bad");
        assert_eq!(codes(&out), vec![BindCode::SelfParam]);
        assert_eq!(out.kwargs.get("my__m"), Some(&json!("happy")));
        assert_eq!(out.leftover, toks("bad"));
        // The self slot stays unset without a NO_VALUE error.
        assert_eq!(out.args[0], None);
    }

    #[test]
    fn required_parameters_report_no_value_once() {
        let params = [
            Param::positional("def___if_"),
            Param::keyword("_hidden"),
            Param::keyword("bob__x"),
            Param::keyword("y").default(9),
            Param::keyword("z").flag().default(false),
        ];
        let out = bind(&params, "-zz -y 3");
        let missing: Vec<&BindError> =
            out.errors.iter().filter(|e| e.code == BindCode::NoValue).collect();
        assert_eq!(missing.len(), 2);
        assert!(missing[0].message.contains("--def --if"));
        assert!(missing[0].message.contains("1st positional"));
        assert!(missing[1].message.contains("--bob -x"));
        assert!(missing[1].message.contains("keyword-only"));
    }

    #[test]
    fn defaults_bypass_coercion() {
        let params = [Param::keyword("x").list(Coerce::Int).default(34)];
        let out = bind(&params, "");
        assert!(out.errors.is_empty());
        // The scalar default lands untouched even though x is an int array.
        assert_eq!(out.kwargs.get("x"), Some(&json!(34)));
    }

    #[test]
    fn arrays_accumulate_and_close() {
        let params = [
            Param::keyword("flag__f").flag().default(false),
            Param::keyword("a").list(Coerce::Float),
            Param::keyword("b").list(Coerce::Str).default(json!([1, 2, 3])),
        ];
        let out = bind(&params, "-a 1 -b 2");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("a"), Some(&json!([1.0])));
        assert_eq!(out.kwargs.get("b"), Some(&json!(["2"])));

        let out = bind(&params, "-a 1 --a 2 -b#1 2");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("a"), Some(&json!([1.0, 2.0])));
        assert_eq!(out.kwargs.get("b"), Some(&json!(["2"])));

        let out = bind(&params, "-fb#3 1 2 \\- -ffa# 2 -.3 8 3 -1");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("b"), Some(&json!(["1", "2", "-"])));
        assert_eq!(out.kwargs.get("a"), Some(&json!([2.0, -0.3, 8.0, 3.0, -1.0])));
        assert_eq!(out.kwargs.get("flag__f"), Some(&json!(3)));
    }

    #[test]
    fn zero_count_closes_an_array_without_elements() {
        let params = [Param::keyword("a").list(Coerce::Str)];
        let out = bind(&params, "-a#0");
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("a"), Some(&json!([])));

        // Closing after values keeps them.
        let out = bind(&params, "-a x -a y -a#0");
        assert_eq!(out.kwargs.get("a"), Some(&json!(["x", "y"])));
    }

    #[test]
    fn unbounded_count_stops_at_a_terminator() {
        let params = [Param::positional("a").list(Coerce::Str)];
        let out = bind(&params, "-a# -");
        assert!(out.errors.is_empty());
        assert_eq!(out.args[0], Some(json!([])));
        assert!(out.leftover.is_empty());
    }

    #[test]
    fn count_on_a_non_list_parameter_is_rejected() {
        let params = [
            Param::keyword("flag__f").flag().default(false),
            Param::keyword("a").list(Coerce::Float),
        ];
        let out = bind(&params, "-a 1 -f#3 1 1 1");
        assert_eq!(codes(&out), vec![BindCode::NotList]);
        assert_eq!(out.leftover, toks("1 1 1"));
    }

    #[test]
    fn exact_count_shortfall_reports_expected_and_received() {
        let params = [Param::positional("a").list(Coerce::Int)];
        let out = bind(&params, "-a#4 1 2");
        assert_eq!(codes(&out), vec![BindCode::ListTooFew]);
        assert!(out.errors[0].message.contains('4'));
        assert!(out.errors[0].message.contains('2'));

        let out = bind(&params, "-a 4 -a#1");
        assert_eq!(codes(&out), vec![BindCode::ListTooFew]);
        assert!(out.errors[0].message.contains("received 0"));
    }

    #[test]
    fn variadic_positionals_swallow_leftovers_raw() {
        let params = [Param::positional("a"), Param::var_positional()];
        let out = bind(&params, "a - b c -- d");
        assert!(out.errors.is_empty());
        assert_eq!(
            out.args,
            vec![
                Some(json!("a")),
                Some(json!("b")),
                Some(json!("c")),
                Some(json!("--")),
                Some(json!("d")),
            ]
        );
        assert!(out.leftover.is_empty());
    }

    #[test]
    fn keyword_phase_hands_off_non_keyword_tokens() {
        let params = [Param::keyword("x"), Param::keyword("y").default(9)];
        let out = bind(&params, "-x 3 -.3 -y 10");
        assert_eq!(out.kwargs.get("x"), Some(&json!("3")));
        assert_eq!(out.kwargs.get("y"), Some(&json!(9)));
        assert_eq!(out.leftover, toks("-.3 -y 10"));

        let out = bind(&params, "-x 3 done -y 10");
        assert_eq!(out.leftover, toks("done -y 10"));

        // An explicit terminator is consumed.
        let out = bind(&params, "-x 3 - -y 10");
        assert_eq!(out.leftover, toks("-y 10"));
    }

    #[test]
    fn help_flag_is_always_recognized() {
        let out = bind(&[], "-h");
        assert!(out.help);
        let out = bind(&[], "--help");
        assert!(out.help);
        let out = bind(&[], "");
        assert!(!out.help);
        // Help never leaks into kwargs.
        let out = bind(&[], "--help");
        assert!(out.kwargs.is_empty());
    }

    #[test]
    fn bound_names_exclude_defaulted_parameters() {
        let params = [
            Param::keyword("x"),
            Param::keyword("y").default(9),
            Param::var_keyword(),
        ];
        let out = bind(&params, "-x 1 --extra v");
        assert!(out.bound.contains("x"));
        assert!(out.bound.contains("extra"));
        assert!(!out.bound.contains("y"));
        assert_eq!(out.kwargs.get("y"), Some(&json!(9)));
    }

    #[test]
    fn binding_is_idempotent_across_fresh_tables() {
        let params = [
            Param::positional("a").list(Coerce::Float),
            Param::keyword("verbose__v").flag().default(false),
            Param::var_keyword(),
        ];
        let line = "1 2 - -vv --extra hi leftover";
        let first = bind(&params, line);
        let second = bind(&params, line);
        assert_eq!(first, second);
    }

    #[test]
    fn positional_type_mismatch_names_the_ordinal() {
        let params = [Param::positional("n").of(Coerce::Int)];
        let out = bind(&params, "abc");
        assert_eq!(codes(&out), vec![BindCode::TypeMismatch]);
        assert!(out.errors[0].message.contains("1st"));
        assert!(out.errors[0].message.contains("'abc'"));
    }

    #[test]
    fn json_parameters_merge_structurally() {
        let params = [Param::keyword("cfg").of(Coerce::Json)];
        let table = ParamTable::build(&params).unwrap();
        let out = table.bind(&[
            "--cfg".to_string(),
            r#"{"a":1}"#.to_string(),
            "--cfg".to_string(),
            r#"{"b":2}"#.to_string(),
        ]);
        assert!(out.errors.is_empty());
        assert_eq!(out.kwargs.get("cfg"), Some(&json!({"a": 1, "b": 2})));
    }
}
