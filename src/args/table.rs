//! Parameter descriptors and the per-callable parameter table.
//!
//! A [`ParamTable`] is built once from an explicit descriptor list and is
//! immutable afterwards; every binding attempt works on its own value slots.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::args::ty::{ArgType, Coerce};
use crate::errors::DefnError;

/// How a parameter may be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
    VariadicPositional,
    VariadicKeyword,
}

/// One parameter descriptor, supplied at command registration.
///
/// The descriptor name follows the double-underscore alias convention:
/// `verbose__v` exposes `--verbose` and `-v`, a trailing underscore marks a
/// keyword-avoidance name (`if_` exposes `--if`), and a leading underscore
/// hides the parameter from tokens entirely.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    pub(crate) ty: Option<ArgType>,
    pub(crate) default: Option<Value>,
}

impl Param {
    fn new(name: &str, kind: ParamKind) -> Self {
        Self { name: name.to_string(), kind, ty: None, default: None }
    }

    /// A positional parameter that is also addressable by alias.
    pub fn positional(name: &str) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    /// A positional parameter with no aliases, settable only by position
    /// (and never from an incoming payload key).
    pub fn positional_only(name: &str) -> Self {
        Self::new(name, ParamKind::PositionalOnly)
    }

    /// A keyword-only parameter.
    pub fn keyword(name: &str) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    /// Accept any number of extra positional tokens.
    pub fn var_positional() -> Self {
        Self::new("args", ParamKind::VariadicPositional)
    }

    /// Accept arbitrary extra keyword parameters.
    pub fn var_keyword() -> Self {
        Self::new("kwargs", ParamKind::VariadicKeyword)
    }

    /// Declare the scalar coercion type.
    pub fn of(mut self, coerce: Coerce) -> Self {
        self.ty = Some(ArgType::scalar(coerce));
        self
    }

    /// Declare a repeated (array) type with the given element coercion.
    pub fn list(mut self, coerce: Coerce) -> Self {
        self.ty = Some(ArgType::list(coerce));
        self
    }

    /// Declare a boolean flag whose bound value is an occurrence count.
    pub fn flag(self) -> Self {
        self.of(Coerce::Bool)
    }

    /// Set the default value. Defaults are structurally cloned into unset
    /// parameters after binding, bypassing coercion.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A fully resolved parameter inside a [`ParamTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    /// User-facing aliases in hyphenated form, declaration order.
    pub aliases: Vec<String>,
    /// 0 for keyword-only, 1-based declaration order for positional kinds.
    pub index: usize,
    pub ty: ArgType,
    pub default: Option<Value>,
    /// Leading-underscore name: settable only from an incoming payload.
    pub hidden: bool,
    /// First positional parameter named `self`: filled from the chain
    /// payload, never from tokens.
    pub self_like: bool,
}

impl ParamSpec {
    /// The alias set rendered for diagnostics, e.g. `--def --if`.
    pub(crate) fn dashed_aliases(&self) -> String {
        self.aliases.iter().map(|a| dashed(a)).collect::<Vec<_>>().join(" ")
    }
}

/// Immutable per-callable parameter table: specs, alias index, and the
/// variadic acceptance flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamTable {
    pub(crate) specs: Vec<ParamSpec>,
    alias: BTreeMap<String, usize>,
    by_name: BTreeMap<String, usize>,
    accepts_var_args: bool,
    accepts_var_kwargs: bool,
    has_self: bool,
}

/// Index of the synthetic help parameter, always present.
pub(crate) const HELP_SLOT: usize = 0;

impl ParamTable {
    /// Build a table from a descriptor list, in declaration order.
    ///
    /// A synthetic help flag (`--help` / `-h`) is always appended and its
    /// aliases are reserved; any other alias collision (beyond a parameter's
    /// own automatic underscore variant) is a definition error.
    pub fn build(params: &[Param]) -> Result<Self, DefnError> {
        let mut table = ParamTable {
            specs: Vec::with_capacity(params.len() + 1),
            alias: BTreeMap::new(),
            by_name: BTreeMap::new(),
            accepts_var_args: false,
            accepts_var_kwargs: false,
            has_self: false,
        };
        table.push_spec(ParamSpec {
            name: String::new(),
            kind: ParamKind::KeywordOnly,
            aliases: vec!["help".into(), "h".into()],
            index: 0,
            ty: ArgType::scalar(Coerce::Bool),
            default: Some(Value::Bool(false)),
            hidden: false,
            self_like: false,
        })?;

        let mut next_index = 1;
        for param in params {
            match param.kind {
                ParamKind::VariadicPositional => {
                    table.accepts_var_args = true;
                    continue;
                }
                ParamKind::VariadicKeyword => {
                    table.accepts_var_kwargs = true;
                    continue;
                }
                _ => {}
            }
            let positional = param.kind != ParamKind::KeywordOnly;
            let index = if positional {
                next_index += 1;
                next_index - 1
            } else {
                0
            };
            let self_like = index == 1 && param.name == "self";
            if self_like {
                table.has_self = true;
            }
            let hidden = param.name.starts_with('_');
            let ty = match (&param.ty, &param.default) {
                (Some(ty), _) => *ty,
                (None, Some(default)) => ArgType::from_default(default),
                (None, None) => ArgType::scalar(Coerce::Str),
            };
            if ty.repeated && ty.coerce == Coerce::Bool {
                return Err(DefnError::RepeatedFlag { name: param.name.clone() });
            }
            let aliases = match param.kind {
                ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly => {
                    name_split(&param.name)
                }
                _ => Vec::new(),
            };
            table.push_spec(ParamSpec {
                name: param.name.clone(),
                kind: param.kind,
                aliases,
                index,
                ty,
                default: param.default.clone(),
                hidden,
                self_like,
            })?;
        }
        Ok(table)
    }

    fn push_spec(&mut self, spec: ParamSpec) -> Result<(), DefnError> {
        let slot = self.specs.len();
        for alias in &spec.aliases {
            self.register_alias(alias, slot)?;
            if alias.contains('-') {
                self.register_alias(&alias.replace('-', "_"), slot)?;
            }
        }
        self.by_name.insert(spec.name.clone(), slot);
        self.specs.push(spec);
        Ok(())
    }

    fn register_alias(&mut self, alias: &str, slot: usize) -> Result<(), DefnError> {
        if self.alias.contains_key(alias) {
            if alias == "help" || alias == "h" {
                return Err(DefnError::ReservedAlias { alias: alias.to_string() });
            }
            return Err(DefnError::DuplicateAlias { alias: alias.to_string() });
        }
        self.alias.insert(alias.to_string(), slot);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.by_name.get(name).map(|&i| &self.specs[i])
    }

    pub(crate) fn resolve_alias(&self, alias: &str) -> Option<usize> {
        self.alias.get(alias).copied()
    }

    /// Positional specs in index order (the help parameter is keyword-only
    /// and never appears here).
    pub(crate) fn positional(&self) -> impl Iterator<Item = &ParamSpec> {
        self.specs.iter().filter(|s| s.index > 0)
    }

    pub fn accepts_var_args(&self) -> bool {
        self.accepts_var_args
    }

    pub fn accepts_var_kwargs(&self) -> bool {
        self.accepts_var_kwargs
    }

    pub fn has_self(&self) -> bool {
        self.has_self
    }
}

/// Split a descriptor name into hyphenated aliases on the `__` convention.
///
/// The split scans from the right so a segment may keep a single leading
/// underscore; each segment drops one trailing underscore (keyword
/// avoidance) before underscores become hyphens. Hidden names yield nothing.
pub(crate) fn name_split(name: &str) -> Vec<String> {
    if name.starts_with('_') {
        return Vec::new();
    }
    let mut segments: Vec<&str> = name.rsplit("__").collect();
    segments.reverse();
    segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.strip_suffix('_').unwrap_or(s).replace('_', "-"))
        .collect()
}

/// Render an alias with its dash prefix: `-x` or `--long`.
pub(crate) fn dashed(alias: &str) -> String {
    if alias.chars().count() > 1 {
        format!("--{alias}")
    } else {
        format!("-{alias}")
    }
}

/// Human-readable rank of a positional parameter: 1st, 2nd, 3rd, 4th, 11th.
pub(crate) fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
