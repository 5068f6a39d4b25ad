//! Type descriptors: how one parameter coerces and accumulates token values.

use serde::Serialize;
use serde_json::Value;

/// Scalar coercion target for a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coerce {
    Str,
    Int,
    Float,
    Bool,
    Json,
}

impl Coerce {
    fn label(&self) -> &'static str {
        match self {
            Coerce::Str => "str",
            Coerce::Int => "int",
            Coerce::Float => "float",
            Coerce::Bool => "bool",
            Coerce::Json => "json",
        }
    }
}

/// One value fed into [`ArgType::merge`].
#[derive(Debug, Clone, Copy)]
pub enum MergeInput<'a> {
    /// Terminate an explicit-count array without adding an element.
    Close,
    /// A flag hit, or a non-final bundle element: no token text available.
    Occurrence,
    /// A literal token pulled from the stream.
    Text(&'a str),
}

/// Classification of a parameter's declared type: scalar coercion, repeated
/// (array) accumulation, and boolean-flag detection.
///
/// `repeated` plus a `Bool` coercion is an invalid combination; the table
/// builder rejects it before an `ArgType` ever binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArgType {
    pub coerce: Coerce,
    pub repeated: bool,
}

impl ArgType {
    pub fn scalar(coerce: Coerce) -> Self {
        Self { coerce, repeated: false }
    }

    pub fn list(coerce: Coerce) -> Self {
        Self { coerce, repeated: true }
    }

    /// Infer a descriptor from a default value. Arrays make the type
    /// repeated with the element type taken from the first element; an
    /// empty array and null both fall back to string coercion.
    pub fn from_default(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self {
                coerce: items.first().map(Self::element_coerce).unwrap_or(Coerce::Str),
                repeated: true,
            },
            other => Self { coerce: Self::element_coerce(other), repeated: false },
        }
    }

    fn element_coerce(value: &Value) -> Coerce {
        match value {
            Value::Bool(_) => Coerce::Bool,
            Value::Number(n) if n.is_f64() => Coerce::Float,
            Value::Number(_) => Coerce::Int,
            Value::String(_) => Coerce::Str,
            Value::Object(_) | Value::Array(_) => Coerce::Json,
            Value::Null => Coerce::Str,
        }
    }

    pub fn is_flag(&self) -> bool {
        self.coerce == Coerce::Bool && !self.repeated
    }

    /// Fold one input into the previously bound value.
    ///
    /// Flags accumulate an occurrence count (unset -> 1, else +1), repeated
    /// types append, json merges structurally, everything else replaces.
    /// Returns a coercion-failure message on type mismatch.
    pub fn merge(&self, input: MergeInput<'_>, prev: Option<Value>) -> Result<Value, String> {
        let MergeInput::Close = input else {
            let val = self.coerce_one(input)?;
            if self.repeated {
                let mut items = match prev {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                items.push(val);
                return Ok(Value::Array(items));
            }
            if self.is_flag() {
                let count = prev.as_ref().and_then(Value::as_u64).unwrap_or(0);
                return Ok(Value::from(count + 1));
            }
            if self.coerce == Coerce::Json {
                return Ok(Self::json_merge(prev, val));
            }
            return Ok(val);
        };
        // Closing an array leaves previous values alone.
        Ok(prev.unwrap_or_else(|| Value::Array(Vec::new())))
    }

    fn coerce_one(&self, input: MergeInput<'_>) -> Result<Value, String> {
        match (self.coerce, input) {
            (Coerce::Bool, MergeInput::Occurrence) => Ok(Value::Bool(true)),
            (Coerce::Int, MergeInput::Occurrence) => Ok(Value::from(1)),
            (Coerce::Float, MergeInput::Occurrence) => Ok(Value::from(1.0)),
            (Coerce::Str | Coerce::Json, MergeInput::Occurrence) => {
                Err(self.mismatch("true"))
            }
            (Coerce::Bool, MergeInput::Text(t)) => Err(self.mismatch(t)),
            (Coerce::Str, MergeInput::Text(t)) => Ok(Value::from(t)),
            (Coerce::Int, MergeInput::Text(t)) => {
                t.parse::<i64>().map(Value::from).map_err(|_| self.mismatch(t))
            }
            (Coerce::Float, MergeInput::Text(t)) => {
                t.parse::<f64>().map(Value::from).map_err(|_| self.mismatch(t))
            }
            (Coerce::Json, MergeInput::Text(t)) => {
                serde_json::from_str(t).map_err(|_| self.mismatch(t))
            }
            (_, MergeInput::Close) => unreachable!("merge handles Close before coercion"),
        }
    }

    fn mismatch(&self, token: &str) -> String {
        format!("Couldn't coerce '{token}' to '{self}'.")
    }

    fn json_merge(prev: Option<Value>, new: Value) -> Value {
        match (prev, new) {
            (Some(Value::Object(mut a)), Value::Object(b)) => {
                a.extend(b);
                Value::Object(a)
            }
            (Some(Value::Array(mut a)), Value::Array(b)) => {
                a.extend(b);
                Value::Array(a)
            }
            (_, new) => new,
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.repeated {
            write!(f, "[{}]", self.coerce.label())
        } else {
            f.write_str(self.coerce.label())
        }
    }
}
