//! Argument model: parameter descriptors, typed value merging, and the
//! token binding engine.
//!
//! A callable declares its parameters as a [`Param`] list, the list compiles
//! into an immutable [`ParamTable`], and [`ParamTable::bind`] turns a raw
//! token slice into a [`BindOutcome`] with every diagnosable error
//! accumulated.

pub(crate) mod bind;
pub(crate) mod table;
pub(crate) mod ty;

pub use bind::BindOutcome;
pub use table::{Param, ParamKind, ParamSpec, ParamTable};
pub use ty::{ArgType, Coerce, MergeInput};
