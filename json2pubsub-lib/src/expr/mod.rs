//! Expression compilation and evaluation.
//!
//! Expressions are written in CEL. The [`Environment`] declares the `origin` and `request`
//! variables plus the custom function library, compiles sources into [`Expression`]s after a
//! static check, and hands out per-request evaluation scopes.

mod cel_type;
mod dynamic;
mod environment;
mod expression;
mod functions;
mod programs;
mod type_check;

pub use cel_type::CelType;
pub use dynamic::{ConversionError, Dynamic, cel_to_json, json_to_cel, map_to_json};
pub use environment::{Environment, VARIABLES};
pub use expression::{EvaluationError, Expression, Role};
pub use functions::{FUNCTIONS, FunctionDecl, Overload, hmac_sha1_hex, hmac_sha256_hex, verify_jwt};
pub use programs::{ProgramSet, ProgramSetBuilder};

const LOG_TARGET: &str = "      expr";
