//! Compiled expressions bound to a pipeline role

use super::{CelType, Dynamic, Environment};
use crate::Result;
use cel_interpreter::{Context, Program};
use core::fmt::{Display, Formatter};
use ohno::{app_err, bail};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use strum::Display as StrumDisplay;

/// The pipeline stage an expression serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Decides whether a request is accepted. Must produce a boolean.
    Authorization,

    /// Turns an accepted request into the message payload.
    Extraction,

    /// Computes the HTTP response body after a successful publish.
    Response,
}

/// An expression compiled against an [`Environment`] for a specific [`Role`]
#[derive(Debug, Clone)]
pub struct Expression {
    role: Role,
    output_type: CelType,
    program: Arc<Program>,
    source: String,
}

impl Expression {
    /// Compile `source` for `role`
    ///
    /// # Errors
    /// Returns an error if the expression does not compile, or if an authorization
    /// expression is not statically boolean
    pub fn new(env: &Environment, role: Role, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let (program, output_type) = env
            .compile(&source)
            .map_err(|e| app_err!("could not compile {role} expression '{source}': {}", e.message()))?;

        if role == Role::Authorization && output_type != CelType::Bool {
            bail!("{role} expression '{source}' has type {output_type}, wanted type bool");
        }

        Ok(Self {
            role,
            output_type,
            program: Arc::new(program),
            source,
        })
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn output_type(&self) -> CelType {
        self.output_type
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the expression in `scope`
    ///
    /// # Errors
    /// Returns an error if evaluation fails
    pub fn evaluate(&self, scope: &Context<'_>) -> Result<Dynamic, EvaluationError> {
        self.program.execute(scope).map(Dynamic::from).map_err(|e| EvaluationError {
            role: self.role,
            message: e.to_string(),
        })
    }
}

impl Serialize for Expression {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Expression", 3)?;
        state.serialize_field("role", &self.role.to_string())?;
        state.serialize_field("expression", &self.source)?;
        state.serialize_field("type", &self.output_type.to_string())?;
        state.end()
    }
}

/// A failure raised while running an expression.
#[derive(Debug, Clone)]
pub struct EvaluationError {
    role: Role,
    message: String,
}

impl EvaluationError {
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} expression failed: {}", self.role, self.message)
    }
}

impl core::error::Error for EvaluationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_interpreter::Value;

    fn env() -> Environment {
        Environment::new().unwrap()
    }

    #[test]
    fn test_create_expression() {
        let expr = Expression::new(&env(), Role::Extraction, "request.json").unwrap();
        assert_eq!(expr.role(), Role::Extraction);
        assert_eq!(expr.source(), "request.json");
        assert_eq!(expr.output_type(), CelType::Dyn);
    }

    #[test]
    fn test_authorization_must_be_bool() {
        let err = Expression::new(&env(), Role::Authorization, "request.body").unwrap_err();
        assert!(err.to_string().contains("wanted type bool"), "{err}");

        let err = Expression::new(&env(), Role::Authorization, "'true'").unwrap_err();
        assert!(err.to_string().contains("has type string"), "{err}");

        let _ = Expression::new(&env(), Role::Authorization, "origin.ip == '127.0.0.1'").unwrap();
    }

    #[test]
    fn test_other_roles_accept_any_type() {
        let _ = Expression::new(&env(), Role::Extraction, "42").unwrap();
        let _ = Expression::new(&env(), Role::Response, "'ok'").unwrap();
    }

    #[test]
    fn test_compile_error_names_role() {
        let err = Expression::new(&env(), Role::Response, "undefined_thing").unwrap_err();
        assert!(err.to_string().contains("response expression"), "{err}");
    }

    #[test]
    fn test_evaluate() {
        let env = env();
        let expr = Expression::new(&env, Role::Extraction, "[1, 2]").unwrap();
        let scope = env.scope(Value::Null, Value::Null);
        assert!(matches!(expr.evaluate(&scope).unwrap(), Dynamic::Sequence(items) if items.len() == 2));
    }

    #[test]
    fn test_evaluation_error_carries_role() {
        let env = env();
        let expr = Expression::new(&env, Role::Authorization, "request.missing == 1").unwrap();
        let scope = env.scope(Value::Null, Value::Null);
        let err = expr.evaluate(&scope).unwrap_err();
        assert_eq!(err.role(), Role::Authorization);
        assert!(err.to_string().starts_with("authorization expression failed"));
    }

    #[test]
    fn test_serialize() {
        let expr = Expression::new(&env(), Role::Authorization, "true").unwrap();
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["role"], "authorization");
        assert_eq!(json["type"], "bool");
    }
}
