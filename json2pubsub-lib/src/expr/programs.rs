use super::{Environment, Expression, Role};
use crate::Result;
use ohno::app_err;
use std::sync::Arc;

/// The compiled expressions that drive the request pipeline.
///
/// Immutable once built; request tasks share it through an `Arc`.
#[derive(Debug)]
pub struct ProgramSet {
    env: Arc<Environment>,
    authorization: Expression,
    extraction: Expression,
    response: Option<Expression>,
}

impl ProgramSet {
    /// Compiles all expressions in one go.
    ///
    /// An empty or absent `response` means no response expression.
    pub fn compile(env: Arc<Environment>, authorization: &str, extraction: &str, response: Option<&str>) -> Result<Self> {
        let mut builder = ProgramSetBuilder::new(env);
        let _ = builder.install_authorization(authorization)?;
        let _ = builder.install_extraction(extraction)?;
        if let Some(response) = response.filter(|r| !r.trim().is_empty()) {
            let _ = builder.install_response(response)?;
        }

        builder.build()
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub const fn authorization(&self) -> &Expression {
        &self.authorization
    }

    #[must_use]
    pub const fn extraction(&self) -> &Expression {
        &self.extraction
    }

    #[must_use]
    pub const fn response(&self) -> Option<&Expression> {
        self.response.as_ref()
    }

    /// All installed expressions, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        [Some(&self.authorization), Some(&self.extraction), self.response.as_ref()]
            .into_iter()
            .flatten()
    }
}

/// Collects compiled expressions before freezing them into a [`ProgramSet`].
#[derive(Debug)]
pub struct ProgramSetBuilder {
    env: Arc<Environment>,
    authorization: Option<Expression>,
    extraction: Option<Expression>,
    response: Option<Expression>,
}

impl ProgramSetBuilder {
    #[must_use]
    pub const fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            authorization: None,
            extraction: None,
            response: None,
        }
    }

    /// Compiles and installs the authorization expression, which must be statically boolean.
    pub fn install_authorization(&mut self, source: &str) -> Result<&mut Self> {
        self.authorization = Some(Expression::new(&self.env, Role::Authorization, source)?);
        Ok(self)
    }

    pub fn install_extraction(&mut self, source: &str) -> Result<&mut Self> {
        self.extraction = Some(Expression::new(&self.env, Role::Extraction, source)?);
        Ok(self)
    }

    pub fn install_response(&mut self, source: &str) -> Result<&mut Self> {
        self.response = Some(Expression::new(&self.env, Role::Response, source)?);
        Ok(self)
    }

    /// Freezes the installed expressions.
    ///
    /// # Errors
    ///
    /// Fails if the authorization or extraction expression was never installed.
    pub fn build(self) -> Result<ProgramSet> {
        Ok(ProgramSet {
            authorization: self
                .authorization
                .ok_or_else(|| app_err!("no authorization expression was configured"))?,
            extraction: self
                .extraction
                .ok_or_else(|| app_err!("no extraction expression was configured"))?,
            response: self.response,
            env: self.env,
        })
    }
}
