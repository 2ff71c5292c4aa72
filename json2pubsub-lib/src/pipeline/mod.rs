//! The request pipeline: authorize, extract, publish, respond.
//!
//! Every stage either advances the request or ends it with a [`Rejection`] whose kind decides
//! the HTTP status. Nothing is retried.

mod coerce;
mod rejection;

pub use coerce::{ResponseBody, coerce_message, coerce_response};
pub use rejection::{RejectKind, Rejection, Stage};

use crate::expr::ProgramSet;
use crate::publish::Publisher;
use crate::request::RequestContext;
use bytes::Bytes;
use std::sync::Arc;

const LOG_TARGET: &str = "  pipeline";

/// Runs requests through the compiled expressions and hands messages to a publisher.
#[derive(Debug)]
pub struct Pipeline<P> {
    programs: Arc<ProgramSet>,
    publisher: P,
}

impl<P: Publisher> Pipeline<P> {
    #[must_use]
    pub const fn new(programs: Arc<ProgramSet>, publisher: P) -> Self {
        Self { programs, publisher }
    }

    #[must_use]
    pub fn programs(&self) -> &ProgramSet {
        &self.programs
    }

    /// Processes one request that has already passed transport validation.
    pub async fn process(&self, ctx: &RequestContext) -> Result<ResponseBody, Rejection> {
        let (origin, request) = ctx.to_values();

        let payload = {
            let scope = self.programs.environment().scope(origin.clone(), request.clone());

            let decision = self
                .programs
                .authorization()
                .evaluate(&scope)
                .map_err(|e| Rejection::service(Stage::Authorization, e.to_string()))?;

            if !decision.is_true() {
                return Err(Rejection::new(
                    RejectKind::PolicyDenial,
                    Stage::Authorization,
                    format!("request control check returned {decision:?}"),
                ));
            }

            let extracted = self
                .programs
                .extraction()
                .evaluate(&scope)
                .map_err(|e| Rejection::service(Stage::Extraction, e.to_string()))?;

            let message = coerce_message(extracted)?;
            serde_json::to_vec(&message)
                .map_err(|e| Rejection::service(Stage::Publish, format!("unable to serialize message: {e}")))?
        };

        log::info!(
            target: LOG_TARGET,
            "[{}] Publishing a message, len={} bytes",
            ctx.origin_ip(),
            payload.len()
        );

        self.publisher
            .publish(Bytes::from(payload))
            .await
            .map_err(|e| Rejection::new(RejectKind::Unavailable, Stage::Publish, e.to_string()))?;

        let Some(response) = self.programs.response() else {
            return Ok(ResponseBody::Empty);
        };

        let scope = self.programs.environment().scope(origin, request);
        let value = response
            .evaluate(&scope)
            .map_err(|e| Rejection::service(Stage::Response, e.to_string()))?;

        coerce_response(value)
    }
}
