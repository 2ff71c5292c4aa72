use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct ServerState<P> {
    pub(crate) pipeline: Arc<Pipeline<P>>,
    pub(crate) max_body_bytes: usize,
}

impl<P> ServerState<P> {
    #[must_use]
    pub fn new(pipeline: Pipeline<P>, max_body_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_body_bytes,
        }
    }
}

impl<P> Clone for ServerState<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            max_body_bytes: self.max_body_bytes,
        }
    }
}
