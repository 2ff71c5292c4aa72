use axum::http::StatusCode;
use core::fmt::{Display, Formatter};
use strum::Display as StrumDisplay;

/// Class of a request failure, which determines the HTTP status returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum RejectKind {
    /// The request itself is malformed or produced no usable message.
    ClientError,

    /// The authorization expression did not accept the request.
    PolicyDenial,

    /// An expression failed or its result could not be converted.
    ServiceError,

    /// The message could not be published.
    Unavailable,
}

impl RejectKind {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::ClientError => StatusCode::BAD_REQUEST,
            Self::PolicyDenial => StatusCode::FORBIDDEN,
            Self::ServiceError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Where in the request lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Request,
    Authorization,
    Extraction,
    Publish,
    Response,
}

/// A terminal request failure.
///
/// Only the status derived from `kind` reaches the caller; the cause is for the logs.
#[derive(Debug, Clone)]
pub struct Rejection {
    kind: RejectKind,
    stage: Stage,
    cause: String,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: RejectKind, stage: Stage, cause: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn client(stage: Stage, cause: impl Into<String>) -> Self {
        Self::new(RejectKind::ClientError, stage, cause)
    }

    #[must_use]
    pub fn service(stage: Stage, cause: impl Into<String>) -> Self {
        Self::new(RejectKind::ServiceError, stage, cause)
    }

    #[must_use]
    pub const fn kind(&self) -> RejectKind {
        self.kind
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} at {} stage: {}", self.kind, self.stage, self.cause)
    }
}

impl core::error::Error for Rejection {}
