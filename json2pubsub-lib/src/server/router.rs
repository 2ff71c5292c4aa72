use super::{LOG_TARGET, ServerState};
use crate::pipeline::{RejectKind, Rejection, ResponseBody, Stage};
use crate::publish::Publisher;
use crate::request::{RawRequest, RequestContext};
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use chrono::Utc;
use core::net::SocketAddr;

/// Path of the health check, served only when the webhook has its own path.
pub const HEALTH_PATH: &str = "/healthz";

/// Builds the application router.
///
/// With a handler path of `/` every path reaches the webhook. Otherwise the webhook is mounted
/// at `handler_path` and [`HEALTH_PATH`] answers health checks.
pub fn router<P: Publisher>(state: ServerState<P>, handler_path: &str) -> Router {
    let router = if handler_path == "/" {
        Router::new().fallback(webhook::<P>)
    } else {
        let router = Router::new().route(handler_path, any(webhook::<P>));
        if handler_path == HEALTH_PATH {
            router
        } else {
            router.route(HEALTH_PATH, get(healthz))
        }
    };

    router.with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn webhook<P: Publisher>(
    State(state): State<ServerState<P>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let remote_addr = peer.to_string();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            let rejection = Rejection::client(Stage::Request, format!("failed to read request body: {e}"));
            return reject(&remote_addr, &rejection);
        }
    };

    let raw = RawRequest {
        remote_addr,
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };

    let ctx = match RequestContext::build(&raw, Utc::now()) {
        Ok(ctx) => ctx,
        Err(rejection) => return reject(&raw.remote_addr, &rejection),
    };

    match state.pipeline.process(&ctx).await {
        Ok(body) => respond(body),
        Err(rejection) => reject(&raw.remote_addr, &rejection),
    }
}

fn respond(body: ResponseBody) -> Response {
    match body {
        ResponseBody::Empty => StatusCode::OK.into_response(),
        ResponseBody::Text(text) => (StatusCode::OK, [(CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response(),
        ResponseBody::Json(json) => (StatusCode::OK, [(CONTENT_TYPE, "application/json")], json).into_response(),
    }
}

fn reject(remote_addr: &str, rejection: &Rejection) -> Response {
    match rejection.kind() {
        RejectKind::ClientError | RejectKind::PolicyDenial => {
            log::warn!(target: LOG_TARGET, "[{remote_addr}] {rejection}");
        }
        RejectKind::ServiceError | RejectKind::Unavailable => {
            log::error!(target: LOG_TARGET, "[{remote_addr}] {rejection}");
        }
    }

    rejection.status().into_response()
}
