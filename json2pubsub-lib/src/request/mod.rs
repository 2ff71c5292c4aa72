//! Turning inbound HTTP requests into the values expressions see.
//!
//! [`RequestContext::build`] validates the request (peer address, method, body) and captures
//! everything an expression can reference as `origin` or `request`.

mod peer;

pub use peer::split_host_port;

use crate::pipeline::{Rejection, Stage};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use cel_interpreter::Value;
use cel_interpreter::objects::Map;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The parts of an inbound HTTP request the pipeline needs.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Peer address as `host:port`.
    pub remote_addr: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How the request body is interpreted, based on its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Raw,
}

impl BodyKind {
    /// Classifies a `Content-Type` value, ignoring parameters and case.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some("application/json" | "text/json") => Self::Json,
            Some("application/x-www-form-urlencoded") => Self::Form,
            _ => Self::Raw,
        }
    }
}

/// Calendar fields of the request time, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub second: i64,
}

impl From<DateTime<Utc>> for RequestTime {
    fn from(now: DateTime<Utc>) -> Self {
        Self {
            year: i64::from(now.year()),
            month: i64::from(now.month()),
            day: i64::from(now.day()),
            hour: i64::from(now.hour()),
            minute: i64::from(now.minute()),
            second: i64::from(now.second()),
        }
    }
}

/// Everything expressions can observe about one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    origin_ip: String,
    body: String,
    method: String,
    path: String,
    scheme: String,
    query: String,
    json: Option<JsonValue>,
    post: Option<BTreeMap<String, Vec<String>>>,
    headers: BTreeMap<String, String>,
    unixtime: i64,
    time: RequestTime,
}

impl RequestContext {
    /// Validates `raw` and captures its contents, stamping it with `now`.
    ///
    /// # Errors
    ///
    /// Rejects, as a client error, requests whose peer address cannot be parsed, that are not
    /// `POST`, that have an empty body, or that declare a JSON content type but carry invalid JSON.
    pub fn build(raw: &RawRequest, now: DateTime<Utc>) -> Result<Self, Rejection> {
        let origin_ip = split_host_port(&raw.remote_addr)
            .ok_or_else(|| Rejection::client(Stage::Request, format!("unable to parse remote address '{}'", raw.remote_addr)))?
            .to_string();

        if raw.method != Method::POST {
            return Err(Rejection::client(Stage::Request, format!("{} is not a POST request", raw.method)));
        }

        if raw.body.is_empty() {
            return Err(Rejection::client(Stage::Request, "empty request body"));
        }

        let mut headers = BTreeMap::new();
        for (name, value) in &raw.headers {
            let _ = headers
                .entry(name.as_str().to_ascii_lowercase())
                .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let content_type = headers.get(CONTENT_TYPE.as_str()).map(String::as_str);
        let (json, post) = match BodyKind::from_content_type(content_type) {
            BodyKind::Json => {
                let parsed = serde_json::from_slice::<JsonValue>(&raw.body)
                    .map_err(|e| Rejection::client(Stage::Request, format!("invalid JSON body: {e}")))?;
                (Some(parsed), None)
            }
            BodyKind::Form => {
                let fields = parse_form(&raw.body).map_err(|e| Rejection::client(Stage::Request, format!("invalid form body: {e}")))?;
                (None, Some(fields))
            }
            BodyKind::Raw => (None, None),
        };

        let scheme = raw
            .uri
            .scheme_str()
            .map(str::to_string)
            .or_else(|| headers.get("x-forwarded-proto").cloned())
            .unwrap_or_else(|| "http".to_string());

        Ok(Self {
            origin_ip,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
            method: raw.method.as_str().to_string(),
            path: raw.uri.path().to_string(),
            scheme,
            query: raw.uri.query().unwrap_or_default().to_string(),
            json,
            post,
            headers,
            unixtime: now.timestamp(),
            time: RequestTime::from(now),
        })
    }

    #[must_use]
    pub fn origin_ip(&self) -> &str {
        &self.origin_ip
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub const fn json(&self) -> Option<&JsonValue> {
        self.json.as_ref()
    }

    #[must_use]
    pub const fn post(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.post.as_ref()
    }

    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub const fn unixtime(&self) -> i64 {
        self.unixtime
    }

    #[must_use]
    pub const fn time(&self) -> RequestTime {
        self.time
    }

    /// The `origin` and `request` variables, in evaluator form.
    #[must_use]
    pub fn to_values(&self) -> (Value, Value) {
        let origin = cel_map([("ip", string(&self.origin_ip))]);

        let headers: HashMap<String, Value> = self.headers.iter().map(|(k, v)| (k.clone(), string(v))).collect();

        let time = cel_map([
            ("year", Value::Int(self.time.year)),
            ("month", Value::Int(self.time.month)),
            ("day", Value::Int(self.time.day)),
            ("hour", Value::Int(self.time.hour)),
            ("minute", Value::Int(self.time.minute)),
            ("second", Value::Int(self.time.second)),
        ]);

        let mut request: HashMap<String, Value> = HashMap::from([
            ("body".to_string(), string(&self.body)),
            ("method".to_string(), string(&self.method)),
            ("path".to_string(), string(&self.path)),
            ("scheme".to_string(), string(&self.scheme)),
            ("query".to_string(), string(&self.query)),
            ("headers".to_string(), Value::Map(Map::from(headers))),
            ("unixtime".to_string(), Value::Int(self.unixtime)),
            ("time".to_string(), time),
        ]);

        if let Some(json) = &self.json {
            let _ = request.insert("json".to_string(), crate::expr::json_to_cel(json));
        }

        if let Some(post) = &self.post {
            let fields: HashMap<String, Value> = post
                .iter()
                .map(|(k, values)| (k.clone(), Value::List(Arc::new(values.iter().map(|v| string(v)).collect()))))
                .collect();
            let _ = request.insert("post".to_string(), Value::Map(Map::from(fields)));
        }

        (origin, Value::Map(Map::from(request)))
    }
}

/// Decodes an `application/x-www-form-urlencoded` body, rejecting malformed percent-escapes
/// that the lenient decoder would otherwise keep verbatim.
fn parse_form(body: &[u8]) -> Result<BTreeMap<String, Vec<String>>, String> {
    if let Some(offset) = invalid_escape(body) {
        let end = (offset + 3).min(body.len());
        return Err(format!("invalid URL escape \"{}\"", String::from_utf8_lossy(&body[offset..end])));
    }

    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url::form_urlencoded::parse(body) {
        fields.entry(name.into_owned()).or_default().push(value.into_owned());
    }
    Ok(fields)
}

fn invalid_escape(body: &[u8]) -> Option<usize> {
    body.iter().enumerate().find_map(|(i, b)| {
        let valid = body.get(i + 1..i + 3).is_some_and(|digits| digits.iter().all(u8::is_ascii_hexdigit));
        (*b == b'%' && !valid).then_some(i)
    })
}

fn string(s: &str) -> Value {
    Value::String(Arc::new(s.to_string()))
}

fn cel_map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    let map: HashMap<String, Value> = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Value::Map(Map::from(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RejectKind;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn raw(content_type: Option<&str>, body: &'static str) -> RawRequest {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }

        RawRequest {
            remote_addr: "192.168.1.1:5555".to_string(),
            method: Method::POST,
            uri: Uri::from_static("/hooks/github?delivery=1"),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(BodyKind::from_content_type(Some("application/json")), BodyKind::Json);
        assert_eq!(BodyKind::from_content_type(Some("Application/JSON; charset=utf-8")), BodyKind::Json);
        assert_eq!(BodyKind::from_content_type(Some("text/json")), BodyKind::Json);
        assert_eq!(BodyKind::from_content_type(Some("application/x-www-form-urlencoded")), BodyKind::Form);
        assert_eq!(BodyKind::from_content_type(Some("text/plain")), BodyKind::Raw);
        assert_eq!(BodyKind::from_content_type(None), BodyKind::Raw);
    }

    #[test]
    fn test_json_body() {
        let ctx = RequestContext::build(&raw(Some("application/json"), r#"{"type":"x"}"#), now()).unwrap();
        assert_eq!(ctx.origin_ip(), "192.168.1.1");
        assert_eq!(ctx.json().unwrap()["type"], "x");
        assert!(ctx.post().is_none());
        assert_eq!(ctx.path(), "/hooks/github");
        assert_eq!(ctx.query(), "delivery=1");
        assert_eq!(ctx.scheme(), "http");
        assert_eq!(ctx.method(), "POST");
    }

    #[test]
    fn test_form_body_keeps_repeated_values() {
        let ctx = RequestContext::build(
            &raw(Some("application/x-www-form-urlencoded"), "user_name=roadrunner&tag=a&tag=b&text="),
            now(),
        )
        .unwrap();

        let post = ctx.post().unwrap();
        assert_eq!(post["user_name"], vec!["roadrunner"]);
        assert_eq!(post["tag"], vec!["a", "b"]);
        assert_eq!(post["text"], vec![""]);
        assert!(ctx.json().is_none());
    }

    #[test]
    fn test_form_body_decodes_escapes() {
        let ctx = RequestContext::build(
            &raw(Some("application/x-www-form-urlencoded"), "command=%2Fwebhook&text=a+b%21"),
            now(),
        )
        .unwrap();

        let post = ctx.post().unwrap();
        assert_eq!(post["command"], vec!["/webhook"]);
        assert_eq!(post["text"], vec!["a b!"]);
    }

    #[test]
    fn test_malformed_form_escape_is_client_error() {
        for body in ["a=%zz&b=1", "a=1&b=%4", "a=%"] {
            let err = RequestContext::build(&raw(Some("application/x-www-form-urlencoded"), body), now()).unwrap_err();
            assert_eq!(err.kind(), RejectKind::ClientError, "{body}");
            assert_eq!(err.stage(), Stage::Request);
            assert!(err.to_string().contains("invalid URL escape"), "{err}");
        }
    }

    #[test]
    fn test_raw_body() {
        let ctx = RequestContext::build(&raw(Some("text/plain"), "hello"), now()).unwrap();
        assert_eq!(ctx.body(), "hello");
        assert!(ctx.json().is_none());
        assert!(ctx.post().is_none());
    }

    #[test]
    fn test_invalid_json_is_client_error() {
        let err = RequestContext::build(&raw(Some("application/json"), "{nope"), now()).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ClientError);
        assert_eq!(err.stage(), Stage::Request);
    }

    #[test]
    fn test_rejects_non_post() {
        let mut request = raw(None, "x");
        request.method = Method::GET;
        let err = RequestContext::build(&request, now()).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ClientError);
    }

    #[test]
    fn test_rejects_empty_body() {
        let err = RequestContext::build(&raw(None, ""), now()).unwrap_err();
        assert!(err.cause().contains("empty"));
    }

    #[test]
    fn test_rejects_bad_peer_address() {
        let mut request = raw(None, "x");
        request.remote_addr = "nonsense".to_string();
        let _ = RequestContext::build(&request, now()).unwrap_err();
    }

    #[test]
    fn test_ipv6_peer() {
        let mut request = raw(None, "x");
        request.remote_addr = "[2001:db8::1]:443".to_string();
        let ctx = RequestContext::build(&request, now()).unwrap();
        assert_eq!(ctx.origin_ip(), "2001:db8::1");
    }

    #[test]
    fn test_first_repeated_header_wins() {
        let mut request = raw(None, "x");
        let _ = request.headers.append("X-Token", HeaderValue::from_static("first"));
        let _ = request.headers.append("X-Token", HeaderValue::from_static("second"));
        let ctx = RequestContext::build(&request, now()).unwrap();
        assert_eq!(ctx.headers()["x-token"], "first");
    }

    #[test]
    fn test_forwarded_proto() {
        let mut request = raw(None, "x");
        let _ = request.headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let ctx = RequestContext::build(&request, now()).unwrap();
        assert_eq!(ctx.scheme(), "https");
    }

    #[test]
    fn test_time_fields() {
        let ctx = RequestContext::build(&raw(None, "x"), now()).unwrap();
        assert_eq!(ctx.unixtime(), now().timestamp());
        assert_eq!(
            ctx.time(),
            RequestTime {
                year: 2024,
                month: 3,
                day: 9,
                hour: 14,
                minute: 5,
                second: 7
            }
        );
    }

    #[test]
    fn test_values_omit_absent_body_views() {
        let ctx = RequestContext::build(&raw(Some("text/plain"), "hello"), now()).unwrap();
        let (origin, request) = ctx.to_values();

        let Value::Map(origin) = origin else { panic!("origin is not a map") };
        assert_eq!(origin.map.len(), 1);

        let Value::Map(request) = request else { panic!("request is not a map") };
        let keys: Vec<String> = request
            .map
            .keys()
            .map(|k| match k {
                cel_interpreter::objects::Key::String(s) => s.to_string(),
                other => format!("{other:?}"),
            })
            .collect();
        assert!(!keys.contains(&"json".to_string()));
        assert!(!keys.contains(&"post".to_string()));
        assert!(keys.contains(&"headers".to_string()));
    }
}
