//! Domain functions made available to every expression.
//!
//! Each function is described by a [`FunctionDecl`] in [`FUNCTIONS`], which carries both the
//! overloads used by the static checker and the routine that installs the runtime handler
//! into a CEL context.

use super::CelType;
use super::dynamic::{format_duration, json_to_cel};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use cel_interpreter::extractors::{Arguments, This};
use cel_interpreter::objects::Key;
use cel_interpreter::{Context, ExecutionError, FunctionContext, Value};
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeDelta, Timelike, Utc};
use core::fmt::Write;
use core::net::IpAddr;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use ipnet::{IpNet, Ipv4Net};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map as JsonMap, Value as JsonValue};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::Arc;

type HandlerResult = Result<Value, ExecutionError>;

/// One callable signature of a custom function.
#[derive(Debug, Clone, Copy)]
pub struct Overload {
    /// Type of the receiver for method-style calls (`"abc".trim()`), `None` for global calls.
    pub receiver: Option<CelType>,
    pub params: &'static [CelType],
    pub result: CelType,
}

/// A custom function: its overloads and the routine that registers its handler.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDecl {
    pub name: &'static str,
    pub overloads: &'static [Overload],
    pub install: Option<fn(&mut Context<'static>, &'static str)>,
}

impl FunctionDecl {
    /// Splits a qualified name such as `base64.encode` into its namespace and the name the
    /// handler is registered under.
    #[must_use]
    pub fn split_name(&self) -> (Option<&'static str>, &'static str) {
        match self.name.split_once('.') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, self.name),
        }
    }
}

const fn global(params: &'static [CelType], result: CelType) -> Overload {
    Overload {
        receiver: None,
        params,
        result,
    }
}

const fn method(params: &'static [CelType], result: CelType) -> Overload {
    method_on(CelType::String, params, result)
}

const fn method_on(receiver: CelType, params: &'static [CelType], result: CelType) -> Overload {
    Overload {
        receiver: Some(receiver),
        params,
        result,
    }
}

use CelType::{Bool, Bytes, Int, List, Map, String as Str};

/// Calendar accessors take an optional time zone argument.
const DATE_PART: &[Overload] = &[
    method_on(CelType::Timestamp, &[], Int),
    method_on(CelType::Timestamp, &[Str], Int),
];

/// Clock accessors also apply to durations, where they return the total in that unit.
const CLOCK_PART: &[Overload] = &[
    method_on(CelType::Timestamp, &[], Int),
    method_on(CelType::Timestamp, &[Str], Int),
    method_on(CelType::Duration, &[], Int),
];

macro_rules! installer {
    ($handler:ident) => {
        Some(|ctx: &mut Context<'static>, name: &'static str| ctx.add_function(name, $handler))
    };
}

/// Every custom function known to the environment.
pub const FUNCTIONS: &[FunctionDecl] = &[
    FunctionDecl {
        name: "ipInRange",
        overloads: &[global(&[Str, Str], Bool)],
        install: installer!(ip_in_range),
    },
    FunctionDecl {
        name: "parseJSON",
        overloads: &[global(&[Str], Map)],
        install: installer!(parse_json),
    },
    FunctionDecl {
        name: "parseJWT",
        overloads: &[global(&[Str, Str], Map)],
        install: installer!(parse_jwt),
    },
    FunctionDecl {
        name: "hmacSHA256",
        overloads: &[global(&[Str, Str], Str)],
        install: installer!(hmac_sha256),
    },
    FunctionDecl {
        name: "hmacSHA1",
        overloads: &[global(&[Str, Str], Str)],
        install: installer!(hmac_sha1),
    },
    FunctionDecl {
        name: "substring",
        overloads: &[method(&[Int], Str), method(&[Int, Int], Str)],
        install: installer!(substring),
    },
    FunctionDecl {
        name: "indexOf",
        overloads: &[method(&[Str], Int)],
        install: installer!(index_of),
    },
    FunctionDecl {
        name: "lowerAscii",
        overloads: &[method(&[], Str)],
        install: installer!(lower_ascii),
    },
    FunctionDecl {
        name: "upperAscii",
        overloads: &[method(&[], Str)],
        install: installer!(upper_ascii),
    },
    FunctionDecl {
        name: "trim",
        overloads: &[method(&[], Str)],
        install: installer!(trim),
    },
    FunctionDecl {
        name: "replace",
        overloads: &[method(&[Str, Str], Str)],
        install: installer!(replace),
    },
    FunctionDecl {
        name: "split",
        overloads: &[method(&[Str], List)],
        install: installer!(split),
    },
    FunctionDecl {
        name: "charAt",
        overloads: &[method(&[Int], Str)],
        install: installer!(char_at),
    },
    FunctionDecl {
        name: "lastIndexOf",
        overloads: &[method(&[Str], Int)],
        install: installer!(last_index_of),
    },
    FunctionDecl {
        name: "reverse",
        overloads: &[method(&[], Str)],
        install: installer!(reverse),
    },
    FunctionDecl {
        name: "format",
        overloads: &[method(&[List], Str)],
        install: installer!(format),
    },
    FunctionDecl {
        name: "join",
        overloads: &[method_on(List, &[], Str), method_on(List, &[Str], Str)],
        install: installer!(join),
    },
    FunctionDecl {
        name: "strings.quote",
        overloads: &[global(&[Str], Str)],
        install: installer!(quote),
    },
    FunctionDecl {
        name: "base64.encode",
        overloads: &[global(&[Bytes], Str)],
        install: installer!(base64_encode),
    },
    FunctionDecl {
        name: "base64.decode",
        overloads: &[global(&[Str], Bytes)],
        install: installer!(base64_decode),
    },
    FunctionDecl {
        name: "getFullYear",
        overloads: DATE_PART,
        install: installer!(get_full_year),
    },
    FunctionDecl {
        name: "getMonth",
        overloads: DATE_PART,
        install: installer!(get_month),
    },
    FunctionDecl {
        name: "getDate",
        overloads: DATE_PART,
        install: installer!(get_date),
    },
    FunctionDecl {
        name: "getDayOfMonth",
        overloads: DATE_PART,
        install: installer!(get_day_of_month),
    },
    FunctionDecl {
        name: "getDayOfWeek",
        overloads: DATE_PART,
        install: installer!(get_day_of_week),
    },
    FunctionDecl {
        name: "getDayOfYear",
        overloads: DATE_PART,
        install: installer!(get_day_of_year),
    },
    FunctionDecl {
        name: "getHours",
        overloads: CLOCK_PART,
        install: installer!(get_hours),
    },
    FunctionDecl {
        name: "getMinutes",
        overloads: CLOCK_PART,
        install: installer!(get_minutes),
    },
    FunctionDecl {
        name: "getSeconds",
        overloads: CLOCK_PART,
        install: installer!(get_seconds),
    },
    FunctionDecl {
        name: "getMilliseconds",
        overloads: CLOCK_PART,
        install: installer!(get_milliseconds),
    },
];

fn ip_in_range(ftx: &FunctionContext, addr: Arc<String>, cidr: Arc<String>) -> HandlerResult {
    let ip: IpAddr = addr
        .parse()
        .map_err(|e| ftx.error(format!("'{addr}' is not a valid IP address: {e}")))?;
    let network: IpNet = cidr
        .parse()
        .map_err(|e| ftx.error(format!("'{cidr}' is not a valid CIDR range: {e}")))?;

    Ok(Value::Bool(canonical_network(network).contains(&ip.to_canonical())))
}

/// Rewrites an IPv4-mapped IPv6 range (`::ffff:10.0.0.0/104`) as the IPv4 range it covers.
fn canonical_network(network: IpNet) -> IpNet {
    let IpNet::V6(v6) = network else {
        return network;
    };

    match v6.addr().to_ipv4_mapped() {
        Some(v4) if v6.prefix_len() >= 96 => Ipv4Net::new(v4, v6.prefix_len() - 96).map_or(network, IpNet::V4),
        _ => network,
    }
}

fn parse_json(ftx: &FunctionContext, text: Arc<String>) -> HandlerResult {
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(value @ JsonValue::Object(_)) => Ok(json_to_cel(&value)),
        Ok(_) => Err(ftx.error("parseJSON expects a JSON object")),
        Err(e) => Err(ftx.error(format!("invalid JSON: {e}"))),
    }
}

fn parse_jwt(ftx: &FunctionContext, key: Arc<String>, token: Arc<String>) -> HandlerResult {
    verify_jwt(key.as_bytes(), &token, Utc::now().timestamp())
        .map(|claims| json_to_cel(&JsonValue::Object(claims)))
        .map_err(|e| ftx.error(format!("invalid token: {e}")))
}

/// Verifies an HMAC-signed JWT and returns its claims.
///
/// `exp` and `nbf` are checked without leeway, an `iat` later than `now` is rejected, and
/// absent time claims are accepted. The audience is never compared.
#[expect(clippy::cast_precision_loss, reason = "Unix timestamps fit in an f64 mantissa")]
pub fn verify_jwt(key: &[u8], token: &str, now: i64) -> Result<JsonMap<String, JsonValue>, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.leeway = 0;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = jsonwebtoken::decode::<JsonMap<String, JsonValue>>(token, &DecodingKey::from_secret(key), &validation)
        .map_err(|e| e.to_string())?;

    let issued_at = data.claims.get("iat").and_then(JsonValue::as_f64);
    if issued_at.is_some_and(|iat| iat > now as f64) {
        return Err("token used before issued".to_string());
    }

    Ok(data.claims)
}

/// Lower-case hex HMAC-SHA256 of `message` keyed with `key`.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Lower-case hex HMAC-SHA1 of `message` keyed with `key`.
pub fn hmac_sha1_hex(key: &[u8], message: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn hmac_sha256(ftx: &FunctionContext, key: Arc<String>, message: Arc<String>) -> HandlerResult {
    hmac_sha256_hex(key.as_bytes(), message.as_bytes())
        .map(string_value)
        .map_err(|e| ftx.error(format!("invalid HMAC key: {e}")))
}

fn hmac_sha1(ftx: &FunctionContext, key: Arc<String>, message: Arc<String>) -> HandlerResult {
    hmac_sha1_hex(key.as_bytes(), message.as_bytes())
        .map(string_value)
        .map_err(|e| ftx.error(format!("invalid HMAC key: {e}")))
}

fn string_value(s: impl Into<String>) -> Value {
    Value::String(Arc::new(s.into()))
}

fn char_index(ftx: &FunctionContext, value: &Value, len: usize) -> Result<usize, ExecutionError> {
    let index = match value {
        Value::Int(i) => usize::try_from(*i).ok(),
        Value::UInt(u) => usize::try_from(*u).ok(),
        _ => return Err(ftx.error("substring indices must be integers")),
    };

    index
        .filter(|i| *i <= len)
        .ok_or_else(|| ftx.error(format!("index out of range: {value:?}")))
}

fn substring(ftx: &FunctionContext, This(this): This<Arc<String>>, Arguments(args): Arguments) -> HandlerResult {
    let chars: Vec<char> = this.chars().collect();
    let start = match args.first() {
        Some(v) => char_index(ftx, v, chars.len())?,
        None => return Err(ftx.error("substring expects a start index")),
    };
    let end = match args.get(1) {
        Some(v) => char_index(ftx, v, chars.len())?,
        None => chars.len(),
    };

    if start > end {
        return Err(ftx.error(format!("invalid substring range: start {start} is after end {end}")));
    }

    Ok(string_value(chars[start..end].iter().collect::<String>()))
}

fn index_of(This(this): This<Arc<String>>, needle: Arc<String>) -> HandlerResult {
    let position = this
        .find(needle.as_str())
        .map_or(-1, |byte_offset| char_position(&this, byte_offset));
    Ok(Value::Int(position))
}

/// Converts a byte offset found by `str::find` into a character index.
fn char_position(text: &str, byte_offset: usize) -> i64 {
    let chars = text.char_indices().take_while(|(i, _)| *i < byte_offset).count();
    i64::try_from(chars).unwrap_or(i64::MAX)
}

fn lower_ascii(This(this): This<Arc<String>>) -> HandlerResult {
    Ok(string_value(this.to_ascii_lowercase()))
}

fn upper_ascii(This(this): This<Arc<String>>) -> HandlerResult {
    Ok(string_value(this.to_ascii_uppercase()))
}

fn trim(This(this): This<Arc<String>>) -> HandlerResult {
    Ok(string_value(this.trim()))
}

fn replace(This(this): This<Arc<String>>, from: Arc<String>, to: Arc<String>) -> HandlerResult {
    Ok(string_value(this.replace(from.as_str(), to.as_str())))
}

fn split(This(this): This<Arc<String>>, separator: Arc<String>) -> HandlerResult {
    let parts = this.split(separator.as_str()).map(string_value).collect();
    Ok(Value::List(Arc::new(parts)))
}

fn char_at(ftx: &FunctionContext, This(this): This<Arc<String>>, index: i64) -> HandlerResult {
    let len = this.chars().count();
    let position = usize::try_from(index)
        .ok()
        .filter(|i| *i <= len)
        .ok_or_else(|| ftx.error(format!("index out of range: {index}")))?;

    Ok(string_value(this.chars().nth(position).map(String::from).unwrap_or_default()))
}

fn last_index_of(This(this): This<Arc<String>>, needle: Arc<String>) -> HandlerResult {
    let position = this
        .rfind(needle.as_str())
        .map_or(-1, |byte_offset| char_position(&this, byte_offset));
    Ok(Value::Int(position))
}

fn reverse(This(this): This<Arc<String>>) -> HandlerResult {
    Ok(string_value(this.chars().rev().collect::<String>()))
}

fn join(ftx: &FunctionContext, This(this): This<Arc<Vec<Value>>>, Arguments(args): Arguments) -> HandlerResult {
    let separator = match args.first() {
        None => "",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(ftx.error(format!("separator must be a string, found {}", other.type_of()))),
    };

    let parts = this
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.as_str()),
            other => Err(ftx.error(format!("join expects a list of strings, found {}", other.type_of()))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(string_value(parts.join(separator)))
}

// Namespaced calls carry the namespace as their target, so the operand is the first argument.
fn quote(text: Arc<String>) -> HandlerResult {
    Ok(string_value(quote_string(&text)))
}

fn quote_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\u{7}' => quoted.push_str("\\a"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{b}' => quoted.push_str("\\v"),
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn format(ftx: &FunctionContext, This(this): This<Arc<String>>, args: Arc<Vec<Value>>) -> HandlerResult {
    format_template(&this, &args).map(string_value).map_err(|e| ftx.error(e))
}

/// Expands `%s`, `%d`, `%f`, `%e`, `%x`, `%X`, `%o`, `%b` and `%%` in `template`.
///
/// `%f` and `%e` accept a precision (`%.2f`). Every argument must be consumed.
fn format_template(template: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut remaining = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let precision = if chars.next_if_eq(&'.').is_some() {
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            Some(
                digits
                    .parse::<usize>()
                    .map_err(|e| format!("invalid precision after '%.': {e}"))?,
            )
        } else {
            None
        };

        let verb = chars.next().ok_or_else(|| "format string ends with '%'".to_string())?;
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = remaining
            .next()
            .ok_or_else(|| format!("missing argument for '%{verb}'"))?;
        format_arg(&mut out, verb, precision, arg)?;
    }

    if remaining.next().is_some() {
        return Err(format!("format string uses fewer than the {} arguments supplied", args.len()));
    }

    Ok(out)
}

#[expect(clippy::cast_precision_loss, reason = "%f and %e render integers as doubles")]
fn format_arg(out: &mut String, verb: char, precision: Option<usize>, arg: &Value) -> Result<(), String> {
    let as_double = |value: &Value| match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        other => Err(format!("'%{verb}' expects a number, found {}", other.type_of())),
    };

    match (verb, arg) {
        ('s', value) => out.push_str(&display_value(value)),
        ('d', Value::Int(i)) => {
            let _ = write!(out, "{i}");
        }
        ('d', Value::UInt(u)) => {
            let _ = write!(out, "{u}");
        }
        ('f', value) => {
            let _ = write!(out, "{:.*}", precision.unwrap_or(6), as_double(value)?);
        }
        ('e', value) => out.push_str(&scientific(as_double(value)?, precision.unwrap_or(6))),
        ('x', Value::String(s)) => out.push_str(&hex::encode(s.as_bytes())),
        ('X', Value::String(s)) => out.push_str(&hex::encode_upper(s.as_bytes())),
        ('x', Value::Bytes(b)) => out.push_str(&hex::encode(b.as_slice())),
        ('X', Value::Bytes(b)) => out.push_str(&hex::encode_upper(b.as_slice())),
        ('x' | 'X' | 'o' | 'b', Value::Int(i)) => {
            if *i < 0 {
                out.push('-');
            }
            radix(out, verb, i.unsigned_abs());
        }
        ('x' | 'X' | 'o' | 'b', Value::UInt(u)) => radix(out, verb, *u),
        (verb, value) => return Err(format!("cannot format {} with '%{verb}'", value.type_of())),
    }

    Ok(())
}

fn radix(out: &mut String, verb: char, value: u64) {
    let _ = match verb {
        'x' => write!(out, "{value:x}"),
        'X' => write!(out, "{value:X}"),
        'o' => write!(out, "{value:o}"),
        _ => write!(out, "{value:b}"),
    };
}

/// Scientific notation with a signed, two-digit exponent (`1.500000e+03`).
fn scientific(value: f64, precision: usize) -> String {
    let rendered = format!("{value:.precision$e}");
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = exponent.strip_prefix('-').map_or(("+", exponent), |d| ("-", d));
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => rendered,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Timestamp(ts) => ts.to_rfc3339(),
        Value::Duration(d) => format_duration(d),
        Value::Function(name, _) => name.to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<(&Key, &Value)> = map.map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let entries: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| format!("{}: {}", display_key(key), display_value(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn display_key(key: &Key) -> String {
    match key {
        Key::Int(i) => i.to_string(),
        Key::Uint(u) => u.to_string(),
        Key::Bool(b) => b.to_string(),
        Key::String(s) => s.to_string(),
    }
}

fn base64_encode(data: Arc<Vec<u8>>) -> HandlerResult {
    Ok(string_value(STANDARD.encode(data.as_slice())))
}

fn base64_decode(ftx: &FunctionContext, text: Arc<String>) -> HandlerResult {
    STANDARD
        .decode(text.as_bytes())
        .or_else(|_| STANDARD_NO_PAD.decode(text.as_bytes()))
        .map(|bytes| Value::Bytes(Arc::new(bytes)))
        .map_err(|e| ftx.error(format!("invalid base64: {e}")))
}

/// A component read from a timestamp or a duration.
#[derive(Debug, Clone, Copy)]
enum TimePart {
    FullYear,
    Month,
    Date,
    DayOfMonth,
    DayOfWeek,
    DayOfYear,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl TimePart {
    /// Calendar fields follow the zero-based conventions of CEL: January is month 0 and
    /// Sunday is day 0, while `Date` is the one-based day of the month.
    fn of_timestamp(self, t: &DateTime<FixedOffset>) -> i64 {
        match self {
            Self::FullYear => i64::from(t.year()),
            Self::Month => i64::from(t.month0()),
            Self::Date => i64::from(t.day()),
            Self::DayOfMonth => i64::from(t.day0()),
            Self::DayOfWeek => i64::from(t.weekday().num_days_from_sunday()),
            Self::DayOfYear => i64::from(t.ordinal0()),
            Self::Hours => i64::from(t.hour()),
            Self::Minutes => i64::from(t.minute()),
            Self::Seconds => i64::from(t.second()),
            Self::Milliseconds => i64::from(t.timestamp_subsec_millis()),
        }
    }

    fn of_duration(self, d: &TimeDelta) -> Option<i64> {
        match self {
            Self::Hours => Some(d.num_hours()),
            Self::Minutes => Some(d.num_minutes()),
            Self::Seconds => Some(d.num_seconds()),
            Self::Milliseconds => Some(d.num_milliseconds()),
            _ => None,
        }
    }
}

fn time_part(ftx: &FunctionContext, this: &Value, args: &[Value], part: TimePart) -> HandlerResult {
    match (this, args) {
        (Value::Timestamp(ts), []) => Ok(Value::Int(part.of_timestamp(&ts.with_timezone(&Utc.fix())))),
        (Value::Timestamp(ts), [Value::String(zone)]) => {
            let offset = parse_fixed_offset(zone).ok_or_else(|| {
                ftx.error(format!("unsupported time zone '{zone}', expected UTC or an offset such as +05:30"))
            })?;
            Ok(Value::Int(part.of_timestamp(&ts.with_timezone(&offset))))
        }
        (Value::Duration(d), []) => part
            .of_duration(d)
            .map(Value::Int)
            .ok_or_else(|| ftx.error("not defined for durations")),
        (other, _) => Err(ftx.error(format!("not defined for {}", other.type_of()))),
    }
}

/// Parses `UTC`, `Z` or a signed `HH:MM` offset.
fn parse_fixed_offset(zone: &str) -> Option<FixedOffset> {
    if zone.eq_ignore_ascii_case("utc") || zone == "Z" {
        return Some(Utc.fix());
    }

    let (sign, rest) = match zone.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, zone.strip_prefix('+').unwrap_or(zone)),
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok().filter(|h| (0..24).contains(h))?;
    let minutes: i32 = minutes.parse().ok().filter(|m| (0..60).contains(m))?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

macro_rules! time_accessors {
    ($($handler:ident => $part:ident),* $(,)?) => {
        $(
            fn $handler(ftx: &FunctionContext, This(this): This<Value>, Arguments(args): Arguments) -> HandlerResult {
                time_part(ftx, &this, &args, TimePart::$part)
            }
        )*
    };
}

time_accessors! {
    get_full_year => FullYear,
    get_month => Month,
    get_date => Date,
    get_day_of_month => DayOfMonth,
    get_day_of_week => DayOfWeek,
    get_day_of_year => DayOfYear,
    get_hours => Hours,
    get_minutes => Minutes,
    get_seconds => Seconds,
    get_milliseconds => Milliseconds,
}
