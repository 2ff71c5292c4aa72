#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for json2pubsub
//!
//! json2pubsub receives webhook requests over HTTP, decides with a CEL expression
//! whether each one is allowed, turns it into a message with a second expression
//! and publishes the message to a Pub/Sub topic. An optional third expression
//! shapes the HTTP response.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`expr`]: Expression environment, custom functions and compiled programs
//! - [`request`]: Normalization of incoming requests into expression inputs
//! - [`pipeline`]: The per-request authorize, extract, publish, respond sequence
//! - [`publish`]: Message sinks and Google credentials
//! - [`secrets`]: Resolution of `gsm:` secret references in settings
//! - [`server`]: HTTP routing and lifecycle

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod expr;
#[cfg(not(any(debug_assertions, test)))]
mod expr;

#[cfg(any(debug_assertions, test))]
pub mod pipeline;
#[cfg(not(any(debug_assertions, test)))]
mod pipeline;

#[cfg(any(debug_assertions, test))]
pub mod publish;
#[cfg(not(any(debug_assertions, test)))]
mod publish;

#[cfg(any(debug_assertions, test))]
pub mod request;
#[cfg(not(any(debug_assertions, test)))]
mod request;

#[cfg(any(debug_assertions, test))]
pub mod secrets;
#[cfg(not(any(debug_assertions, test)))]
mod secrets;

#[cfg(any(debug_assertions, test))]
pub mod server;
#[cfg(not(any(debug_assertions, test)))]
mod server;

pub use crate::commands::{Host, run};
