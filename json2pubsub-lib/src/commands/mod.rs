//! Command-line interface and orchestration for json2pubsub
//!
//! # Commands
//!
//! - **serve**: load settings, compile the three expressions, pick a publisher
//!   and run the webhook server until interrupted
//! - **validate**: load settings and compile the expressions, reporting the
//!   result without binding a socket
//! - **init**: write a commented configuration template
//!
//! Settings come from a TOML file overlaid by command-line flags and environment
//! variables. Any string setting may instead name a Secret Manager secret with a
//! `gsm:` prefix, which is resolved once at startup.

mod common;
mod config;
mod host;
mod init;
mod run;
mod serve;
mod validate;

#[cfg(debug_assertions)]
pub use config::{Config, Settings};

pub use common::{GoogleArgs, LogLevel, PipelineArgs};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use serve::{ServeArgs, serve_webhooks};
pub use validate::{ValidateArgs, validate_expressions};
