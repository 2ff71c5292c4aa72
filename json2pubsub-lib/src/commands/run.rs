//! Command dispatch logic for json2pubsub

use super::{InitArgs, ServeArgs, ValidateArgs, init_config, serve_webhooks, validate_expressions};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "json2pubsub", version, author, long_about = None)]
#[command(about = "Forward policy-approved webhook requests to a Pub/Sub topic")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept webhooks and publish them as messages
    Serve(Box<ServeArgs>),
    /// Check the configuration and compile its expressions
    Validate(Box<ValidateArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        Command::Serve(serve_args) => serve_webhooks(host, serve_args).await,
        Command::Validate(validate_args) => validate_expressions(host, validate_args).await,
        Command::Init(init_args) => init_config(host, init_args),
    }
}
