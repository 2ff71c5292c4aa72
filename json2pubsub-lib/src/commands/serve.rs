use super::Host;
use super::common::{GoogleArgs, LogLevel, PipelineArgs, http_client, init_logging, load_settings};
use crate::Result;
use crate::expr::{Environment, ProgramSet};
use crate::pipeline::Pipeline;
use crate::publish::{ConfiguredPublisher, DryRunPublisher, PubsubPublisher};
use crate::server::{ServerState, router, serve};
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;

const LOG_TARGET: &str = "     serve";

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub google: GoogleArgs,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    pub host: String,

    /// Log messages instead of publishing them
    #[arg(long)]
    pub dry_run: bool,

    /// Log level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

/// Starts the webhook server and runs until interrupted
pub async fn serve_webhooks<H: Host>(host: &mut H, args: &ServeArgs) -> Result<()> {
    init_logging(args.log_level);
    log::info!(target: LOG_TARGET, "Starting json2pubsub {}", env!("CARGO_PKG_VERSION"));

    let client = http_client()?;
    let credentials = Arc::new(args.google.credentials(&client));

    let settings = load_settings(&args.pipeline, &args.google, &client, Arc::clone(&credentials)).await?;
    settings.validate(!args.dry_run)?;

    let env = Arc::new(Environment::new()?);
    let programs = Arc::new(ProgramSet::compile(
        env,
        settings.control(),
        settings.message(),
        settings.response.as_deref(),
    )?);

    if programs.response().is_none() {
        log::info!(target: LOG_TARGET, "No response expression configured, using empty responses");
    }

    let publisher = if args.dry_run {
        log::warn!(target: LOG_TARGET, "Dry run: messages are logged, not published");
        ConfiguredPublisher::DryRun(DryRunPublisher)
    } else {
        let publisher = PubsubPublisher::new(
            client,
            &args.google.pubsub_endpoint(),
            settings.project.as_deref(),
            settings.topic.as_deref().unwrap_or_default(),
            credentials,
        )?;
        log::info!(target: LOG_TARGET, "Using Pub/Sub topic '{}'", publisher.topic());
        ConfiguredPublisher::Pubsub(publisher)
    };

    if settings.handler_path != "/" {
        log::info!(target: LOG_TARGET, "Using custom handler location '{}'", settings.handler_path);
    }

    let state = ServerState::new(Pipeline::new(programs, publisher), settings.max_body_bytes);
    let app = router(state, &settings.handler_path);

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .into_app_err_with(|| format!("binding to {}:{}", args.host, args.port))?;

    if let Ok(addr) = listener.local_addr() {
        let _ = writeln!(host.output(), "json2pubsub listening on http://{addr}{}", settings.handler_path);
    }

    serve(listener, app, shutdown_signal()).await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::info!(target: LOG_TARGET, "Shutting down");
    }
}
