use super::Host;
use super::common::{GoogleArgs, LogLevel, PipelineArgs, http_client, init_logging, load_settings};
use crate::Result;
use crate::expr::{Environment, ProgramSet};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub google: GoogleArgs,

    /// Log level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: LogLevel,
}

/// Loads the settings and compiles every expression without starting a server
///
/// # Errors
///
/// Returns an error if the settings are incomplete or an expression fails to compile
async fn validate_inner(args: &ValidateArgs) -> Result<ProgramSet> {
    let client = http_client()?;
    let credentials = Arc::new(args.google.credentials(&client));

    let settings = load_settings(&args.pipeline, &args.google, &client, credentials).await?;
    settings.validate(false)?;

    let env = Arc::new(Environment::new()?);
    ProgramSet::compile(env, settings.control(), settings.message(), settings.response.as_deref())
}

pub async fn validate_expressions<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    init_logging(args.log_level);

    match validate_inner(args).await {
        Ok(programs) => {
            let _ = writeln!(host.output(), "Configuration is valid");
            for expr in programs.iter() {
                let _ = writeln!(host.output(), "  {} ({}): {}", expr.role(), expr.output_type(), expr.source());
            }
            if programs.response().is_none() {
                let _ = writeln!(host.output(), "  response: none, requests get an empty 200 response");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::commands::init::{InitArgs, init_config};
    use camino::Utf8PathBuf;

    fn args(control: &str, message: &str) -> ValidateArgs {
        ValidateArgs {
            pipeline: PipelineArgs {
                control_cel: Some(control.to_string()),
                message_cel: Some(message.to_string()),
                ..PipelineArgs::default()
            },
            google: GoogleArgs::default(),
            log_level: LogLevel::None,
        }
    }

    #[tokio::test]
    async fn test_valid_expressions() {
        let mut host = TestHost::new();
        validate_expressions(&mut host, &args("origin.ip == '127.0.0.1'", "request.json"))
            .await
            .unwrap();

        let output = String::from_utf8(host.output_buf).unwrap();
        assert!(output.contains("Configuration is valid"));
        assert!(output.contains("authorization (bool)"));
        assert!(output.contains("response: none"));
        assert_eq!(host.exit_code, None);
    }

    #[tokio::test]
    async fn test_non_boolean_control_fails() {
        let mut host = TestHost::new();
        let _ = validate_expressions(&mut host, &args("request.body", "request.json")).await.unwrap_err();

        let error = String::from_utf8(host.error_buf).unwrap();
        assert!(error.contains("validation failed"));
        assert_eq!(host.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_missing_message_fails() {
        let mut host = TestHost::new();
        let mut args = args("true", "");
        args.pipeline.message_cel = None;
        let _ = validate_expressions(&mut host, &args).await.unwrap_err();
        assert_eq!(host.exit_code, Some(1));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_default_config_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = Utf8PathBuf::try_from(tmp.path().join("json2pubsub.toml")).unwrap();

        let mut init_host = TestHost::new();
        init_config(&mut init_host, &InitArgs { output: Some(config_path.clone()) }).unwrap();

        let mut host = TestHost::new();
        let args = ValidateArgs {
            pipeline: PipelineArgs {
                config: Some(config_path),
                ..PipelineArgs::default()
            },
            google: GoogleArgs::default(),
            log_level: LogLevel::None,
        };
        validate_expressions(&mut host, &args).await.unwrap();
    }
}
