mod config;
mod logging;
mod statsd;

use adapter::Apis;
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use dataapi::{BulkOptions, CallOptions, DataApiError, Params, RequestContext};
use gateway::errors::GatewayError;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bkchat", about = "Chat-bot platform API client and gateway")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "bkchat.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Call one API and print its data
    Call(CallArgs),
    /// Fetch every page of a paginated API
    Bulk(BulkArgs),
    /// List the callable APIs
    Actions,
    /// Run the pass-through gateway
    Gateway,
}

#[derive(Args)]
struct RequestArgs {
    /// API group, e.g. `job` or `task_broadcasts`
    module: String,
    action: String,
    /// Request parameters as a JSON object
    #[arg(long, default_value = "{}")]
    params: String,
    /// User the call is made on behalf of
    #[arg(long)]
    username: Option<String>,
}

#[derive(Args)]
struct CallArgs {
    #[command(flatten)]
    request: RequestArgs,
    /// Print the whole response envelope
    #[arg(long)]
    raw: bool,
    /// Timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args)]
struct BulkArgs {
    #[command(flatten)]
    request: RequestArgs,
    #[arg(long, default_value_t = 1000)]
    limit: u64,
    /// JSON pointer to the page items in the response data
    #[arg(long, default_value = "/info")]
    data_pointer: String,
    /// JSON pointer to the total count in the response data
    #[arg(long, default_value = "/count")]
    count_pointer: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] logging::LoggingError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("invalid --params: {0}")]
    InvalidParams(String),
    #[error("no gateway section in the configuration")]
    MissingGatewayConfig,
    #[error(transparent)]
    Api(#[from] DataApiError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _logging = match logging::init(&config.common.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bkchat failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CliCommand, config: Config) -> Result<(), CliError> {
    if let Some(metrics_config) = &config.common.metrics {
        statsd::init(metrics_config)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let apis = Apis::new(config.settings, &config.endpoints)?;

    match command {
        CliCommand::Call(args) => {
            let (ctx, params) = args.request.prepare()?;
            let api = apis.find(&args.request.module, &args.request.action)?;
            let options = CallOptions {
                raw: args.raw,
                timeout: args.timeout.map(Duration::from_secs),
                ..Default::default()
            };
            let data = runtime.block_on(api.call_with(&ctx, params, options))?;
            print_json(&data);
        }
        CliCommand::Bulk(args) => {
            let (ctx, params) = args.request.prepare()?;
            let api = apis.find(&args.request.module, &args.request.action)?;
            let options = BulkOptions {
                limit: args.limit,
                data_pointer: args.data_pointer,
                count_pointer: args.count_pointer,
            };
            let items = runtime.block_on(api.bulk_request(&ctx, params, &options))?;
            print_json(&Value::Array(items));
        }
        CliCommand::Actions => {
            for (module, actions) in apis.actions() {
                for action in actions {
                    println!("{module}.{action}");
                }
            }
        }
        CliCommand::Gateway => {
            let gateway_config = config.gateway.ok_or(CliError::MissingGatewayConfig)?;
            tracing::info!(
                host = %gateway_config.listener.host,
                port = gateway_config.listener.port,
                "starting gateway"
            );
            runtime.block_on(gateway::run(
                gateway_config,
                apis.client().clone(),
                shutdown_signal(),
            ))?;
        }
    }

    Ok(())
}

impl RequestArgs {
    fn prepare(&self) -> Result<(RequestContext, Params), CliError> {
        let params = match serde_json::from_str(&self.params) {
            Ok(Value::Object(params)) => params,
            Ok(_) => return Err(CliError::InvalidParams("expected a JSON object".into())),
            Err(e) => return Err(CliError::InvalidParams(e.to_string())),
        };

        let mut ctx = RequestContext::new();
        if let Some(username) = &self.username {
            ctx = ctx.with_username(username);
        }
        Ok((ctx, params))
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for the shutdown signal");
    }
}
