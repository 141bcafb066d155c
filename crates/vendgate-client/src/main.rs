//! `vendgate` CLI: call vendor endpoints through the gateway and work with
//! envelope payloads by hand.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use vendgate_client::config::{DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_GATEWAY_URL};
use vendgate_client::{CallError, ClientConfig, VendorClient};
use vendgate_core::codec;
use vendgate_core::envelope::{PROTOCOL_VERSION, new_req_id};
use vendgate_core::secret::SharedSecret;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

/// vendgate — encrypted vendor envelope client.
#[derive(Parser)]
#[command(
    name = "vendgate",
    version,
    about = "vendgate CLI — call vendor endpoints through the gateway",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         VENDGATE_GATEWAY_URL   Gateway address (default: {DEFAULT_GATEWAY_URL})\n  \
         VENDGATE_APP_KEY       Caller credential\n  \
         VENDGATE_APP_SECRET    Shared secret (16, 24 or 32 bytes)\n\n\
         {DIM}Examples:{RESET}\n  \
         vendgate call /api/open/app/product/query --params '{{\"proxy_type\":[104]}}'\n  \
         vendgate encrypt --params '{{\"order_no\":\"A1\"}}'\n  \
         vendgate decrypt \"$PAYLOAD\"\n  \
         vendgate req-id"
    ),
)]
struct Cli {
    /// Gateway base URL.
    #[arg(long, env = "VENDGATE_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    /// Caller credential sent as `appKey`.
    #[arg(long, env = "VENDGATE_APP_KEY")]
    app_key: Option<String>,

    /// Shared secret used to encrypt params.
    #[arg(long, env = "VENDGATE_APP_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Secret used to decrypt response data (defaults to --secret).
    #[arg(long, env = "VENDGATE_RESPONSE_SECRET", hide_env_values = true)]
    response_secret: Option<String>,

    /// Envelope protocol version.
    #[arg(long, default_value = PROTOCOL_VERSION)]
    protocol_version: String,

    /// Call timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_CLIENT_TIMEOUT_SECS)]
    timeout: u64,

    /// Log diagnostics to stderr.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a vendor endpoint through the gateway and print its data.
    Call {
        /// Vendor path, e.g. /api/open/app/product/query.
        path: String,
        /// Parameter object as JSON.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Encrypt a parameter object into an envelope payload.
    Encrypt {
        /// Parameter object as JSON.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Decrypt an envelope payload back into JSON.
    Decrypt {
        /// Base64 payload.
        payload: String,
    },
    /// Print a fresh request id.
    #[command(name = "req-id")]
    ReqId,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            if let Some(call) = e.downcast_ref::<CallError>() {
                eprintln!("  {RED}{BOLD}✗ {}{RESET}", call.user_message());
                eprintln!("  {DIM}{call}{RESET}");
                if call.is_retryable() {
                    eprintln!("  {YELLOW}This call can be retried.{RESET}");
                }
            } else {
                eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            }
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Call { path, params } => {
            let params = parse_params(params)?;
            let client = VendorClient::new(client_config(&cli)?)
                .context("failed to build HTTP client")?;
            let data = client.call(path, &params).await?;
            eprintln!("{GREEN}{BOLD}✓{RESET} {path}");
            print_json(&data);
        }
        Commands::Encrypt { params } => {
            let params = parse_params(params)?;
            let secret = shared_secret(&cli)?;
            println!("{}", codec::encrypt(&params, &secret)?);
        }
        Commands::Decrypt { payload } => {
            let secret = shared_secret(&cli)?;
            let value = codec::decrypt(payload.trim(), &secret)
                .context("payload could not be decrypted with this secret")?;
            print_json(&value);
        }
        Commands::ReqId => println!("{}", new_req_id()),
    }
    Ok(())
}

fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let Some(app_key) = cli.app_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        bail!("an app key is required (--app-key or VENDGATE_APP_KEY)");
    };
    let Some(secret) = cli.secret.as_deref() else {
        bail!("a secret is required (--secret or VENDGATE_APP_SECRET)");
    };

    let mut config = ClientConfig::new(&cli.gateway, app_key.trim(), secret)?
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(response_secret) = cli.response_secret.as_deref() {
        let secret = SharedSecret::new(response_secret).context("invalid response secret")?;
        config = config.with_response_secret(secret);
    }
    config.protocol_version.clone_from(&cli.protocol_version);
    Ok(config)
}

fn shared_secret(cli: &Cli) -> Result<SharedSecret> {
    let Some(secret) = cli.secret.as_deref() else {
        bail!("a secret is required (--secret or VENDGATE_APP_SECRET)");
    };
    SharedSecret::new(secret).context("invalid secret")
}

fn parse_params(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
    if !value.is_object() {
        bail!("--params must be a JSON object");
    }
    Ok(value)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}
