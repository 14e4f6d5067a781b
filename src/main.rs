mod config;
mod env;
mod error;
mod executor;
mod launch;
mod shutdown;
mod tee;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use config::{load_config, ConfigOverrides, LauncherConfig};
use env::{Environment, NGAS_STORAGE_DIR, PYVOSPACE_DIR};
use error::LaunchError;
use launch::LaunchPlan;

#[derive(Parser)]
#[command(name = "ngas-launcher")]
#[command(version, about = "Start the NGAS archive server in the foreground, teeing its output to a log file")]
struct Cli {
    /// Base directory for logs (log goes to <dir>/scripts/log/ngas.log)
    #[arg(long, env = PYVOSPACE_DIR, value_name = "DIR")]
    pyvospace_dir: Option<String>,

    /// NGAS storage root (server config is <dir>/cfg/ngamsServer.conf)
    #[arg(long, env = NGAS_STORAGE_DIR, value_name = "DIR")]
    ngas_storage_dir: Option<String>,

    /// Launcher config file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server binary name or path
    #[arg(long, value_name = "BIN")]
    server_bin: Option<String>,

    /// Server log verbosity passed with -v
    #[arg(long, value_name = "LEVEL")]
    server_verbosity: Option<u8>,

    /// Append to the log instead of truncating it
    #[arg(long)]
    append: bool,

    /// Milliseconds the server gets to stop after a forwarded signal
    #[arg(long, value_name = "MS")]
    shutdown_grace_ms: Option<u64>,

    /// Resolve and validate everything, print the command, do not start the server
    #[arg(long)]
    dry_run: bool,

    /// Print the effective launcher config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// More launcher diagnostics (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report launcher errors
    #[arg(short, long)]
    quiet: bool,

    /// Extra arguments for the server, after `--`
    #[arg(last = true, value_name = "SERVER_ARGS")]
    server_args: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_bin: self.server_bin.clone(),
            verbosity: self.server_verbosity,
            append: self.append,
            shutdown_grace_ms: self.shutdown_grace_ms,
            extra_args: self.server_args.clone(),
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<u8, LaunchError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LauncherConfig::default(),
    };
    cli.overrides().apply(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(0);
    }

    let env = Environment::from_lookup(|name| match name {
        PYVOSPACE_DIR => cli.pyvospace_dir.clone(),
        NGAS_STORAGE_DIR => cli.ngas_storage_dir.clone(),
        _ => None,
    })?;
    let plan = LaunchPlan::resolve(&config, &env)?;

    if cli.dry_run {
        println!("{}", plan.command_line());
        println!("log: {} ({:?})", plan.log_path.display(), plan.log_mode);
        return Ok(0);
    }

    let log_file = plan.open_log()?;
    let outcome = executor::run(&plan, log_file, std::io::stdout()).await?;
    Ok(outcome.exit_code())
}
