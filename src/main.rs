use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use tcl_kernel::config::{KernelConfig, STARTUP_SCRIPT_ENV_VAR};
use tcl_kernel::kernel_executor::KernelHandle;
use tcl_kernel::server::KernelServer;
use tcl_kernel::tcl_runtime::{self, RUNTIME_ENV_VAR};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Tcl Kernel - evaluate notebook cells in a persistent Tcl interpreter")]
struct Args {
    /// Select TCL runtime implementation
    #[arg(
        long,
        value_name = "RUNTIME",
        help = "TCL runtime to use (molt|tcl). Can also be set via TCL_KERNEL_RUNTIME environment variable"
    )]
    runtime: Option<String>,

    /// Companion script evaluated once when the session starts
    #[arg(
        long,
        value_name = "PATH",
        help = "Tcl script loaded at startup (default: ./kernel_tcl.tcl if present). Can also be set via TCL_KERNEL_STARTUP_SCRIPT"
    )]
    startup_script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Stdout carries the protocol and is redirected during evaluation, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let env_runtime = std::env::var(RUNTIME_ENV_VAR).ok();
    let env_script = std::env::var_os(STARTUP_SCRIPT_ENV_VAR).map(PathBuf::from);
    let config = KernelConfig::from_args_and_env(
        args.runtime.as_deref(),
        env_runtime.as_deref(),
        args.startup_script.as_deref(),
        env_script.as_deref(),
    )?;

    let requested_available = config
        .runtime
        .runtime_type
        .as_ref()
        .map(|rt| rt.is_available())
        .unwrap_or(true);
    if !requested_available {
        let available: Vec<&str> = tcl_runtime::available_runtimes()
            .iter()
            .map(|r| r.as_str())
            .collect();
        tracing::warn!(
            "{} runtime not available. Available runtimes: {}",
            config.runtime.runtime_type.as_ref().map(|rt| rt.as_str()).unwrap_or("unknown"),
            available.join(", ")
        );
    }

    info!("Starting Tcl kernel");
    let kernel = KernelHandle::start(config)
        .await
        .context("Failed to start Tcl session")?;

    KernelServer::new(kernel).run_stdio().await?;

    Ok(())
}
