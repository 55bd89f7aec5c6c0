//! # idxscan CLI
//!
//! Scans a backup datastore for chunk index files, prints deduplication
//! reports and optionally serves the live registries over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use console::style;
use idxscan_api::{ApiServer, ApiState};
use idxscan_config::logging::{init_logging, LogLevel};
use idxscan_config::{log_cli_debug, log_cli_info, Config};
use idxscan_core::{ScanOptions, ScanSession};
use tracing::field::display;

mod output;

/// Deduplication statistics for .fidx / .didx backup index files
#[derive(Parser, Debug)]
#[command(name = "idxscan")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory to scan recursively
    #[arg(value_name = "DIRECTORY", required_unless_present = "print_default_config")]
    directory: Option<PathBuf>,

    /// Print the N most referenced digests
    #[arg(long, value_name = "N")]
    top_chunks: Option<usize>,

    /// Print the N files with the highest dedup ratio
    #[arg(long, value_name = "N")]
    top_files: Option<usize>,

    /// Serve the read-only API on this port (0 disables)
    #[arg(long, value_name = "PORT")]
    web_port: Option<u16>,

    /// Number of decode workers
    #[arg(short = 'j', long, value_name = "WORKERS")]
    workers: Option<usize>,

    /// Print every file's digest index list
    #[arg(long)]
    print_refs: bool,

    /// Follow symbolic links while walking DIRECTORY
    #[arg(long)]
    follow_links: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags override every config layer.
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.top_chunks {
            config.report.top_chunks = n;
        }
        if let Some(n) = self.top_files {
            config.report.top_files = n;
        }
        if let Some(port) = self.web_port {
            config.api.port = port;
        }
        if let Some(n) = self.workers {
            config.scan.workers = n;
        }
        if self.print_refs {
            config.report.print_refs = true;
        }
        if self.follow_links {
            config.scan.follow_links = true;
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version go to stdout with status 0
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_logging(LogLevel::from_verbosity(cli.verbose));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.print_default_config {
        print!("{}", Config::default_toml()?);
        return Ok(());
    }

    let mut config = Config::load().context("failed to load configuration")?;
    cli.apply(&mut config);
    log_cli_debug!("Effective configuration", config = tracing::field::debug(&config));

    let root = cli
        .directory
        .context("missing DIRECTORY argument")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = rt.block_on(async_main(root, config));
    // A scan abandoned on SIGINT may still be running on a blocking thread
    rt.shutdown_background();
    result
}

async fn async_main(root: PathBuf, config: Config) -> Result<()> {
    let session = Arc::new(ScanSession::new());

    // Bound before the scan so partial results can be queried
    let server = if config.api.enabled() {
        let server = Arc::new(ApiServer::new(
            config.api.clone(),
            ApiState::new(Arc::clone(&session)),
        ));
        let listener = server.bind().await?;
        let addr = listener.local_addr()?;
        eprintln!(
            "{} http://{}/api/",
            style("Serving API on").cyan(),
            addr
        );
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(listener).await })
        };
        Some((server, task))
    } else {
        None
    };

    let scan = {
        let session = Arc::clone(&session);
        let options = ScanOptions::from(&config.scan);
        let root = root.clone();
        tokio::task::spawn_blocking(move || output::run_scan(&root, &session, options))
    };

    let stats = tokio::select! {
        joined = scan => joined.context("scan task failed")??,
        signal = shutdown_signal() => {
            signal.context("failed to listen for shutdown signals")?;
            eprintln!("\nReceived shutdown signal, exiting...");
            stop_server(server).await?;
            return Ok(());
        }
    };

    output::print_failures(&stats);
    output::print_reports(&session, &config.report).context("failed to write report")?;

    if let Some((server, mut task)) = server {
        log_cli_info!(
            "Scan finished; serving until interrupted",
            root = display(root.display())
        );
        tokio::select! {
            signal = shutdown_signal() => {
                signal.context("failed to listen for shutdown signals")?;
                eprintln!("\nReceived shutdown signal, exiting...");
                server.shutdown();
                task.await.context("API task failed")??;
            }
            served = &mut task => {
                // The server only stops on its own when it fails
                served.context("API task failed")??;
            }
        }
    }

    Ok(())
}

type ServerHandle = (
    Arc<ApiServer>,
    tokio::task::JoinHandle<idxscan_api::Result<()>>,
);

async fn stop_server(server: Option<ServerHandle>) -> Result<()> {
    if let Some((server, task)) = server {
        server.shutdown();
        task.await.context("API task failed")??;
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
