//! brook command-line host
//!
//! Evaluates one script in a fresh runtime and then keeps dispatching its
//! timer and HTTP callbacks until the process is signalled (or, with
//! `--exit-on-idle`, until nothing is left to do).

mod output;
#[cfg(unix)]
mod signal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use brook_runtime::{Manifest, RunMode, Runtime, RuntimeOptions};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use output::{resolve_color_choice, StyledOutput};

#[derive(Parser, Debug)]
#[command(name = "brook")]
#[command(
    about = "Run a script with console, fs, process, timers, http and require",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Script to run, followed by the arguments it sees in process.argv
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "SCRIPT")]
    command: Vec<String>,

    /// Port for http.createServer
    #[arg(long)]
    port: Option<u16>,

    /// Address for http.createServer
    #[arg(long)]
    host: Option<String>,

    /// Directory that holds modules/
    #[arg(long, value_name = "DIR")]
    base_path: Option<PathBuf>,

    /// Manifest to load instead of searching for brook.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit once no timer, server or queued callback is left
    #[arg(long)]
    exit_on_idle: bool,

    /// Color diagnostics: auto, always, never
    #[arg(long, value_name = "WHEN")]
    color: Option<String>,
}

impl Cli {
    fn script(&self) -> Option<PathBuf> {
        self.command.first().map(PathBuf::from)
    }

    fn script_args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let Some(script) = cli.script() else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(&cli, &script) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("brook: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// `BROOK_LOG` wins over `RUST_LOG`; both fall back to `warn`.
fn init_tracing() {
    let filter = std::env::var("BROOK_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, script: &Path) -> anyhow::Result<ExitCode> {
    #[cfg(unix)]
    signal::block().context("failed to block shutdown signals")?;

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let source = match std::fs::read_to_string(script) {
        Ok(source) => source,
        Err(err) => {
            out.error_line("Error reading script: ", &format!("{}: {}", script.display(), err));
            return Ok(ExitCode::FAILURE);
        }
    };

    let options = load_options(cli, script)?;
    let runtime = Runtime::new(options).context("failed to start runtime")?;

    #[cfg(unix)]
    signal::watch(runtime.shutdown_handle()).context("failed to start signal watcher")?;

    tracing::debug!(script = %script.display(), "evaluating entry script");
    let failed = match runtime.eval(&source) {
        Ok(_) => false,
        Err(err) => {
            out.error_line("JavaScript error: ", &err.to_string());
            true
        }
    };

    let mode = if cli.exit_on_idle {
        RunMode::UntilIdle
    } else {
        RunMode::Forever
    };
    let outcome = runtime.run(mode);
    tracing::debug!(?outcome, "run loop finished");
    drop(runtime);

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Defaults, then the manifest, then command-line flags.
fn load_options(cli: &Cli, script: &Path) -> anyhow::Result<RuntimeOptions> {
    let mut options = RuntimeOptions::default();

    let manifest = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().context("failed to read the current directory")?;
            Manifest::find(&cwd)
        }
    };
    if let Some(path) = manifest {
        let manifest = Manifest::from_file(&path)?;
        tracing::debug!(path = %path.display(), "loaded manifest");
        options = options.apply_manifest(&manifest);
    }

    if let Some(base_path) = &cli.base_path {
        options = options.with_base_path(base_path.clone());
    }
    if let Some(host) = &cli.host {
        options = options.with_http_host(host.clone());
    }
    if let Some(port) = cli.port {
        options = options.with_http_port(port);
    }

    let program = std::env::args().next().unwrap_or_else(|| "brook".to_string());
    let mut argv = vec![program, script.to_string_lossy().into_owned()];
    argv.extend(cli.script_args().iter().cloned());
    Ok(options.with_argv(argv))
}
