use anyhow::{bail, Result};
use baseline_store::StatePath;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use vhost_audit::config::{self, FileConfig, Overrides};
use vhost_audit::report::{self, OutputFormat};
use vhost_audit::{logging, Settings};

#[derive(Debug, Parser)]
#[command(name = "vhost-audit", version, about = "Probe reverse-proxy virtual hosts and report status drift against a baseline")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./vhost-audit.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level or filter directive (falls back to LOG_LEVEL, then RUST_LOG, then info)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Proxy configuration file, or - for stdin
    input: PathBuf,
    /// Baseline file, or - for stdin/stdout [default: vhost-audit.state.json]
    #[arg(short, long)]
    state: Option<PathBuf>,
    /// Comma-separated server names to exclude
    #[arg(short = 'x', long)]
    ignore: Option<String>,
    /// Number of concurrent probe workers [default: 10]
    #[arg(short, long)]
    concurrency: Option<usize>,
    /// Per-request timeout, e.g. 5s, 750ms, 1m [default: 5s]
    #[arg(short, long)]
    timeout: Option<String>,
}

impl RunArgs {
    fn settings(&self, file: Option<&FileConfig>, no_verify_hash: bool) -> Result<Settings> {
        Overrides {
            state: self.state.clone(),
            ignore: self.ignore.clone(),
            concurrency: self.concurrency,
            timeout: self.timeout.clone(),
            no_verify_hash,
        }
        .resolve(file)
    }

    fn input(&self) -> StatePath {
        StatePath::from(self.input.as_path())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Probe all endpoints and write a new baseline
    Index {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Probe all endpoints and report status codes that differ from the baseline
    Diff {
        #[command(flatten)]
        run: RunArgs,
        /// Compare even if the configuration changed since the baseline was taken
        #[arg(long, default_value_t = false)]
        no_verify_hash: bool,
        /// Report format on stdout (or --out)
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the report to a file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of --format when --out is provided
        #[arg(long, default_value_t = false, requires = "out")]
        csv: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("vhost-audit {} (core {})", env!("CARGO_PKG_VERSION"), audit_core::version());
        }
        Commands::Index { run } => {
            let settings = run.settings(loaded_cfg.as_ref(), false)?;
            let input = baseline_store::read_input(&run.input())?;
            let rt = tokio::runtime::Runtime::new()?;
            let baseline = rt.block_on(vhost_audit::index_http(&input, &settings))?;
            info!(endpoints = baseline.server_statuses.len(), state = %settings.state, "index complete");
        }
        Commands::Diff { run, no_verify_hash, format, out, csv } => {
            let settings = run.settings(loaded_cfg.as_ref(), no_verify_hash)?;
            let input = vhost_audit::read_diff_input(&run.input(), &settings)?;
            let rt = tokio::runtime::Runtime::new()?;
            let outcome = rt.block_on(vhost_audit::diff_http(&input, &settings))?;
            match out {
                Some(path) => {
                    let f = std::io::BufWriter::new(std::fs::File::create(&path)?);
                    if csv { report::write_csv(f, &outcome.regressions)? } else { report::write_report(f, &outcome.regressions, format)? }
                }
                None => report::write_report(std::io::stdout().lock(), &outcome.regressions, format)?,
            }
            if !outcome.is_clean() {
                bail!("found {} diffs", outcome.regressions.len());
            }
        }
    }
    Ok(())
}
