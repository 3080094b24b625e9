// Navigation model daemon

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use navmodeld::config::{Backend, DaemonConfig, SourceKind};
use navmodeld::{daemon, mock};

#[derive(Parser, Debug)]
#[command(author, version, about = "Navigation model evaluation daemon", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate frames and publish results as JSON lines
    Run(RunArgs),
    /// Write a random NAVW weights file for the reference runner
    MockWeights {
        /// Output path
        #[arg(long)]
        out: PathBuf,

        /// RNG seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// NAVW weights for the reference backend
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Use the all-zero backend (no weights needed)
    #[arg(long, conflicts_with = "weights")]
    zero: bool,

    /// Raw luma input path ("-" for stdin)
    #[arg(long)]
    input: Option<String>,

    /// Raw frame width
    #[arg(long)]
    width: Option<usize>,

    /// Raw frame height
    #[arg(long)]
    height: Option<usize>,

    /// JSON-lines output path ("-" for stdout)
    #[arg(long)]
    output: Option<String>,

    /// Use N synthetic frames instead of raw input (0 = unbounded)
    #[arg(long, value_name = "N", conflicts_with = "input")]
    synthetic: Option<u64>,

    /// Stop after N frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,
}

impl RunArgs {
    /// 設定ファイルを読み、CLI 引数で上書きする
    fn resolve(&self) -> Result<DaemonConfig> {
        let mut cfg = match &self.config {
            Some(path) => DaemonConfig::load(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(weights) = &self.weights {
            cfg.model.backend = Backend::Reference;
            cfg.model.weights = Some(weights.clone());
        }
        if self.zero {
            cfg.model.backend = Backend::Zero;
        }
        if let Some(input) = &self.input {
            cfg.input.source = SourceKind::Raw;
            cfg.input.path = input.clone();
        }
        if let Some(frames) = self.synthetic {
            cfg.input.source = SourceKind::Synthetic;
            cfg.input.frames = frames;
        }
        if let Some(width) = self.width {
            cfg.input.width = width;
        }
        if let Some(height) = self.height {
            cfg.input.height = height;
        }
        if let Some(output) = &self.output {
            cfg.output.path = output.clone();
        }
        if let Some(max_frames) = self.max_frames {
            cfg.runtime.max_frames = max_frames;
        }
        Ok(cfg)
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    use std::io::Write;
    let log_level = if cli.debug { "debug" } else { "info" };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );

    // stdout は JSON-lines 出力に使うため、ログは stderr のみ
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli.command) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::MockWeights { out, seed } => mock::write_mock_weights(&out, seed),
        Command::Run(args) => {
            let cfg = args.resolve()?;

            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = stop.clone();
                ctrlc::set_handler(move || {
                    stop.store(true, Ordering::Relaxed);
                })
                .ok();
            }

            daemon::run(&cfg, &stop)?;
            Ok(())
        }
    }
}
