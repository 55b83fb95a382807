use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ciyu_compiler::{ConfigFile, EmitError, OutputFormat, Overrides, Settings, compile, emit_outputs};
use ciyu_db::LoadMode;

const EXIT_ABORTED: u8 = 2;

#[derive(Parser)]
#[command(name = "ciyu-compile")]
#[command(about = "Compile ciyu word lists into a sorted pinyin lookup table")]
struct Cli {
    /// Word lists in priority order (earlier files win candidate order)
    #[arg(env = "CIYU_INPUTS", value_delimiter = ',')]
    inputs: Vec<PathBuf>,
    /// JSON config file with inputs, elision set, substitutions and output
    #[arg(long, env = "CIYU_CONFIG")]
    config: Option<PathBuf>,
    /// Artifact path
    #[arg(short, long, env = "CIYU_OUTPUT")]
    output: Option<PathBuf>,
    /// Artifact format: json or rust
    #[arg(long, env = "CIYU_FORMAT")]
    format: Option<OutputFormat>,
    /// Hash seed
    #[arg(long, env = "CIYU_SEED")]
    seed: Option<u32>,
    /// How word lists are read: mmap or owned
    #[arg(long, env = "CIYU_LOAD_MODE", value_parser = parse_load_mode)]
    mode: Option<LoadMode>,
    /// Also write a script/pronunciation/key sheet for checking keys by hand
    #[arg(long)]
    qc: Option<PathBuf>,
    /// Overwrite existing outputs without asking
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Compile and report only; write nothing
    #[arg(long, default_value_t = false)]
    check: bool,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let file = cli
        .config
        .as_deref()
        .map(ConfigFile::load)
        .transpose()
        .context("loading config")?;
    let mut settings = Settings::resolve(
        file,
        Overrides {
            inputs: cli.inputs,
            seed: cli.seed,
            output: cli.output,
            format: cli.format,
            qc: cli.qc,
            load_mode: cli.mode,
            force: cli.force,
        },
    )?;
    for input in &settings.compile.inputs {
        info!("using word list at {}", input.display());
    }

    let compilation = match compile(&settings.compile) {
        Ok(c) => c,
        Err(err) => {
            error!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };
    compilation.report.log();

    if cli.check {
        info!("check only; no files written");
        return Ok(ExitCode::SUCCESS);
    }
    let Some(output) = settings.output.clone() else {
        anyhow::bail!("no output path configured (use --output or \"output\" in the config)");
    };

    let targets: Vec<&Path> = std::iter::once(output.as_path())
        .chain(settings.qc.as_deref())
        .collect();
    if !settings.emit.force && targets.iter().any(|p| p.exists()) {
        if !io::stdin().is_terminal() || !confirm_overwrite(&targets)? {
            warn!("no changes made");
            return Ok(ExitCode::from(EXIT_ABORTED));
        }
        settings.emit.force = true;
    }

    let qc = settings
        .qc
        .as_deref()
        .map(|path| (compilation.qc.as_slice(), path));
    match emit_outputs(&compilation.artifact, &output, qc, settings.emit) {
        Ok(()) => {
            info!(
                "wrote {} table with {} keys to {}",
                settings.emit.format,
                compilation.artifact.table.len(),
                output.display()
            );
            if let Some(path) = &settings.qc {
                info!("wrote quality-check sheet to {}", path.display());
            }
        }
        Err(EmitError::Exists(path)) => return Ok(aborted(&path)),
        Err(err) => return Err(err.into()),
    }

    Ok(ExitCode::SUCCESS)
}

fn aborted(path: &Path) -> ExitCode {
    warn!("{} already exists; no changes made", path.display());
    ExitCode::from(EXIT_ABORTED)
}

fn confirm_overwrite(targets: &[&Path]) -> Result<bool> {
    let names: Vec<String> = targets.iter().map(|p| p.display().to_string()).collect();
    print!("This will overwrite {}\nProceed? [y/N]: ", names.join(" and "));
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y"))
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Ok(LoadMode::Mmap),
        "owned" => Ok(LoadMode::Owned),
        other => Err(format!("unknown load mode {other:?} (expected mmap or owned)")),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .init();
}
