use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::info;
use vitrine_disclosure::DisclosureConfig;

use crate::error::{ReplayError, Result};
use crate::replay;
use crate::scenario::Scenario;
use crate::trace::{write_jsonl, write_text};

#[derive(Debug, Parser)]
#[command(
    name = "vitrine-replay",
    about = "Replay scripted mega-menu scenarios and emit a trace",
    version
)]
pub struct Cli {
    /// Emit JSON (JSONL traces, JSON errors).
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a scenario file and print its trace.
    Run(RunArgs),

    /// Validate a disclosure configuration file (TOML or JSON).
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario file (TOML).
    pub scenario: PathBuf,

    /// Write the trace here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Configuration file; the format follows the extension.
    pub path: PathBuf,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run_scenario(&args, cli.json),
        Commands::CheckConfig(args) => check_config(&args.path, cli.json),
    }
}

fn run_scenario(args: &RunArgs, json: bool) -> Result<()> {
    let scenario = Scenario::from_file(&args.scenario)?;
    let records = replay::run(&scenario)?;
    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if json {
        write_jsonl(&records, out)?;
    } else {
        write_text(&records, out)?;
    }
    Ok(())
}

fn check_config(path: &Path, json: bool) -> Result<()> {
    let config = load_config(path)?;
    config.resolve()?;
    info!(path = %path.display(), "configuration valid");
    if json {
        println!("{}", serde_json::json!({ "status": "ok", "config": config }));
    } else {
        println!("{}: ok", path.display());
    }
    Ok(())
}

/// Load a configuration by file extension.
pub fn load_config(path: &Path) -> Result<DisclosureConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(DisclosureConfig::from_toml_file(path)?),
        Some("json") => Ok(DisclosureConfig::from_json_file(path)?),
        _ => Err(ReplayError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn check_config_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("menus.toml");
        std::fs::write(&path, "duration_ms = 999999\n").unwrap();
        let err = run(Cli {
            json: false,
            command: Commands::CheckConfig(CheckConfigArgs { path }),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_CONFIG);
    }

    #[test]
    fn check_config_accepts_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("menus.json");
        std::fs::write(&path, r#"{"hover_close_delay_ms": 0}"#).unwrap();
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_config(Path::new("menus.yaml")).unwrap_err();
        assert!(matches!(err, ReplayError::UnsupportedFormat { .. }));
    }

    #[test]
    fn run_writes_trace_file() {
        let dir = tempdir().unwrap();
        let scenario = dir.path().join("s.toml");
        std::fs::write(
            &scenario,
            "[[menus]]\nid = \"shop\"\n[[steps]]\naction = \"activate\"\nmenu = \"shop\"\n",
        )
        .unwrap();
        let output = dir.path().join("trace.jsonl");
        run(Cli {
            json: true,
            command: Commands::Run(RunArgs {
                scenario,
                output: Some(output.clone()),
            }),
        })
        .unwrap();
        let trace = std::fs::read_to_string(output).unwrap();
        assert_eq!(trace.lines().count(), 2);
        assert!(trace.contains(r#""state":"opening""#));
    }
}
