//! voxtype CLI: deliver dictation text to the focused window and diagnose
//! the injection environment.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use voxtype_injection::{
    get_setup_instructions, CapabilityDetector, InjectionConfig, StrategyOrchestrator,
};

#[derive(Parser)]
#[command(name = "voxtype")]
#[command(about = "Inject dictation text into the focused window")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "VOXTYPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inject text into the currently focused window. Reads stdin when no
    /// argument is given.
    Inject {
        text: Option<String>,
        /// Print the full attempt log as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print setup instructions for the detected environment.
    Diagnose,
    /// Dump the capability detection report as JSON.
    Probe,
}

fn load_config(path: Option<&PathBuf>) -> Result<InjectionConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(InjectionConfig::default()),
    }
}

fn read_stdin_text() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading text from stdin")?;
    Ok(buf)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let detector = Arc::new(CapabilityDetector::new(config.clone()));

    match cli.command {
        Command::Inject { text, json } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin_text()?,
            };

            let orchestrator = StrategyOrchestrator::new(config, detector).await;
            let outcome = orchestrator.inject_text(&text).await;
            debug!(attempts = outcome.attempts.len(), "injection finished");

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if let Some(strategy) = outcome.winning_strategy() {
                eprintln!("injected {} chars via {}", text.len(), strategy);
            }

            orchestrator.shutdown();

            if !outcome.success {
                // The text must never be silently lost: surface it verbatim
                // so the user can paste it by hand.
                eprintln!("injection failed on every strategy; your text was:");
                println!("{}", text);
                std::process::exit(1);
            }
        }
        Command::Diagnose => {
            println!("{}", get_setup_instructions(&detector).await);
        }
        Command::Probe => {
            let report = detector.detect().await;
            println!("{}", serde_json::to_string_pretty(report.as_ref())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_inject_with_text() {
        let cli = Cli::try_parse_from(["voxtype", "inject", "hello world"]).unwrap();
        match cli.command {
            Command::Inject { text, json } => {
                assert_eq!(text.as_deref(), Some("hello world"));
                assert!(!json);
            }
            _ => panic!("expected inject subcommand"),
        }
    }

    #[test]
    fn cli_parses_diagnose_and_probe() {
        assert!(matches!(
            Cli::try_parse_from(["voxtype", "diagnose"]).unwrap().command,
            Command::Diagnose
        ));
        assert!(matches!(
            Cli::try_parse_from(["voxtype", "probe"]).unwrap().command,
            Command::Probe
        ));
    }

    #[test]
    fn config_loads_from_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefer_clipboard_paste = false").unwrap();
        let config = load_config(Some(&file.path().to_path_buf())).unwrap();
        assert!(!config.prefer_clipboard_paste);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/voxtype.toml");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn absent_config_gives_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.prefer_clipboard_paste);
    }
}
