//! Tether Runtime
//!
//! Command-line host: boots a script engine, installs the demonstration
//! host and runs one script. The process exit code is the run status.

mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tether_script::{Engine, EngineSettings};

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Run a script against the embedded host bridge", long_about = None)]
#[command(version)]
struct Cli {
    /// Script file to run, or inline code with --eval
    script: String,
    /// Treat SCRIPT as inline code
    #[arg(short, long)]
    eval: bool,
    /// Publish the debugger start flags in process.argv
    #[arg(long)]
    debug: bool,
    /// Engine settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Files evaluated before the script; repeatable
    #[arg(short, long = "include")]
    include: Vec<PathBuf>,
    /// Log bridge internals at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::info!("Tether v{}", tether_script::VERSION);
    let status = run(&cli)?;
    std::process::exit(status);
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn settings_for(cli: &Cli) -> Result<EngineSettings> {
    let mut settings = match &cli.config {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };
    settings.debug |= cli.debug;
    settings.include_files.extend(cli.include.iter().cloned());
    Ok(settings)
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = settings_for(cli)?;
    let mut engine = Engine::with_settings(&settings).context("failed to start the script engine")?;
    let host = demo::DemoHost::install(&mut engine).context("failed to install the demonstration host")?;

    let status = if cli.eval {
        engine.run_string(&cli.script)
    } else {
        engine.run_file(&cli.script)
    };
    tracing::info!(status, callbacks = host.len(), "script finished");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tether_script::{STATUS_EXCEPTION, STATUS_OK};

    #[test]
    fn parses_flags_and_repeated_includes() {
        let cli = Cli::try_parse_from([
            "tether", "main.js", "--debug", "-i", "a.js", "--include", "b.js", "-v",
        ])
        .unwrap();
        assert_eq!(cli.script, "main.js");
        assert!(cli.debug && cli.verbose && !cli.eval);
        assert_eq!(cli.include, [PathBuf::from("a.js"), PathBuf::from("b.js")]);
    }

    #[test]
    fn script_is_required() {
        assert!(Cli::try_parse_from(["tether", "--eval"]).is_err());
    }

    #[test]
    fn settings_merge_config_and_flags() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        write!(config, r#"{{ "exe_identifier": "custom" }}"#).unwrap();
        let path = config.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["tether", "x.js", "--debug", "--config", path.as_str()]).unwrap();

        let settings = settings_for(&cli).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.exe_identifier, "custom");
    }

    #[test]
    fn missing_config_is_an_error() {
        let cli = Cli::try_parse_from(["tether", "x.js", "--config", "/nonexistent/tether.json"]).unwrap();
        assert!(settings_for(&cli).is_err());
    }

    #[test]
    fn eval_runs_inline_code_against_the_demo_host() {
        let ok = Cli::try_parse_from(["tether", "--eval", "if (NewCallBackClass().Capacity !== 8) throw 1;"]).unwrap();
        assert_eq!(run(&ok).unwrap(), STATUS_OK);

        let failing = Cli::try_parse_from(["tether", "-e", "throw new Error('no');"]).unwrap();
        assert_eq!(run(&failing).unwrap(), STATUS_EXCEPTION);
    }
}
