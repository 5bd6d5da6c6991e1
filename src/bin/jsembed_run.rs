use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use dirs::home_dir;
use jsembed_kernel_rs::config::{RuntimeConfig, CONFIG_ENV};
use jsembed_kernel_rs::engine::Engine;
use jsembed_kernel_rs::logging::StdioLogSink;
use jsembed_kernel_rs::resource::ResourcePath;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "jsembed-run")]
#[command(about = "Run a script through the embedded JavaScript runtime")]
struct CliOptions {
    /// Script to run, as a resource path (e.g. /main.js)
    #[arg(long = "script", short = 's')]
    script: ResourcePath,

    /// Script directory; may be repeated, searched in order
    #[arg(long = "root", short = 'r', action = ArgAction::Append)]
    roots: Vec<PathBuf>,

    /// .tar.gz script bundle; may be repeated, searched after the roots
    #[arg(long = "archive", short = 'a', action = ArgAction::Append)]
    archives: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long = "config", short = 'c')]
    config: Option<PathBuf>,

    /// JSON input file exposed to the script as `input` (use '-' for stdin)
    #[arg(long = "input", short = 'i')]
    input: Option<String>,

    /// Write the error page here instead of stdout when the script fails
    #[arg(long = "error-page")]
    error_page: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let opts = CliOptions::parse();

    let config_path = opts.config.clone().or_else(default_config_path);
    let mut config = RuntimeConfig::load(config_path.as_deref())?;
    // Command-line locations take precedence over configured ones.
    if !opts.roots.is_empty() {
        config.roots = opts.roots.clone();
    }
    config.archives.extend(opts.archives.iter().cloned());

    let input = load_input(opts.input.as_deref())?;

    let engine = Engine::builder()
        .log_sink(Arc::new(StdioLogSink::new(config.log_level)))
        .config(config)
        .build()?;

    let outcome = match &input {
        Some(input) => engine.run_with_input(&opts.script, input),
        None => engine.run(&opts.script),
    };
    match outcome {
        Ok(exports) => {
            let rendered = serde_json::to_string_pretty(&exports.value)?;
            println!("{rendered}");
            Ok(true)
        }
        Err(failure) => {
            let page = engine.error_page(&failure);
            match &opts.error_page {
                Some(target) => {
                    write_page(target, &page)?;
                    eprintln!("{failure}");
                }
                None => println!("{page}"),
            }
            Ok(false)
        }
    }
}

/// `~/.jsembed/config.toml`, when present and no config was named elsewhere.
fn default_config_path() -> Option<PathBuf> {
    if std::env::var_os(CONFIG_ENV).is_some() {
        return None;
    }
    let candidate = home_dir()?.join(".jsembed").join("config.toml");
    candidate.is_file().then_some(candidate)
}

fn load_input(source: Option<&str>) -> Result<Option<Value>> {
    let text = match source {
        None => return Ok(None),
        Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read JSON input from stdin")?;
            buffer
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("Unable to read {path}"))?,
    };
    if text.trim().is_empty() {
        return Ok(Some(Value::Object(Default::default())));
    }
    let value = serde_json::from_str(&text).context("Invalid JSON input")?;
    Ok(Some(value))
}

fn write_page(target: &Path, page: &str) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create directory {}", parent.display()))?;
    }
    fs::write(target, page).with_context(|| format!("Unable to write {}", target.display()))
}
