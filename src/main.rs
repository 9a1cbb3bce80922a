use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use md2pdf::config::CONFIG_FILE_NAME;
use md2pdf::{Config, ConvertOptions};

#[derive(Parser)]
#[command(name = "md2pdf", version)]
#[command(about = "Convert Markdown files to PDF")]
#[command(after_help = "Examples:\n  md2pdf document.md\n  md2pdf document.md -o output.pdf\n  \
                        md2pdf document.md --config custom.yaml")]
struct Cli {
    /// Input Markdown file
    #[arg(required_unless_present = "init_config")]
    input: Option<PathBuf>,

    /// Output PDF file (defaults to input name with .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, env = "MD2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Ignore all configuration files and use defaults only (overrides --config)
    #[arg(long)]
    no_config: bool,

    /// Also write the intermediate HTML document
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,

    /// Write a sample md2pdf.yaml to the current directory and exit
    #[arg(long)]
    init_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.init_config {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        Config::write_sample(&path)?;
        println!("Created: {}", path.display());
        return Ok(());
    }

    let Some(input) = cli.input else {
        anyhow::bail!("no input file given");
    };

    let output = output_path(&input, cli.output);

    let config = load_config(&input, cli.config.as_deref(), cli.no_config)?;

    let options = ConvertOptions {
        html_output: cli.html,
    };
    md2pdf::convert_file(&input, &output, &config, &options)
        .with_context(|| format!("failed to convert {}", input.display()))?;

    println!("Created: {}", output.display());
    Ok(())
}

/// Defaults to the input name with a `.pdf` extension, next to the input.
fn output_path(input: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension("pdf"))
}

fn load_config(input: &Path, explicit: Option<&Path>, no_config: bool) -> Result<Config> {
    if no_config {
        log::info!("Using default configuration (--no-config specified).");
        return Ok(Config::default());
    }

    if let Some(path) = explicit {
        log::info!("Using config: {}", path.display());
        return Ok(Config::load(path)?);
    }

    match Config::find(input) {
        Some(path) => {
            log::info!("Found config: {}", path.display());
            Ok(Config::load(&path)?)
        }
        None => {
            log::info!("No config file found, using defaults.");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn input_is_required_without_init_config() {
        assert!(Cli::try_parse_from(["md2pdf"]).is_err());
        assert!(Cli::try_parse_from(["md2pdf", "--init-config"]).is_ok());
    }

    #[test]
    fn output_defaults_to_pdf_next_to_input() {
        assert_eq!(
            output_path(Path::new("docs/report.md"), None),
            Path::new("docs/report.pdf")
        );
        assert_eq!(
            output_path(Path::new("report.md"), Some(PathBuf::from("out.pdf"))),
            Path::new("out.pdf")
        );
    }

    #[test]
    fn run_writes_default_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.md");
        std::fs::write(&input, "# Notes\n\nBody.\n").unwrap();

        let cli = Cli::try_parse_from([
            OsStr::new("md2pdf"),
            input.as_os_str(),
            OsStr::new("--no-config"),
        ])
        .unwrap();
        run(cli).unwrap();

        let pdf = std::fs::read(dir.path().join("notes.pdf")).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn no_config_wins_over_explicit_path() {
        let config = load_config(
            Path::new("doc.md"),
            Some(Path::new("/nonexistent/md2pdf.yaml")),
            true,
        )
        .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "page_size: Letter\n").unwrap();

        let config = load_config(&dir.path().join("doc.md"), Some(&path), false).unwrap();
        assert_eq!(config.page_size, "Letter");
    }
}
