use std::fs::File;
use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use banktap::config::Settings;
use banktap::replay::{run_capture, CaptureFile};
use banktap::{build_registry, export};

#[derive(Parser)]
#[command(name = "banktap", version, about = "Bank transaction capture pipeline")]
struct Cli {
    /// Settings file; defaults apply when absent.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Command {
    /// Run a recorded capture file through the pipeline and export the
    /// normalized transactions.
    Replay {
        /// Capture file (JSON: tabs, events, bodies).
        capture: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        /// Output file; stdout when absent.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List the registered site plugins.
    Plugins,
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => {
            Settings::load(path).with_context(|| format!("loading settings {}", path.display()))
        }
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Replay {
            capture,
            format,
            out,
        } => {
            let capture = CaptureFile::load(&capture)
                .with_context(|| format!("loading capture {}", capture.display()))?;
            let store = run_capture(&capture, &settings).await?;

            let mut batches = store.all_transactions();
            batches.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sink: Box<dyn io::Write> = match out {
                Some(path) => Box::new(
                    File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            match format {
                OutputFormat::Json => export::write_json(&mut sink, &batches)?,
                OutputFormat::Csv => export::write_csv(&mut sink, &batches)?,
            }
            writeln!(sink)?;
        }
        Command::Plugins => {
            let registry = build_registry(&settings);
            let mut stdout = io::stdout().lock();
            for descriptor in registry.descriptors() {
                writeln!(
                    stdout,
                    "{}\t{}\tbase={}\tapi={}",
                    descriptor.display_name,
                    descriptor.account_display_name,
                    descriptor.base_url_pattern,
                    descriptor.api_url_pattern
                )?;
            }
        }
    }
    Ok(())
}
