use crate::catalog::{sheets, templates};
use crate::config::{Config, load_config};
use crate::export::ExportFormat;
use crate::icons::IconResolver;
use crate::model::{LabelBatchRequest, LabelSingleRequest};
use crate::service::LabelService;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "labelsmith", version, about = "Printable label sheets over HTTP")]
pub struct Args {
    /// TOML config file (defaults, then file, then LABELSMITH__* env)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
    /// Render a JSON label request to a file
    Render {
        /// Request JSON, or '-' for stdin
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        /// Output file. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        #[arg(short = 'e', long = "format", value_enum, default_value = "pdf")]
        format: ExportFormat,

        /// Input is a single-label request
        #[arg(long)]
        single: bool,
    },
    /// Print the label type registry
    Types,
    /// Print the sheet registry
    Sheets,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(crate::server::serve(config))
        }
        Command::Render {
            input,
            output,
            format,
            single,
        } => render(&config, input.as_deref(), output.as_deref(), format, single),
        Command::Types => print_json(&json!({ "types": templates() })),
        Command::Sheets => print_json(&json!({ "sheets": sheets() })),
    }
}

fn render(
    config: &Config,
    input: Option<&Path>,
    output: Option<&Path>,
    format: ExportFormat,
    single: bool,
) -> Result<()> {
    let service = LabelService::new(
        config.render.clone(),
        config.theme.clone(),
        Arc::new(IconResolver::new(&config.render.icons_dir)),
    );
    let raw = read_input(input)?;
    let rendered = if single {
        let req: LabelSingleRequest =
            serde_json::from_str(&raw).context("invalid single-label request")?;
        service.render_single(&req, format)?
    } else {
        let req: LabelBatchRequest =
            serde_json::from_str(&raw).context("invalid batch request")?;
        service.render_batch(&req, format)?
    };
    for warning in &rendered.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        pages = rendered.page_count,
        file = %rendered.export.filename,
        "rendered"
    );
    write_output(&rendered.export.bytes, output)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(bytes: &[u8], path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,labelsmith=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
