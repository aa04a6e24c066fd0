mod config;
mod crd;
mod names;
mod resource_list;
mod resources;
mod transform;
mod volumes;
mod workload;

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{FnSettings, LogFormat};
use crate::resource_list::{ResourceList, TransportError};

const STDIO: &str = "-";

#[derive(Parser)]
#[command(
    name = "webhook-fn",
    about = "KRM function that adds or removes the resources backing an admission webhook"
)]
struct Cli {
    /// ResourceList to read, `-` for stdin
    #[arg(long, default_value = STDIO)]
    input: String,
    /// Where to write the resulting ResourceList, `-` for stdout
    #[arg(long, default_value = STDIO)]
    output: String,
    /// functionConfig document to use instead of the one in the ResourceList
    #[arg(long, env = "WEBHOOK_FN_CONFIG")]
    fn_config: Option<String>,
}

fn init_tracing(settings: &FnSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    // stdout carries the ResourceList
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn read_input(path: &str) -> Result<String, TransportError> {
    let mut buf = String::new();
    let result = if path == STDIO {
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(path)
    };
    result.map_err(|source| TransportError::Read {
        path: path.to_string(),
        source,
    })
}

fn write_output(path: &str, contents: &str) -> Result<(), TransportError> {
    let result = if path == STDIO {
        io::stdout().lock().write_all(contents.as_bytes())
    } else {
        fs::write(path, contents)
    };
    result.map_err(|source| TransportError::Write {
        path: path.to_string(),
        source,
    })
}

fn execute(cli: &Cli) -> Result<(), TransportError> {
    let mut rl = ResourceList::from_yaml(&read_input(&cli.input)?)?;

    if let Some(path) = &cli.fn_config {
        let fc = serde_yaml::from_str(&read_input(path)?).map_err(|source| {
            TransportError::ParseFunctionConfig {
                path: path.clone(),
                source,
            }
        })?;
        rl.function_config = Some(fc);
    }

    transform::run(&mut rl);

    for result in &rl.results {
        debug!(severity = %result.severity, resource = ?result.resource_ref, "{}", result.message);
    }
    info!(
        items = rl.items.len(),
        results = rl.results.len(),
        has_errors = rl.has_errors(),
        "webhook-fn finished"
    );

    write_output(&cli.output, &rl.to_yaml()?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = FnSettings::load().unwrap_or_else(|e| {
        eprintln!("Failed to load settings, using defaults: {e}");
        FnSettings::default()
    });
    init_tracing(&settings);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("webhook-fn: {e}");
            ExitCode::FAILURE
        }
    }
}
