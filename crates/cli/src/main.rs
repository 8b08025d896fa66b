mod config;

use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use marrow_core::ParseError;
use marrow_eval::{CapabilityRegistry, Error, RuntimeError, StdinInput, EVALUATOR_STACK_SIZE};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Marrow scripting language runner.
#[derive(Parser)]
#[command(name = "marrow", version, about = "Marrow scripting language runner")]
struct Cli {
    /// Diagnostic format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress diagnostics and program echo
    #[arg(long, global = true)]
    quiet: bool,

    /// Settings file (defaults to marrow.toml beside the script)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a .mrw script
    Run {
        /// Path to the script
        file: PathBuf,
    },

    /// Parse a .mrw script without running it
    Check {
        /// Path to the script
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let code = match &cli.command {
        Commands::Run { file } => cmd_run(file, &cli),
        Commands::Check { file } => cmd_check(file, &cli),
    };
    process::exit(code);
}

/// Logs go to stderr so program output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_run(file: &Path, cli: &Cli) -> i32 {
    let Some(src) = read_source(file, cli) else {
        return 1;
    };
    let config = match Config::load(cli.config.as_deref(), file) {
        Ok(config) => config,
        Err(e) => {
            report_error(file, "config", &e.to_string(), None, cli);
            return 1;
        }
    };

    let mut options = config.engine;
    if cli.quiet {
        options.echo = false;
    }
    let web = config.web;

    let evaluation = std::thread::Builder::new()
        .name("marrow-eval".to_string())
        .stack_size(EVALUATOR_STACK_SIZE)
        .spawn(move || -> std::io::Result<Result<usize, Error>> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let registry = Rc::new(CapabilityRegistry::with_web_options(web));
            Ok(runtime
                .block_on(marrow_eval::run_source(&src, registry, options, StdinInput::new()))
                .map(|evaluator| evaluator.output().len()))
        });
    let result = match evaluation.map(|handle| handle.join()) {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) | Err(e) => {
            report_error(file, "io", &format!("failed to start runtime: {}", e), None, cli);
            return 1;
        }
        Ok(Err(_)) => {
            report_error(file, "io", "evaluator thread panicked", None, cli);
            return 1;
        }
    };

    match result {
        Ok(lines) => {
            tracing::debug!(lines, "script finished");
            0
        }
        Err(Error::Parse(e)) => {
            report_parse_error(file, &e, cli);
            1
        }
        Err(Error::Runtime(e)) => {
            report_runtime_error(file, &e, cli);
            1
        }
    }
}

fn cmd_check(file: &Path, cli: &Cli) -> i32 {
    let Some(src) = read_source(file, cli) else {
        return 1;
    };
    let registry = CapabilityRegistry::with_defaults();
    match marrow_core::parse_source(&src, &registry) {
        Ok(program) => {
            if !cli.quiet {
                match cli.output {
                    OutputFormat::Text => println!("ok"),
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::json!({
                            "ok": true,
                            "declarations": program.declarations.len(),
                            "statements": program.body.len(),
                        })
                    ),
                }
            }
            0
        }
        Err(e) => {
            report_parse_error(file, &e, cli);
            1
        }
    }
}

fn read_source(file: &Path, cli: &Cli) -> Option<String> {
    match std::fs::read_to_string(file) {
        Ok(src) => Some(src),
        Err(e) => {
            report_error(file, "io", &format!("cannot read file: {}", e), None, cli);
            None
        }
    }
}

fn report_parse_error(file: &Path, err: &ParseError, cli: &Cli) {
    if cli.quiet {
        return;
    }
    match cli.output {
        OutputFormat::Text => eprintln!("error: {}:{}", file.display(), err),
        OutputFormat::Json => {
            let mut json = serde_json::to_value(err).unwrap_or_default();
            if let Some(map) = json.as_object_mut() {
                map.insert("file".to_string(), file.display().to_string().into());
                map.insert("message".to_string(), err.to_string().into());
            }
            eprintln!("{}", json);
        }
    }
}

fn report_runtime_error(file: &Path, err: &RuntimeError, cli: &Cli) {
    report_error(file, "runtime", &err.kind().to_string(), err.line(), cli);
}

fn report_error(file: &Path, kind: &str, message: &str, line: Option<u32>, cli: &Cli) {
    if cli.quiet {
        return;
    }
    match cli.output {
        OutputFormat::Text => match line {
            Some(line) => eprintln!("error: {}:{}: {}", file.display(), line, message),
            None => eprintln!("error: {}: {}", file.display(), message),
        },
        OutputFormat::Json => eprintln!(
            "{}",
            serde_json::json!({
                "kind": kind,
                "file": file.display().to_string(),
                "line": line,
                "message": message,
            })
        ),
    }
}
