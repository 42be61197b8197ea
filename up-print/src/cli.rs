///
/// This module implements the full CLI interface for up-print: command parsing,
/// input validation, credential resolution and the async entrypoint.
///
/// All protocol logic (scopes, strategies, upload, polling) lives in the [`up-print-core`] crate.
/// This module is strictly CLI glue: it builds a `GraphConfig`, acquires a token,
/// wires the reqwest transport into the core and reports the outcome.
///
/// ## Features
/// - Entry struct [`Cli`] with the `print` and `diagnose` subcommands.
/// - Every required input also reads from the environment (`.env` included).
/// - Missing input is reported as [`InputError`], which `main` maps to exit code 2.
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
///
/// ## How To Use
/// - For command-line users: use the installed `up-print` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`up-print-core`]: ../../up-print-core/
/// [`Cli`]: struct.Cli.html
/// [`run`]: fn.run.html
use crate::auth::{AuthMethod, TokenProvider, TokenRolesProbe};
use crate::graph::GraphClient;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use up_print_core::config::GraphConfig;
use up_print_core::contract::{DiagnosticProbe, ProgressReporter};
use up_print_core::diagnostics::{default_probes, run_diagnostics};
use up_print_core::submit::{JobSubmitter, PrintRequest};

pub const DEFAULT_JOB_NAME: &str = "UP Job";

/// CLI for up-print: send one document to a Universal Print printer.
#[derive(Parser)]
#[clap(
    name = "up-print",
    version,
    about = "Create, upload and start a Universal Print job via Microsoft Graph"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a file: create job, upload document, start job
    Print(PrintArgs),
    /// Probe printer, job and document access with a throwaway job
    Diagnose(DiagnoseArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct AuthArgs {
    /// Azure AD tenant ID
    #[clap(long, env = "TENANT_ID")]
    pub tenant_id: Option<String>,
    /// App registration client ID
    #[clap(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,
    /// App registration client secret (not needed with --device-code)
    #[clap(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
    /// Sign in interactively with the device code flow
    #[clap(long)]
    pub device_code: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PrintArgs {
    /// Printer ID in Universal Print
    #[clap(long, env = "PRINTER_ID")]
    pub printer_id: Option<String>,
    /// Path to the file to print (PDF, XPS, images, ...)
    #[clap(long, env = "FILE_PATH")]
    pub file: Option<PathBuf>,
    /// Display name for the print job
    #[clap(long, default_value = DEFAULT_JOB_NAME)]
    pub job_name: String,
    /// Document content type; detected from the file when omitted
    #[clap(long)]
    pub content_type: Option<String>,
    /// Submit through this printer share
    #[clap(long)]
    pub share_id: Option<String>,
    /// Never route through a discovered share
    #[clap(long)]
    pub printer_scope: bool,
    /// Do not copy the printer's default settings into the job
    #[clap(long)]
    pub no_printer_defaults: bool,
    /// Poll job status until it finishes
    #[clap(long)]
    pub poll: bool,
    /// Seconds between status checks
    #[clap(long)]
    pub poll_interval: Option<u64>,
    /// Seconds to wait for the job to finish
    #[clap(long)]
    pub poll_timeout: Option<u64>,
    /// Upload chunk size in bytes
    #[clap(long)]
    pub chunk_size: Option<usize>,
    /// Optional YAML file overriding Graph settings
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DiagnoseArgs {
    /// Printer ID in Universal Print
    #[clap(long, env = "PRINTER_ID")]
    pub printer_id: Option<String>,
    /// File whose content type is used for the upload session probes
    #[clap(long, env = "FILE_PATH")]
    pub file: Option<PathBuf>,
    /// Optional YAML file overriding Graph settings
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(flatten)]
    pub auth: AuthArgs,
}

/// Input problems detected before any request is made.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Missing required arguments: {}", .0.join(" "))]
    Missing(Vec<&'static str>),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("--poll-interval must be at least 1 second")]
    ZeroPollInterval,
}

/// Exit code for a failed run: 2 for bad input, 1 for everything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<InputError>().is_some() {
        2
    } else {
        1
    }
}

/// Progress lines go to stdout, untouched by the log filter.
pub struct StdoutProgress;

impl ProgressReporter for StdoutProgress {
    fn line(&self, message: &str) {
        println!("{message}");
    }
}

struct ValidatedInput {
    printer_id: String,
    file: PathBuf,
    auth: AuthMethod,
}

fn validate(
    auth: &AuthArgs,
    printer_id: &Option<String>,
    file: &Option<PathBuf>,
) -> std::result::Result<ValidatedInput, InputError> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let mut missing = Vec::new();
    if !present(&auth.tenant_id) {
        missing.push("--tenant-id");
    }
    if !present(&auth.client_id) {
        missing.push("--client-id");
    }
    if !auth.device_code && !present(&auth.client_secret) {
        missing.push("--client-secret");
    }
    if !present(printer_id) {
        missing.push("--printer-id");
    }
    if file.as_ref().map_or(true, |f| f.as_os_str().is_empty()) {
        missing.push("--file");
    }

    match (&auth.tenant_id, &auth.client_id, printer_id, file) {
        (Some(tenant_id), Some(client_id), Some(printer_id), Some(file)) if missing.is_empty() => {
            if !file.is_file() {
                return Err(InputError::FileNotFound(file.clone()));
            }
            let method = match (&auth.client_secret, auth.device_code) {
                (_, true) => AuthMethod::DeviceCode {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                },
                (Some(secret), false) => AuthMethod::ClientCredentials {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: secret.clone(),
                },
                (None, false) => return Err(InputError::Missing(vec!["--client-secret"])),
            };
            Ok(ValidatedInput {
                printer_id: printer_id.clone(),
                file: file.clone(),
                auth: method,
            })
        }
        _ => Err(InputError::Missing(missing)),
    }
}

fn base_config(path: Option<&Path>) -> Result<GraphConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(GraphConfig::default()),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Print(args) => print(args).await,
        Commands::Diagnose(args) => diagnose(args).await,
    }
}

async fn print(args: PrintArgs) -> Result<()> {
    let input = validate(&args.auth, &args.printer_id, &args.file)?;
    if args.poll_interval == Some(0) {
        return Err(InputError::ZeroPollInterval.into());
    }

    let mut config = base_config(args.config.as_deref())?;
    if args.printer_scope {
        config.prefer_share_scope = false;
    }
    if args.no_printer_defaults {
        config.apply_printer_defaults = false;
    }
    if let Some(secs) = args.poll_interval {
        config.poll.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.poll_timeout {
        config.poll.timeout = Duration::from_secs(secs);
    }
    if let Some(chunk_size) = args.chunk_size.filter(|c| *c > 0) {
        config.chunk_size = chunk_size;
    }
    tracing::info!(command = "print", printer_id = %input.printer_id, "Starting print submission");

    let token = TokenProvider::new()?
        .acquire(&input.auth, &config.scopes)
        .await?;
    let transport = GraphClient::new(token.clone()).context("Failed to build Graph client")?;
    let progress = StdoutProgress;

    let mut probes: Vec<Box<dyn DiagnosticProbe + '_>> = default_probes(&transport, &config);
    probes.push(Box::new(TokenRolesProbe::new(
        token,
        config.required_roles.clone(),
    )));
    let submitter = JobSubmitter::new(&transport, &config, &progress).with_probes(probes);

    let request = PrintRequest {
        printer_id: input.printer_id,
        file_path: input.file,
        job_name: args.job_name,
        content_type_override: args.content_type,
        share_id: args.share_id,
        poll: args.poll,
    };
    match submitter.submit(&request).await {
        Ok(report) => {
            tracing::info!(command = "print", ?report, "Print submission complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "print", error = %e, "Print submission failed");
            Err(anyhow::Error::new(e))
        }
    }
}

async fn diagnose(args: DiagnoseArgs) -> Result<()> {
    let input = validate(&args.auth, &args.printer_id, &args.file)?;
    let config = base_config(args.config.as_deref())?;
    tracing::info!(command = "diagnose", printer_id = %input.printer_id, "Starting diagnostics");

    let token = TokenProvider::new()?
        .acquire(&input.auth, &config.scopes)
        .await?;
    let transport = GraphClient::new(token.clone()).context("Failed to build Graph client")?;

    let mut probes: Vec<Box<dyn DiagnosticProbe + '_>> = default_probes(&transport, &config);
    probes.push(Box::new(TokenRolesProbe::new(
        token,
        config.required_roles.clone(),
    )));

    let report = run_diagnostics(&transport, &config, &input.printer_id, &input.file, &probes).await?;
    println!("Debug job: {}", report.job_id);
    for record in &report.records {
        println!("{record}");
    }
    if report.attachment_possible() {
        println!("At least one upload path works for this printer.");
    } else {
        println!("No upload path accepted the document.");
    }
    Ok(())
}
