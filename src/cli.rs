//! Command-line interface for sonar-invoke.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::client::{ClientError, ScanClient, ScanOutcome, TaskStatus};
use crate::config::{
    self, ScanConfig, PLACEHOLDER_TOKEN, SERVER_URL_ENV_VAR, TOKEN_ENV_VAR,
};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default config file names to search for.
const DEFAULT_CONFIG_NAMES: &[&str] = &["sonar-invoke.yaml", ".sonar-invoke.yaml"];

/// Starter config written by `sonar-invoke init`.
const CONFIG_TEMPLATE: &str = include_str!("templates/sonar-invoke.yaml");

/// Trigger a SonarQube scan and gate on the result.
///
/// sonar-invoke assembles the scan properties (project identity, source
/// and test paths, exclusion globs, coverage report paths), submits them
/// to the configured server, and waits for the compute engine task to
/// finish. By default the process exits 0 whatever happens to the scan;
/// set `fail_on_error` to turn scan failures into non-zero exits.
#[derive(Parser)]
#[command(name = "sonar-invoke")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a scan and wait for its outcome
    #[command(visible_alias = "run")]
    Scan(ScanArgs),
    /// Create a starter sonar-invoke.yaml
    Init(InitArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server URL (overrides SONAR_HOST_URL and the config file)
    #[arg(long)]
    pub server_url: Option<String>,

    /// Authentication token (overrides SONAR_TOKEN and the config file)
    #[arg(long)]
    pub token: Option<String>,

    /// Exit non-zero when the scan fails (overrides the config file)
    #[arg(long)]
    pub fail_on_error: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Submit without waiting for the compute engine task
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "sonar-invoke.yaml")]
    pub output: PathBuf,
}

/// Discover a config file in the current directory.
fn discover_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Map an outcome to a process exit code under the given policy.
///
/// With `fail_on_error` off this always returns success, replicating the
/// historical fire-and-forget behavior. A non-terminal status only occurs
/// for `--no-wait` submissions, which count as success either way.
pub fn exit_code_for(outcome: &ScanOutcome, fail_on_error: bool) -> i32 {
    if !fail_on_error {
        return EXIT_SUCCESS;
    }
    if outcome.passed() || !outcome.status.is_terminal() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    }
}

/// Map a client error (server unreachable, auth rejected, poll timeout)
/// to a process exit code under the given policy. The default policy
/// swallows these too: the scan not completing never failed the caller
/// historically.
pub fn exit_code_for_error(fail_on_error: bool) -> i32 {
    if fail_on_error {
        EXIT_ERROR
    } else {
        EXIT_SUCCESS
    }
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    // Load config: explicit path, discovered file, or built-in defaults
    let config_path = args.config.clone().or_else(discover_config);
    let config = match &config_path {
        Some(path) => match ScanConfig::parse_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
        None => ScanConfig::default(),
    };

    // Ambient environment is read here, at the edge, and passed into the
    // resolvers explicitly.
    let env_token = std::env::var(TOKEN_ENV_VAR).ok();
    let env_url = std::env::var(SERVER_URL_ENV_VAR).ok();

    let token = config::resolve_token(
        args.token.as_deref(),
        env_token.as_deref(),
        config.token.as_deref(),
    );
    if token == PLACEHOLDER_TOKEN {
        eprintln!(
            "Warning: no token configured ({} unset); the server will likely reject the scan",
            TOKEN_ENV_VAR
        );
    }

    let server_url = config::resolve_server_url(
        args.server_url.as_deref(),
        env_url.as_deref(),
        &config.server_url,
    );

    let fail_on_error = args.fail_on_error || config.fail_on_error;
    let properties = config.project.to_properties();
    let client = ScanClient::new(&config, server_url.clone(), token);

    let runtime = tokio::runtime::Runtime::new()?;
    let show_spinner = args.format == "pretty" && !args.no_wait;
    let no_wait = args.no_wait;
    let scan_result: Result<ScanOutcome, ClientError> = runtime.block_on(async {
        client.server_version().await?;
        let task_id = client.submit(&properties).await?;

        if no_wait {
            return Ok(ScanOutcome {
                task_id,
                status: TaskStatus::Pending,
                error_message: None,
            });
        }

        let spinner = if show_spinner {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_message(format!("waiting for compute engine task {}", task_id));
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let outcome = client.wait_for_task(&task_id).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        outcome
    });

    match scan_result {
        Ok(outcome) => {
            if args.format == "json" {
                report::write_json(&server_url, &config.project.key, &outcome)?;
            } else {
                report::write_pretty(&server_url, &config.project.key, &outcome);
            }
            Ok(exit_code_for(&outcome, fail_on_error))
        }
        Err(e) => {
            if fail_on_error {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("Warning: scan did not complete: {}", e);
            }
            Ok(exit_code_for_error(fail_on_error))
        }
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    // Write config file
    if let Err(e) = std::fs::write(&args.output, CONFIG_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} for your project", args.output.display());
    println!("  2. Export {} with a user token from your server", TOKEN_ENV_VAR);
    println!("  3. Run: sonar-invoke scan");

    Ok(EXIT_SUCCESS)
}
