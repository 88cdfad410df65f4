//! Command-line front end for tessera.
//!
//! # Usage
//!
//! ```bash
//! # Launch a fresh app instance and type "test" into t_1, t_2 and t_3
//! tessera exercise --bundle-id com.example.Example
//!
//! # Use an app that is already running, and keep the step log
//! tessera exercise --no-launch --log
//!
//! # Wire the ExampleEarlGrey UI test target into ./Example.xcodeproj
//! tessera configure
//!
//! # Show the effective defaults, writing them to ~/.tessera/config.json
//! tessera config --init
//!
//! # Custom names and an exact framework pin
//! tessera configure --root ~/src/shop --project Shop --target ShopUITests \
//!     --scheme ShopUITests.xcscheme --version 1.15.1
//! ```

mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tessera_core::action::{save_log, ActionLog, ActionResult, ActionType};
use tessera_core::agent_driver::AgentDriver;
use tessera_core::config::{logs_dir, TesseraConfig};
use tessera_core::driver::AutomationDriver;
use tessera_core::exerciser::{ExerciseConfig, FieldExerciser};
use tessera_core::project::{
    ConfigureSettings, DependencyRegistry, FileRegistry, FrameworkPin, ProjectConfigurator, ProjectStore,
    StaticRegistry,
};
use tessera_core::simctl::Simctl;

use error::CliError;

/// Exercise iOS text fields and wire UI test targets into Xcode projects.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Exercise iOS text fields and wire UI test targets into Xcode projects")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Write logs to ~/.tessera/logs/tessera.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Tap each text field and type into it, stopping at the first failure
    Exercise {
        /// Bundle id of the app under test
        #[arg(short, long, env = "TESSERA_BUNDLE_ID")]
        bundle_id: Option<String>,
        /// Simulator UDID (defaults to the first booted simulator)
        #[arg(short, long, env = "TESSERA_UDID")]
        udid: Option<String>,
        /// Agent host
        #[arg(long, env = "TESSERA_HOST")]
        host: Option<String>,
        /// Agent port
        #[arg(short, long, env = "TESSERA_PORT")]
        port: Option<u16>,
        /// Implicit wait per field, in milliseconds
        #[arg(short = 'o', long, env = "TESSERA_TIMEOUT")]
        timeout: Option<u64>,
        /// Use the running app instead of launching a fresh instance
        #[arg(long)]
        no_launch: bool,
        /// Save the step log as JSON Lines under ~/.tessera/logs
        #[arg(long)]
        log: bool,
    },

    /// Add a hosted UI test target, its test framework and a shared scheme
    Configure {
        /// Directory containing the .xcodeproj bundle
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Project name
        #[arg(short, long, default_value = "Example")]
        project: String,
        /// UI test target name
        #[arg(short, long, default_value = "ExampleEarlGrey")]
        target: String,
        /// Shared scheme file name
        #[arg(short, long, default_value = "ExampleEarlGrey.xcscheme")]
        scheme: String,
        /// Test framework to link
        #[arg(long, default_value = "EarlGrey")]
        framework: String,
        /// Framework version pin: exact, N.x or *
        #[arg(long = "version", default_value = "1.x")]
        framework_version: String,
        /// JSON registry index to resolve the framework from
        #[arg(long, env = "TESSERA_REGISTRY")]
        registry: Option<PathBuf>,
        /// Show the changes without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the settings loaded from ~/.tessera/config.json
    Config {
        /// Write the current settings back, creating the file if missing
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = init_tracing(cli.log_file);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Logs to stderr, or to `~/.tessera/logs/tessera.log` with `--log-file`.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(log_file: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if log_file {
        let file_appender = tracing_appender::rolling::never(logs_dir(), "tessera.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = TesseraConfig::load();
    let format = cli.format;

    match cli.command {
        Command::Exercise {
            bundle_id,
            udid,
            host,
            port,
            timeout,
            no_launch,
            log,
        } => {
            let options = ExerciseOptions {
                bundle_id: bundle_id.or_else(|| config.bundle_id.clone()),
                udid,
                host: host.unwrap_or_else(|| config.agent_host.clone()),
                port: port.unwrap_or(config.agent_port),
                implicit_wait: Duration::from_millis(timeout.unwrap_or(config.implicit_wait_ms)),
                launch: !no_launch,
                save_log: log,
            };
            exercise(options, format).await
        }
        Command::Configure {
            root,
            project,
            target,
            scheme,
            framework,
            framework_version,
            registry,
            dry_run,
        } => {
            let settings = ConfigureSettings {
                project_name: project,
                test_target_name: target,
                scheme_file_name: scheme,
                framework: FrameworkPin {
                    name: framework,
                    version: framework_version,
                },
            };
            let registry: Box<dyn DependencyRegistry> = match registry.or_else(|| config.registry_path.clone()) {
                Some(path) => Box::new(FileRegistry::load(&path).map_err(|e| CliError::Io(e.to_string()))?),
                None => Box::new(StaticRegistry::builtin()),
            };
            configure(ProjectConfigurator::new(ProjectStore::new(root), registry), &settings, dry_run, format)
        }
        Command::Config { init } => {
            if init {
                config.save()?;
            }
            println!("{}", serde_json::to_string_pretty(&config).unwrap_or_default());
            Ok(())
        }
    }
}

struct ExerciseOptions {
    bundle_id: Option<String>,
    udid: Option<String>,
    host: String,
    port: u16,
    implicit_wait: Duration,
    launch: bool,
    save_log: bool,
}

async fn exercise(options: ExerciseOptions, format: OutputFormat) -> Result<(), CliError> {
    let mut actions: Vec<ActionLog> = Vec::new();
    let result = launch_and_exercise(&options, &mut actions).await;

    // Saved on failure too: a failed launch or connection is still a step.
    if options.save_log {
        match save_log(&logs_dir(), &actions) {
            Ok(path) => {
                debug!(path = %path.display(), "step log saved");
                if format == OutputFormat::Text {
                    eprintln!("Step log: {}", path.display());
                }
            }
            // The run's own error takes precedence over the log's.
            Err(e) if result.is_err() => warn!(error = %e, "failed to save step log"),
            Err(e) => return Err(e.into()),
        }
    }

    let fields = result?;
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "fields": fields, "actions": actions });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        }
        OutputFormat::Text => {
            for field in &fields {
                println!("typed into {}", field);
            }
        }
    }
    Ok(())
}

/// Launches a fresh instance, connects and fills the fields, recording each
/// step in `actions`.
async fn launch_and_exercise(options: &ExerciseOptions, actions: &mut Vec<ActionLog>) -> Result<Vec<String>, CliError> {
    if options.launch {
        let bundle_id = options.bundle_id.as_deref().ok_or_else(|| {
            CliError::Connection("no bundle id to launch; pass --bundle-id or --no-launch".to_string())
        })?;
        let udid = match &options.udid {
            Some(udid) => udid.clone(),
            None => Simctl::get_booted_udid()?,
        };
        let start = std::time::Instant::now();
        let launched = Simctl::launch(&udid, bundle_id);
        let result = match &launched {
            Ok(_) => ActionResult::Success,
            Err(e) => ActionResult::Failure(e.to_string()),
        };
        actions.push(ActionLog::new(
            ActionType::LaunchApp { bundle_id: bundle_id.to_string() },
            result,
            Some(start.elapsed().as_millis() as u64),
        ));
        let pid = launched?;
        info!(pid, bundle_id, "fresh instance launched");
    }

    let mut driver = AgentDriver::direct(options.host.clone(), options.port);
    driver.connect().await.map_err(|e| CliError::Connection(e.to_string()))?;
    if let Some(bundle_id) = &options.bundle_id {
        driver.set_target(bundle_id).await?;
    }

    let config = ExerciseConfig {
        implicit_wait: options.implicit_wait,
        ..Default::default()
    };
    let exerciser = FieldExerciser::new(Arc::new(driver), config);
    Ok(exerciser.run_with_log(actions).await?)
}

fn configure<R: DependencyRegistry>(
    configurator: ProjectConfigurator<R>,
    settings: &ConfigureSettings,
    dry_run: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let (changes, persisted) = if dry_run {
        (configurator.plan(settings)?.changes, false)
    } else {
        let outcome = configurator.configure(settings)?;
        (outcome.changes, outcome.persisted)
    };

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "project": configurator.store().descriptor_path(&settings.project_name),
                "changes": changes,
                "persisted": persisted,
            });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        }
        OutputFormat::Text => {
            if changes.is_empty() {
                println!("{} is already configured", settings.project_name);
            }
            for change in &changes {
                println!("{}", change);
            }
            if dry_run && !changes.is_empty() {
                println!("(dry run, nothing written)");
            }
        }
    }
    Ok(())
}
