use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

use vesselscout::checkpoint::{generate_settings_hash, Checkpoint, CheckpointTracker, ResumeMode};
use vesselscout::cli::Cli;
use vesselscout::config::{self, AppConfig};
use vesselscout::country::{ChatCountryService, CountryResolver, CountryService, CountryTable};
use vesselscout::input::load_entities;
use vesselscout::logger::RunLogger;
use vesselscout::pipeline::EntityPipeline;
use vesselscout::result_sink::ResultSink;
use vesselscout::source::BrowserSource;

/// Set by the Ctrl-C handler; the run loop stops before the next entity.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Grace period between Ctrl-C and a forced exit.
const INTERRUPT_GRACE_SECS: u64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.init {
        let created = match &cli.config {
            Some(path) => AppConfig::create_default_config_at(path),
            None => AppConfig::create_default_config(),
        };
        match created {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run vesselscout again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut app_config = load_config(&cli);
    cli.apply_overrides(&mut app_config);
    if let Err(e) = app_config.validate() {
        eprintln!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    init_tracing(cli.verbose);

    let verbosity = cli.verbosity();
    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path.clone()),
        None => RunLogger::new(verbosity),
    };

    ctrlc::set_handler(move || {
        INTERRUPTED.store(true, Ordering::SeqCst);
        eprintln!("\n⚠️  Interrupt received. Finishing the current company and saving progress...");
        std::thread::sleep(std::time::Duration::from_secs(INTERRUPT_GRACE_SECS));
        eprintln!("⚠️  Force exiting (the last unsaved batch may be lost).");
        std::process::exit(130);
    })
    .unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
    });

    let input_file = cli.input_file.clone().context("Input file is required")?;
    let entities = load_entities(&input_file)?;
    logger.info(&format!("Loaded {} companies from {}", entities.len(), input_file.display()));

    let output_path = cli.get_output_path();
    let output_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    println!("📁 Results will be saved to: {}", output_path.display());
    logger.record_output_file(&output_path);

    let settings_hash = generate_settings_hash(
        app_config.output.top_n,
        app_config.source.fuzzy_search,
        app_config.country_service.enabled,
    );
    let resumed = resolve_checkpoint(
        cli.get_resume_mode(),
        &output_dir,
        &input_file,
        &output_path,
        &settings_hash,
        &logger,
    )?;

    let batch_size = app_config.output.batch_size;
    let (checkpoint, mut sink) = match resumed {
        Some(cp) => (cp, ResultSink::append_to(&output_path, batch_size)?),
        None => (
            Checkpoint::new(&input_file, &output_path, settings_hash.clone()),
            ResultSink::create(&output_path, batch_size)?,
        ),
    };
    let mut tracker = CheckpointTracker::new(checkpoint, &output_dir);

    let table = CountryTable::load(app_config.country_table.path.as_deref())?;
    logger.debug(&format!("Port table loaded with {} aliases", table.len()));

    let chat_service = if app_config.country_service.enabled {
        match ChatCountryService::from_config(&app_config.country_service) {
            Ok(service) => Some(service),
            Err(e) => {
                logger.error(&format!("Country service disabled: {}", e));
                None
            }
        }
    } else {
        None
    };
    let service: Option<&dyn CountryService> = chat_service.as_ref().map(|s| s as &dyn CountryService);

    let source = BrowserSource::launch(&app_config.source)?;
    source.sign_in_from_env().await?;
    logger.info("Signed in");

    let pipeline = EntityPipeline::new(
        &source,
        CountryResolver::new(&table, service),
        &app_config.source,
        app_config.output.top_n,
        logger.clone(),
    );
    let run = pipeline.run(&entities, &mut sink, Some(&mut tracker), &INTERRUPTED).await?;
    sink.finish()?;

    if run.interrupted {
        logger.error("Run interrupted by user. Re-run with --resume to continue.");
        finish_logging(&logger, cli.log_file.as_deref());
        std::process::exit(130);
    }

    tracker.complete()?;
    finish_logging(&logger, cli.log_file.as_deref());
    Ok(())
}

/// Load the configuration, offering to create it when missing.
fn load_config(cli: &Cli) -> AppConfig {
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };

    match loaded {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config() {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to customize settings, then run vesselscout again.");
                std::process::exit(0);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Diagnostics go to stderr; RUST_LOG wins over -v.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,vesselscout={}", level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn finish_logging(logger: &RunLogger, log_file: Option<&Path>) {
    logger.print_final_summary();
    if !logger.is_log_export_enabled() {
        return;
    }
    match logger.export_logs() {
        Ok(()) => {
            if let Some(path) = log_file {
                println!("📝 Run log written to: {}", path.display());
            }
        }
        Err(e) => eprintln!("⚠️  Failed to write log file: {}", e),
    }
}

fn ask_yes(question: &str) -> bool {
    print!("{} [Y/n]: ", question);
    let _ = io::stdout().flush();
    let mut answer = String::new();
    let _ = io::stdin().read_line(&mut answer);
    let answer = answer.trim().to_lowercase();
    answer.is_empty() || answer == "y" || answer == "yes"
}

/// Decide whether to continue from an existing checkpoint. Returns the
/// checkpoint to resume from, or `None` for a fresh run.
fn resolve_checkpoint(
    mode: ResumeMode,
    output_dir: &Path,
    input_file: &Path,
    output_file: &Path,
    settings_hash: &str,
    logger: &RunLogger,
) -> Result<Option<Checkpoint>> {
    if !Checkpoint::exists(output_dir) {
        return Ok(None);
    }

    let existing = match Checkpoint::load(output_dir) {
        Ok(cp) => cp,
        Err(e) => {
            logger.error(&format!("Failed to load existing checkpoint: {}. Starting fresh.", e));
            Checkpoint::delete(output_dir)?;
            return Ok(None);
        }
    };
    let compatible = existing.is_compatible(input_file, output_file, settings_hash);
    let summary = existing.summary();

    let resume = match mode {
        ResumeMode::Fresh => {
            println!("🔄 Starting fresh (--no-resume specified).");
            false
        }
        ResumeMode::AutoResume => {
            if !compatible {
                println!("⚠️  Existing checkpoint is incompatible (different input, output or settings). Starting fresh.");
            }
            compatible
        }
        ResumeMode::Prompt if !io::stdin().is_terminal() => {
            if compatible {
                println!("📋 Auto-resuming from compatible checkpoint (non-interactive mode)");
            } else {
                println!("⚠️  Incompatible checkpoint deleted (non-interactive mode)");
            }
            compatible
        }
        ResumeMode::Prompt => {
            println!();
            println!("📋 Unfinished run found:");
            println!("   {}", summary);
            if compatible {
                ask_yes("Resume from checkpoint?")
            } else {
                println!("⚠️  Checkpoint is incompatible with the current input or settings.");
                if !ask_yes("Delete checkpoint and start fresh?") {
                    println!("❌ Cannot proceed with incompatible checkpoint. Exiting.");
                    std::process::exit(1);
                }
                false
            }
        }
    };

    if resume {
        println!("✅ Resuming: {}", summary);
        Ok(Some(existing))
    } else {
        Checkpoint::delete(output_dir)?;
        Ok(None)
    }
}
