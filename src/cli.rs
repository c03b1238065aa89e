use clap::Parser;
use std::path::{Path, PathBuf};

use crate::checkpoint::ResumeMode;
use crate::config::AppConfig;
use crate::logger::VerbosityLevel;

#[derive(Parser, Debug)]
#[command(name = "vesselscout")]
#[command(about = "Collects importer trade activity (shipments by country, port type and service provider) for a list of companies")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/vesselscout.toml
    #[arg(long)]
    pub init: bool,

    /// CSV or JSON file listing the companies to look up
    /// CSV: header with companyName, domain, legalName, location (or one domain per line)
    /// JSON: array of objects with the same fields, or array of domain strings
    #[arg(short, long, value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Output CSV filename
    #[arg(short, long, default_value = "vessel_results.csv")]
    pub output: String,

    /// Output directory for the results file (defaults to Desktop)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./config/vesselscout.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Records buffered before each write to disk (overrides config)
    #[arg(long, value_name = "K")]
    pub batch_size: Option<usize>,

    /// Entries kept in ranked summaries (overrides config)
    #[arg(long, value_name = "N")]
    pub top_n: Option<usize>,

    /// Skip the fuzzy-search pass when no exact match is found
    #[arg(long)]
    pub no_fuzzy: bool,

    /// Resolve countries from the static port table only
    #[arg(long)]
    pub no_country_service: bool,

    /// Run Chrome with a visible window
    #[arg(long)]
    pub show_browser: bool,

    /// Auto-resume from checkpoint if one exists (skip resume prompt)
    #[arg(long, conflicts_with = "no_resume")]
    pub resume: bool,

    /// Start fresh, deleting any checkpoint and existing output
    #[arg(long, conflicts_with = "resume")]
    pub no_resume: bool,

    /// Export run logs to a file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Verbose logging (-v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only show the progress bar and final summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.init {
            return Ok(());
        }

        match &self.input_file {
            None => return Err("Input file is required (use --input-file)".to_string()),
            Some(p) if p.as_os_str().is_empty() => return Err("Input file cannot be empty".to_string()),
            _ => {}
        }

        if self.output.trim().is_empty() {
            return Err("Output filename cannot be empty".to_string());
        }

        if self.batch_size == Some(0) {
            return Err("Batch size must be greater than 0".to_string());
        }

        if self.top_n == Some(0) {
            return Err("Top N must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn get_default_output_dir() -> PathBuf {
        dirs::desktop_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn get_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(Self::get_default_output_dir)
    }

    /// Full path of the results file. An absolute `--output` ignores the output directory.
    pub fn get_output_path(&self) -> PathBuf {
        let output = Path::new(&self.output);
        if output.is_absolute() {
            return output.to_path_buf();
        }
        let mut path = self.get_output_dir().join(output);
        if path.extension().is_none() {
            path.set_extension("csv");
        }
        path
    }

    pub fn get_resume_mode(&self) -> ResumeMode {
        if self.resume {
            ResumeMode::AutoResume
        } else if self.no_resume {
            ResumeMode::Fresh
        } else {
            ResumeMode::Prompt
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Silent
        } else {
            VerbosityLevel::from_verbose_count(self.verbose)
        }
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(k) = self.batch_size {
            config.output.batch_size = k;
        }
        if let Some(n) = self.top_n {
            config.output.top_n = n;
        }
        if self.no_fuzzy {
            config.source.fuzzy_search = false;
        }
        if self.no_country_service {
            config.country_service.enabled = false;
        }
        if self.show_browser {
            config.source.headless = false;
        }
    }
}
