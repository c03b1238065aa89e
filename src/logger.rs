use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only progress bar and final summary
    Summary = 1,   // Per-entity outcomes (default)
    Detailed = 2,  // Section warnings and enrichment details
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// Counters collected over one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub entities_total: usize,
    pub entities_processed: usize,
    pub entities_skipped: usize,
    pub identities_found: usize,
    pub identities_not_found: usize,
    pub section_failures: usize,
    pub country_service_calls: usize,
    pub country_service_failures: usize,
    pub batches_flushed: usize,
    pub records_written: usize,
    pub output_file: String,
}

/// User-facing run log: timestamped lines, a progress bar over the entity
/// list, and a summary block at the end.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    stats: Arc<Mutex<RunStats>>,
    started: Arc<Mutex<Option<Instant>>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            stats: Arc::new(Mutex::new(RunStats::default())),
            started: Arc::new(Mutex::new(None)),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: PathBuf) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Errors are shown at every verbosity.
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above the progress bar when one is active
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn with_stats(&self, f: impl FnOnce(&mut RunStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    pub async fn start_progress(&self, total: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        if self.verbosity == VerbosityLevel::Debug {
            // Debug output is too dense for a redrawing bar
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }
        pb.set_message("Starting...");

        *self.progress_bar.write().await = Some(pb);
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.with_stats(|s| s.entities_total = total as usize);
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn advance_progress(&self, steps: u64) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.inc(steps);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }
        self.info(final_message);
    }

    pub fn record_entity_processed(&self) {
        self.with_stats(|s| s.entities_processed += 1);
    }

    pub fn record_entity_skipped(&self) {
        self.with_stats(|s| s.entities_skipped += 1);
    }

    pub fn record_identity(&self, found: bool) {
        self.with_stats(|s| {
            if found {
                s.identities_found += 1;
            } else {
                s.identities_not_found += 1;
            }
        });
    }

    pub fn record_section_failure(&self) {
        self.with_stats(|s| s.section_failures += 1);
    }

    pub fn record_country_service_call(&self, failed: bool) {
        self.with_stats(|s| {
            s.country_service_calls += 1;
            if failed {
                s.country_service_failures += 1;
            }
        });
    }

    pub fn record_flush(&self, records: usize) {
        self.with_stats(|s| {
            s.batches_flushed += 1;
            s.records_written += records;
        });
    }

    pub fn record_output_file(&self, path: &Path) {
        let path = path.display().to_string();
        self.with_stats(|s| s.output_file = path);
    }

    pub fn stats(&self) -> RunStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Printed to stdout regardless of verbosity.
    pub fn print_final_summary(&self) {
        let stats = self.stats();
        let elapsed = self.started.lock().ok().and_then(|s| *s).map(|s| s.elapsed());

        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== RUN SUMMARY ===");
        if let Some(elapsed) = elapsed {
            println!("Duration: {:.2}s", elapsed.as_secs_f64());
        }
        println!("Entities: {} ({} processed, {} skipped from checkpoint)",
            stats.entities_total, stats.entities_processed, stats.entities_skipped);
        println!("Importer pages found: {}", stats.identities_found);
        println!("Not found: {}", stats.identities_not_found);
        println!("Section failures: {}", stats.section_failures);
        println!("Country service calls: {} ({} failed)",
            stats.country_service_calls, stats.country_service_failures);
        println!("Records written: {} in {} batches", stats.records_written, stats.batches_flushed);
        if !stats.output_file.is_empty() {
            println!("Output: {}", stats.output_file);
        }
        println!("===================\n");
    }

    /// Write every buffered log line to the log file, if one was requested.
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };
        let Ok(buffer) = self.log_buffer.lock() else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        for line in buffer.iter() {
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }
}
