// checkpoint.rs - Resume an interrupted run
//
// After every flushed batch the checkpoint records which entities are already
// in the output file. On restart those entities are skipped and the output is
// appended to, so a long run can survive Ctrl+C or a crash.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Hidden file next to the output file
pub const CHECKPOINT_FILENAME: &str = ".vesselscout-checkpoint.json";

/// Bump when the on-disk format changes
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,

    /// UTC timestamp of the last save
    pub created_at: DateTime<Utc>,

    pub input_file: String,

    pub output_file: String,

    /// Hash of the settings that shape output rows; a mismatch blocks resuming
    pub settings_hash: String,

    /// Identity keys of entities whose records are on disk
    pub completed: HashSet<String>,

    pub records_written: usize,
}

impl Checkpoint {
    pub fn new(input_file: &Path, output_file: &Path, settings_hash: String) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            input_file: input_file.display().to_string(),
            output_file: output_file.display().to_string(),
            settings_hash,
            completed: HashSet::new(),
            records_written: 0,
        }
    }

    pub fn get_checkpoint_path(output_dir: &Path) -> PathBuf {
        output_dir.join(CHECKPOINT_FILENAME)
    }

    pub fn exists(output_dir: &Path) -> bool {
        Self::get_checkpoint_path(output_dir).exists()
    }

    /// Load the checkpoint in `output_dir`. Fails on an incompatible format version.
    pub fn load(output_dir: &Path) -> Result<Self> {
        let path = Self::get_checkpoint_path(output_dir);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            anyhow::bail!(
                "Incompatible checkpoint version: file has version {} but current version is {}. \
                 Delete the checkpoint file to start fresh.",
                checkpoint.version,
                CHECKPOINT_VERSION
            );
        }
        Ok(checkpoint)
    }

    /// Write to a temp file, fsync, then rename over the checkpoint.
    pub fn save(&mut self, output_dir: &Path) -> Result<()> {
        self.created_at = Utc::now();
        let path = Self::get_checkpoint_path(output_dir);
        let temp_path = output_dir.join(".vesselscout-checkpoint.tmp");
        let content = serde_json::to_string_pretty(self)?;

        {
            let mut file = std::fs::File::create(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            std::io::Write::write_all(&mut file, content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to write checkpoint: {}", path.display()))?;

        Ok(())
    }

    pub fn delete(output_dir: &Path) -> Result<()> {
        let path = Self::get_checkpoint_path(output_dir);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete checkpoint: {}", path.display()))?;
        }
        Ok(())
    }

    /// Same input, same output file, same output-shaping settings.
    pub fn is_compatible(&self, input_file: &Path, output_file: &Path, settings_hash: &str) -> bool {
        self.input_file == input_file.display().to_string()
            && self.output_file == output_file.display().to_string()
            && self.settings_hash == settings_hash
    }

    pub fn mark_completed(&mut self, identity_key: &str) {
        if self.completed.insert(identity_key.to_string()) {
            self.records_written += 1;
        }
    }

    pub fn is_completed(&self, identity_key: &str) -> bool {
        self.completed.contains(identity_key)
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            input_file: self.input_file.clone(),
            created_at: self.created_at,
            completed_count: self.completed.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub input_file: String,
    pub created_at: DateTime<Utc>,
    pub completed_count: usize,
}

impl std::fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Checkpoint for '{}' - {} entities written (saved {})",
            self.input_file,
            self.completed_count,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Hash of the settings that change what a row contains.
pub fn generate_settings_hash(top_n: usize, fuzzy_search: bool, country_service_enabled: bool) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    top_n.hash(&mut hasher);
    fuzzy_search.hash(&mut hasher);
    country_service_enabled.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Keeps a checkpoint in step with the result sink: keys are queued as records
/// are added and only marked completed once their batch is on disk.
pub struct CheckpointTracker {
    checkpoint: Checkpoint,
    dir: PathBuf,
    unflushed: Vec<String>,
}

impl CheckpointTracker {
    pub fn new(checkpoint: Checkpoint, dir: &Path) -> Self {
        Self {
            checkpoint,
            dir: dir.to_path_buf(),
            unflushed: Vec::new(),
        }
    }

    pub fn is_completed(&self, identity_key: &str) -> bool {
        self.checkpoint.is_completed(identity_key)
    }

    pub fn record_added(&mut self, identity_key: &str) {
        self.unflushed.push(identity_key.to_string());
    }

    /// Mark everything queued since the last flush as completed and save.
    pub fn record_flushed(&mut self) -> Result<()> {
        if self.unflushed.is_empty() {
            return Ok(());
        }
        for key in std::mem::take(&mut self.unflushed) {
            self.checkpoint.mark_completed(&key);
        }
        self.checkpoint.save(&self.dir)
    }

    /// The run finished; the checkpoint is no longer needed.
    pub fn complete(self) -> Result<()> {
        Checkpoint::delete(&self.dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ResumeMode {
    /// Ask if a checkpoint exists (auto-resume when not interactive)
    #[default]
    Prompt,
    AutoResume,
    /// Delete any checkpoint and truncate the output
    Fresh,
}
