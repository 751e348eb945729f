// src/units/file.rs

//! File trigger: fires when files matching a glob pattern change.
//!
//! Change detection is content-based: every matching file is hashed with
//! SHA-256 and the sorted `path:hex` pairs are joined into one canonical
//! fingerprint string. Equal fingerprints mean "no change".

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::FileConfig;
use crate::engine::capture::CaptureSink;
use crate::state::StateStore;
use crate::units::{CheckMode, UnitRefs};

const FILES_STATE_KEY: &str = "files_state";

/// Trigger that fires when the fingerprint of a file set changes.
#[derive(Debug)]
pub struct FileTrigger {
    pub name: String,
    pub refs: UnitRefs,
    state: StateStore,
    pattern: String,
}

impl FileTrigger {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        state: StateStore,
        refs: UnitRefs,
    ) -> Result<Self> {
        // Reject malformed patterns at construction, not on the first sweep.
        glob::Pattern::new(pattern)
            .map_err(|e| anyhow!("invalid glob pattern '{}': {}", pattern, e))?;

        Ok(Self {
            name: name.into(),
            refs,
            state,
            pattern: pattern.to_string(),
        })
    }

    pub fn from_config(cfg: &FileConfig, state: StateStore) -> Result<Self> {
        Self::new(
            cfg.common.name.clone(),
            &cfg.pattern,
            state,
            UnitRefs::from(&cfg.common),
        )
    }

    /// Returns true if the current fingerprint differs from the persisted
    /// one (the first check always fires). Both modes behave identically.
    pub fn check(&self, _mode: CheckMode) -> Result<bool> {
        let current = self.fingerprint()?;

        let last = self.state.get_string(&self.name, FILES_STATE_KEY);
        if last.as_deref() == Some(current.as_str()) {
            return Ok(false);
        }

        self.state
            .set_string(&self.name, FILES_STATE_KEY, &current)
            .context("saving files state")?;
        Ok(true)
    }

    pub fn run(&self, sink: &CaptureSink) -> Result<()> {
        sink.line(&format!(
            "File trigger '{}' activated (pattern: {})",
            self.name, self.pattern
        ));
        Ok(())
    }

    /// Canonical `path:hex|path:hex|...` fingerprint over all files matching
    /// the pattern, sorted by path. Directories are ignored; files that
    /// vanish between the glob and the read hash as empty.
    pub fn fingerprint(&self) -> Result<String> {
        let paths = glob::glob(&self.pattern)
            .map_err(|e| anyhow!("invalid glob pattern '{}': {}", self.pattern, e))?;

        let mut entries: Vec<(String, String)> = Vec::new();
        for entry in paths {
            let Ok(path) = entry else { continue };
            if !path.is_file() {
                continue;
            }

            let hash = hash_file(&path).unwrap_or_default();
            entries.push((path.to_string_lossy().into_owned(), hash));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(unit = %self.name, files = entries.len(), "fingerprinted file set");

        let parts: Vec<String> = entries
            .into_iter()
            .map(|(path, hash)| format!("{}:{}", path, hash))
            .collect();
        Ok(parts.join("|"))
    }
}

/// SHA-256 of a file's contents as lowercase hex.
fn hash_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
